/// Durable task queue abstraction
///
/// A `ChunkWriteTask` is handed off from the admission-gated worker pool
/// to a durable queue so that a chunk write survives a process restart
/// between admission and the object-store write actually landing. The
/// in-memory backend gives up that guarantee in exchange for zero
/// external dependencies; redis and sqs back it with a real durable
/// store.
pub mod consumer;
pub mod memory;
pub mod redis_queue;
pub mod result_store;
pub mod sqs_queue;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::config::{Config, QueueBackend};
use crate::error::Result;

pub use result_store::ChunkResultStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkWriteTask {
    pub task_id: String,
    pub upload_id: String,
    pub chunk_index: i64,
    pub chunk_checksum_sha256: String,
    pub multipart_token: Option<String>,
    #[serde(with = "base64_bytes")]
    pub bytes: Bytes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkWriteResult {
    pub task_id: String,
    pub outcome: ChunkWriteOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChunkWriteOutcome {
    Written {
        storage_key: String,
        storage_etag: Option<String>,
    },
    Failed {
        reason: String,
    },
}

/// An opaque, backend-specific receipt that a consumer passes back when
/// acknowledging a task (deleting it from the durable queue, releasing a
/// visibility timeout, etc).
pub type AckToken = String;

#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(&self, task: ChunkWriteTask) -> Result<()>;

    /// Long-poll for the next task. Returns `None` on a timed-out poll
    /// with nothing available, letting the consumer loop back around.
    async fn dequeue(&self) -> Result<Option<(ChunkWriteTask, AckToken)>>;

    async fn ack(&self, token: AckToken) -> Result<()>;
}

pub async fn build(config: &Config) -> Result<Box<dyn TaskQueue>> {
    match config.queue.backend {
        QueueBackend::Memory => Ok(Box::new(memory::MemoryQueue::new())),
        QueueBackend::Redis => Ok(Box::new(redis_queue::RedisQueue::connect(&config.queue).await?)),
        QueueBackend::Sqs => Ok(Box::new(sqs_queue::SqsQueue::connect(&config.queue).await?)),
    }
}

mod base64_bytes {
    use base64::Engine;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Bytes, s: S) -> Result<S::Ok, S::Error> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        s.serialize_str(&encoded)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(d)?;
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)?;
        Ok(Bytes::from(decoded))
    }
}
