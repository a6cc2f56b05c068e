/// Redis-backed durable queue
///
/// Uses a single Redis list as a FIFO: `RPUSH` to enqueue, blocking
/// `BLPOP` to dequeue. Redis lists give no visibility-timeout semantics,
/// so a task is considered acknowledged the moment it is popped; the
/// `ack` call here is a no-op kept only to satisfy the trait.
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::{AckToken, ChunkWriteTask, TaskQueue};
use crate::config::QueueConfig;
use crate::error::{AppError, Result};

pub struct RedisQueue {
    conn: ConnectionManager,
    queue_key: String,
    poll_timeout_seconds: u64,
}

impl RedisQueue {
    pub async fn connect(cfg: &QueueConfig) -> Result<Self> {
        let client = redis::Client::open(cfg.redis_url.as_str())
            .map_err(|e| AppError::Upstream(format!("invalid redis url: {e}")))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::Upstream(format!("failed to connect to redis: {e}")))?;

        Ok(Self {
            conn,
            queue_key: cfg.redis_queue_name.clone(),
            poll_timeout_seconds: cfg.poll_timeout_seconds,
        })
    }
}

#[async_trait]
impl TaskQueue for RedisQueue {
    async fn enqueue(&self, task: ChunkWriteTask) -> Result<()> {
        let payload = serde_json::to_string(&task)?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .rpush(&self.queue_key, payload)
            .await
            .map_err(|e| AppError::Upstream(format!("redis rpush failed: {e}")))?;
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<(ChunkWriteTask, AckToken)>> {
        let mut conn = self.conn.clone();
        let result: Option<(String, String)> = conn
            .blpop(&self.queue_key, self.poll_timeout_seconds as usize)
            .await
            .map_err(|e| AppError::Upstream(format!("redis blpop failed: {e}")))?;

        match result {
            Some((_key, payload)) => {
                let task: ChunkWriteTask = serde_json::from_str(&payload)?;
                Ok(Some((task, String::new())))
            }
            None => Ok(None),
        }
    }

    async fn ack(&self, _token: AckToken) -> Result<()> {
        Ok(())
    }
}
