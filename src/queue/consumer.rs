/// Durable queue consumer
///
/// Drains the configured `TaskQueue`, performs the object-store write,
/// deposits the outcome into `ChunkResultStore` for the waiting handler,
/// and acks. One of these runs per `queue.consumer_count` when a durable
/// backend is configured. The in-memory backend never needs this: the
/// coordinator talks to the worker pool directly in that case.
use std::sync::Arc;
use std::time::Duration;

use crate::app_state::AppState;
use crate::queue::{ChunkWriteOutcome, ChunkWriteResult};

pub async fn run(state: Arc<AppState>, consumer_id: usize) {
    loop {
        match state.queue.dequeue().await {
            Ok(Some((task, ack))) => {
                let outcome = match state
                    .storage
                    .write_chunk(
                        &task.upload_id,
                        task.chunk_index,
                        task.bytes.clone(),
                        task.multipart_token.as_deref(),
                    )
                    .await
                {
                    Ok(written) => ChunkWriteOutcome::Written {
                        storage_key: written.storage_key,
                        storage_etag: written.storage_etag,
                    },
                    Err(err) => ChunkWriteOutcome::Failed { reason: err.to_string() },
                };

                state.result_store.deposit(ChunkWriteResult {
                    task_id: task.task_id.clone(),
                    outcome,
                });

                if let Err(err) = state.queue.ack(ack).await {
                    tracing::warn!(consumer_id, task_id = %task.task_id, error = %err, "failed to ack chunk write task");
                }
            }
            Ok(None) => {}
            Err(err) => {
                tracing::error!(consumer_id, error = %err, "queue dequeue failed");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}
