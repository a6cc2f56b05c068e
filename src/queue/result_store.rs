/// Rendezvous point between the durable-queue consumer and the request
/// handler that is waiting on a chunk write it enqueued.
///
/// A handler registers interest in a `task_id` before handing the task
/// to the queue, then polls (with a deadline) for the consumer to have
/// deposited a result. This decouples the queue backend (which may be
/// an external service with no request/response pairing) from the
/// synchronous HTTP contract the coordinator exposes.
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use super::ChunkWriteResult;
use crate::error::{AppError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

pub struct ChunkResultStore {
    results: Mutex<HashMap<String, ChunkWriteResult>>,
}

impl ChunkResultStore {
    pub fn new() -> Self {
        Self {
            results: Mutex::new(HashMap::new()),
        }
    }

    /// Called by a queue consumer once it has written (or failed to
    /// write) a chunk.
    pub fn deposit(&self, result: ChunkWriteResult) {
        let mut results = self.results.lock().expect("result store mutex poisoned");
        results.insert(result.task_id.clone(), result);
    }

    /// Block-poll until a result for `task_id` appears or `timeout` elapses.
    pub async fn await_result(
        &self,
        task_id: &str,
        timeout: Duration,
    ) -> Result<ChunkWriteResult> {
        let deadline = Instant::now() + timeout;

        loop {
            {
                let mut results = self.results.lock().expect("result store mutex poisoned");
                if let Some(result) = results.remove(task_id) {
                    return Ok(result);
                }
            }

            if Instant::now() >= deadline {
                return Err(AppError::Timeout(format!(
                    "chunk write task {task_id} did not complete in time"
                )));
            }

            sleep(POLL_INTERVAL).await;
        }
    }
}

impl Default for ChunkResultStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::ChunkWriteOutcome;

    #[tokio::test]
    async fn returns_deposited_result() {
        let store = ChunkResultStore::new();
        store.deposit(ChunkWriteResult {
            task_id: "t1".into(),
            outcome: ChunkWriteOutcome::Written {
                storage_key: "uploads/u1/chunk_0".into(),
                storage_etag: None,
            },
        });

        let result = store
            .await_result("t1", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(result.task_id, "t1");
    }

    #[tokio::test]
    async fn times_out_when_nothing_arrives() {
        let store = ChunkResultStore::new();
        let result = store.await_result("missing", Duration::from_millis(50)).await;
        assert!(matches!(result, Err(AppError::Timeout(_))));
    }
}
