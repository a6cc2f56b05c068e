/// In-process queue backend
///
/// Backs the durable-queue abstraction with an in-memory channel. Tasks
/// do not survive a process restart; acking is a no-op since there is
/// nothing external to confirm delivery to.
use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use super::{AckToken, ChunkWriteTask, TaskQueue};
use crate::error::Result;

pub struct MemoryQueue {
    sender: mpsc::UnboundedSender<ChunkWriteTask>,
    receiver: Mutex<mpsc::UnboundedReceiver<ChunkWriteTask>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
        }
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskQueue for MemoryQueue {
    async fn enqueue(&self, task: ChunkWriteTask) -> Result<()> {
        self.sender
            .send(task)
            .map_err(|e| crate::error::AppError::Upstream(format!("queue closed: {e}")))
    }

    async fn dequeue(&self) -> Result<Option<(ChunkWriteTask, AckToken)>> {
        let mut receiver = self.receiver.lock().await;
        match receiver.recv().await {
            Some(task) => Ok(Some((task, String::new()))),
            None => Ok(None),
        }
    }

    async fn ack(&self, _token: AckToken) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_a_task() {
        let queue = MemoryQueue::new();
        queue
            .enqueue(ChunkWriteTask {
                task_id: "t1".into(),
                upload_id: "u1".into(),
                chunk_index: 0,
                chunk_checksum_sha256: "abc".into(),
                multipart_token: None,
                bytes: bytes::Bytes::from_static(b"hello"),
            })
            .await
            .unwrap();

        let (task, token) = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(task.task_id, "t1");
        queue.ack(token).await.unwrap();
    }
}
