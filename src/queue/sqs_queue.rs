/// SQS-backed durable queue
///
/// `dequeue` long-polls with `WaitTimeSeconds` and relies on SQS's
/// visibility timeout for at-least-once delivery; the returned
/// `AckToken` is the message's receipt handle, which `ack` deletes.
use async_trait::async_trait;
use aws_sdk_sqs::config::Region;
use aws_sdk_sqs::Client;

use super::{AckToken, ChunkWriteTask, TaskQueue};
use crate::config::QueueConfig;
use crate::error::{AppError, Result};

pub struct SqsQueue {
    client: Client,
    queue_url: String,
    poll_timeout_seconds: i32,
}

impl SqsQueue {
    pub async fn connect(cfg: &QueueConfig) -> Result<Self> {
        let queue_url = cfg.sqs_queue_url.clone().ok_or_else(|| {
            AppError::Internal("SQS_QUEUE_URL is required for the sqs queue backend".into())
        })?;

        let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .load()
            .await;
        let client = Client::new(&aws_config);

        Ok(Self {
            client,
            queue_url,
            poll_timeout_seconds: cfg.poll_timeout_seconds.min(20) as i32,
        })
    }
}

#[async_trait]
impl TaskQueue for SqsQueue {
    async fn enqueue(&self, task: ChunkWriteTask) -> Result<()> {
        let payload = serde_json::to_string(&task)?;
        self.client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(payload)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("sqs send_message failed: {e}")))?;
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<(ChunkWriteTask, AckToken)>> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(1)
            .wait_time_seconds(self.poll_timeout_seconds)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("sqs receive_message failed: {e}")))?;

        let Some(message) = output.messages().first() else {
            return Ok(None);
        };

        let body = message
            .body()
            .ok_or_else(|| AppError::Upstream("sqs message missing body".into()))?;
        let task: ChunkWriteTask = serde_json::from_str(body)?;
        let receipt_handle = message
            .receipt_handle()
            .ok_or_else(|| AppError::Upstream("sqs message missing receipt handle".into()))?
            .to_string();

        Ok(Some((task, receipt_handle)))
    }

    async fn ack(&self, token: AckToken) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(token)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("sqs delete_message failed: {e}")))?;
        Ok(())
    }
}
