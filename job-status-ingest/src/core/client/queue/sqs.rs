use crate::core::client::queue::{BatchDeleteFailure, QueueClient, QueueError, ReceivedMessage};
use crate::types::constant::SQS_DELETE_BATCH_LIMIT;
use crate::types::params::QueueArgs;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sqs::types::{DeleteMessageBatchRequestEntry, QueueAttributeName};
use aws_sdk_sqs::Client;
use std::time::Duration;

/// SQS backed work queue. One instance is bound to the single status queue the
/// workers publish to.
#[derive(Clone, Debug)]
pub struct SQS {
    client: Client,
    queue_url: String,
}

impl SQS {
    /// new - Create a new SQS client bound to the configured queue URL
    /// # Arguments
    /// * `aws_config` - The AWS configuration.
    /// * `args` - The queue arguments.
    pub fn new(aws_config: &SdkConfig, args: &QueueArgs) -> Self {
        let mut sqs_config_builder = aws_sdk_sqs::config::Builder::from(aws_config);
        if let Some(endpoint_url) = &args.endpoint_url {
            sqs_config_builder = sqs_config_builder.endpoint_url(endpoint_url.as_str());
        }
        let client = Client::from_conf(sqs_config_builder.build());
        Self { client, queue_url: args.queue_url.clone() }
    }
}

/// Entry ids only need to be unique within one request and match `[A-Za-z0-9_-]{1,80}`.
fn batch_entry_id(index: usize) -> String {
    format!("ack_{}", index)
}

#[async_trait]
impl QueueClient for SQS {
    async fn receive_messages(&self, max_messages: i32, wait: Duration) -> Result<Vec<ReceivedMessage>, QueueError> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_messages)
            .wait_time_seconds(wait.as_secs() as i32)
            .send()
            .await?;

        let messages = output
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|message| ReceivedMessage {
                body: message.body().map(str::to_string),
                receipt_handle: message.receipt_handle().map(str::to_string),
            })
            .collect::<Vec<_>>();

        tracing::trace!(count = messages.len(), "Received messages from status queue");
        Ok(messages)
    }

    async fn delete_message(&self, receipt_handle: &str) -> Result<(), QueueError> {
        self.client.delete_message().queue_url(&self.queue_url).receipt_handle(receipt_handle).send().await?;
        Ok(())
    }

    async fn delete_message_batch(&self, receipt_handles: &[String]) -> Result<Vec<BatchDeleteFailure>, QueueError> {
        if receipt_handles.len() > SQS_DELETE_BATCH_LIMIT {
            return Err(QueueError::BatchTooLarge(receipt_handles.len()));
        }
        if receipt_handles.is_empty() {
            return Ok(Vec::new());
        }

        let entries = receipt_handles
            .iter()
            .enumerate()
            .map(|(index, receipt_handle)| {
                DeleteMessageBatchRequestEntry::builder()
                    .id(batch_entry_id(index))
                    .receipt_handle(receipt_handle)
                    .build()
            })
            .collect::<Result<Vec<_>, _>>()?;

        let output = self
            .client
            .delete_message_batch()
            .queue_url(&self.queue_url)
            .set_entries(Some(entries))
            .send()
            .await?;

        let failures = output
            .failed()
            .iter()
            .map(|failed| {
                let receipt_handle = receipt_handles
                    .iter()
                    .enumerate()
                    .find(|(index, _)| batch_entry_id(*index) == failed.id())
                    .map(|(_, receipt_handle)| receipt_handle.clone())
                    .unwrap_or_else(|| failed.id().to_string());
                BatchDeleteFailure {
                    receipt_handle,
                    code: failed.code().to_string(),
                    message: failed.message().map(str::to_string),
                }
            })
            .collect();

        Ok(failures)
    }

    async fn health_check(&self) -> Result<(), QueueError> {
        self.client
            .get_queue_attributes()
            .queue_url(&self.queue_url)
            .attribute_names(QueueAttributeName::QueueArn)
            .send()
            .await?;
        Ok(())
    }
}
