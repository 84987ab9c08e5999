pub mod error;
pub mod sqs;

use async_trait::async_trait;
pub use error::QueueError;
use std::time::Duration;

/// One delivery returned by a receive call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReceivedMessage {
    pub body: Option<String>,
    pub receipt_handle: Option<String>,
}

/// An entry of a delete batch that the queue refused to delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchDeleteFailure {
    pub receipt_handle: String,
    pub code: String,
    pub message: Option<String>,
}

/// Trait defining the work queue operations the ingest pipeline relies on
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Long-polls the queue for up to `max_messages` deliveries, waiting at most `wait`.
    async fn receive_messages(&self, max_messages: i32, wait: Duration) -> Result<Vec<ReceivedMessage>, QueueError>;

    async fn delete_message(&self, receipt_handle: &str) -> Result<(), QueueError>;

    /// Deletes up to [`crate::types::constant::SQS_DELETE_BATCH_LIMIT`] deliveries in one call.
    ///
    /// # Returns
    /// * `Ok(failures)` - The entries the queue reported as not deleted
    /// * `Err(QueueError)` - If the whole call failed
    async fn delete_message_batch(&self, receipt_handles: &[String]) -> Result<Vec<BatchDeleteFailure>, QueueError>;

    /// Perform a health check on the queue service
    ///
    /// This method verifies that the queue is reachable and the configured
    /// credentials are allowed to read its attributes.
    async fn health_check(&self) -> Result<(), QueueError>;
}
