pub mod message;

use thiserror::Error;

use crate::core::client::database::DatabaseError;
use crate::core::client::queue::QueueError;
pub use message::MessageError;

/// Result type for ingest operations
pub type IngestResult<T> = Result<T, IngestError>;

/// Error types for the ingest service
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Queue error: {0}")]
    QueueError(#[from] QueueError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("Message error: {0}")]
    MessageError(#[from] MessageError),

    /// Run Command error
    #[error("Run Command Error: {0}")]
    RunCommandError(String),

    /// Controller error
    #[error("Controller error: {0}")]
    ControllerError(String),
}
