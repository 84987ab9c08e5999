use thiserror::Error;

/// Reasons a queue message cannot be applied. All of them are permanent: the
/// message is acknowledged and dropped, since redelivery cannot fix it.
#[derive(Error, Debug)]
pub enum MessageError {
    #[error("Message has no body")]
    MissingBody,

    #[error("Failed to parse message body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Job key is required")]
    MissingJobKey,

    #[error("Invalid message: {}", .0.join(", "))]
    Invalid(Vec<String>),
}
