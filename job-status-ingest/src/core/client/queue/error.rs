use aws_sdk_sqs::error::{BuildError, SdkError};
use aws_sdk_sqs::operation::delete_message::DeleteMessageError;
use aws_sdk_sqs::operation::delete_message_batch::DeleteMessageBatchError;
use aws_sdk_sqs::operation::get_queue_attributes::GetQueueAttributesError;
use aws_sdk_sqs::operation::receive_message::ReceiveMessageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Failed to receive messages: {0}")]
    ReceiveMessageError(#[from] SdkError<ReceiveMessageError>),

    #[error("Failed to delete message: {0}")]
    DeleteMessageError(#[from] SdkError<DeleteMessageError>),

    #[error("Failed to delete message batch: {0}")]
    DeleteMessageBatchError(#[from] SdkError<DeleteMessageBatchError>),

    #[error("Failed to get queue attributes: {0}")]
    GetQueueAttributesError(#[from] SdkError<GetQueueAttributesError>),

    #[error("Failed to build queue request: {0}")]
    RequestBuildError(#[from] BuildError),

    #[error("Delete batch of {0} entries exceeds the queue limit")]
    BatchTooLarge(usize),
}
