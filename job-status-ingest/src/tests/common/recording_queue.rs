use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::client::queue::{BatchDeleteFailure, QueueClient, QueueError, ReceivedMessage};
use crate::types::constant::SQS_DELETE_BATCH_LIMIT;

/// [`QueueClient`] serving scripted receive batches and recording deletes.
#[derive(Debug, Default)]
pub struct RecordingQueue {
    batches: Mutex<VecDeque<Vec<ReceivedMessage>>>,
    deleted: Mutex<Vec<String>>,
    delete_batches: Mutex<Vec<Vec<String>>>,
}

impl RecordingQueue {
    pub fn with_batch(self, batch: Vec<ReceivedMessage>) -> Self {
        self.batches.lock().unwrap().push_back(batch);
        self
    }

    /// Every receipt handle deleted so far, single or batched, in call order.
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn delete_batch_sizes(&self) -> Vec<usize> {
        self.delete_batches.lock().unwrap().iter().map(Vec::len).collect()
    }
}

pub fn received(body: &str, receipt_handle: &str) -> ReceivedMessage {
    ReceivedMessage { body: Some(body.to_string()), receipt_handle: Some(receipt_handle.to_string()) }
}

#[async_trait]
impl QueueClient for RecordingQueue {
    async fn receive_messages(&self, _max_messages: i32, _wait: Duration) -> Result<Vec<ReceivedMessage>, QueueError> {
        Ok(self.batches.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn delete_message(&self, receipt_handle: &str) -> Result<(), QueueError> {
        self.deleted.lock().unwrap().push(receipt_handle.to_string());
        Ok(())
    }

    async fn delete_message_batch(&self, receipt_handles: &[String]) -> Result<Vec<BatchDeleteFailure>, QueueError> {
        if receipt_handles.len() > SQS_DELETE_BATCH_LIMIT {
            return Err(QueueError::BatchTooLarge(receipt_handles.len()));
        }
        self.delete_batches.lock().unwrap().push(receipt_handles.to_vec());
        self.deleted.lock().unwrap().extend(receipt_handles.iter().cloned());
        Ok(Vec::new())
    }

    async fn health_check(&self) -> Result<(), QueueError> {
        Ok(())
    }
}
