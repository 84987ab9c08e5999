use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::client::queue::QueueError;
use crate::core::client::QueueClient;
use crate::error::MessageError;
use crate::types::message::WorkerMessage;
use crate::types::params::PollerParams;
use crate::worker::consolidate::consolidate_by_job_key;
use crate::worker::StatusSink;

/// Counts of one receive call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub received: usize,
    /// Unparsable or keyless messages, deleted right away
    pub malformed: usize,
    /// Representatives handed to the status updater
    pub forwarded: usize,
    /// Messages that lost consolidation and are left to redelivery
    pub superseded: usize,
}

/// Long-polls the status queue and forwards one representative message per
/// job key and batch to the status sink.
pub struct QueuePoller {
    queue: Arc<dyn QueueClient>,
    sink: Arc<dyn StatusSink>,
    params: PollerParams,
}

impl QueuePoller {
    pub fn new(queue: Arc<dyn QueueClient>, sink: Arc<dyn StatusSink>, params: PollerParams) -> Self {
        Self { queue, sink, params }
    }

    /// Receives one batch, drops the malformed messages and forwards the
    /// representatives of the rest.
    ///
    /// # Errors
    /// Only a failed receive call is an error. Failures to delete a malformed
    /// message are logged; it will come back and be deleted again.
    pub async fn poll_once(&self) -> Result<PollSummary, QueueError> {
        let received = self.queue.receive_messages(self.params.max_messages, self.params.wait_time).await?;
        let mut summary = PollSummary { received: received.len(), ..Default::default() };

        let mut messages = Vec::with_capacity(received.len());
        for raw in received {
            let parsed = match raw.body.as_deref() {
                Some(body) => WorkerMessage::parse(body, raw.receipt_handle.clone()),
                None => Err(MessageError::MissingBody),
            };
            match parsed {
                Ok(message) => messages.push(message),
                Err(e) => {
                    summary.malformed += 1;
                    warn!(error = %e, body = ?raw.body, "Discarding malformed queue message");
                    if let Some(receipt_handle) = raw.receipt_handle {
                        if let Err(e) = self.queue.delete_message(&receipt_handle).await {
                            error!(error = %e, "Failed to delete malformed queue message");
                        }
                    }
                }
            }
        }

        // Stable, so messages of one job keep their arrival order
        messages.sort_by(|a, b| a.job_key.cmp(&b.job_key));
        for message in &messages {
            debug!(
                job_key = %message.job_key,
                origin = %message.origin,
                kind = %message.kind,
                progress = ?message.progress(),
                "Received status message"
            );
        }

        let parsed = messages.len();
        let representatives = consolidate_by_job_key(messages);
        summary.forwarded = representatives.len();
        summary.superseded = parsed - representatives.len();

        for message in representatives.into_values() {
            self.sink.enqueue_message(message);
        }
        Ok(summary)
    }

    /// Polls until cancelled. A failed receive is retried after the backoff.
    pub async fn run(&self, cancellation_token: CancellationToken) {
        info!(
            max_messages = self.params.max_messages,
            wait_s = self.params.wait_time.as_secs(),
            "Queue poller started"
        );
        loop {
            let result = tokio::select! {
                biased;
                _ = cancellation_token.cancelled() => break,
                result = self.poll_once() => result,
            };

            match result {
                Ok(summary) if summary.received > 0 => {
                    debug!(
                        received = summary.received,
                        malformed = summary.malformed,
                        forwarded = summary.forwarded,
                        superseded = summary.superseded,
                        "Polled status queue"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    error!(
                        error = %e,
                        backoff_ms = self.params.error_backoff.as_millis() as u64,
                        "Failed to receive status messages"
                    );
                    tokio::select! {
                        biased;
                        _ = cancellation_token.cancelled() => break,
                        _ = tokio::time::sleep(self.params.error_backoff) => {}
                    }
                }
            }
        }
        info!("Queue poller stopped");
    }
}
