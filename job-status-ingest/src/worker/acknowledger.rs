use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::core::client::QueueClient;
use crate::types::constant::SQS_DELETE_BATCH_LIMIT;
use crate::types::params::AckParams;
use crate::utils::debounce::Debouncer;

/// Outcome of one drain of the pending acknowledgments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AckSummary {
    /// Delete batch calls issued
    pub batches: usize,
    pub acknowledged: usize,
    /// Handles abandoned to redelivery
    pub failed: usize,
}

struct AckState {
    queue: Arc<dyn QueueClient>,
    pending: Mutex<Vec<String>>,
    drain_lock: tokio::sync::Mutex<()>,
}

impl AckState {
    fn pending(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_chunk(&self) -> Vec<String> {
        let mut pending = self.pending();
        let len = pending.len().min(SQS_DELETE_BATCH_LIMIT);
        pending.drain(..len).collect()
    }

    async fn flush(&self) -> AckSummary {
        let _drain = self.drain_lock.lock().await;
        let mut summary = AckSummary::default();

        loop {
            let chunk = self.next_chunk();
            if chunk.is_empty() {
                break;
            }
            summary.batches += 1;

            match self.queue.delete_message_batch(&chunk).await {
                Ok(failures) => {
                    for failure in &failures {
                        warn!(
                            receipt_handle = %failure.receipt_handle,
                            code = %failure.code,
                            reason = ?failure.message,
                            "Queue refused to delete message, it will be redelivered"
                        );
                    }
                    summary.failed += failures.len();
                    summary.acknowledged += chunk.len().saturating_sub(failures.len());
                }
                Err(e) => {
                    error!(
                        error = %e,
                        handles = chunk.len(),
                        "Failed to delete message batch, messages will be redelivered"
                    );
                    summary.failed += chunk.len();
                }
            }
        }

        if summary.batches > 0 {
            debug!(
                batches = summary.batches,
                acknowledged = summary.acknowledged,
                failed = summary.failed,
                "Acknowledged messages"
            );
        }
        summary
    }
}

/// Batches receipt handles into `DeleteMessageBatch` calls.
///
/// Handles are accepted one at a time and drained on a short debounce. A
/// handle leaves the pending list as soon as the batch carrying it is issued;
/// failed deletes are never retried from here.
#[derive(Clone)]
pub struct Acknowledger {
    state: Arc<AckState>,
    debouncer: Arc<Debouncer>,
}

impl Acknowledger {
    pub fn new(queue: Arc<dyn QueueClient>, params: &AckParams, cancellation_token: &CancellationToken) -> Self {
        let state = Arc::new(AckState {
            queue,
            pending: Mutex::new(Vec::new()),
            drain_lock: tokio::sync::Mutex::new(()),
        });

        let debouncer = {
            let state = state.clone();
            Debouncer::spawn(params.flush, cancellation_token, move || {
                let state = state.clone();
                async move {
                    state.flush().await;
                }
            })
        };

        Self { state, debouncer: Arc::new(debouncer) }
    }

    pub fn acknowledge(&self, receipt_handle: impl Into<String>) {
        self.state.pending().push(receipt_handle.into());
        self.debouncer.trigger();
    }

    /// Drains the pending list now, in chunks of at most ten handles.
    pub async fn flush(&self) -> AckSummary {
        self.state.flush().await
    }

    pub fn pending_len(&self) -> usize {
        self.state.pending().len()
    }

    /// Stops the debounced drain and drains what is left.
    pub async fn shutdown(&self) -> AckSummary {
        self.debouncer.shutdown().await;
        self.flush().await
    }
}
