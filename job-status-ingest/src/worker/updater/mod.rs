pub(crate) mod buffer;
pub(crate) mod subdivision;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use strum::IntoEnumIterator;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::client::JobStore;
use crate::types::job::{BeginRow, ErrorRow, JobOrigin, ProgressRow, ResultRow};
use crate::types::message::{JobStatusMessage, ResultUpdate, WorkerMessage};
use crate::types::params::{OutputParams, UpdaterParams};
use crate::utils::debounce::Debouncer;
use crate::worker::acknowledger::Acknowledger;
use crate::worker::StatusSink;
use buffer::{begin_slot, error_slot, progress_slot, result_slot, Buffers, Slot, SlotAccessor};
use subdivision::SubdivisionOutcome;

/// Counts of one flush tick. Each count is the number of buffered updates whose
/// write succeeded and whose slot was released.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushSummary {
    pub results: usize,
    pub errors: usize,
    pub begins: usize,
    pub progress: usize,
    /// Handles handed to the acknowledger
    pub acknowledged: usize,
    /// Writes that failed and stay buffered
    pub failed_writes: usize,
}

impl FlushSummary {
    pub fn applied(&self) -> usize {
        self.results + self.errors + self.begins + self.progress
    }
}

struct UpdaterState {
    store: Arc<dyn JobStore>,
    acknowledger: Acknowledger,
    outputs: OutputParams,
    buffers: Mutex<Buffers>,
    tick_lock: tokio::sync::Mutex<()>,
}

impl UpdaterState {
    fn buffers(&self) -> MutexGuard<'_, Buffers> {
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot<T: Clone>(&self, slot: SlotAccessor<T>) -> Vec<(String, Slot<T>)> {
        self.buffers().snapshot(slot)
    }

    /// Releases written slots and acknowledges their deliveries.
    fn complete<T>(&self, slot: SlotAccessor<T>, written: &[(String, Slot<T>)]) -> usize {
        let handles = self.buffers().complete(slot, written);
        let count = handles.len();
        for handle in handles {
            self.acknowledger.acknowledge(handle);
        }
        count
    }

    async fn flush(&self) -> FlushSummary {
        let _tick = self.tick_lock.lock().await;
        let started = Instant::now();
        let mut summary = FlushSummary::default();

        // Terminal updates first so a begin or progress of the same tick can
        // never be written after them.
        self.flush_results(&mut summary).await;
        self.flush_errors(&mut summary).await;
        self.flush_begins(&mut summary).await;
        self.flush_progress(&mut summary).await;

        if summary.applied() > 0 || summary.failed_writes > 0 {
            info!(
                results = summary.results,
                errors = summary.errors,
                begins = summary.begins,
                progress = summary.progress,
                failed_writes = summary.failed_writes,
                duration_ms = started.elapsed().as_millis() as u64,
                "Flushed job status updates"
            );
        }
        summary
    }

    async fn flush_results(&self, summary: &mut FlushSummary) {
        let snapshot = self.snapshot(result_slot);
        if snapshot.is_empty() {
            return;
        }
        let (overlay, subdivision): (Vec<_>, Vec<_>) =
            snapshot.into_iter().partition(|(_, slot)| slot.origin == JobOrigin::Overlay);

        if !overlay.is_empty() {
            let rows = overlay
                .iter()
                .map(|(job_key, slot)| ResultRow {
                    job_key: job_key.clone(),
                    result: slot.update.result.clone(),
                    duration_ms: slot.update.duration_ms,
                })
                .collect::<Vec<_>>();
            match self.store.complete_overlay_jobs(&rows).await {
                Ok(updated) => {
                    debug!(origin = %JobOrigin::Overlay, rows = rows.len(), updated, "Wrote results");
                    summary.results += overlay.len();
                    summary.acknowledged += self.complete(result_slot, &overlay);
                }
                Err(e) => {
                    error!(origin = %JobOrigin::Overlay, error = %e, rows = rows.len(), "Failed to write results");
                    summary.failed_writes += 1;
                }
            }
        }

        for entry in subdivision {
            let (job_key, slot) = &entry;
            match self.apply_subdivision_result(job_key, &slot.update).await {
                Ok(outcome) => {
                    debug!(origin = %JobOrigin::Subdivision, %job_key, ?outcome, "Applied result");
                    summary.results += 1;
                    summary.acknowledged += self.complete(result_slot, std::slice::from_ref(&entry));
                }
                Err(e) => {
                    error!(origin = %JobOrigin::Subdivision, %job_key, error = %e, "Failed to write result");
                    summary.failed_writes += 1;
                }
            }
        }
    }

    async fn apply_subdivision_result(
        &self,
        job_key: &str,
        update: &ResultUpdate,
    ) -> Result<SubdivisionOutcome, crate::core::client::database::DatabaseError> {
        subdivision::apply_result(self.store.as_ref(), &self.outputs, job_key, update).await
    }

    async fn flush_errors(&self, summary: &mut FlushSummary) {
        let snapshot = self.snapshot(error_slot);
        for origin in JobOrigin::iter() {
            let entries = snapshot.iter().filter(|(_, slot)| slot.origin == origin).cloned().collect::<Vec<_>>();
            if entries.is_empty() {
                continue;
            }
            let rows = entries
                .iter()
                .map(|(job_key, slot)| ErrorRow { job_key: job_key.clone(), error: slot.update.error.clone() })
                .collect::<Vec<_>>();
            match self.store.fail_jobs(origin, &rows).await {
                Ok(updated) => {
                    debug!(%origin, rows = rows.len(), updated, "Wrote errors");
                    summary.errors += entries.len();
                    summary.acknowledged += self.complete(error_slot, &entries);
                }
                Err(e) => {
                    error!(%origin, error = %e, rows = rows.len(), "Failed to write errors");
                    summary.failed_writes += 1;
                }
            }
        }
    }

    async fn flush_begins(&self, summary: &mut FlushSummary) {
        let snapshot = self.snapshot(begin_slot);
        for origin in JobOrigin::iter() {
            let entries = snapshot.iter().filter(|(_, slot)| slot.origin == origin).cloned().collect::<Vec<_>>();
            if entries.is_empty() {
                continue;
            }
            let rows = entries
                .iter()
                .map(|(job_key, slot)| BeginRow {
                    job_key: job_key.clone(),
                    logs_url: slot.update.logs_url.clone(),
                    logs_expires_at: slot.update.logs_expires_at,
                })
                .collect::<Vec<_>>();
            match self.store.begin_jobs(origin, &rows).await {
                Ok(updated) => {
                    debug!(%origin, rows = rows.len(), updated, "Wrote begins");
                    summary.begins += entries.len();
                    summary.acknowledged += self.complete(begin_slot, &entries);
                }
                Err(e) => {
                    error!(%origin, error = %e, rows = rows.len(), "Failed to write begins");
                    summary.failed_writes += 1;
                }
            }
        }
    }

    async fn flush_progress(&self, summary: &mut FlushSummary) {
        let snapshot = self.snapshot(progress_slot);
        for origin in JobOrigin::iter() {
            let entries = snapshot.iter().filter(|(_, slot)| slot.origin == origin).cloned().collect::<Vec<_>>();
            if entries.is_empty() {
                continue;
            }
            let rows = entries
                .iter()
                .map(|(job_key, slot)| ProgressRow {
                    job_key: job_key.clone(),
                    progress: slot.update.progress,
                    message: slot.update.message.clone(),
                    eta: slot.update.eta,
                })
                .collect::<Vec<_>>();
            match self.store.update_progress(origin, &rows).await {
                Ok(updated) => {
                    debug!(%origin, rows = rows.len(), updated, "Wrote progress");
                    summary.progress += entries.len();
                    summary.acknowledged += self.complete(progress_slot, &entries);
                }
                Err(e) => {
                    error!(%origin, error = %e, rows = rows.len(), "Failed to write progress");
                    summary.failed_writes += 1;
                }
            }
        }
    }
}

/// Buffers job status messages per job key and writes them in batches.
///
/// Flushes are debounced and never overlap. Each flush writes results, then
/// errors, then begins, then progress, with at most one statement per origin
/// and phase. A failed write leaves its updates buffered for the next flush.
/// Begin and progress deliveries are acknowledged as soon as they are
/// buffered; result and error deliveries only once written.
#[derive(Clone)]
pub struct StatusUpdater {
    state: Arc<UpdaterState>,
    debouncer: Arc<Debouncer>,
    safety_net: Arc<Mutex<Option<JoinHandle<()>>>>,
    cancellation_token: CancellationToken,
}

impl StatusUpdater {
    pub fn new(
        store: Arc<dyn JobStore>,
        acknowledger: Acknowledger,
        params: &UpdaterParams,
        outputs: OutputParams,
        cancellation_token: &CancellationToken,
    ) -> Self {
        let cancellation_token = cancellation_token.child_token();
        let state = Arc::new(UpdaterState {
            store,
            acknowledger,
            outputs,
            buffers: Mutex::new(Buffers::default()),
            tick_lock: tokio::sync::Mutex::new(()),
        });

        let debouncer = {
            let state = state.clone();
            Debouncer::spawn(params.flush, &cancellation_token, move || {
                let state = state.clone();
                async move {
                    state.flush().await;
                }
            })
        };

        let safety_net =
            tokio::spawn(safety_net(state.clone(), params.safety_flush_interval, cancellation_token.clone()));

        Self {
            state,
            debouncer: Arc::new(debouncer),
            safety_net: Arc::new(Mutex::new(Some(safety_net))),
            cancellation_token,
        }
    }

    /// Validates and buffers a message, then schedules a flush.
    ///
    /// Invalid messages are acknowledged and dropped.
    pub fn enqueue_message(&self, message: WorkerMessage) {
        let job_key = message.job_key.clone();
        let origin = message.origin;
        let kind = message.kind;
        let receipt_handle = message.receipt_handle.clone();

        let message = match JobStatusMessage::try_from(message) {
            Ok(message) => message,
            Err(e) => {
                warn!(%job_key, %origin, %kind, error = %e, "Discarding invalid status message");
                if let Some(receipt_handle) = receipt_handle {
                    self.state.acknowledger.acknowledge(receipt_handle);
                }
                return;
            }
        };

        let acknowledge_now = message.update.acknowledge_on_buffer();
        let buffered = self.state.buffers().insert(message);
        debug!(%job_key, %origin, %kind, buffered, "Buffered status message");

        if acknowledge_now {
            if let Some(receipt_handle) = receipt_handle {
                self.state.acknowledger.acknowledge(receipt_handle);
            }
        }
        self.debouncer.trigger();
    }

    /// Runs a flush now, after any flush already in progress.
    pub async fn flush(&self) -> FlushSummary {
        self.state.flush().await
    }

    /// Job keys with updates still waiting to be written.
    pub fn buffered_job_keys(&self) -> Vec<String> {
        self.state.buffers().job_keys()
    }

    /// Stops the scheduled flushes and writes whatever is still buffered.
    pub async fn shutdown(&self) -> FlushSummary {
        self.cancellation_token.cancel();
        self.debouncer.shutdown().await;
        let safety_net = self.safety_net.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = safety_net {
            if let Err(e) = handle.await {
                error!(error = %e, "Safety-net flush task terminated abnormally");
            }
        }

        let summary = self.flush().await;
        let remaining = self.buffered_job_keys();
        if !remaining.is_empty() {
            warn!(job_keys = ?remaining, "Shutting down with unwritten updates, they will be redelivered");
        }
        summary
    }
}

impl StatusSink for StatusUpdater {
    fn enqueue_message(&self, message: WorkerMessage) {
        StatusUpdater::enqueue_message(self, message)
    }
}

/// Forces a flush whenever updates are still buffered, in case a write kept
/// failing and nothing new arrives to schedule another flush.
async fn safety_net(state: Arc<UpdaterState>, period: Duration, cancellation_token: CancellationToken) {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    loop {
        tokio::select! {
            biased;
            _ = cancellation_token.cancelled() => return,
            _ = interval.tick() => {}
        }

        let job_keys = state.buffers().job_keys();
        if job_keys.is_empty() {
            continue;
        }
        warn!(job_keys = ?job_keys, "Updates still buffered, forcing a flush");
        state.flush().await;
    }
}
