use std::collections::BTreeMap;

use crate::types::job::JobOrigin;
use crate::types::message::{
    BeginUpdate, ErrorUpdate, JobStatusMessage, JobStatusUpdate, ProgressUpdate, ResultUpdate,
};

/// One buffered update. `seq` identifies the exact message held, so a flush
/// only clears a slot that was not replaced while its write was in flight.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Slot<T> {
    pub seq: u64,
    pub origin: JobOrigin,
    pub update: T,
    /// Deliveries to acknowledge once this update is written. Empty for
    /// updates acknowledged on arrival.
    pub receipt_handles: Vec<String>,
}

/// Pending updates of one job, one slot per message type.
#[derive(Debug, Default)]
pub(crate) struct JobBuffer {
    pub result: Option<Slot<ResultUpdate>>,
    pub error: Option<Slot<ErrorUpdate>>,
    pub begin: Option<Slot<BeginUpdate>>,
    pub progress: Option<Slot<ProgressUpdate>>,
}

impl JobBuffer {
    pub fn is_empty(&self) -> bool {
        self.result.is_none() && self.error.is_none() && self.begin.is_none() && self.progress.is_none()
    }
}

/// Selects one slot of a [`JobBuffer`].
pub(crate) type SlotAccessor<T> = fn(&mut JobBuffer) -> &mut Option<Slot<T>>;

pub(crate) fn result_slot(buffer: &mut JobBuffer) -> &mut Option<Slot<ResultUpdate>> {
    &mut buffer.result
}

pub(crate) fn error_slot(buffer: &mut JobBuffer) -> &mut Option<Slot<ErrorUpdate>> {
    &mut buffer.error
}

pub(crate) fn begin_slot(buffer: &mut JobBuffer) -> &mut Option<Slot<BeginUpdate>> {
    &mut buffer.begin
}

pub(crate) fn progress_slot(buffer: &mut JobBuffer) -> &mut Option<Slot<ProgressUpdate>> {
    &mut buffer.progress
}

/// The aggregation map of the status updater, keyed by job key.
#[derive(Debug, Default)]
pub(crate) struct Buffers {
    next_seq: u64,
    jobs: BTreeMap<String, JobBuffer>,
}

impl Buffers {
    /// Buffers a validated message. Returns `false` when the message was
    /// dropped because a higher progress is already buffered.
    pub fn insert(&mut self, message: JobStatusMessage) -> bool {
        self.next_seq += 1;
        let seq = self.next_seq;
        let origin = message.origin;
        let buffer = self.jobs.entry(message.job_key).or_default();

        match message.update {
            JobStatusUpdate::Begin(update) => {
                buffer.begin = Some(Slot { seq, origin, update, receipt_handles: Vec::new() });
            }
            JobStatusUpdate::Progress(update) => {
                if buffer.progress.as_ref().is_some_and(|current| current.update.progress > update.progress) {
                    return false;
                }
                buffer.progress = Some(Slot { seq, origin, update, receipt_handles: Vec::new() });
            }
            JobStatusUpdate::Result(update) => {
                // The displaced delivery is acknowledged together with its replacement
                let mut receipt_handles = buffer.result.take().map(|slot| slot.receipt_handles).unwrap_or_default();
                receipt_handles.extend(message.receipt_handle);
                buffer.result = Some(Slot { seq, origin, update, receipt_handles });
            }
            JobStatusUpdate::Error(update) => {
                let mut receipt_handles = buffer.error.take().map(|slot| slot.receipt_handles).unwrap_or_default();
                receipt_handles.extend(message.receipt_handle);
                buffer.error = Some(Slot { seq, origin, update, receipt_handles });
            }
        }
        true
    }

    /// Copies the occupied slots selected by `slot`, in job key order.
    pub fn snapshot<T: Clone>(&mut self, slot: SlotAccessor<T>) -> Vec<(String, Slot<T>)> {
        self.jobs
            .iter_mut()
            .filter_map(|(job_key, buffer)| slot(buffer).clone().map(|held| (job_key.clone(), held)))
            .collect()
    }

    /// Clears the slots of `written` entries and returns the receipt handles
    /// that can now be acknowledged.
    ///
    /// A slot replaced since the snapshot is kept; only the handles the
    /// snapshot carried are taken out of it.
    pub fn complete<T>(&mut self, slot: SlotAccessor<T>, written: &[(String, Slot<T>)]) -> Vec<String> {
        let mut handles = Vec::new();
        for (job_key, snapshot) in written {
            let Some(buffer) = self.jobs.get_mut(job_key) else {
                continue;
            };
            let held = slot(buffer);
            let unchanged = held.as_ref().is_some_and(|current| current.seq == snapshot.seq);
            if unchanged {
                if let Some(cleared) = held.take() {
                    handles.extend(cleared.receipt_handles);
                }
            } else {
                if let Some(current) = held.as_mut() {
                    current.receipt_handles.retain(|handle| !snapshot.receipt_handles.contains(handle));
                }
                handles.extend(snapshot.receipt_handles.iter().cloned());
            }
            if buffer.is_empty() {
                self.jobs.remove(job_key);
            }
        }
        handles
    }

    pub fn job_keys(&self) -> Vec<String> {
        self.jobs.keys().cloned().collect()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, job_key: &str) -> Option<&JobBuffer> {
        self.jobs.get(job_key)
    }
}
