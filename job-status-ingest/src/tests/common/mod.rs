pub mod recording_queue;

use std::sync::Arc;

use rstest::*;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::types::constant::DEFAULT_UPLOADS_PUBLIC_BASE_URL;
use crate::types::message::WorkerMessage;
use crate::types::params::{AckParams, OutputParams, UpdaterParams};
use crate::worker::acknowledger::Acknowledger;
use crate::worker::updater::StatusUpdater;
pub use in_memory_store::{InMemoryJobStore, JobRecord};
pub use recording_queue::RecordingQueue;

/// Parses a worker envelope the way the poller would.
pub fn worker_message(body: Value, receipt_handle: &str) -> WorkerMessage {
    WorkerMessage::parse(&body.to_string(), Some(receipt_handle.to_string())).expect("test envelope must parse")
}

pub fn begin(job_key: &str, receipt_handle: &str) -> WorkerMessage {
    worker_message(json!({ "jobKey": job_key, "type": "begin" }), receipt_handle)
}

pub fn progress(job_key: &str, value: f64, receipt_handle: &str) -> WorkerMessage {
    worker_message(json!({ "jobKey": job_key, "type": "progress", "progress": value }), receipt_handle)
}

pub fn overlay_result(job_key: &str, value: Value, receipt_handle: &str) -> WorkerMessage {
    worker_message(json!({ "jobKey": job_key, "type": "result", "result": value, "duration": 1500.0 }), receipt_handle)
}

pub fn error(job_key: &str, reason: &str, receipt_handle: &str) -> WorkerMessage {
    worker_message(json!({ "jobKey": job_key, "type": "error", "error": reason }), receipt_handle)
}

pub fn with_origin(mut message: WorkerMessage, origin: crate::types::job::JobOrigin) -> WorkerMessage {
    message.origin = origin;
    message.envelope.origin = Some(origin);
    message
}

#[fixture]
pub fn output_params() -> OutputParams {
    OutputParams {
        uploads_public_base_url: Url::parse(DEFAULT_UPLOADS_PUBLIC_BASE_URL).expect("default base URL is valid"),
    }
}

/// A status updater wired to an in-memory store and a recording queue.
pub struct UpdaterHarness {
    pub store: Arc<InMemoryJobStore>,
    pub queue: Arc<RecordingQueue>,
    pub acknowledger: Acknowledger,
    pub updater: StatusUpdater,
    pub cancellation_token: CancellationToken,
}

impl UpdaterHarness {
    pub fn new(store: InMemoryJobStore) -> Self {
        let store = Arc::new(store);
        let queue = Arc::new(RecordingQueue::default());
        let cancellation_token = CancellationToken::new();
        let acknowledger = Acknowledger::new(queue.clone(), &AckParams::default(), &cancellation_token);
        let updater = StatusUpdater::new(
            store.clone(),
            acknowledger.clone(),
            &UpdaterParams::default(),
            output_params(),
            &cancellation_token,
        );
        Self { store, queue, acknowledger, updater, cancellation_token }
    }

    /// Flushes the updater, then the acknowledgments it produced.
    pub async fn settle(&self) {
        self.updater.flush().await;
        self.acknowledger.flush().await;
    }

    pub async fn acknowledged(&self) -> Vec<String> {
        self.acknowledger.flush().await;
        self.queue.deleted()
    }
}
