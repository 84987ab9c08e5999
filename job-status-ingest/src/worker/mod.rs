pub mod acknowledger;
pub mod consolidate;
pub mod poller;
pub mod updater;

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::core::config::Config;
use crate::types::message::WorkerMessage;
use crate::{IngestError, IngestResult};
use acknowledger::Acknowledger;
use poller::QueuePoller;
use updater::StatusUpdater;

/// Ingestion entrypoint the poller hands representative messages to.
#[cfg_attr(test, mockall::automock)]
pub trait StatusSink: Send + Sync {
    fn enqueue_message(&self, message: WorkerMessage);
}

/// Owns the running pipeline: poller task, status updater and acknowledger.
pub struct IngestController {
    cancellation_token: CancellationToken,
    poller: JoinHandle<()>,
    updater: StatusUpdater,
    acknowledger: Acknowledger,
}

/// Wires the pipeline from `config` and starts polling.
pub fn initialize_ingest(config: &Config, cancellation_token: CancellationToken) -> IngestController {
    let params = config.params();
    let acknowledger = Acknowledger::new(config.queue().clone(), &params.ack, &cancellation_token);
    let updater = StatusUpdater::new(
        config.store().clone(),
        acknowledger.clone(),
        &params.updater,
        params.outputs.clone(),
        &cancellation_token,
    );

    let poller = QueuePoller::new(config.queue().clone(), Arc::new(updater.clone()), params.poller.clone());
    let poller = {
        let cancellation_token = cancellation_token.clone();
        tokio::spawn(async move { poller.run(cancellation_token).await })
    };

    info!("Ingest pipeline started");
    IngestController { cancellation_token, poller, updater, acknowledger }
}

impl IngestController {
    /// Stops polling, writes what is still buffered and drains the
    /// acknowledgments, in that order.
    pub async fn shutdown(self) -> IngestResult<()> {
        self.cancellation_token.cancel();
        self.poller.await.map_err(|e| IngestError::ControllerError(format!("Queue poller task failed: {}", e)))?;

        let flush = self.updater.shutdown().await;
        let acks = self.acknowledger.shutdown().await;
        info!(
            applied = flush.applied(),
            failed_writes = flush.failed_writes,
            acknowledged = acks.acknowledged,
            failed_acks = acks.failed,
            "Ingest pipeline stopped"
        );
        Ok(())
    }
}
