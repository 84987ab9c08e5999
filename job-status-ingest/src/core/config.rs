use std::sync::Arc;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use tracing::info;

use crate::cli::RunCmd;
use crate::core::client::{JobStore, PostgresJobStore, QueueClient, SQS};
use crate::types::params::{IngestParams, QueueArgs};
use crate::IngestResult;

/// The shared state of the ingest service: validated parameters and the
/// clients of the two external systems it talks to.
#[derive(Clone)]
pub struct Config {
    params: IngestParams,
    queue: Arc<dyn QueueClient>,
    store: Arc<dyn JobStore>,
}

impl Config {
    pub fn new(params: IngestParams, queue: Arc<dyn QueueClient>, store: Arc<dyn JobStore>) -> Self {
        Self { params, queue, store }
    }

    /// Validates the command line and connects the clients.
    ///
    /// # Errors
    /// Fails on invalid arguments or when the job database cannot be reached.
    pub async fn from_run_cmd(run_cmd: &RunCmd) -> IngestResult<Self> {
        let params = IngestParams::try_from(run_cmd.clone())?;

        let aws_config = Self::build_aws_config(&params.queue).await;
        let queue = Arc::new(SQS::new(&aws_config, &params.queue));
        let store = Arc::new(PostgresJobStore::new(&params.database).await?);

        info!(
            queue_url = %params.queue.queue_url,
            max_connections = params.database.max_connections,
            "Configuration loaded"
        );
        Ok(Self::new(params, queue, store))
    }

    async fn build_aws_config(args: &QueueArgs) -> SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &args.region {
            loader = loader.region(Region::new(region.clone()));
        }
        loader.load().await
    }

    pub fn params(&self) -> &IngestParams {
        &self.params
    }

    pub fn queue(&self) -> &Arc<dyn QueueClient> {
        &self.queue
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }
}
