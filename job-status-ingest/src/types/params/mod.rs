pub mod service;

use std::time::Duration;

use url::Url;

use crate::cli::RunCmd;
use crate::IngestError;
pub use service::{AckParams, OutputParams, PollerParams, UpdaterParams};

/// QueueArgs - Arguments used to reach the status queue
#[derive(Debug, Clone)]
pub struct QueueArgs {
    pub queue_url: String,
    pub region: Option<String>,
    pub endpoint_url: Option<Url>,
}

/// DatabaseArgs - Arguments used to connect to the job database
#[derive(Debug, Clone)]
pub struct DatabaseArgs {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

/// Everything the ingest service needs, validated from the command line.
#[derive(Debug, Clone)]
pub struct IngestParams {
    pub queue: QueueArgs,
    pub database: DatabaseArgs,
    pub updater: UpdaterParams,
    pub ack: AckParams,
    pub poller: PollerParams,
    pub outputs: OutputParams,
}

impl TryFrom<RunCmd> for QueueArgs {
    type Error = IngestError;

    fn try_from(run_cmd: RunCmd) -> Result<Self, Self::Error> {
        let args = run_cmd.aws_sqs_args;
        Url::parse(&args.queue_url)
            .map_err(|e| IngestError::RunCommandError(format!("Invalid queue URL {}: {}", args.queue_url, e)))?;
        Ok(Self { queue_url: args.queue_url, region: args.aws_region, endpoint_url: args.sqs_endpoint_url })
    }
}

impl TryFrom<RunCmd> for DatabaseArgs {
    type Error = IngestError;

    fn try_from(run_cmd: RunCmd) -> Result<Self, Self::Error> {
        let args = run_cmd.postgres_args;
        let scheme = Url::parse(&args.database_url)
            .map(|url| url.scheme().to_string())
            .map_err(|e| IngestError::RunCommandError(format!("Invalid database URL: {}", e)))?;
        if scheme != "postgres" && scheme != "postgresql" {
            return Err(IngestError::RunCommandError(format!("Unsupported database URL scheme: {}", scheme)));
        }
        if args.database_max_connections == 0 {
            return Err(IngestError::RunCommandError("database max connections must be greater than 0".to_string()));
        }
        Ok(Self {
            database_url: args.database_url,
            max_connections: args.database_max_connections,
            acquire_timeout: Duration::from_secs(args.database_acquire_timeout_seconds),
        })
    }
}

impl TryFrom<RunCmd> for IngestParams {
    type Error = IngestError;

    fn try_from(run_cmd: RunCmd) -> Result<Self, Self::Error> {
        Ok(Self {
            queue: QueueArgs::try_from(run_cmd.clone())?,
            database: DatabaseArgs::try_from(run_cmd.clone())?,
            updater: UpdaterParams::try_from(run_cmd.updater_args)?,
            ack: AckParams::try_from(run_cmd.ack_args)?,
            poller: PollerParams::try_from(run_cmd.poller_args)?,
            outputs: OutputParams::from(run_cmd.outputs_args),
        })
    }
}
