use clap::Parser as _;
use dotenvy::dotenv;
use job_status_ingest::cli::{Cli, Commands, RunCmd};
use job_status_ingest::core::config::Config;
use job_status_ingest::utils::logging::init_logging;
use job_status_ingest::utils::signal_handler::SignalHandler;
use job_status_ingest::worker::initialize_ingest;
use job_status_ingest::{IngestError, IngestResult};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Upper bound on the final flush and acknowledgment drain.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_logging();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Run { run_command } => {
            info!("Starting job status ingest");
            if let Err(e) = run_ingest(run_command).await {
                error!(error = %e, error_chain = ?e, "Job status ingest failed");
                return Err(e.into());
            }
        }
        Commands::Check { run_command } => {
            if let Err(e) = check_connectivity(run_command).await {
                error!(error = %e, error_chain = ?e, "Connectivity check failed");
                return Err(e.into());
            }
            info!("Queue and database are reachable");
        }
    }
    Ok(())
}

async fn run_ingest(run_cmd: &RunCmd) -> IngestResult<()> {
    let config = Config::from_run_cmd(run_cmd).await?;
    debug!("Configuration initialized");

    let cancellation_token = CancellationToken::new();
    let controller = initialize_ingest(&config, cancellation_token);

    let mut signal_handler = SignalHandler::new();
    signal_handler.wait_for_shutdown().await.map_err(|e| IngestError::ControllerError(e.to_string()))?;

    signal_handler
        .handle_graceful_shutdown(
            move || async move { controller.shutdown().await.map_err(anyhow::Error::from) },
            SHUTDOWN_TIMEOUT,
        )
        .await
        .map_err(|e| IngestError::ControllerError(e.to_string()))?;

    info!("Job status ingest shut down");
    Ok(())
}

/// check_connectivity - Verifies the queue and the job database are reachable
async fn check_connectivity(run_cmd: &RunCmd) -> IngestResult<()> {
    let config = Config::from_run_cmd(run_cmd).await?;
    config.queue().health_check().await?;
    config.store().health_check().await?;
    Ok(())
}
