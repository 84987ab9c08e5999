use clap::{Parser, Subcommand};

pub use database::postgres::PostgresCliArgs;
pub use outputs::OutputsCliArgs;
pub use queue::aws_sqs::AWSSQSCliArgs;
pub use service::{AckCliArgs, PollerCliArgs, UpdaterCliArgs};

pub mod database;
pub mod outputs;
pub mod queue;
pub mod service;

#[derive(Parser, Debug)]
#[command(
    name = "job-status-ingest",
    about = "Applies job status reports from the worker queue to the job database",
    long_about = "Consumes begin, progress, result and error reports published by overlay and subdivision \
    workers, consolidates them, applies them to the job tables in batches and acknowledges them \
    once they are durable.",
    after_help = "Examples:\n  \
    job-status-ingest run --queue-url https://sqs.us-west-2.amazonaws.com/123/job-status --database-url postgres://localhost/app\n  \
    job-status-ingest check"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the ingest service
    Run {
        #[command(flatten)]
        run_command: Box<RunCmd>,
    },
    /// Check that the queue and the database are reachable, then exit
    Check {
        #[command(flatten)]
        run_command: Box<RunCmd>,
    },
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct RunCmd {
    #[clap(flatten, next_help_heading = "Queue")]
    pub aws_sqs_args: AWSSQSCliArgs,

    #[clap(flatten, next_help_heading = "Database")]
    pub postgres_args: PostgresCliArgs,

    #[clap(flatten, next_help_heading = "Status updater")]
    pub updater_args: UpdaterCliArgs,

    #[clap(flatten, next_help_heading = "Acknowledgment")]
    pub ack_args: AckCliArgs,

    #[clap(flatten, next_help_heading = "Poller")]
    pub poller_args: PollerCliArgs,

    #[clap(flatten, next_help_heading = "Outputs")]
    pub outputs_args: OutputsCliArgs,
}
