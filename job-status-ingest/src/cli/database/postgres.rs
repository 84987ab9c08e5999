use clap::Args;

/// Parameters used to config PostgreSQL.
#[derive(Debug, Clone, Args)]
pub struct PostgresCliArgs {
    /// The connection string of the job database.
    #[arg(env = "JOB_STATUS_DATABASE_URL", long)]
    pub database_url: String,

    /// The maximum number of pooled connections.
    #[arg(env = "JOB_STATUS_DATABASE_MAX_CONNECTIONS", long, default_value = "5")]
    pub database_max_connections: u32,

    /// Seconds to wait for a pooled connection before failing a query.
    #[arg(env = "JOB_STATUS_DATABASE_ACQUIRE_TIMEOUT_SECONDS", long, default_value = "10")]
    pub database_acquire_timeout_seconds: u64,
}
