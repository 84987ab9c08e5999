use clap::Args;

fn parse_positive_u64(s: &str) -> Result<u64, String> {
    let value: u64 = s.parse().map_err(|_| format!("'{}' is not a valid number", s))?;
    if value == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(value)
}

/// Tunables of the status updater flush.
#[derive(Debug, Clone, Args)]
pub struct UpdaterCliArgs {
    /// Quiet period after the last buffered message before a flush runs.
    #[arg(env = "JOB_STATUS_FLUSH_DEBOUNCE_MS", long, default_value = "100")]
    pub flush_debounce_ms: u64,

    /// Longest a buffered message waits for a flush while messages keep arriving.
    #[arg(env = "JOB_STATUS_FLUSH_MAX_WAIT_MS", long, default_value = "1000", value_parser = parse_positive_u64)]
    pub flush_max_wait_ms: u64,

    /// Interval of the safety-net flush of anything still buffered.
    #[arg(env = "JOB_STATUS_SAFETY_FLUSH_INTERVAL_MS", long, default_value = "5000", value_parser = parse_positive_u64)]
    pub safety_flush_interval_ms: u64,
}

/// Tunables of the acknowledgment batcher.
#[derive(Debug, Clone, Args)]
pub struct AckCliArgs {
    #[arg(env = "JOB_STATUS_ACK_DEBOUNCE_MS", long, default_value = "10")]
    pub ack_debounce_ms: u64,

    #[arg(env = "JOB_STATUS_ACK_MAX_WAIT_MS", long, default_value = "300", value_parser = parse_positive_u64)]
    pub ack_max_wait_ms: u64,
}

/// Tunables of the queue poller.
#[derive(Debug, Clone, Args)]
pub struct PollerCliArgs {
    /// Messages requested per receive call. SQS accepts at most 10.
    #[arg(env = "JOB_STATUS_POLL_MAX_MESSAGES", long, default_value = "10")]
    pub poll_max_messages: i32,

    /// Long-poll wait of a receive call. SQS accepts at most 20 seconds.
    #[arg(env = "JOB_STATUS_POLL_WAIT_SECONDS", long, default_value = "20")]
    pub poll_wait_seconds: u64,

    /// Delay before polling again after a failed receive.
    #[arg(env = "JOB_STATUS_POLL_ERROR_BACKOFF_MS", long, default_value = "5000")]
    pub poll_error_backoff_ms: u64,
}
