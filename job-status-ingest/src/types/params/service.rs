use std::time::Duration;

use url::Url;

use crate::cli::outputs::OutputsCliArgs;
use crate::cli::service::{AckCliArgs, PollerCliArgs, UpdaterCliArgs};
use crate::types::constant::{SQS_MAX_RECEIVE_MESSAGES, SQS_MAX_WAIT_TIME};
use crate::utils::debounce::DebounceSettings;
use crate::IngestError;

/// UpdaterParams - Timing of the status updater flushes
#[derive(Debug, Clone)]
pub struct UpdaterParams {
    pub flush: DebounceSettings,
    /// Interval of the safety-net flush of anything still buffered
    pub safety_flush_interval: Duration,
}

impl Default for UpdaterParams {
    fn default() -> Self {
        Self {
            flush: DebounceSettings::new(Duration::from_millis(100), Duration::from_millis(1000)),
            safety_flush_interval: Duration::from_secs(5),
        }
    }
}

impl TryFrom<UpdaterCliArgs> for UpdaterParams {
    type Error = IngestError;

    fn try_from(args: UpdaterCliArgs) -> Result<Self, Self::Error> {
        if args.flush_debounce_ms > args.flush_max_wait_ms {
            return Err(IngestError::RunCommandError(format!(
                "flush debounce ({}ms) must not exceed flush max wait ({}ms)",
                args.flush_debounce_ms, args.flush_max_wait_ms
            )));
        }
        Ok(Self {
            flush: DebounceSettings::new(
                Duration::from_millis(args.flush_debounce_ms),
                Duration::from_millis(args.flush_max_wait_ms),
            ),
            safety_flush_interval: Duration::from_millis(args.safety_flush_interval_ms),
        })
    }
}

/// AckParams - Timing of the batched acknowledgments
#[derive(Debug, Clone)]
pub struct AckParams {
    pub flush: DebounceSettings,
}

impl Default for AckParams {
    fn default() -> Self {
        Self { flush: DebounceSettings::new(Duration::from_millis(10), Duration::from_millis(300)) }
    }
}

impl TryFrom<AckCliArgs> for AckParams {
    type Error = IngestError;

    fn try_from(args: AckCliArgs) -> Result<Self, Self::Error> {
        if args.ack_debounce_ms > args.ack_max_wait_ms {
            return Err(IngestError::RunCommandError(format!(
                "ack debounce ({}ms) must not exceed ack max wait ({}ms)",
                args.ack_debounce_ms, args.ack_max_wait_ms
            )));
        }
        Ok(Self {
            flush: DebounceSettings::new(
                Duration::from_millis(args.ack_debounce_ms),
                Duration::from_millis(args.ack_max_wait_ms),
            ),
        })
    }
}

/// PollerParams - Shape of the receive calls
#[derive(Debug, Clone)]
pub struct PollerParams {
    pub max_messages: i32,
    pub wait_time: Duration,
    /// Delay before polling again after a failed receive
    pub error_backoff: Duration,
}

impl Default for PollerParams {
    fn default() -> Self {
        Self {
            max_messages: SQS_MAX_RECEIVE_MESSAGES,
            wait_time: SQS_MAX_WAIT_TIME,
            error_backoff: Duration::from_secs(5),
        }
    }
}

impl TryFrom<PollerCliArgs> for PollerParams {
    type Error = IngestError;

    fn try_from(args: PollerCliArgs) -> Result<Self, Self::Error> {
        if !(1..=SQS_MAX_RECEIVE_MESSAGES).contains(&args.poll_max_messages) {
            return Err(IngestError::RunCommandError(format!(
                "poll max messages must be between 1 and {}, got {}",
                SQS_MAX_RECEIVE_MESSAGES, args.poll_max_messages
            )));
        }
        let wait_time = Duration::from_secs(args.poll_wait_seconds);
        if wait_time > SQS_MAX_WAIT_TIME {
            return Err(IngestError::RunCommandError(format!(
                "poll wait must be at most {}s, got {}s",
                SQS_MAX_WAIT_TIME.as_secs(),
                args.poll_wait_seconds
            )));
        }
        Ok(Self {
            max_messages: args.poll_max_messages,
            wait_time,
            error_backoff: Duration::from_millis(args.poll_error_backoff_ms),
        })
    }
}

/// OutputParams - How subdivision outputs are recorded
#[derive(Debug, Clone)]
pub struct OutputParams {
    pub uploads_public_base_url: Url,
}

impl OutputParams {
    /// Public URL of an uploaded object `key`.
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.uploads_public_base_url.as_str().trim_end_matches('/'), key.trim_start_matches('/'))
    }
}

impl From<OutputsCliArgs> for OutputParams {
    fn from(args: OutputsCliArgs) -> Self {
        Self { uploads_public_base_url: args.uploads_public_base_url }
    }
}
