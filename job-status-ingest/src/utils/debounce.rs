//! Debounce with a ceiling.
//!
//! A [`Debouncer`] runs an async action once triggers stop arriving for the
//! quiet period, but never later than `max_wait` after the first trigger of a
//! burst. Runs never overlap: triggers arriving while the action runs are
//! folded into exactly one follow-up run, scheduled with the same timing once
//! the current run completes.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceSettings {
    /// Quiet period after the last trigger
    pub quiet: Duration,
    /// Longest delay between the first trigger of a burst and the run
    pub max_wait: Duration,
}

impl DebounceSettings {
    pub const fn new(quiet: Duration, max_wait: Duration) -> Self {
        Self { quiet, max_wait }
    }
}

pub struct Debouncer {
    notify: Arc<Notify>,
    cancellation_token: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    /// Spawns the scheduling task. It stops when `cancellation_token` (or the
    /// debouncer itself) is cancelled; a run in progress is always completed.
    pub fn spawn<F, Fut>(settings: DebounceSettings, cancellation_token: &CancellationToken, action: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let notify = Arc::new(Notify::new());
        let cancellation_token = cancellation_token.child_token();
        let handle = tokio::spawn(schedule(settings, notify.clone(), cancellation_token.clone(), action));
        Self { notify, cancellation_token, handle: Mutex::new(Some(handle)) }
    }

    /// Requests a run. Never blocks.
    pub fn trigger(&self) {
        // Stores a single permit when the task is busy, which is what turns any
        // number of mid-run triggers into one follow-up run.
        self.notify.notify_one();
    }

    /// Stops scheduling and waits for a run in progress to finish. Pending
    /// triggers are dropped; callers flush explicitly afterwards if needed.
    pub async fn shutdown(&self) {
        self.cancellation_token.cancel();
        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Debounce task terminated abnormally");
            }
        }
    }
}

async fn schedule<F, Fut>(
    settings: DebounceSettings,
    notify: Arc<Notify>,
    cancellation_token: CancellationToken,
    mut action: F,
) where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    loop {
        tokio::select! {
            biased;
            _ = cancellation_token.cancelled() => return,
            _ = notify.notified() => {}
        }

        let ceiling = Instant::now() + settings.max_wait;
        let mut deadline = (Instant::now() + settings.quiet).min(ceiling);
        loop {
            tokio::select! {
                biased;
                _ = cancellation_token.cancelled() => return,
                _ = notify.notified() => {
                    deadline = (Instant::now() + settings.quiet).min(ceiling);
                }
                _ = sleep_until(deadline) => break,
            }
        }

        action().await;
    }
}
