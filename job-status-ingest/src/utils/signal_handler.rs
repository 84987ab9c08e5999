use anyhow::{anyhow, Result};
use tokio::signal;
use tracing::{error, info, warn};

#[cfg(unix)]
use signal::unix::{signal, SignalKind};

/// Signal types that can trigger shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGTERM - container graceful shutdown
    Terminate,
    /// SIGINT - Ctrl+C interactive shutdown
    Interrupt,
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownSignal::Terminate => write!(f, "SIGTERM"),
            ShutdownSignal::Interrupt => write!(f, "SIGINT"),
        }
    }
}

/// Waits for a shutdown signal and bounds the graceful shutdown that follows.
#[derive(Debug, Default)]
pub struct SignalHandler {
    shutdown_signal: Option<ShutdownSignal>,
}

impl SignalHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for any shutdown signal and return which one was received
    pub async fn wait_for_shutdown(&mut self) -> Result<ShutdownSignal> {
        let signal = self.wait_for_signal().await?;
        self.shutdown_signal = Some(signal);
        info!(%signal, "Received shutdown signal");
        Ok(signal)
    }

    pub fn shutdown_signal(&self) -> Option<ShutdownSignal> {
        self.shutdown_signal
    }

    #[cfg(unix)]
    async fn wait_for_signal(&self) -> Result<ShutdownSignal> {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => Ok(ShutdownSignal::Terminate),
            _ = sigint.recv() => Ok(ShutdownSignal::Interrupt),
        }
    }

    #[cfg(not(unix))]
    async fn wait_for_signal(&self) -> Result<ShutdownSignal> {
        signal::ctrl_c().await?;
        Ok(ShutdownSignal::Interrupt)
    }

    /// Runs `shutdown_fn`, giving up after `timeout`.
    pub async fn handle_graceful_shutdown<F, Fut>(&self, shutdown_fn: F, timeout: std::time::Duration) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<()>>,
    {
        let signal = self.shutdown_signal.unwrap_or(ShutdownSignal::Interrupt);
        info!(%signal, timeout_ms = timeout.as_millis() as u64, "Starting graceful shutdown");

        match tokio::time::timeout(timeout, shutdown_fn()).await {
            Ok(Ok(())) => {
                info!("Graceful shutdown completed");
                Ok(())
            }
            Ok(Err(e)) => {
                error!(error = %e, "Graceful shutdown failed");
                Err(e)
            }
            Err(_) => {
                warn!("Shutdown timeout reached, buffered updates may be redelivered");
                Err(anyhow!("Shutdown timeout exceeded"))
            }
        }
    }
}
