//! Graceful Shutdown Module
//!
//! Implements coordinated shutdown for all long-lived tasks with:
//! - Signal handlers (SIGTERM, SIGINT)
//! - One-shot broadcast to every subscribed task
//! - Configurable shutdown deadline

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::sync::{broadcast, watch};
use tracing::{error, info};

/// Shutdown configuration
#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Maximum time to wait for graceful shutdown
    pub timeout: Duration,
    /// Enable signal handlers
    pub enable_signals: bool,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            enable_signals: true,
        }
    }
}

/// Reason for shutdown
#[derive(Debug, Clone, PartialEq)]
pub enum ShutdownReason {
    /// SIGTERM signal received
    SigTerm,
    /// SIGINT signal received (Ctrl+C)
    SigInt,
    /// Programmatic shutdown
    Programmatic(String),
    /// Unknown reason
    Unknown,
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownReason::SigTerm => write!(f, "SIGTERM"),
            ShutdownReason::SigInt => write!(f, "SIGINT (Ctrl+C)"),
            ShutdownReason::Programmatic(reason) => write!(f, "Programmatic: {}", reason),
            ShutdownReason::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Shutdown signal information
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    pub reason: ShutdownReason,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Shutdown state
#[derive(Debug, Clone, PartialEq)]
pub enum ShutdownState {
    Running,
    ShuttingDown(ShutdownReason),
}

/// Graceful shutdown coordinator
///
/// Every long-lived task subscribes a [`ShutdownReceiver`] and selects
/// on it next to its own work. The coordinator fans the signal out once;
/// tasks finish their current unit of work and exit.
#[derive(Clone)]
pub struct GracefulShutdown {
    shutdown_tx: Arc<broadcast::Sender<ShutdownSignal>>,
    state_tx: Arc<watch::Sender<ShutdownState>>,
    config: Arc<ShutdownConfig>,
}

impl GracefulShutdown {
    /// Create a new GracefulShutdown coordinator
    pub fn new(config: ShutdownConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);
        let (state_tx, _) = watch::channel(ShutdownState::Running);

        Self {
            shutdown_tx: Arc::new(shutdown_tx),
            state_tx: Arc::new(state_tx),
            config: Arc::new(config),
        }
    }

    /// Get a handle for subscribing to shutdown signals
    pub fn subscribe(&self) -> ShutdownReceiver {
        ShutdownReceiver {
            rx: self.shutdown_tx.subscribe(),
            state_rx: self.state_tx.subscribe(),
        }
    }

    /// Trigger shutdown programmatically
    pub fn shutdown(&self, reason: ShutdownReason) {
        info!("Triggering shutdown: {:?}", reason);
        let _ = self
            .state_tx
            .send(ShutdownState::ShuttingDown(reason.clone()));
        let _ = self.shutdown_tx.send(ShutdownSignal {
            reason,
            timestamp: chrono::Utc::now(),
        });
    }

    /// Wait for a shutdown signal (from signals or programmatic)
    pub async fn wait_for_signal(&self) -> ShutdownSignal {
        self.subscribe().recv().await
    }

    /// Check if shutdown has been initiated
    pub fn is_shutting_down(&self) -> bool {
        matches!(*self.state_tx.borrow(), ShutdownState::ShuttingDown(_))
    }

    /// The configured shutdown deadline
    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }
}

/// Receiver for shutdown signals
pub struct ShutdownReceiver {
    rx: broadcast::Receiver<ShutdownSignal>,
    state_rx: watch::Receiver<ShutdownState>,
}

impl ShutdownReceiver {
    /// Receive the next shutdown signal.
    ///
    /// Cancel-safe; intended for use inside `tokio::select!`.
    pub async fn recv(&mut self) -> ShutdownSignal {
        match self.rx.recv().await {
            Ok(signal) => signal,
            // Sender dropped or messages lagged; fall back to the state channel
            Err(_) => {
                let reason = match &*self.state_rx.borrow() {
                    ShutdownState::Running => ShutdownReason::Unknown,
                    ShutdownState::ShuttingDown(reason) => reason.clone(),
                };
                ShutdownSignal {
                    reason,
                    timestamp: chrono::Utc::now(),
                }
            }
        }
    }

    /// Check if shutdown has been initiated
    pub fn is_shutting_down(&self) -> bool {
        matches!(&*self.state_rx.borrow(), ShutdownState::ShuttingDown(_))
    }
}

/// Start the signal handler task that triggers graceful shutdown.
pub fn start_signal_handler(coordinator: &GracefulShutdown) {
    if !coordinator.config.enable_signals {
        return;
    }

    let coordinator = coordinator.clone();

    tokio::spawn(async move {
        let ctrl_c = async {
            match signal::ctrl_c().await {
                Ok(()) => ShutdownReason::SigInt,
                Err(e) => {
                    error!("Failed to register ctrl-c handler: {}", e);
                    ShutdownReason::Unknown
                }
            }
        };

        let term = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                    ShutdownReason::SigTerm
                }
                Err(e) => {
                    error!("Failed to register SIGTERM handler: {}", e);
                    ShutdownReason::Unknown
                }
            }
        };

        tokio::select! {
            reason = ctrl_c => coordinator.shutdown(reason),
            reason = term => coordinator.shutdown(reason),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_graceful_shutdown_trigger() {
        let shutdown = GracefulShutdown::new(ShutdownConfig::default());

        let handle = tokio::spawn({
            let shutdown = shutdown.clone();
            async move { shutdown.wait_for_signal().await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;

        shutdown.shutdown(ShutdownReason::Programmatic("Test".to_string()));

        let signal = handle.await.unwrap();
        assert!(matches!(signal.reason, ShutdownReason::Programmatic(_)));
    }

    #[tokio::test]
    async fn test_shutdown_state() {
        let shutdown = GracefulShutdown::new(ShutdownConfig::default());

        assert!(!shutdown.is_shutting_down());

        shutdown.shutdown(ShutdownReason::SigInt);

        assert!(shutdown.is_shutting_down());
    }

    #[tokio::test]
    async fn test_shutdown_receiver() {
        let shutdown = GracefulShutdown::new(ShutdownConfig::default());
        let mut receiver = shutdown.subscribe();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            shutdown.shutdown(ShutdownReason::SigTerm);
        });

        let signal = receiver.recv().await;
        assert!(matches!(signal.reason, ShutdownReason::SigTerm));
    }

    #[tokio::test]
    async fn test_receiver_sees_state_after_lag() {
        let shutdown = GracefulShutdown::new(ShutdownConfig::default());
        let mut receiver = shutdown.subscribe();

        shutdown.shutdown(ShutdownReason::SigTerm);

        let signal = receiver.recv().await;
        assert_eq!(signal.reason, ShutdownReason::SigTerm);
        assert!(receiver.is_shutting_down());
    }
}
