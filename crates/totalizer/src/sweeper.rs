//! Dedup Sweeper
//!
//! Periodic task that removes dedup rows older than the retention
//! window. Retention must exceed the log's message lifetime, otherwise
//! a late redelivery would slip past the dedup check.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use sumline_shared::config::ConsumerSettings;
use sumline_shared::shutdown::{GracefulShutdown, ShutdownReceiver};

use crate::domain::DedupStore;

/// Configuration for the dedup sweeper
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Age threshold for purging dedup rows; zero disables the sweeper
    pub retention: Duration,
    /// Cadence of sweep passes
    pub interval: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(30 * 24 * 60 * 60),
            interval: Duration::from_secs(60 * 60),
        }
    }
}

impl From<&ConsumerSettings> for SweeperConfig {
    fn from(settings: &ConsumerSettings) -> Self {
        Self {
            retention: Duration::from_secs(settings.dedup_retention_secs),
            interval: Duration::from_secs(settings.dedup_sweep_interval_secs),
        }
    }
}

/// Periodic dedup retention sweeper
pub struct DedupSweeper<D> {
    dedup: Arc<D>,
    config: SweeperConfig,
}

impl<D> DedupSweeper<D>
where
    D: DedupStore + 'static,
{
    pub fn new(dedup: Arc<D>, config: SweeperConfig) -> Self {
        Self { dedup, config }
    }

    /// Launch the sweep loop; exits on shutdown. A zero retention
    /// disables sweeping entirely.
    pub fn start(self, shutdown: &GracefulShutdown) -> JoinHandle<()> {
        let rx = shutdown.subscribe();
        tokio::spawn(async move { self.run(rx).await })
    }

    async fn run(self, mut shutdown: ShutdownReceiver) {
        if self.config.retention.is_zero() {
            info!("Dedup sweeper disabled");
            return;
        }

        info!(
            retention_secs = self.config.retention.as_secs(),
            interval_secs = self.config.interval.as_secs(),
            "Starting dedup sweeper"
        );

        let mut interval = tokio::time::interval(self.config.interval);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Dedup sweeper shutting down");
                    break;
                }
                _ = interval.tick() => {
                    match self.dedup.purge_older_than(self.config.retention).await {
                        Ok(0) => {}
                        Ok(deleted) => {
                            info!(deleted, "Dedup sweep removed expired rows");
                        }
                        Err(e) => {
                            warn!(error = %e, "Dedup sweep failed");
                        }
                    }
                }
            }
        }
    }
}
