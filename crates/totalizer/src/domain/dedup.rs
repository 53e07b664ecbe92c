//! Dedup Store
//!
//! Consumer-side table of applied event identifiers. Its unique key is
//! the primary safety mechanism for at-most-once apply; the log's
//! redelivery machinery only decides how often we look.

use std::time::Duration;

use sqlx::PgTransaction;
use uuid::Uuid;

/// Error types for dedup operations
#[derive(Debug, thiserror::Error)]
pub enum DedupError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result of the check-and-mark operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupOutcome {
    /// First sighting; the dedup row is now pending in the caller's
    /// transaction and the event must be applied
    Fresh,
    /// The event id is already recorded; skip application but still
    /// commit so the log offset advances
    AlreadyProcessed,
}

/// Records applied event identifiers.
#[async_trait::async_trait]
pub trait DedupStore: Send + Sync {
    /// Attempt to record the event id within the caller's transaction.
    ///
    /// On a unique-key conflict this reports [`DedupOutcome::AlreadyProcessed`]
    /// without poisoning the transaction: the caller observes the
    /// outcome and commits either way.
    async fn check_and_mark_in_tx(
        &self,
        tx: &mut PgTransaction<'_>,
        event_id: Uuid,
        aggregate_type: &str,
        event_type: &str,
    ) -> Result<DedupOutcome, DedupError>;

    /// Whether an event id has been recorded.
    async fn is_processed(&self, event_id: Uuid) -> Result<bool, DedupError>;

    /// Remove dedup rows older than the retention window. Returns the
    /// number of deleted rows. Retention must exceed the log's message
    /// lifetime so late redeliveries are still detected.
    async fn purge_older_than(&self, retention: Duration) -> Result<u64, DedupError>;
}
