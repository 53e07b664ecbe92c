//! Outbox Repository Traits
//!
//! Abstraction for outbox event persistence operations.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::PgTransaction;
use uuid::Uuid;

use super::event::{OutboxError, OutboxEvent};

/// Repository operations used by the relay and the operator surface.
///
/// All operations run against the pool; the transactional insert lives
/// in [`OutboxRepositoryTx`] so it can share the caller's transaction.
#[async_trait::async_trait]
pub trait OutboxRepository: Send + Sync {
    /// Retrieve unpublished events for publication.
    ///
    /// Orders by `created_at` so per-aggregate insertion order is
    /// preserved, and claims rows with `FOR UPDATE SKIP LOCKED`: rows a
    /// concurrent relay instance already claimed are skipped, not waited
    /// on.
    async fn fetch_unpublished(&self, limit: i64) -> Result<Vec<OutboxEvent>, OutboxError>;

    /// Set `published_at` to the supplied instant.
    ///
    /// The instant is the one the relay stamped into the wire envelope
    /// before the log write, so the stored row matches what consumers saw.
    async fn mark_published(
        &self,
        id: Uuid,
        published_at: DateTime<Utc>,
    ) -> Result<(), OutboxError>;

    /// Increment the retry count and store the error tail.
    /// Leaves `published_at` null so the next tick retries the event.
    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), OutboxError>;

    /// Delete published events whose `published_at` is older than the
    /// retention window. Returns the number of deleted rows. Rows that
    /// were never published are untouched, quarantined rows included.
    async fn cleanup_old_events(&self, retention: Duration) -> Result<u64, OutboxError>;

    /// Unpublished events whose retry budget is exhausted, for operator
    /// inspection.
    async fn fetch_quarantined(&self, max_retries: i32) -> Result<Vec<OutboxEvent>, OutboxError>;

    /// Reset the retry budget of a quarantined event so the relay picks
    /// it up again. Fails with `NotFound` for ids that do not name an
    /// unpublished row.
    async fn requeue(&self, id: Uuid) -> Result<(), OutboxError>;

    /// Counts by state plus the age of the oldest pending row.
    async fn stats(&self, max_retries: i32) -> Result<OutboxStats, OutboxError>;
}

/// Transaction-aware outbox operations.
///
/// This is the core of the Transactional Outbox Pattern: the event
/// insert shares the transaction of the domain mutation, so both commit
/// or neither does.
#[async_trait::async_trait]
pub trait OutboxRepositoryTx: Send + Sync {
    /// Append a freshly constructed event within the caller's
    /// transaction. A duplicate id is a bug and surfaces as the
    /// database's constraint violation.
    async fn insert_in_tx(
        &self,
        tx: &mut PgTransaction<'_>,
        event: &OutboxEvent,
    ) -> Result<(), OutboxError>;
}

/// Statistics about outbox events
#[derive(Debug, Clone, serde::Serialize)]
pub struct OutboxStats {
    pub pending_count: u64,
    pub published_count: u64,
    pub quarantined_count: u64,
    pub oldest_pending_age_seconds: Option<i64>,
}

impl OutboxStats {
    /// Total number of rows currently in the outbox
    pub fn total(&self) -> u64 {
        self.pending_count + self.published_count + self.quarantined_count
    }

    /// Whether any row is waiting for the relay
    pub fn has_pending(&self) -> bool {
        self.pending_count > 0
    }
}
