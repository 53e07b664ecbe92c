//! Running-total storage.

use chrono::{DateTime, Utc};
use sqlx::PgTransaction;

/// Error types for totals storage
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// The single running-total row
#[derive(Debug, Clone, serde::Serialize)]
pub struct RunningTotal {
    pub total: i64,
    pub updated_at: DateTime<Utc>,
}

/// Stores the single-row running total.
///
/// Writes are relative (`total = total + delta`) so concurrent consumer
/// instances stay correct under the database's row locks without
/// application-level coordination.
#[async_trait::async_trait]
pub trait TotalsStore: Send + Sync {
    /// Add `delta` to the total within the caller's transaction.
    async fn add_in_tx(&self, tx: &mut PgTransaction<'_>, delta: i64) -> Result<(), StorageError>;

    /// Read the current total.
    async fn load(&self) -> Result<RunningTotal, StorageError>;
}
