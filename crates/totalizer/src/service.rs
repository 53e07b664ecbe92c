//! Read-side service over the running total.

use std::sync::Arc;

use crate::domain::{RunningTotal, StorageError, TotalsStore};

/// Serves the current running total.
pub struct TotalizerService<T> {
    totals: Arc<T>,
}

impl<T> TotalizerService<T>
where
    T: TotalsStore,
{
    pub fn new(totals: Arc<T>) -> Self {
        Self { totals }
    }

    /// The current total and when it last changed.
    pub async fn current_total(&self) -> Result<RunningTotal, StorageError> {
        self.totals.load().await
    }
}
