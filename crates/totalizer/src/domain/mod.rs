//! Domain model for the consuming side: the wire envelope as this
//! service sees it, the dedup store, and the running-total storage.

pub mod dedup;
pub mod event;
pub mod storage;

pub use dedup::{DedupError, DedupOutcome, DedupStore};
pub use event::{ConsumedEvent, EVENT_TYPE_SUM_CALCULATED, SumCalculatedPayload};
pub use storage::{RunningTotal, StorageError, TotalsStore};
