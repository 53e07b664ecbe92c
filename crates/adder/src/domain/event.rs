//! Outbox Event Model
//!
//! Domain model for outbox events used in the Transactional Outbox Pattern.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Aggregate classification for sum events
pub const AGGREGATE_TYPE_SUM: &str = "sum";

/// Event type tag dispatched on by the consumer
pub const EVENT_TYPE_SUM_CALCULATED: &str = "sum.calculated";

/// Error types for outbox operations
#[derive(Debug, thiserror::Error)]
pub enum OutboxError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Event not found: {0}")]
    NotFound(Uuid),
}

/// Payload of a `sum.calculated` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SumCalculatedPayload {
    pub x: i64,
    pub y: i64,
    pub result: i64,
}

/// An event in the transactional outbox.
///
/// Immutable once inserted except for `published_at`, `retry_count` and
/// `last_error`, which only the relay mutates. The serialized form is the
/// wire envelope: `id` travels as `event_id`, `published_at` is omitted
/// while null, and the relay bookkeeping fields never reach the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEvent {
    #[serde(rename = "event_id")]
    pub id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub retry_count: i32,
    #[serde(skip)]
    pub last_error: Option<String>,
}

impl OutboxEvent {
    /// Create a fresh `sum.calculated` event.
    ///
    /// Every sum is its own aggregate: the event id doubles as the
    /// aggregate id, which becomes the log partitioning key.
    pub fn sum_calculated(x: i64, y: i64, result: i64) -> Result<Self, OutboxError> {
        let payload = serde_json::to_value(SumCalculatedPayload { x, y, result })?;
        let id = Uuid::new_v4();

        Ok(Self {
            id,
            aggregate_type: AGGREGATE_TYPE_SUM.to_string(),
            aggregate_id: id.to_string(),
            event_type: EVENT_TYPE_SUM_CALCULATED.to_string(),
            payload,
            created_at: Utc::now(),
            published_at: None,
            retry_count: 0,
            last_error: None,
        })
    }

    /// Whether the retry budget is exhausted and the relay must leave
    /// the row for operator intervention.
    pub fn is_quarantined(&self, max_retries: i32) -> bool {
        self.retry_count >= max_retries
    }

    /// Serialize the wire envelope for publishing to the log.
    pub fn to_wire(&self) -> Result<Vec<u8>, OutboxError> {
        Ok(serde_json::to_vec(self)?)
    }
}
