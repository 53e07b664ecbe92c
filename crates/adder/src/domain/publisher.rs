//! Publisher abstraction over the message log.

use super::event::OutboxEvent;

/// Errors surfaced by a log publisher
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("failed to publish message: {0}")]
    Publish(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Hands a single event to the message log.
///
/// Implementations must not acknowledge success before the log has
/// durably accepted the message; the relay marks the row published only
/// after this returns `Ok`.
#[async_trait::async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &OutboxEvent) -> Result<(), PublishError>;
}
