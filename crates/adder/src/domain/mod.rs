//! Domain model for the producing side: the outbox event, the
//! repository abstraction over its persistence, and the publisher
//! abstraction over the message log.

pub mod event;
pub mod publisher;
pub mod repository;

pub use event::{
    AGGREGATE_TYPE_SUM, EVENT_TYPE_SUM_CALCULATED, OutboxError, OutboxEvent, SumCalculatedPayload,
};
pub use publisher::{EventPublisher, PublishError};
pub use repository::{OutboxRepository, OutboxRepositoryTx, OutboxStats};
