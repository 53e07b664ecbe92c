//! NATS JetStream messaging for the producing side.

pub mod nats;

pub use nats::{NatsEventPublisher, STREAM_NAME, TOPIC, subject_for};
