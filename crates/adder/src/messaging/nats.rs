//! NATS JetStream publisher.
//!
//! Production implementation of [`EventPublisher`] with durable,
//! at-least-once delivery: every publish waits for the stream's ack
//! before the relay is allowed to mark the row published.

use std::time::Duration;

use async_nats::jetstream::Context as JetStreamContext;
use async_nats::jetstream::stream::Config as StreamConfig;
use async_nats::{ConnectOptions, HeaderMap};
use tracing::{debug, info};

use sumline_shared::config::NatsConfig;
use sumline_shared::telemetry::tracing::inject_trace_context;

use crate::domain::{EventPublisher, OutboxEvent, PublishError};

/// Subject root of the pipeline; also the `topic` label on metrics
pub const TOPIC: &str = "sums";

/// JetStream stream backing the pipeline
pub const STREAM_NAME: &str = "SUMLINE_EVENTS";

/// Message lifetime inside the log. Must stay below the consumer's
/// dedup retention so late redeliveries are still recognized.
const STREAM_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Subject for an event: `sums.<aggregate_type>.<aggregate_id>`.
///
/// The aggregate id is the partitioning key; publishing an aggregate's
/// events serially onto one subject preserves their order for
/// consumers.
pub fn subject_for(topic: &str, event: &OutboxEvent) -> String {
    format!("{}.{}.{}", topic, event.aggregate_type, event.aggregate_id)
}

/// JetStream-backed event publisher
#[derive(Clone)]
pub struct NatsEventPublisher {
    jetstream: JetStreamContext,
    topic: String,
}

impl NatsEventPublisher {
    /// Connect to NATS and ensure the pipeline stream exists.
    pub async fn connect(config: &NatsConfig) -> Result<Self, PublishError> {
        let mut options = ConnectOptions::default()
            .connection_timeout(Duration::from_secs(config.connection_timeout_secs));

        if let Some(name) = &config.name {
            options = options.name(name);
        }
        if let Some(max_reconnects) = config.max_reconnects {
            options = options.max_reconnects(max_reconnects);
        }

        let client = async_nats::connect_with_options(&config.url, options)
            .await
            .map_err(|e| PublishError::Connection(e.to_string()))?;

        let jetstream = async_nats::jetstream::new(client);

        let stream_config = StreamConfig {
            name: STREAM_NAME.to_string(),
            subjects: vec![format!("{}.>", TOPIC)],
            retention: async_nats::jetstream::stream::RetentionPolicy::Limits,
            max_age: STREAM_MAX_AGE,
            storage: async_nats::jetstream::stream::StorageType::File,
            num_replicas: 1,
            ..Default::default()
        };

        jetstream
            .get_or_create_stream(stream_config)
            .await
            .map_err(|e| PublishError::Connection(e.to_string()))?;

        info!(stream = STREAM_NAME, url = %config.url, "Connected to NATS JetStream");

        Ok(Self {
            jetstream,
            topic: TOPIC.to_string(),
        })
    }

    /// The topic (subject root) this publisher writes to
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait::async_trait]
impl EventPublisher for NatsEventPublisher {
    async fn publish(&self, event: &OutboxEvent) -> Result<(), PublishError> {
        let subject = subject_for(&self.topic, event);
        let payload = event.to_wire().map_err(|e| match e {
            crate::domain::OutboxError::Serialization(e) => PublishError::Serialization(e),
            other => PublishError::Publish(other.to_string()),
        })?;

        let mut headers = HeaderMap::new();
        inject_trace_context(&mut headers);

        // Wait for the stream ack: only a durably stored message counts
        let ack = self
            .jetstream
            .publish_with_headers(subject.clone(), headers, payload.into())
            .await
            .map_err(|e| PublishError::Publish(e.to_string()))?;

        ack.await.map_err(|e| PublishError::Publish(e.to_string()))?;

        debug!(
            event_id = %event.id,
            event_type = %event.event_type,
            subject = %subject,
            "Event published to log"
        );

        Ok(())
    }
}
