//! Metrics Module - Prometheus metrics for the event pipeline
//!
//! Provides the four pipeline metrics shared by producer and consumer:
//! - End-to-end event latency (event creation → consumer apply)
//! - Log delivery latency (publish intent → consumer apply)
//! - Produced message counter
//! - Consumed message counter
//!
//! The facade is dependency-injected into the relay and the consumer;
//! only the composition roots create a registry.

use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

/// Histogram buckets for latency measurements (seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Outcome label for produced messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProduceStatus {
    Success,
    Error,
}

impl ProduceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProduceStatus::Success => "success",
            ProduceStatus::Error => "error",
        }
    }
}

/// Outcome label for consumed messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeStatus {
    Success,
    Error,
    Duplicate,
    Unknown,
}

impl ConsumeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsumeStatus::Success => "success",
            ConsumeStatus::Error => "error",
            ConsumeStatus::Duplicate => "duplicate",
            ConsumeStatus::Unknown => "unknown",
        }
    }
}

/// Pipeline metrics facade
#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    /// Full lifecycle latency from event creation to consumer processing
    event_processing_latency: HistogramVec,

    /// Log-only latency from publish intent to consumer processing
    delivery_latency: HistogramVec,

    /// Messages handed to the log, by outcome
    messages_produced: IntCounterVec,

    /// Messages read from the log, by event type and outcome
    messages_consumed: IntCounterVec,

    registry: Registry,
}

impl PipelineMetrics {
    /// Create metrics registered against a fresh registry
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::with_registry(Registry::new())
    }

    /// Create metrics registered against the given registry
    pub fn with_registry(registry: Registry) -> Result<Self, prometheus::Error> {
        let event_processing_latency = HistogramVec::new(
            HistogramOpts::new(
                "event_processing_latency_seconds",
                "Full lifecycle latency from event creation to consumer processing (seconds)",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
            &["topic", "event_type"],
        )?;

        let delivery_latency = HistogramVec::new(
            HistogramOpts::new(
                "nats_delivery_latency_seconds",
                "Log delivery latency from publish to consumer processing (seconds)",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
            &["topic", "event_type"],
        )?;

        let messages_produced = IntCounterVec::new(
            Opts::new(
                "nats_messages_produced_total",
                "Total number of messages produced to the log",
            ),
            &["topic", "status"],
        )?;

        let messages_consumed = IntCounterVec::new(
            Opts::new(
                "nats_messages_consumed_total",
                "Total number of messages consumed from the log",
            ),
            &["topic", "event_type", "status"],
        )?;

        registry.register(Box::new(event_processing_latency.clone()))?;
        registry.register(Box::new(delivery_latency.clone()))?;
        registry.register(Box::new(messages_produced.clone()))?;
        registry.register(Box::new(messages_consumed.clone()))?;

        Ok(Self {
            event_processing_latency,
            delivery_latency,
            messages_produced,
            messages_consumed,
            registry,
        })
    }

    /// Observe end-to-end latency (seconds) keyed by topic and event type
    pub fn observe_event_latency(&self, topic: &str, event_type: &str, seconds: f64) {
        self.event_processing_latency
            .with_label_values(&[topic, event_type])
            .observe(seconds);
    }

    /// Observe log-only delivery latency (seconds)
    pub fn observe_delivery_latency(&self, topic: &str, event_type: &str, seconds: f64) {
        self.delivery_latency
            .with_label_values(&[topic, event_type])
            .observe(seconds);
    }

    /// Count a publish attempt outcome
    pub fn record_produced(&self, topic: &str, status: ProduceStatus) {
        self.messages_produced
            .with_label_values(&[topic, status.as_str()])
            .inc();
    }

    /// Count a consume outcome
    pub fn record_consumed(&self, topic: &str, event_type: &str, status: ConsumeStatus) {
        self.messages_consumed
            .with_label_values(&[topic, event_type, status.as_str()])
            .inc();
    }

    /// Get the backing registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encode all registered metrics in the Prometheus text format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_labels() {
        assert_eq!(ProduceStatus::Success.as_str(), "success");
        assert_eq!(ProduceStatus::Error.as_str(), "error");
        assert_eq!(ConsumeStatus::Duplicate.as_str(), "duplicate");
        assert_eq!(ConsumeStatus::Unknown.as_str(), "unknown");
    }

    #[test]
    fn test_counters_increment() {
        let metrics = PipelineMetrics::new().unwrap();

        metrics.record_produced("sums", ProduceStatus::Success);
        metrics.record_produced("sums", ProduceStatus::Success);
        metrics.record_produced("sums", ProduceStatus::Error);
        metrics.record_consumed("sums", "sum.calculated", ConsumeStatus::Success);
        metrics.record_consumed("sums", "sum.calculated", ConsumeStatus::Duplicate);

        let encoded = metrics.encode().unwrap();
        assert!(encoded.contains("nats_messages_produced_total"));
        assert!(encoded.contains("nats_messages_consumed_total"));
        assert!(encoded.contains("duplicate"));
    }

    #[test]
    fn test_histograms_observe() {
        let metrics = PipelineMetrics::new().unwrap();

        metrics.observe_event_latency("sums", "sum.calculated", 0.042);
        metrics.observe_delivery_latency("sums", "sum.calculated", 0.007);

        let encoded = metrics.encode().unwrap();
        assert!(encoded.contains("event_processing_latency_seconds"));
        assert!(encoded.contains("nats_delivery_latency_seconds"));
    }

    #[test]
    fn test_two_facades_do_not_share_a_registry() {
        let a = PipelineMetrics::new().unwrap();
        let b = PipelineMetrics::new().unwrap();

        a.record_produced("sums", ProduceStatus::Success);

        let encoded_b = b.encode().unwrap();
        assert!(!encoded_b.contains("success"));
    }
}
