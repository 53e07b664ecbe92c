//! Wire envelope as consumed from the message log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event type applied to the running total
pub const EVENT_TYPE_SUM_CALCULATED: &str = "sum.calculated";

/// Payload of a `sum.calculated` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SumCalculatedPayload {
    pub x: i64,
    pub y: i64,
    pub result: i64,
}

/// An event as it arrives from the log.
///
/// `published_at` may be absent: a producer crash between the log write
/// and its bookkeeping republishes the event, and only the retry that
/// reached the log carries the timestamp of its own attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumedEvent {
    #[serde(rename = "event_id")]
    pub id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl ConsumedEvent {
    /// Decode a wire envelope. A failure here classifies the message as
    /// poison.
    pub fn decode(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }

    /// Decode the payload of a `sum.calculated` event.
    pub fn sum_payload(&self) -> Result<SumCalculatedPayload, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }

    /// End-to-end latency at `now`, in seconds.
    pub fn event_latency_secs(&self, now: DateTime<Utc>) -> f64 {
        (now - self.created_at).num_milliseconds() as f64 / 1000.0
    }

    /// Log-only latency at `now`, if the envelope carries a publish
    /// timestamp.
    pub fn delivery_latency_secs(&self, now: DateTime<Utc>) -> Option<f64> {
        self.published_at
            .map(|published_at| (now - published_at).num_milliseconds() as f64 / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire_json(published_at: Option<&str>) -> String {
        let published = match published_at {
            Some(ts) => format!(r#","published_at":"{ts}""#),
            None => String::new(),
        };
        format!(
            r#"{{"event_id":"550e8400-e29b-41d4-a716-446655440000",
                "aggregate_type":"sum",
                "aggregate_id":"550e8400-e29b-41d4-a716-446655440000",
                "event_type":"sum.calculated",
                "payload":{{"x":5,"y":3,"result":8}},
                "created_at":"2024-01-15T10:30:00.000Z"{published}}}"#
        )
    }

    #[test]
    fn test_decode_full_envelope() {
        let event =
            ConsumedEvent::decode(wire_json(Some("2024-01-15T10:30:00.050Z")).as_bytes()).unwrap();

        assert_eq!(event.event_type, "sum.calculated");
        assert_eq!(event.aggregate_id, event.id.to_string());
        assert!(event.published_at.is_some());
        assert_eq!(
            event.sum_payload().unwrap(),
            SumCalculatedPayload { x: 5, y: 3, result: 8 }
        );
    }

    #[test]
    fn test_decode_without_published_at() {
        let event = ConsumedEvent::decode(wire_json(None).as_bytes()).unwrap();
        assert!(event.published_at.is_none());

        let now = Utc::now();
        assert!(event.event_latency_secs(now) > 0.0);
        assert!(event.delivery_latency_secs(now).is_none());
    }

    #[test]
    fn test_decode_rejects_malformed_input() {
        assert!(ConsumedEvent::decode(b"not json at all").is_err());
        assert!(ConsumedEvent::decode(b"{\"event_id\":\"nope\"}").is_err());
    }

    #[test]
    fn test_latency_measured_against_envelope_timestamps() {
        let mut event = ConsumedEvent::decode(wire_json(None).as_bytes()).unwrap();
        let now = Utc::now();
        event.created_at = now - chrono::Duration::milliseconds(1500);
        event.published_at = Some(now - chrono::Duration::milliseconds(250));

        assert!((event.event_latency_secs(now) - 1.5).abs() < 0.001);
        assert!((event.delivery_latency_secs(now).unwrap() - 0.25).abs() < 0.001);
    }

    #[test]
    fn test_sum_payload_rejects_wrong_shape() {
        let mut event = ConsumedEvent::decode(wire_json(None).as_bytes()).unwrap();
        event.payload = serde_json::json!({"amount": "not a sum"});
        assert!(event.sum_payload().is_err());
    }
}
