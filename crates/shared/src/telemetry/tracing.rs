//! Tracing Module - log setup and W3C trace context propagation
//!
//! Provides:
//! - tracing-subscriber initialization with env-filter levels
//! - W3C Trace Context propagation over NATS message headers

use async_nats::HeaderMap;
use opentelemetry::Context;
use opentelemetry::global;
use opentelemetry::propagation::{Extractor, Injector};
use opentelemetry::trace::TraceContextExt;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Configuration for tracing
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Service name for traces
    pub service_name: String,
    /// Log filter level
    pub log_level: String,
}

impl TracingConfig {
    pub fn new(service_name: &str, log_level: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            log_level: log_level.to_string(),
        }
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: "sumline".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Initialize tracing output and the global W3C propagator.
///
/// Safe to call more than once; only the first call installs the
/// global subscriber.
pub fn init_tracing(config: &TracingConfig) {
    let env_filter =
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let logging_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stdout)
        .with_filter(env_filter);

    let subscriber = tracing_subscriber::Registry::default().with(logging_layer);
    tracing::subscriber::set_global_default(subscriber).ok();

    global::set_text_map_propagator(TraceContextPropagator::new());

    info!("Tracing initialized for service: {}", config.service_name);
}

/// Inject the current trace context into NATS message headers.
///
/// Called by the relay immediately before handing a message to the log.
pub fn inject_trace_context(headers: &mut HeaderMap) {
    let cx = Context::current();
    global::get_text_map_propagator(|propagator| {
        propagator.inject_context(&cx, &mut NatsHeaderInjector(headers));
    });
}

/// Extract a remote trace context from NATS message headers.
///
/// Called by the consumer before it opens its processing span.
pub fn extract_trace_context(headers: &HeaderMap) -> Context {
    global::get_text_map_propagator(|propagator| propagator.extract(&NatsHeaderExtractor(headers)))
}

/// Remote trace id carried by an extracted context, if any.
pub fn remote_trace_id(cx: &Context) -> Option<String> {
    let span_context = cx.span().span_context().clone();
    if span_context.is_valid() {
        Some(span_context.trace_id().to_string())
    } else {
        None
    }
}

struct NatsHeaderInjector<'a>(&'a mut HeaderMap);

impl Injector for NatsHeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        self.0.insert(key, value.as_str());
    }
}

struct NatsHeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for NatsHeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|value| value.as_str())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.iter().map(|(name, _)| name.as_ref()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::{SpanContext, SpanId, TraceFlags, TraceId, TraceState};

    fn remote_context() -> Context {
        let span_context = SpanContext::new(
            TraceId::from_bytes(0x4bf92f3577b34da6a3ce929d0e0e4736u128.to_be_bytes()),
            SpanId::from_bytes(0x00f067aa0ba902b7u64.to_be_bytes()),
            TraceFlags::SAMPLED,
            true,
            TraceState::default(),
        );
        Context::new().with_remote_span_context(span_context)
    }

    #[test]
    fn test_inject_and_extract_round_trip() {
        global::set_text_map_propagator(TraceContextPropagator::new());

        let mut headers = HeaderMap::new();
        let cx = remote_context();
        global::get_text_map_propagator(|propagator| {
            propagator.inject_context(&cx, &mut NatsHeaderInjector(&mut headers));
        });

        assert!(headers.get("traceparent").is_some());

        let extracted = extract_trace_context(&headers);
        assert_eq!(
            remote_trace_id(&extracted),
            Some("4bf92f3577b34da6a3ce929d0e0e4736".to_string())
        );
    }

    #[test]
    fn test_extract_without_headers_yields_invalid_context() {
        global::set_text_map_propagator(TraceContextPropagator::new());

        let headers = HeaderMap::new();
        let extracted = extract_trace_context(&headers);
        assert_eq!(remote_trace_id(&extracted), None);
    }
}
