//! Telemetry: metrics facade and tracing/propagation helpers

pub mod metrics;
pub mod tracing;

pub use self::metrics::{ConsumeStatus, PipelineMetrics, ProduceStatus};
pub use self::tracing::{
    TracingConfig, extract_trace_context, init_tracing, inject_trace_context,
};
