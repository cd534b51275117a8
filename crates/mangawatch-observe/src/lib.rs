//! Observability setup for mangawatch: structured logging, optional
//! OpenTelemetry span export, and metric instruments.

pub mod metrics;
pub mod tracing_setup;
