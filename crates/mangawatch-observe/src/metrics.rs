//! OpenTelemetry metric instruments.
//!
//! Instruments record into the global meter provider. That provider is a
//! no-op until [`init_metrics`] installs the stdout exporter (`--otel`), so
//! the recording helpers are always safe to call.

use std::sync::OnceLock;
use std::time::Duration;

use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::{KeyValue, global};
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};

// --- Instrument names ---

/// Notification delivery attempts, labelled by `outcome`.
pub const DELIVERIES: &str = "mangawatch.deliveries";

/// Failures, labelled by `kind` (`database`, `catalog`, `transport`, `panic`).
pub const ERRORS: &str = "mangawatch.errors";

/// Catalog request latency in seconds, labelled by `endpoint` and `status`.
pub const CATALOG_REQUEST_DURATION: &str = "mangawatch.catalog.request.duration";

/// CLI command latency in seconds, labelled by `command`.
pub const COMMAND_DURATION: &str = "mangawatch.command.duration";

const METER_NAME: &str = "mangawatch";

/// Stores the meter provider so it can be flushed on exit.
static METER_PROVIDER: OnceLock<SdkMeterProvider> = OnceLock::new();

struct Instruments {
    deliveries: Counter<u64>,
    errors: Counter<u64>,
    catalog_duration: Histogram<f64>,
    command_duration: Histogram<f64>,
}

impl Instruments {
    fn new(meter: &Meter) -> Self {
        Self {
            deliveries: meter
                .u64_counter(DELIVERIES)
                .with_description("Notification delivery attempts")
                .build(),
            errors: meter
                .u64_counter(ERRORS)
                .with_description("Failures by kind")
                .build(),
            catalog_duration: meter
                .f64_histogram(CATALOG_REQUEST_DURATION)
                .with_description("Catalog request latency")
                .with_unit("s")
                .build(),
            command_duration: meter
                .f64_histogram(COMMAND_DURATION)
                .with_description("CLI command latency")
                .with_unit("s")
                .build(),
        }
    }
}

/// Instruments bound to the provider installed at first use.
fn instruments() -> &'static Instruments {
    static INSTRUMENTS: OnceLock<Instruments> = OnceLock::new();
    INSTRUMENTS.get_or_init(|| Instruments::new(&global::meter(METER_NAME)))
}

/// Install a meter provider exporting to stdout on a periodic reader.
///
/// Call before anything records; instruments bind to the provider present
/// at their first use.
pub fn init_metrics() {
    let reader = PeriodicReader::builder(opentelemetry_stdout::MetricExporter::default()).build();
    let provider = SdkMeterProvider::builder().with_reader(reader).build();

    let _ = METER_PROVIDER.set(provider.clone());
    global::set_meter_provider(provider);
}

/// Flush and shut down the meter provider. No-op when metrics were not
/// initialized.
pub fn shutdown_metrics() {
    if let Some(provider) = METER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            eprintln!("Warning: OTel meter provider shutdown error: {e}");
        }
    }
}

pub fn record_delivery(outcome: &'static str) {
    instruments()
        .deliveries
        .add(1, &[KeyValue::new("outcome", outcome)]);
}

pub fn record_error(kind: &'static str) {
    instruments().errors.add(1, &[KeyValue::new("kind", kind)]);
}

pub fn record_catalog_request(endpoint: &'static str, status: &'static str, elapsed: Duration) {
    instruments().catalog_duration.record(
        elapsed.as_secs_f64(),
        &[
            KeyValue::new("endpoint", endpoint),
            KeyValue::new("status", status),
        ],
    );
}

pub fn record_command(command: &'static str, elapsed: Duration) {
    instruments()
        .command_duration
        .record(elapsed.as_secs_f64(), &[KeyValue::new("command", command)]);
}
