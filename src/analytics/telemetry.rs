//! Pipeline telemetry instruments and recording helpers.

use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram};
use opentelemetry::KeyValue;
use std::sync::OnceLock;

struct PipelineInstruments {
    requests: Counter<u64>,
    request_duration_seconds: Histogram<f64>,
    stage_duration_seconds: Histogram<f64>,
    rows_returned: Histogram<u64>,
    sample_rate: Histogram<f64>,
}

fn instruments() -> &'static PipelineInstruments {
    static INSTRUMENTS: OnceLock<PipelineInstruments> = OnceLock::new();
    INSTRUMENTS.get_or_init(|| {
        let meter = global::meter("tagsift.analytics");
        PipelineInstruments {
            requests: meter
                .u64_counter("tagsift.analytics.requests")
                .with_description("Total pipeline requests by operation and outcome")
                .init(),
            request_duration_seconds: meter
                .f64_histogram("tagsift.analytics.request.duration")
                .with_description("End-to-end pipeline request latency")
                .with_unit(opentelemetry::metrics::Unit::new("s"))
                .init(),
            stage_duration_seconds: meter
                .f64_histogram("tagsift.analytics.stage.duration")
                .with_description("Per-stage query latency")
                .with_unit(opentelemetry::metrics::Unit::new("s"))
                .init(),
            rows_returned: meter
                .u64_histogram("tagsift.analytics.rows_returned")
                .with_description("Rows returned per pipeline request")
                .init(),
            sample_rate: meter
                .f64_histogram("tagsift.analytics.sample_rate")
                .with_description("Planned sample rate when sampling is enabled")
                .init(),
        }
    })
}

pub struct RequestMetrics {
    pub operation: &'static str,
    /// "success", "no_data", or "error".
    pub outcome: &'static str,
    pub duration_seconds: f64,
    pub rows_returned: u64,
}

pub fn record_request(metrics: RequestMetrics) {
    let i = instruments();
    let attrs = [
        KeyValue::new("operation", metrics.operation),
        KeyValue::new("outcome", metrics.outcome),
    ];
    i.requests.add(1, &attrs);
    i.request_duration_seconds
        .record(metrics.duration_seconds, &attrs);
    i.rows_returned.record(metrics.rows_returned, &attrs);
}

pub fn record_stage(stage: &'static str, duration_seconds: f64) {
    instruments()
        .stage_duration_seconds
        .record(duration_seconds, &[KeyValue::new("stage", stage)]);
}

pub fn record_sample_rate(rate: f64) {
    instruments().sample_rate.record(rate, &[]);
}
