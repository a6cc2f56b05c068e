/// Prometheus metrics surface
///
/// Held as part of `AppState` rather than behind process-level statics,
/// per this service's no-package-level-mutable-state design: a `Metrics`
/// handle is constructed once at startup and cloned into every
/// collaborator that needs to record an observation.
use prometheus::{Encoder, HistogramVec, IntCounterVec, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub chunk_upload_failures_total: IntCounterVec,
    pub retries_total: IntCounterVec,
    pub request_duration_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let chunk_upload_failures_total = IntCounterVec::new(
            prometheus::Opts::new(
                "chunk_upload_failures_total",
                "Chunk uploads that exhausted retries",
            ),
            &["reason"],
        )
        .expect("valid metric definition");

        let retries_total = IntCounterVec::new(
            prometheus::Opts::new("retries_total", "Chunk persistence retry attempts"),
            &["stage"],
        )
        .expect("valid metric definition");

        let request_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "request_duration_seconds",
                "HTTP request duration in seconds",
            ),
            &["method", "path"],
        )
        .expect("valid metric definition");

        registry
            .register(Box::new(chunk_upload_failures_total.clone()))
            .expect("metric registration");
        registry
            .register(Box::new(retries_total.clone()))
            .expect("metric registration");
        registry
            .register(Box::new(request_duration_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            chunk_upload_failures_total,
            retries_total,
            request_duration_seconds,
        }
    }

    pub fn gather(&self) -> String {
        let metric_families = self.registry.gather();
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .expect("prometheus text encoding never fails for well-formed metrics");
        String::from_utf8(buffer).expect("prometheus text output is valid utf-8")
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
