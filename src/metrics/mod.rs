// Pipeline Prometheus metrics
//
// Counters for the request pipeline:
// - Requests by outcome (hit, transformed, fallback, not_found)
// - Cache lookups by result
// - Origin fetch and transform failures
// - Background cache work failures
// - Fallback responses by reason

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Encoder, Histogram,
    IntCounter, IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;

/// Global metrics registry for the image pipeline
pub struct PipelineMetrics {
    /// Requests by final outcome
    pub requests: IntCounterVec,

    /// Cache lookups by result (hit, miss, stale, disabled)
    pub cache_lookups: IntCounterVec,

    /// Origin fetches that did not return a usable 200
    pub fetch_failures: IntCounter,

    /// Transforms that failed and served the original bytes
    pub transform_failures: IntCounter,

    /// Background writes/removals that failed
    pub cache_work_failures: IntCounterVec,

    /// Fallback responses by reason (validation, unauthorized, fetch)
    pub fallbacks: IntCounterVec,

    /// Time spent producing a response, in seconds
    pub request_duration: Histogram,
}

static METRICS: OnceLock<PipelineMetrics> = OnceLock::new();

impl PipelineMetrics {
    /// Return the global metrics instance, registering it on first use
    pub fn global() -> &'static Self {
        METRICS.get_or_init(|| {
            let requests = register_int_counter_vec!(
                "s3imageserver_requests_total",
                "Image requests by outcome",
                &["outcome"]
            )
            .expect("Failed to register requests_total metric");

            let cache_lookups = register_int_counter_vec!(
                "s3imageserver_cache_lookups_total",
                "Disk cache lookups by result",
                &["result"]
            )
            .expect("Failed to register cache_lookups_total metric");

            let fetch_failures = register_int_counter!(
                "s3imageserver_origin_fetch_failures_total",
                "Origin fetches that failed or returned a non-200 status"
            )
            .expect("Failed to register origin_fetch_failures_total metric");

            let transform_failures = register_int_counter!(
                "s3imageserver_transform_failures_total",
                "Transforms that failed and served the source bytes"
            )
            .expect("Failed to register transform_failures_total metric");

            let cache_work_failures = register_int_counter_vec!(
                "s3imageserver_cache_work_failures_total",
                "Background cache work items that failed",
                &["operation"] // write, remove
            )
            .expect("Failed to register cache_work_failures_total metric");

            let fallbacks = register_int_counter_vec!(
                "s3imageserver_fallbacks_total",
                "Fallback responses by reason",
                &["reason"]
            )
            .expect("Failed to register fallbacks_total metric");

            let request_duration = register_histogram!(
                "s3imageserver_request_duration_seconds",
                "Time to produce an image response in seconds",
                vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
            )
            .expect("Failed to register request_duration_seconds metric");

            PipelineMetrics {
                requests,
                cache_lookups,
                fetch_failures,
                transform_failures,
                cache_work_failures,
                fallbacks,
                request_duration,
            }
        })
    }

    pub fn record_request(&self, outcome: &str, seconds: f64) {
        self.requests.with_label_values(&[outcome]).inc();
        self.request_duration.observe(seconds);
    }

    pub fn record_cache_lookup(&self, result: &str) {
        self.cache_lookups.with_label_values(&[result]).inc();
    }

    pub fn record_fetch_failure(&self) {
        self.fetch_failures.inc();
    }

    pub fn record_transform_failure(&self) {
        self.transform_failures.inc();
    }

    pub fn record_cache_work_failure(&self, operation: &str) {
        self.cache_work_failures.with_label_values(&[operation]).inc();
    }

    pub fn record_fallback(&self, reason: &str) {
        self.fallbacks.with_label_values(&[reason]).inc();
    }
}

/// Export every registered metric in Prometheus text format
pub fn export_prometheus() -> String {
    // Make sure the pipeline metrics exist even before the first request
    PipelineMetrics::global();

    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8(buffer).unwrap_or_default()
}
