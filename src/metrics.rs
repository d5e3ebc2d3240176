//! Prometheus metrics
//!
//! - Sync outcomes per entity, operation and outcome
//! - Embedded documents rewritten by author fan-out
//! - Benchmark query latencies per store and query

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use tracing::{error, info};

lazy_static::lazy_static! {
    /// Global metrics registry
    pub static ref METRICS_REGISTRY: Registry = Registry::new();

    pub static ref SYNC_OPERATIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("bookmirror_sync_operations_total", "Synchronized write operations by outcome"),
        &["entity", "op", "outcome"]
    ).unwrap();

    pub static ref FANOUT_DOCUMENTS: IntCounter = IntCounter::new(
        "bookmirror_fanout_documents_total",
        "Embedding documents rewritten after an author update"
    ).unwrap();

    pub static ref BENCH_QUERY_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "bookmirror_bench_query_seconds",
            "Benchmark query duration in seconds"
        ).buckets(vec![0.000_001, 0.000_01, 0.000_1, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        &["store", "query"]
    ).unwrap();
}

/// Initialize metrics registry
pub fn init_metrics() {
    info!("Initializing Prometheus metrics");

    METRICS_REGISTRY.register(Box::new(SYNC_OPERATIONS.clone())).ok();
    METRICS_REGISTRY.register(Box::new(FANOUT_DOCUMENTS.clone())).ok();
    METRICS_REGISTRY.register(Box::new(BENCH_QUERY_DURATION.clone())).ok();
}

pub fn record_sync(entity: &str, op: &str, outcome: &str) {
    SYNC_OPERATIONS.with_label_values(&[entity, op, outcome]).inc();
}

pub fn record_fanout(documents: u64) {
    FANOUT_DOCUMENTS.inc_by(documents);
}

pub fn observe_bench_query(store: &str, query: &str, seconds: f64) {
    BENCH_QUERY_DURATION
        .with_label_values(&[store, query])
        .observe(seconds);
}

/// Export all metrics in Prometheus text format
pub fn export_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|_| String::from("# Error converting metrics\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_contains_registered_metrics() {
        init_metrics();
        record_sync("author", "create", "synchronized");
        record_fanout(2);
        observe_bench_query("relational", "point_lookup", 0.0001);

        let text = export_metrics();
        assert!(text.contains("bookmirror_sync_operations_total"));
        assert!(text.contains("bookmirror_fanout_documents_total"));
        assert!(text.contains("bookmirror_bench_query_seconds"));
    }
}
