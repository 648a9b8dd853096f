// Prometheus metrics registry and collectors
// Author: kelexine (https://github.com/kelexine)

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec_with_registry, register_gauge_vec_with_registry,
    register_histogram_vec_with_registry, CounterVec, Encoder, GaugeVec, HistogramVec, Opts,
    Registry, TextEncoder,
};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // ============================================================================
    // GATEWAY METRICS
    // ============================================================================

    /// Total number of inbound gateway requests
    pub static ref GATEWAY_REQUESTS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("gateway_requests_total", "Total number of inbound gateway requests"),
        &["route", "status_code"],
        REGISTRY
    ).unwrap();

    /// Inbound request duration histogram
    pub static ref GATEWAY_DURATION: HistogramVec = register_histogram_vec_with_registry!(
        prometheus::HistogramOpts::new("gateway_request_duration_seconds", "Gateway request duration in seconds")
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["route"],
        REGISTRY
    ).unwrap();

    // ============================================================================
    // BACKEND METRICS
    // ============================================================================

    /// Total backend calls; status_code 0 means no response was received
    pub static ref BACKEND_CALLS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("backend_calls_total", "Total backend API calls"),
        &["route", "status_code"],
        REGISTRY
    ).unwrap();

    /// Backend call duration
    pub static ref BACKEND_DURATION: HistogramVec = register_histogram_vec_with_registry!(
        prometheus::HistogramOpts::new("backend_call_duration_seconds", "Backend API call duration")
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["route"],
        REGISTRY
    ).unwrap();

    /// Fan-out sources that failed and were replaced by an empty list
    pub static ref FAN_OUT_FAILURES: CounterVec = register_counter_vec_with_registry!(
        Opts::new("fan_out_source_failures_total", "Total failed fan-out sources"),
        &["route", "source"],
        REGISTRY
    ).unwrap();

    // ============================================================================
    // CACHE METRICS
    // ============================================================================

    /// Query cache operations
    pub static ref CACHE_OPERATIONS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("cache_operations_total", "Total query cache operations"),
        &["operation"], // hit, miss, stale, dedup, gated, invalidate, evict
        REGISTRY
    ).unwrap();

    /// Current cache entries
    pub static ref CACHE_ENTRIES: GaugeVec = register_gauge_vec_with_registry!(
        Opts::new("cache_entries_current", "Current number of query cache entries"),
        &["type"], // type: active
        REGISTRY
    ).unwrap();
}

/// Gather all metrics and return as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        // Touch each family so it shows up in the output
        GATEWAY_REQUESTS.with_label_values(&["test", "200"]).inc();
        BACKEND_CALLS.with_label_values(&["test", "200"]).inc();
        CACHE_OPERATIONS.with_label_values(&["hit"]).inc();

        let metrics = gather_metrics();
        assert!(metrics.contains("gateway_requests_total"));
        assert!(metrics.contains("backend_calls_total"));
        assert!(metrics.contains("cache_operations_total"));
    }
}
