// Metrics module for Prometheus observability
// Author: kelexine (https://github.com/kelexine)

mod registry;

pub use registry::{
    gather_metrics, BACKEND_CALLS, BACKEND_DURATION, CACHE_ENTRIES, CACHE_OPERATIONS,
    FAN_OUT_FAILURES, GATEWAY_DURATION, GATEWAY_REQUESTS,
};

/// Helper to record an inbound gateway request
pub fn record_gateway_request(route: &str, status_code: u16, duration_secs: f64) {
    GATEWAY_REQUESTS
        .with_label_values(&[route, &status_code.to_string()])
        .inc();

    GATEWAY_DURATION
        .with_label_values(&[route])
        .observe(duration_secs);
}

/// Helper to record a backend call. Pass status 0 when no response arrived.
pub fn record_backend_call(route: &str, status_code: u16, duration_secs: f64) {
    BACKEND_CALLS
        .with_label_values(&[route, &status_code.to_string()])
        .inc();

    BACKEND_DURATION
        .with_label_values(&[route])
        .observe(duration_secs);
}

pub fn record_fan_out_failure(route: &str, source: &str) {
    FAN_OUT_FAILURES.with_label_values(&[route, source]).inc();
}

/// Helper to record query cache operations
pub fn record_cache_operation(operation: &str) {
    CACHE_OPERATIONS.with_label_values(&[operation]).inc();
}

pub fn update_cache_entries(count: usize) {
    CACHE_ENTRIES.with_label_values(&["active"]).set(count as f64);
}
