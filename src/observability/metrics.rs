//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define routing metrics (requests, latency, cache, throttling)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `route_dispatch_requests_total` (counter): requests by method, outcome
//! - `route_dispatch_duration_seconds` (histogram): latency distribution
//! - `route_cache_events_total` (counter): hit, miss, rebuild, flush, write_failed
//! - `route_dispatch_throttled_total` (counter): throttled requests by route
//! - `route_dispatch_reloads_total` (counter): router reloads by result
//! - `route_dispatch_panics_total` (counter): requests that panicked
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Label values are bounded: outcomes and cache events are fixed strings,
//!   and methods outside the standard set are recorded as `OTHER`

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Metric label for a request method.
pub fn method_label(method: &str) -> &'static str {
    match method.to_ascii_uppercase().as_str() {
        "GET" => "GET",
        "HEAD" => "HEAD",
        "POST" => "POST",
        "PUT" => "PUT",
        "PATCH" => "PATCH",
        "DELETE" => "DELETE",
        "OPTIONS" => "OPTIONS",
        "CONNECT" => "CONNECT",
        "TRACE" => "TRACE",
        _ => "OTHER",
    }
}

/// Record one handled request. `outcome` is one of `ok`, `not_found`,
/// `method_not_allowed`, `bad_request`, `error`.
pub fn record_request(method: &str, outcome: &'static str, start_time: Instant) {
    ::metrics::counter!(
        "route_dispatch_requests_total",
        "method" => method_label(method),
        "outcome" => outcome
    )
    .increment(1);
    ::metrics::histogram!("route_dispatch_duration_seconds", "outcome" => outcome)
        .record(start_time.elapsed().as_secs_f64());
}

pub fn record_cache_event(event: &'static str) {
    ::metrics::counter!("route_cache_events_total", "event" => event).increment(1);
}

pub fn record_throttled(route: &str) {
    ::metrics::counter!("route_dispatch_throttled_total", "route" => route.to_string()).increment(1);
}

pub fn record_reload(result: &'static str) {
    ::metrics::counter!("route_dispatch_reloads_total", "result" => result).increment(1);
}

pub fn record_panic() {
    ::metrics::counter!("route_dispatch_panics_total").increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_label_is_bounded() {
        assert_eq!(method_label("GET"), "GET");
        assert_eq!(method_label("delete"), "DELETE");
        assert_eq!(method_label("PURGE"), "OTHER");
        assert_eq!(method_label("X-CUSTOM-1234"), "OTHER");
    }
}
