//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): relays by target, status
//! - `relay_request_duration_seconds` (histogram): entry to last body byte
//! - `relay_bytes_transferred_total` (counter): response bytes by target
//! - `relay_upstream_errors_total` (counter): failed relays by target, kind
//!
//! A failed relay is recorded with the status the client received.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    describe();
    tracing::info!(address = %addr, "Prometheus metrics endpoint listening");
    Ok(())
}

fn describe() {
    describe_counter!("relay_requests_total", "Relayed requests by target and status");
    describe_histogram!(
        "relay_request_duration_seconds",
        "Time from request entry to the last relayed byte"
    );
    describe_counter!("relay_bytes_transferred_total", "Response body bytes relayed to clients");
    describe_counter!("relay_upstream_errors_total", "Relays that failed before a response was sent");
}

/// Record one finished relay.
pub fn record_relay(target: &str, status: u16, bytes: u64, duration: Duration) {
    let target = target.to_string();
    counter!("relay_requests_total", "target" => target.clone(), "status" => status.to_string()).increment(1);
    histogram!("relay_request_duration_seconds", "target" => target.clone()).record(duration.as_secs_f64());
    if bytes > 0 {
        counter!("relay_bytes_transferred_total", "target" => target).increment(bytes);
    }
}

/// Record a relay that failed before upstream answered.
pub fn record_upstream_error(target: &str, kind: &'static str) {
    counter!("relay_upstream_errors_total", "target" => target.to_string(), "kind" => kind).increment(1);
}
