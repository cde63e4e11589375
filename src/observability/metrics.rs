//! Metrics collection and exposition.
//!
//! # Metrics
//! - `shop_rpc_requests_total` (counter): RPC calls by method, status
//! - `shop_rpc_request_duration_seconds` (histogram): latency by method
//! - `shop_certificate_reloads_total` (counter): reloads by outcome
//! - `shop_certificate_watch_repairs_total` (counter): re-subscriptions by outcome
//! - `shop_connections_aged_out_total` (counter): connections drained at max age
//!
//! Recording is a no-op until a recorder is installed, so library code and
//! tests can call these freely.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "shop_rpc_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("shop_rpc_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_certificate_reload(success: bool) {
    counter!("shop_certificate_reloads_total", "outcome" => outcome(success)).increment(1);
}

pub fn record_watch_repair(success: bool) {
    counter!("shop_certificate_watch_repairs_total", "outcome" => outcome(success)).increment(1);
}

pub fn record_connection_aged_out() {
    counter!("shop_connections_aged_out_total").increment(1);
}

fn outcome(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}
