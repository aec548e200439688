//! Metrics collection and exposition.
//!
//! # Metrics
//! - `autopush_decisions_total` (counter): push decisions taken
//! - `autopush_pushed_paths_total` (counter): paths selected for push
//! - `autopush_pushes_total` (counter): settled pushes by `outcome`
//! - `autopush_token_resets_total` (counter): unusable client tokens discarded
//! - `autopush_path_rejections_total` (counter): unusable request paths by `reason`
//! - `autopush_learned_entries` (gauge): entry paths with learned dependencies
//! - `autopush_active_sessions` (gauge): tracked transport sessions
//! - `autopush_requests_total` (counter): served primary requests by `status`
//! - `autopush_request_duration_seconds` (histogram): primary response latency
//!
//! Every function is a no-op until a recorder is installed.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus metrics endpoint started");
    Ok(())
}

pub fn record_decision(pushed: usize) {
    counter!("autopush_decisions_total").increment(1);
    if pushed > 0 {
        counter!("autopush_pushed_paths_total").increment(pushed as u64);
    }
}

pub fn record_push(outcome: &'static str) {
    counter!("autopush_pushes_total", "outcome" => outcome).increment(1);
}

pub fn record_token_reset() {
    counter!("autopush_token_resets_total").increment(1);
}

pub fn record_path_rejection(reason: &'static str) {
    counter!("autopush_path_rejections_total", "reason" => reason).increment(1);
}

pub fn record_learned_entries(count: usize) {
    gauge!("autopush_learned_entries").set(count as f64);
}

pub fn record_active_sessions(count: usize) {
    gauge!("autopush_active_sessions").set(count as f64);
}

/// Record a served primary request.
pub fn record_request(status: u16, elapsed: Duration) {
    counter!("autopush_requests_total", "status" => status.to_string()).increment(1);
    histogram!("autopush_request_duration_seconds").record(elapsed.as_secs_f64());
}
