//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, route, status
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `dispatch_wins_total` (counter): committed results by strategy
//! - `dispatch_abstentions_total` (counter): silent strategy exits by reason
//! - `dispatch_replays_total` / `dispatch_exhausted_total` (counters)
//! - `circuit_breaker_transitions_total` (counter) and `circuit_breaker_open` (gauge)
//! - `health_probes_total` (counter): real probes by target and outcome
//! - `proxy_attempts_total` (counter): balancer attempts by backend and outcome
//!
//! Every recorder is a no-op until an exporter is installed, so library code
//! and tests can call them freely.

use metrics::{counter, gauge, histogram, Label};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

use crate::resilience::circuit_breaker::CircuitState;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one inbound request.
pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    let labels = vec![
        Label::new("method", method.to_string()),
        Label::new("route", route.to_string()),
        Label::new("status", status.to_string()),
    ];
    counter!("gateway_requests_total", labels.clone()).increment(1);
    histogram!("gateway_request_duration_seconds", labels).record(start.elapsed().as_secs_f64());
}

pub fn record_strategy_win(strategy: &str) {
    counter!("dispatch_wins_total", "strategy" => strategy.to_string()).increment(1);
}

pub fn record_strategy_abstention(strategy: &str, reason: &'static str) {
    counter!(
        "dispatch_abstentions_total",
        "strategy" => strategy.to_string(),
        "reason" => reason
    )
    .increment(1);
}

pub fn record_replay() {
    counter!("dispatch_replays_total").increment(1);
}

pub fn record_exhausted() {
    counter!("dispatch_exhausted_total").increment(1);
}

/// Record a breaker state change; the open gauge doubles as an alarm signal.
pub fn record_breaker_transition(target: &str, state: CircuitState) {
    counter!(
        "circuit_breaker_transitions_total",
        "target" => target.to_string(),
        "state" => state.as_str()
    )
    .increment(1);
    let open = if state == CircuitState::Open { 1.0 } else { 0.0 };
    gauge!("circuit_breaker_open", "target" => target.to_string()).set(open);
}

pub fn record_health_probe(target: &str, healthy: bool) {
    counter!(
        "health_probes_total",
        "target" => target.to_string(),
        "healthy" => if healthy { "true" } else { "false" }
    )
    .increment(1);
}

pub fn record_proxy_attempt(backend: &str, outcome: &'static str) {
    counter!(
        "proxy_attempts_total",
        "backend" => backend.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}
