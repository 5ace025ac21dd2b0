//! Prometheus metrics endpoint handler.
//!
//! # Security
//!
//! Unauthenticated so Prometheus can scrape it. Labels are bounded and carry
//! no subjects, tokens or client addresses.

use axum::{extract::State, response::IntoResponse};
use metrics_exporter_prometheus::PrometheusHandle;

/// Handler for GET /metrics
///
/// Returns Prometheus text format:
/// ```text
/// # TYPE waveguide_rate_limit_decisions_total counter
/// waveguide_rate_limit_decisions_total{outcome="admitted"} 42
/// ```
#[tracing::instrument(skip_all, name = "waveguide.metrics.scrape")]
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}
