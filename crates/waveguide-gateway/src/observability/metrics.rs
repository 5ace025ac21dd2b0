//! Metrics definitions for the Waveguide gateway.
//!
//! All metrics follow Prometheus naming conventions:
//! - `waveguide_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `method`: HTTP methods
//! - `endpoint`: known routes, everything else is `/other`
//! - `status`: 3 values (success, error, timeout)
//! - `outcome`: bounded by [`RateLimitOutcome`] / [`IdentityOutcome`]
//! - `result`: `valid` plus the `TokenError` labels

use crate::errors::TokenError;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus recorder and return the handle for `/metrics`.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("waveguide_http_request".to_string()),
            &[
                0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion.
///
/// Metric: `waveguide_http_requests_total`, `waveguide_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("waveguide_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("waveguide_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Map a request path onto a bounded label.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/health" => "/health",
        "/metrics" => "/metrics",
        "/api/v1/auth/register" => "/api/v1/auth/register",
        "/api/v1/auth/login" => "/api/v1/auth/login",
        "/api/v1/auth/logout" => "/api/v1/auth/logout",
        "/api/v1/auth/me" => "/api/v1/auth/me",
        _ => "/other",
    }
}

// ============================================================================
// Admission Metrics
// ============================================================================

/// Rate-limit stage outcome. Every request records exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitOutcome {
    /// Pre-flight request forwarded without checks.
    Preflight,
    Admitted,
    Rejected,
}

impl RateLimitOutcome {
    fn as_label(self) -> &'static str {
        match self {
            RateLimitOutcome::Preflight => "preflight",
            RateLimitOutcome::Admitted => "admitted",
            RateLimitOutcome::Rejected => "rejected",
        }
    }
}

/// Identity stage outcome. Only admitted requests to protected routes record one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityOutcome {
    Authenticated,
    Unauthorized,
}

impl IdentityOutcome {
    fn as_label(self) -> &'static str {
        match self {
            IdentityOutcome::Authenticated => "authenticated",
            IdentityOutcome::Unauthorized => "unauthorized",
        }
    }
}

/// Metric: `waveguide_rate_limit_decisions_total`
/// Labels: `outcome`
pub fn record_rate_limit_decision(outcome: RateLimitOutcome) {
    counter!("waveguide_rate_limit_decisions_total", "outcome" => outcome.as_label()).increment(1);
}

/// Metric: `waveguide_identity_checks_total`
/// Labels: `outcome`
pub fn record_identity_check(outcome: IdentityOutcome) {
    counter!("waveguide_identity_checks_total", "outcome" => outcome.as_label()).increment(1);
}

/// Metric: `waveguide_token_verifications_total`
/// Labels: `result`
pub fn record_token_verification(result: Result<(), TokenError>) {
    let label = match result {
        Ok(()) => "valid",
        Err(e) => e.as_label(),
    };
    counter!("waveguide_token_verifications_total", "result" => label).increment(1);
}

/// Metric: `waveguide_rate_limit_tracked_clients`
pub fn set_tracked_clients(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    let count = count as f64;
    gauge!("waveguide_rate_limit_tracked_clients").set(count);
}

// ============================================================================
// Revocation Metrics
// ============================================================================

/// Metric: `waveguide_revocations_total`
pub fn record_revocation() {
    counter!("waveguide_revocations_total").increment(1);
}

/// Metric: `waveguide_revocation_sweep_removed_total`, `waveguide_revocation_entries`
pub fn record_revocation_sweep(removed: usize, remaining: usize) {
    counter!("waveguide_revocation_sweep_removed_total").increment(removed as u64);
    #[allow(clippy::cast_precision_loss)]
    let remaining = remaining as f64;
    gauge!("waveguide_revocation_entries").set(remaining);
}
