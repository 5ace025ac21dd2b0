//! Health check handler.

use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

/// Response for `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,

    /// Revocation entries awaiting their sweep.
    pub revoked_tokens: usize,

    /// Clients currently holding a rate-limit bucket.
    pub tracked_clients: usize,
}

/// Health check handler.
///
/// The gateway has no external dependencies, so it is healthy whenever it
/// can answer. The store sizes are reported for operators.
///
/// ## Example Response
///
/// ```json
/// {
///   "status": "healthy",
///   "revoked_tokens": 3,
///   "tracked_clients": 42
/// }
/// ```
#[instrument(skip_all, name = "waveguide.health.check")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        revoked_tokens: state.revocations.len(),
        tracked_clients: state.limiter.tracked_clients(),
    })
}
