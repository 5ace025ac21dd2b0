//! HTTP routes for the Waveguide gateway.
//!
//! Defines the Axum router and application state.

use crate::audit::AuditLog;
use crate::auth::password::DecoyHash;
use crate::auth::{RevocationStore, TokenCodec};
use crate::config::Config;
use crate::directory::UserDirectory;
use crate::handlers;
use crate::middleware::{
    enforce_rate_limit, http_metrics_middleware, require_identity, AdmissionGate,
};
use crate::rate_limit::RateLimiter;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use common::clock::Clock;
use metrics_exporter_prometheus::PrometheusHandle;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
///
/// Created once at startup and dropped at shutdown; the stores it holds are
/// not reachable any other way.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Token issuer/verifier holding the process-wide signing key.
    pub codec: Arc<TokenCodec>,

    /// Tokens revoked before their natural expiry.
    pub revocations: Arc<RevocationStore>,

    /// Per-client token buckets.
    pub limiter: Arc<RateLimiter>,

    /// User lookup and creation.
    pub directory: Arc<dyn UserDirectory>,

    /// Best-effort record of registrations, logins and logouts.
    pub audit: Arc<dyn AuditLog>,

    /// Hash verified for logins naming no account.
    pub login_decoy: Arc<DecoyHash>,
}

impl AppState {
    /// Build the codec and both stores from configuration.
    pub fn new(
        config: Config,
        clock: Arc<dyn Clock>,
        directory: Arc<dyn UserDirectory>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        let codec = Arc::new(TokenCodec::from_config(&config, Arc::clone(&clock)));
        let revocations = Arc::new(RevocationStore::new(Arc::clone(&clock)));
        // Config loading rejects zero
        let per_hour =
            NonZeroU32::new(config.rate_limit_requests_per_hour).unwrap_or(NonZeroU32::MIN);
        let limiter = Arc::new(RateLimiter::per_hour(per_hour, clock));
        let login_decoy = Arc::new(DecoyHash::new(config.bcrypt_cost));

        Self {
            config,
            codec,
            revocations,
            limiter,
            directory,
            audit,
            login_decoy,
        }
    }

    /// The admission gate's view of this state.
    pub fn admission_gate(&self) -> AdmissionGate {
        AdmissionGate {
            limiter: Arc::clone(&self.limiter),
            codec: Arc::clone(&self.codec),
            revocations: Arc::clone(&self.revocations),
        }
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe with store sizes - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - `/api/v1/auth/register` - Create account - public
/// - `/api/v1/auth/login` - Exchange credentials for a token - public
/// - `/api/v1/auth/logout` - Revoke the presented token - requires authentication
/// - `/api/v1/auth/me` - Current user - requires authentication
/// - Rate limiting on every route (pre-flight requests excepted)
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let gate = Arc::new(state.admission_gate());

    // Public routes (identity not required)
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/v1/auth/register", post(handlers::register))
        .route("/api/v1/auth/login", post(handlers::login))
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Protected routes (verified, unrevoked bearer token required)
    let protected_routes = Router::new()
        .route("/api/v1/auth/logout", post(handlers::logout))
        .route("/api/v1/auth/me", get(handlers::me))
        .route_layer(middleware::from_fn_with_state(
            gate.clone(),
            require_identity,
        ))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. enforce_rate_limit - Admission gate, before identity (innermost)
    // 2. TraceLayer - Log request details
    // 3. TimeoutLayer - Timeout the request
    // 4. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(middleware::from_fn_with_state(gate, enforce_rate_limit))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}
