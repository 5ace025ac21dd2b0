//! Admission gate.
//!
//! Two middleware functions share one [`AdmissionGate`]:
//! - `enforce_rate_limit` - applied to every route
//! - `require_identity` - applied to protected routes only, inside the limiter
//!
//! Per request the order is fixed: pre-flight bypass, rate-limit decision,
//! bearer extraction, revocation check, verification. The first failure
//! short-circuits; domain handlers never run after a rejection.

use crate::auth::{Identity, RevocationStore, TokenCodec};
use crate::errors::{ApiError, ApiRejection, TokenError};
use crate::observability::metrics::{
    record_identity_check, record_rate_limit_decision, record_token_verification,
    IdentityOutcome, RateLimitOutcome,
};
use crate::rate_limit::RateLimiter;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::instrument;

/// Header carrying the originating client address when behind a proxy.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Client identifier used when neither a forwarded address nor a peer address
/// is available.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Shared collaborators of the admission middleware. Holds no state of its own.
#[derive(Clone)]
pub struct AdmissionGate {
    pub limiter: Arc<RateLimiter>,
    pub codec: Arc<TokenCodec>,
    pub revocations: Arc<RevocationStore>,
}

/// Pre-flight requests negotiate cross-origin policy and bypass every check.
fn is_preflight(req: &Request) -> bool {
    req.method() == Method::OPTIONS
}

/// Resolve the rate-limit key for a request.
///
/// First non-empty entry of `X-Forwarded-For`, else the peer IP, else
/// [`UNKNOWN_CLIENT`]. The forwarded value is not authenticated.
pub fn client_id(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|first| !first.is_empty());

    match (forwarded, peer) {
        (Some(first), _) => first.to_string(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => UNKNOWN_CLIENT.to_string(),
    }
}

/// Extract the bearer token from the `Authorization` header.
fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!(target: "waveguide.gate.identity", "Missing Authorization header");
            ApiError::MissingBearerToken
        })?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            tracing::debug!(target: "waveguide.gate.identity", "Invalid Authorization header format");
            ApiError::MissingBearerToken
        })
}

/// Rate-limit middleware for every route.
///
/// # Response
///
/// - Forwards `OPTIONS` untouched
/// - Returns 429 with `Retry-After` if the client's quota is exhausted
/// - Otherwise continues to the next layer
#[instrument(skip_all, name = "waveguide.gate.rate_limit")]
pub async fn enforce_rate_limit(
    State(gate): State<Arc<AdmissionGate>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiRejection> {
    if is_preflight(&req) {
        record_rate_limit_decision(RateLimitOutcome::Preflight);
        return Ok(next.run(req).await);
    }

    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_id(req.headers(), peer);

    if let Err(e) = gate.limiter.decide(&client).into_result() {
        tracing::debug!(target: "waveguide.gate.rate_limit", error = %e, "Rejecting request over quota");
        record_rate_limit_decision(RateLimitOutcome::Rejected);
        return Err(ApiError::from(e).at(req.uri().path()));
    }

    record_rate_limit_decision(RateLimitOutcome::Admitted);
    Ok(next.run(req).await)
}

/// Identity middleware for protected routes.
///
/// Runs after [`enforce_rate_limit`]. On success the request carries an
/// [`Identity`] extension.
///
/// # Response
///
/// - Forwards `OPTIONS` untouched
/// - Returns 401 if the token is missing, revoked or fails verification
#[instrument(skip_all, name = "waveguide.gate.identity")]
pub async fn require_identity(
    State(gate): State<Arc<AdmissionGate>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiRejection> {
    if is_preflight(&req) {
        return Ok(next.run(req).await);
    }

    let identity = match authenticate(&gate, req.headers()) {
        Ok(identity) => identity,
        Err(e) => {
            record_identity_check(IdentityOutcome::Unauthorized);
            return Err(e.at(req.uri().path()));
        }
    };

    record_identity_check(IdentityOutcome::Authenticated);
    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}

/// Bearer extraction, revocation check, then verification.
fn authenticate(gate: &AdmissionGate, headers: &HeaderMap) -> Result<Identity, ApiError> {
    let token = extract_bearer_token(headers)?;

    if gate.revocations.is_revoked(token) {
        tracing::debug!(target: "waveguide.gate.identity", "Presented token has been revoked");
        record_token_verification(Err(TokenError::Revoked));
        return Err(TokenError::Revoked.into());
    }

    let claims = gate.codec.verify(token).map_err(|e| {
        record_token_verification(Err(e));
        e
    })?;
    record_token_verification(Ok(()));

    Ok(Identity {
        subject: claims.sub.clone(),
        claims,
        token: token.to_string(),
    })
}
