//! JWT inspection utilities shared across Waveguide components.
//!
//! This module provides:
//! - Size limits for DoS prevention
//! - Clock skew constants for iat validation
//! - Unverified reads of the header `alg` and payload `exp`
//! - iat validation logic
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Nothing here verifies a signature. [`extract_alg`] exists so a verifier
//!   can reject an unexpected algorithm before touching key material, and
//!   [`extract_exp`] exists for bookkeeping (revocation retention). Neither
//!   result may be trusted as an integrity check.
//! - Generic error messages prevent information leakage

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// Identity tokens issued by Waveguide are ~300 bytes (HS512 signature plus a
/// handful of claims). Anything beyond 8KB is rejected before base64 decoding
/// or HMAC computation.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// Default JWT clock skew tolerance (5 minutes).
///
/// Tokens with `iat` (issued-at) timestamps more than this amount in the
/// future are rejected.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while inspecting a JWT.
///
/// Messages are intentionally identical; the variant is for logs and tests.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtInspectionError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Token header has no string `alg` field.
    #[error("The access token is invalid or expired")]
    MissingAlgorithm,

    /// Token payload has no integer `exp` claim.
    #[error("The access token is invalid or expired")]
    MissingExpiry,

    /// Token `iat` claim is too far in the future.
    #[error("The access token is invalid or expired")]
    IatTooFarInFuture,
}

// =============================================================================
// Functions
// =============================================================================

/// Split a compact JWS into its three segments after the size check.
fn segments(token: &str) -> Result<(&str, &str, &str), JwtInspectionError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtInspectionError::TokenTooLarge);
    }

    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(header), Some(payload), Some(signature), None)
            if !header.is_empty() && !payload.is_empty() =>
        {
            Ok((header, payload, signature))
        }
        _ => {
            tracing::debug!(target: "common.jwt", "Token rejected: invalid JWT format");
            Err(JwtInspectionError::MalformedToken)
        }
    }
}

/// Base64url-decode a segment and parse it as a JSON object.
fn decode_segment(segment: &str) -> Result<serde_json::Value, JwtInspectionError> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT segment base64");
        JwtInspectionError::MalformedToken
    })?;

    let value: serde_json::Value = serde_json::from_slice(&bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT segment JSON");
        JwtInspectionError::MalformedToken
    })?;

    if value.is_object() {
        Ok(value)
    } else {
        Err(JwtInspectionError::MalformedToken)
    }
}

/// Extract the `alg` declared in a JWT header without verifying the signature.
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Wrong structure, bad base64, or invalid JSON
/// - `MissingAlgorithm` - Header has no non-empty string `alg`
pub fn extract_alg(token: &str) -> Result<String, JwtInspectionError> {
    let (header_part, _, _) = segments(token)?;
    let header = decode_segment(header_part)?;

    header
        .get("alg")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(JwtInspectionError::MissingAlgorithm)
}

/// Extract the `exp` claim (Unix epoch seconds) without verifying the signature.
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Wrong structure, bad base64, or invalid JSON
/// - `MissingExpiry` - Payload has no integer `exp`
pub fn extract_exp(token: &str) -> Result<i64, JwtInspectionError> {
    let (_, payload_part, _) = segments(token)?;
    let payload = decode_segment(payload_part)?;

    payload
        .get("exp")
        .and_then(serde_json::Value::as_i64)
        .ok_or(JwtInspectionError::MissingExpiry)
}

/// Validate the `iat` (issued-at) claim against an explicit `now`.
///
/// # Errors
///
/// Returns `JwtInspectionError::IatTooFarInFuture` if `iat` is more than
/// `clock_skew` ahead of `now`.
pub fn validate_iat(iat: i64, clock_skew: Duration, now: i64) -> Result<(), JwtInspectionError> {
    // Safe cast: clock_skew is bounded to MAX_CLOCK_SKEW by config validation
    #[allow(clippy::cast_possible_wrap)]
    let clock_skew_secs = clock_skew.as_secs() as i64;
    let max_iat = now.saturating_add(clock_skew_secs);

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            "Token rejected: iat too far in the future"
        );
        return Err(JwtInspectionError::IatTooFarInFuture);
    }

    Ok(())
}
