//! Identity token codec.
//!
//! Issues and verifies HS512-signed JWTs with the process-wide signing key.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only HS512 is accepted; the header `alg` is checked before any HMAC work
//! - Expiry and issued-at are evaluated against the injected [`Clock`]
//! - Callers receive a [`TokenError`] variant for logging; the HTTP layer
//!   collapses all of them into one generic 401

use crate::auth::claims::{Claims, RESERVED_CLAIMS};
use crate::config::Config;
use crate::errors::{ApiError, TokenError};
use chrono::{DateTime, Duration, Utc};
use common::clock::Clock;
use common::jwt::{extract_alg, extract_exp, validate_iat};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// The only signing algorithm this codec issues or accepts.
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::HS512;

/// A freshly signed token and its expiry.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Stateless token issuer/verifier.
///
/// Holds only immutable key material, so a single instance is shared behind
/// an `Arc` and called concurrently without locking.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    clock_skew: std::time::Duration,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    /// Create a codec from raw key bytes.
    ///
    /// # Arguments
    ///
    /// * `secret` - HMAC key (at least 64 bytes; enforced by config loading)
    /// * `issuer` - Issuer written into every token and required on verify
    /// * `clock_skew` - Allowed `iat` lead over the local clock
    /// * `clock` - Time source for `iat`, `exp` and expiry checks
    pub fn new(
        secret: &[u8],
        issuer: impl Into<String>,
        clock_skew: std::time::Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let issuer = issuer.into();

        let mut validation = Validation::new(SIGNING_ALGORITHM);
        // Expiry is checked against the injected clock after signature verification
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        // `iat` and `jti` are enforced by `Claims` deserialization
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        validation.set_issuer(&[issuer.as_str()]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            issuer,
            clock_skew,
            clock,
        }
    }

    /// Create a codec from loaded configuration.
    pub fn from_config(config: &Config, clock: Arc<dyn Clock>) -> Self {
        let skew_secs = u64::try_from(config.jwt_clock_skew_seconds).unwrap_or(0);
        let clock_skew = std::time::Duration::from_secs(skew_secs);
        Self::new(
            config.jwt_secret_bytes(),
            config.jwt_issuer.clone(),
            clock_skew,
            clock,
        )
    }

    /// Issuer this codec signs with.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Sign a new token for `subject` valid for `ttl`.
    ///
    /// Extra claims named like a registered claim (`sub`, `iat`, `exp`, `iss`,
    /// `jti`) are dropped; the registered values always win. Every call gets a
    /// fresh `jti`, so tokens issued in the same second still differ.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Internal` if serialization or signing fails.
    #[instrument(skip_all, name = "waveguide.auth.issue")]
    pub fn issue(
        &self,
        subject: &str,
        mut extra: Map<String, Value>,
        ttl: Duration,
    ) -> Result<IssuedToken, ApiError> {
        for reserved in RESERVED_CLAIMS {
            if extra.remove(reserved).is_some() {
                tracing::warn!(target: "waveguide.auth.codec", claim = reserved, "Dropping extra claim that shadows a registered claim");
            }
        }

        let now = self.clock.now();
        let expires_at = now + ttl;

        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
            extra,
        };

        let mut header = Header::new(SIGNING_ALGORITHM);
        header.typ = Some("JWT".to_string());

        let token = encode(&header, &claims, &self.encoding_key).map_err(|e| {
            tracing::error!(target: "waveguide.auth.codec", error = %e, "Failed to sign token");
            ApiError::Internal
        })?;

        tracing::debug!(target: "waveguide.auth.codec", exp = claims.exp, "Issued token");

        Ok(IssuedToken { token, expires_at })
    }

    /// Verify a token and return its claims.
    ///
    /// # Security Checks
    ///
    /// 1. Size and structure check, header `alg` must be HS512
    /// 2. HMAC-SHA-512 signature
    /// 3. Required claims present, issuer matches
    /// 4. `exp` not passed
    /// 5. `iat` not beyond the clock skew tolerance
    ///
    /// # Errors
    ///
    /// - `Malformed` - structure, encoding, claims, issuer or `iat` problems
    /// - `UnsupportedAlgorithm` - header declares anything but HS512
    /// - `BadSignature` - signature mismatch
    /// - `Expired` - current time is past `exp`
    #[instrument(skip_all, name = "waveguide.auth.verify")]
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let alg = extract_alg(token).map_err(|e| {
            tracing::debug!(target: "waveguide.auth.codec", error = ?e, "Token header inspection failed");
            TokenError::Malformed
        })?;

        if alg != "HS512" {
            tracing::debug!(target: "waveguide.auth.codec", alg = %alg, "Token declares unsupported algorithm");
            return Err(TokenError::UnsupportedAlgorithm);
        }

        let token_data =
            decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
                let mapped = match e.kind() {
                    ErrorKind::InvalidSignature => TokenError::BadSignature,
                    ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                        TokenError::UnsupportedAlgorithm
                    }
                    ErrorKind::ExpiredSignature => TokenError::Expired,
                    _ => TokenError::Malformed,
                };
                tracing::debug!(target: "waveguide.auth.codec", error = %e, result = mapped.as_label(), "Token verification failed");
                mapped
            })?;

        let claims = token_data.claims;
        let now = self.clock.unix_timestamp();

        if now > claims.exp {
            tracing::debug!(target: "waveguide.auth.codec", exp = claims.exp, now = now, "Token expired");
            return Err(TokenError::Expired);
        }

        validate_iat(claims.iat, self.clock_skew, now).map_err(|_| TokenError::Malformed)?;

        Ok(claims)
    }

    /// Read the expiry of a token WITHOUT verifying it.
    ///
    /// For revocation bookkeeping only. Never treat the result as proof that
    /// the token is genuine.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Malformed` if the payload has no readable `exp`.
    pub fn expiry_of(&self, token: &str) -> Result<DateTime<Utc>, TokenError> {
        let exp = extract_exp(token).map_err(|e| {
            tracing::debug!(target: "waveguide.auth.codec", error = ?e, "Token expiry inspection failed");
            TokenError::Malformed
        })?;

        DateTime::from_timestamp(exp, 0).ok_or(TokenError::Malformed)
    }
}
