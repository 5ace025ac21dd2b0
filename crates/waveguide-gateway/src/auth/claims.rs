//! Token claims and the verified identity handed to domain handlers.
//!
//! The `sub` field and extra claims carry user identifiers and email
//! addresses, so neither appears in Debug output.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Extra-claim key carrying the user's UUID.
pub const USER_ID_CLAIM: &str = "userId";

/// Extra-claim key carrying the user's email address.
pub const EMAIL_CLAIM: &str = "email";

/// Registered claim names that extra claims may not shadow.
pub const RESERVED_CLAIMS: [&str; 5] = ["sub", "iat", "exp", "iss", "jti"];

/// Claim set embedded in an identity token.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Subject (username) - redacted in Debug output.
    pub sub: String,

    /// Issued-at timestamp (Unix epoch seconds).
    pub iat: i64,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Issuer identifier.
    pub iss: String,

    /// Unique per issuance, so two sessions never share a token string.
    pub jti: String,

    /// Application claims (`userId`, `email`, ...) - redacted in Debug output.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let extra_keys: Vec<&String> = self.extra.keys().collect();
        f.debug_struct("Claims")
            .field("sub", &"[REDACTED]")
            .field("iat", &self.iat)
            .field("exp", &self.exp)
            .field("iss", &self.iss)
            .field("jti", &self.jti)
            .field("extra_keys", &extra_keys)
            .finish()
    }
}

impl Claims {
    /// The `userId` extra claim, if present and a string.
    pub fn user_id(&self) -> Option<&str> {
        self.extra.get(USER_ID_CLAIM).and_then(Value::as_str)
    }

    /// The `email` extra claim, if present and a string.
    pub fn email(&self) -> Option<&str> {
        self.extra.get(EMAIL_CLAIM).and_then(Value::as_str)
    }
}

/// A verified caller, inserted into request extensions by the admission gate.
///
/// Only the subject string is guaranteed. Resolving a full user record is the
/// user directory's job.
#[derive(Clone)]
pub struct Identity {
    /// Verified subject.
    pub subject: String,

    /// The full verified claim set.
    pub claims: Claims,

    /// The bearer token the caller presented (needed for logout).
    pub token: String,
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("subject", &"[REDACTED]")
            .field("claims", &self.claims)
            .field("token", &"[REDACTED]")
            .finish()
    }
}
