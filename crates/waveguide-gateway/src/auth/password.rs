//! Password hashing with bcrypt.
//!
//! Both operations are CPU-bound (~200ms at cost 12). Handlers run them on
//! the blocking pool via `tokio::task::spawn_blocking`.

use crate::errors::ApiError;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::OnceCell;
use tracing::instrument;

/// Lowest accepted bcrypt cost.
pub const MIN_BCRYPT_COST: u32 = 4;

/// Highest accepted bcrypt cost.
pub const MAX_BCRYPT_COST: u32 = 31;

/// Hash a plaintext password.
///
/// # Errors
///
/// Returns `ApiError::Internal` if the cost is out of range or hashing fails.
#[instrument(skip_all)]
pub fn hash_password(password: &str, cost: u32) -> Result<String, ApiError> {
    if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&cost) {
        tracing::error!(target: "waveguide.auth.password", cost = cost, "Refusing to hash with invalid bcrypt cost");
        return Err(ApiError::Internal);
    }

    bcrypt::hash(password, cost).map_err(|e| {
        tracing::error!(target: "waveguide.auth.password", error = %e, "Password hashing failed");
        ApiError::Internal
    })
}

/// Check a plaintext password against a stored hash.
///
/// An unparseable stored hash verifies as `false`.
#[instrument(skip_all)]
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or_else(|e| {
        tracing::warn!(target: "waveguide.auth.password", error = %e, "Stored password hash could not be parsed");
        false
    })
}

/// Never a real account's password; only ever hashed into the decoy.
const DECOY_PASSWORD: &str = "waveguide-login-decoy-password";

/// Stand-in hash for logins that name no account.
///
/// Verifying against it costs the same bcrypt work as a real account at the
/// configured cost, so response time does not reveal which emails exist.
/// Computed on first use (or by [`DecoyHash::hash`] at startup).
pub struct DecoyHash {
    cost: u32,
    hash: OnceCell<String>,
    uses: AtomicU64,
}

impl DecoyHash {
    pub fn new(cost: u32) -> Self {
        Self {
            cost,
            hash: OnceCell::new(),
            uses: AtomicU64::new(0),
        }
    }

    /// The decoy hash, computing it on the blocking pool the first time.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Internal` if hashing fails or the task panics.
    pub async fn hash(&self) -> Result<&str, ApiError> {
        let cost = self.cost;
        let hash = self
            .hash
            .get_or_try_init(|| async move {
                tokio::task::spawn_blocking(move || hash_password(DECOY_PASSWORD, cost))
                    .await
                    .map_err(|e| {
                        tracing::error!(target: "waveguide.auth.password", error = %e, "Decoy hashing task failed");
                        ApiError::Internal
                    })?
            })
            .await?;

        self.uses.fetch_add(1, Ordering::Relaxed);
        Ok(hash.as_str())
    }

    /// How many times the decoy has been handed out.
    pub fn uses(&self) -> u64 {
        self.uses.load(Ordering::Relaxed)
    }
}
