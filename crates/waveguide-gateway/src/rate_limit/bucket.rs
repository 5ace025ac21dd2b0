//! Continuous token bucket.
//!
//! Token counts are held in fixed-point micro-tokens so fractional refill
//! accumulates exactly across decisions:
//!
//! ```text
//! refill_micros = (elapsed_ns * refill_tokens * MICROS_PER_TOKEN + carry) / period_ns
//! ```
//!
//! The product is computed in `u128`. The division remainder is carried into
//! the next refill, so splitting an interval into many short decisions refills
//! exactly as much as one long one. The result is capped at capacity.

use crate::errors::RateLimitError;
use chrono::{DateTime, Utc};
use std::num::NonZeroU32;
use std::time::Duration;

/// Fixed-point scale: one whole token.
pub const MICROS_PER_TOKEN: u64 = 1_000_000;

const ONE_HOUR: Duration = Duration::from_secs(3_600);

/// Outcome of a single rate-limit decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// One unit consumed.
    Admit {
        /// Whole units left after this request.
        remaining: u32,
    },
    /// Quota exhausted; nothing consumed.
    Reject {
        /// Time until one whole unit is available.
        retry_after: Duration,
    },
}

impl Decision {
    pub fn is_admit(&self) -> bool {
        matches!(self, Decision::Admit { .. })
    }

    /// Convert into a `Result` for `?` at the gate.
    ///
    /// # Errors
    ///
    /// `Reject` becomes `RateLimitError::QuotaExceeded`.
    pub fn into_result(self) -> Result<u32, RateLimitError> {
        match self {
            Decision::Admit { remaining } => Ok(remaining),
            Decision::Reject { retry_after } => Err(RateLimitError::QuotaExceeded { retry_after }),
        }
    }
}

/// Capacity and refill rate shared by every client's bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketPolicy {
    capacity: NonZeroU32,
    refill_tokens: NonZeroU32,
    refill_period: Duration,
}

impl BucketPolicy {
    /// Burst of `capacity`, refilling `refill_tokens` every `refill_period`.
    ///
    /// A zero `refill_period` is treated as one nanosecond.
    pub fn new(capacity: NonZeroU32, refill_tokens: NonZeroU32, refill_period: Duration) -> Self {
        Self {
            capacity,
            refill_tokens,
            refill_period: refill_period.max(Duration::from_nanos(1)),
        }
    }

    /// Burst of `requests`, refilling `requests` per hour.
    pub fn per_hour(requests: NonZeroU32) -> Self {
        Self::new(requests, requests, ONE_HOUR)
    }

    pub fn capacity(&self) -> u32 {
        self.capacity.get()
    }

    fn capacity_micros(&self) -> u64 {
        u64::from(self.capacity.get()) * MICROS_PER_TOKEN
    }

    /// Micro-tokens accrued over `elapsed` plus the carried remainder.
    ///
    /// Returns the whole micro-tokens (saturating) and the new remainder.
    fn refill_micros(&self, elapsed: Duration, carry: u128) -> (u64, u128) {
        let period = self.refill_period.as_nanos();
        let numerator = elapsed
            .as_nanos()
            .saturating_mul(u128::from(self.refill_tokens.get()))
            .saturating_mul(u128::from(MICROS_PER_TOKEN))
            .saturating_add(carry);
        let micros = u64::try_from(numerator / period).unwrap_or(u64::MAX);
        (micros, numerator % period)
    }

    /// Time needed to accrue `micros` micro-tokens on top of `carry`, rounded
    /// up to the nanosecond.
    fn time_to_refill(&self, micros: u64, carry: u128) -> Duration {
        let rate = u128::from(self.refill_tokens.get()) * u128::from(MICROS_PER_TOKEN);
        let nanos = u128::from(micros)
            .saturating_mul(self.refill_period.as_nanos())
            .saturating_sub(carry)
            .div_ceil(rate);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// Time an empty bucket needs to become full.
    pub fn time_to_full(&self) -> Duration {
        self.time_to_refill(self.capacity_micros(), 0)
    }
}

/// Per-client bucket state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBucket {
    micros: u64,
    carry: u128,
    last_refill: DateTime<Utc>,
}

impl TokenBucket {
    /// A bucket holding its full capacity as of `now`.
    pub fn full(policy: &BucketPolicy, now: DateTime<Utc>) -> Self {
        Self {
            micros: policy.capacity_micros(),
            carry: 0,
            last_refill: now,
        }
    }

    /// Whole units currently held (as of the last refill).
    pub fn available(&self) -> u32 {
        u32::try_from(self.micros / MICROS_PER_TOKEN).unwrap_or(u32::MAX)
    }

    /// Bring the bucket up to date with `now`.
    ///
    /// A clock reading earlier than the last refill adds nothing and leaves
    /// the refill timestamp where it is.
    fn refill(&mut self, policy: &BucketPolicy, now: DateTime<Utc>) {
        let Ok(elapsed) = (now - self.last_refill).to_std() else {
            return;
        };

        let capacity = policy.capacity_micros();
        let (gained, carry) = policy.refill_micros(elapsed, self.carry);
        let refilled = self.micros.saturating_add(gained);

        if refilled >= capacity {
            self.micros = capacity;
            self.carry = 0;
        } else {
            self.micros = refilled;
            self.carry = carry;
        }
        self.last_refill = now;
    }

    /// Refill, then consume one unit if available.
    pub fn try_consume(&mut self, policy: &BucketPolicy, now: DateTime<Utc>) -> Decision {
        self.refill(policy, now);

        if self.micros >= MICROS_PER_TOKEN {
            self.micros -= MICROS_PER_TOKEN;
            Decision::Admit {
                remaining: self.available(),
            }
        } else {
            Decision::Reject {
                retry_after: policy.time_to_refill(MICROS_PER_TOKEN - self.micros, self.carry),
            }
        }
    }

    /// Whether the bucket would be at capacity at `now` without any consumption.
    pub fn is_full_at(&self, policy: &BucketPolicy, now: DateTime<Utc>) -> bool {
        let mut projected = *self;
        projected.refill(policy, now);
        projected.micros >= policy.capacity_micros()
    }
}
