//! Per-client rate limiting.
//!
//! One [`TokenBucket`] per client identifier, created lazily and full. Buckets
//! live in a `DashMap`; each decision updates its bucket under that key's
//! shard write guard, so concurrent decisions for one client never observe
//! the same pre-consumption state, and different clients rarely contend.

pub mod bucket;

pub use bucket::{BucketPolicy, Decision, TokenBucket};

use common::clock::Clock;
use dashmap::DashMap;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Token-bucket rate limiter keyed by client identifier.
pub struct RateLimiter {
    policy: BucketPolicy,
    buckets: DashMap<String, TokenBucket>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(policy: BucketPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy,
            buckets: DashMap::new(),
            clock,
        }
    }

    /// Limiter allowing a burst of `requests` that refills `requests` per hour.
    pub fn per_hour(requests: NonZeroU32, clock: Arc<dyn Clock>) -> Self {
        Self::new(BucketPolicy::per_hour(requests), clock)
    }

    pub fn policy(&self) -> &BucketPolicy {
        &self.policy
    }

    /// Consume one unit from `client_id`'s bucket if available.
    pub fn decide(&self, client_id: &str) -> Decision {
        let now = self.clock.now();

        // Existing clients: no key allocation
        if let Some(mut bucket) = self.buckets.get_mut(client_id) {
            return bucket.try_consume(&self.policy, now);
        }

        let mut bucket = self
            .buckets
            .entry(client_id.to_string())
            .or_insert_with(|| TokenBucket::full(&self.policy, now));
        bucket.try_consume(&self.policy, now)
    }

    /// Drop buckets that have refilled completely by the current time.
    ///
    /// A full bucket is indistinguishable from the fresh one a returning
    /// client would get, so eviction never changes a decision.
    pub fn evict_idle(&self) -> usize {
        self.evict_idle_at(self.clock.now())
    }

    /// Drop buckets that are full as of `now`.
    pub fn evict_idle_at(&self, now: chrono::DateTime<chrono::Utc>) -> usize {
        let mut evicted = 0usize;
        self.buckets.retain(|_, bucket| {
            let keep = !bucket.is_full_at(&self.policy, now);
            if !keep {
                evicted += 1;
            }
            keep
        });

        if evicted > 0 {
            tracing::debug!(target: "waveguide.gate.rate_limit", evicted = evicted, remaining = self.buckets.len(), "Evicted idle rate-limit buckets");
        }

        evicted
    }

    /// Number of clients currently holding a bucket.
    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("policy", &self.policy)
            .field("tracked_clients", &self.buckets.len())
            .finish_non_exhaustive()
    }
}
