//! Revoked token store.
//!
//! Holds revoked tokens until their natural expiry. The map is sharded
//! (`DashMap`) so revocations, lookups and sweeps proceed concurrently
//! without a global lock.

use chrono::{DateTime, Utc};
use common::clock::Clock;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// Concurrent set of revoked tokens keyed by the exact token string.
pub struct RevocationStore {
    entries: DashMap<String, DateTime<Utc>>,
    clock: Arc<dyn Clock>,
}

impl RevocationStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Mark `token` revoked until `expiry`.
    ///
    /// Idempotent: revoking an already-revoked token keeps the first recorded
    /// expiry and returns `false`.
    pub fn revoke(&self, token: &str, expiry: DateTime<Utc>) -> bool {
        match self.entries.entry(token.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(expiry);
                true
            }
        }
    }

    /// Whether `token` is currently recorded as revoked.
    ///
    /// A swept token reports `false`; by then its expiry alone rejects it.
    pub fn is_revoked(&self, token: &str) -> bool {
        self.entries.contains_key(token)
    }

    /// Remove every entry whose expiry is at or before the current time.
    ///
    /// Returns the number of entries removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(self.clock.now())
    }

    /// Remove every entry whose expiry is at or before `now`.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let mut removed = 0usize;
        self.entries.retain(|_, expiry| {
            let keep = *expiry > now;
            if !keep {
                removed += 1;
            }
            keep
        });

        if removed > 0 {
            tracing::debug!(target: "waveguide.auth.revocation", removed = removed, remaining = self.entries.len(), "Swept expired revocations");
        }

        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for RevocationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevocationStore")
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}
