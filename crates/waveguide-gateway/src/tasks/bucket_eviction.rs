//! Idle rate-limit bucket eviction task.
//!
//! Without eviction the limiter keeps one bucket for every client ever seen.
//! Only buckets that have refilled completely are dropped; a returning client
//! gets an identical fresh bucket.

use crate::observability::metrics::set_tracked_clients;
use crate::rate_limit::RateLimiter;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Start the bucket eviction task, running once per `interval`.
#[instrument(skip_all, name = "waveguide.task.bucket_eviction")]
pub async fn start_bucket_eviction(
    limiter: Arc<RateLimiter>,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    info!(
        target: "waveguide.task.bucket_eviction",
        interval_seconds = interval.as_secs(),
        "Starting bucket eviction task"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let evicted = limiter.evict_idle();
                let tracked = limiter.tracked_clients();
                set_tracked_clients(tracked);
                if evicted > 0 {
                    debug!(
                        target: "waveguide.task.bucket_eviction",
                        evicted = evicted,
                        tracked = tracked,
                        "Evicted idle buckets"
                    );
                }
            }
            () = cancel_token.cancelled() => {
                info!(
                    target: "waveguide.task.bucket_eviction",
                    "Bucket eviction received shutdown signal, exiting"
                );
                break;
            }
        }
    }

    info!(target: "waveguide.task.bucket_eviction", "Bucket eviction stopped");
}
