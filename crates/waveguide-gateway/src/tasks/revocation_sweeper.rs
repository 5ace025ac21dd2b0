//! Revocation sweep background task.
//!
//! Runs [`RevocationStore::sweep`] on a fixed period so the store holds only
//! tokens that would still verify if they had not been revoked.
//!
//! # Graceful Shutdown
//!
//! The task exits when the cancellation token is cancelled. A sweep in
//! progress finishes first.

use crate::auth::RevocationStore;
use crate::observability::metrics::record_revocation_sweep;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

/// Start the revocation sweep task.
///
/// The first sweep runs immediately, then once per `interval`.
#[instrument(skip_all, name = "waveguide.task.revocation_sweeper")]
pub async fn start_revocation_sweeper(
    store: Arc<RevocationStore>,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    info!(
        target: "waveguide.task.revocation_sweeper",
        interval_seconds = interval.as_secs(),
        "Starting revocation sweeper task"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_sweep(&store);
            }
            () = cancel_token.cancelled() => {
                info!(
                    target: "waveguide.task.revocation_sweeper",
                    "Revocation sweeper received shutdown signal, exiting"
                );
                break;
            }
        }
    }

    info!(target: "waveguide.task.revocation_sweeper", "Revocation sweeper stopped");
}

fn run_sweep(store: &RevocationStore) {
    let removed = store.sweep();
    let remaining = store.len();
    record_revocation_sweep(removed, remaining);

    if removed > 0 {
        info!(
            target: "waveguide.task.revocation_sweeper",
            removed = removed,
            remaining = remaining,
            "Swept expired revocation entries"
        );
    }
}
