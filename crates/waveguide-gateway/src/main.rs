//! Waveguide API gateway
//!
//! Entry point for the Waveguide record API's admission layer.

use common::clock::SystemClock;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use waveguide_gateway::audit::InMemoryAuditLog;
use waveguide_gateway::config::Config;
use waveguide_gateway::directory::InMemoryUserDirectory;
use waveguide_gateway::observability::metrics::init_metrics_recorder;
use waveguide_gateway::routes::{self, AppState};
use waveguide_gateway::tasks::{start_bucket_eviction, start_revocation_sweeper};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "waveguide_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Waveguide gateway");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        jwt_issuer = %config.jwt_issuer,
        jwt_ttl_seconds = config.jwt_ttl_seconds,
        rate_limit_requests_per_hour = config.rate_limit_requests_per_hour,
        revocation_sweep_interval_seconds = config.revocation_sweep_interval_seconds,
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    let bind_address = config.bind_address.clone();
    let sweep_interval = Duration::from_secs(config.revocation_sweep_interval_seconds);
    let drain_period = Duration::from_secs(config.drain_seconds);

    let state = Arc::new(AppState::new(
        config,
        Arc::new(SystemClock),
        Arc::new(InMemoryUserDirectory::new()),
        Arc::new(InMemoryAuditLog::new()),
    ));

    // Pay for the login decoy hash before the first request does
    if let Err(e) = state.login_decoy.hash().await {
        warn!("Failed to precompute login decoy hash: {}", e);
    }

    // Background maintenance, stopped on shutdown
    let cancel_token = CancellationToken::new();
    let sweeper_handle = tokio::spawn(start_revocation_sweeper(
        Arc::clone(&state.revocations),
        sweep_interval,
        cancel_token.clone(),
    ));
    let eviction_handle = tokio::spawn(start_bucket_eviction(
        Arc::clone(&state.limiter),
        sweep_interval,
        cancel_token.clone(),
    ));

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Waveguide gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(cancel_token.clone(), drain_period))
    .await?;

    cancel_token.cancel();
    for handle in [sweeper_handle, eviction_handle] {
        if let Err(e) = handle.await {
            warn!("Background task ended abnormally: {}", e);
        }
    }

    info!("Waveguide gateway shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
///
/// Cancels background tasks, then waits out the drain period before
/// returning.
async fn shutdown_signal(cancel_token: CancellationToken, drain_period: Duration) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    cancel_token.cancel();

    if drain_period.is_zero() {
        info!("Skipping drain period (DRAIN_SECONDS=0)");
    } else {
        warn!("Draining connections for {} seconds...", drain_period.as_secs());
        tokio::time::sleep(drain_period).await;
        info!("Drain period complete");
    }
}
