//! Feed Media Cache - admin server
//!
//! Runs the media cache behind a small HTTP surface for inspection and
//! manual control.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feed_media_cache::api::create_router;
use feed_media_cache::{AppState, Config, MediaCache, MemoryPressure, MemoryPressureMonitor};

/// Main entry point for the media cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the media cache over the HTTP fetcher and session probe
/// 4. Start the memory-pressure task and SIGUSR1 forwarding
/// 5. Create Axum router with all endpoints
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "feed_media_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Feed Media Cache Server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: video_slots={}, max_dimension={}px, eviction_fraction={}, port={}",
        config.cache.max_video_slots,
        config.cache.max_image_dimension,
        config.cache.eviction_fraction,
        config.server_port
    );

    let cache = MediaCache::with_http(config.cache.clone())
        .context("failed to build HTTP client")?;
    info!("Media cache initialized");

    let (state, pressure_handle) = AppState::with_pressure_task(cache.clone());
    let signal_handle = forward_pressure_signals(state.pressure.clone())?;
    info!("Memory pressure task started");

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(vec![pressure_handle, signal_handle]))
        .await
        .context("server error")?;

    let dropped = cache.clear().await;
    info!("Server shutdown complete ({} entries released)", dropped);
    Ok(())
}

/// Turns SIGUSR1 into memory-pressure signals.
#[cfg(unix)]
fn forward_pressure_signals(monitor: MemoryPressureMonitor) -> anyhow::Result<JoinHandle<()>> {
    let mut usr1 = signal::unix::signal(signal::unix::SignalKind::user_defined1())
        .context("failed to install SIGUSR1 handler")?;

    Ok(tokio::spawn(async move {
        while usr1.recv().await.is_some() {
            info!("Received SIGUSR1, signalling memory pressure");
            if !monitor.notify(MemoryPressure::Signal) {
                break;
            }
        }
    }))
}

#[cfg(not(unix))]
fn forward_pressure_signals(monitor: MemoryPressureMonitor) -> anyhow::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        let _monitor = monitor;
        std::future::pending::<()>().await
    }))
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the background tasks and allows graceful
/// shutdown.
async fn shutdown_signal(background: Vec<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    for handle in background {
        handle.abort();
    }
    warn!("Background tasks aborted");
}
