#![doc = include_str!("../README.md")]

mod server;

use anyhow::Context;
use clap::Parser;
use core::time::Duration;
use server::config::{CliArgs, Mode, ServerConfig};
use server::handler::{AppState, router};
use server::offline::render_to_file;
use server::telemetry::init_telemetry;
use std::sync::Arc;
use tilecast::{TilePool, engine::geojson::BoundsEngine};
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry()?;

    // Workers acquire their renderer contexts synchronously; keep that off the
    // async worker threads.
    let pool_config = config.pool.clone();
    let pool = tokio::task::spawn_blocking(move || TilePool::start(&pool_config, BoundsEngine))
        .await?
        .context("unable to start tile pool")?;
    let pool = Arc::new(pool);

    let result = match config.mode {
        Mode::Serve { addr } => serve(&addr, Arc::clone(&pool), config.render_timeout).await,
        Mode::Render { coord, output_file } => {
            render_to_file(&pool, coord, &output_file, config.render_timeout)
                .await
                .map(|size| {
                    tracing::info!("Got tile size={} in {}", size, output_file.display());
                })
        }
    };

    pool.shutdown().await;
    providers.shutdown();
    result
}

async fn serve(
    addr: &str,
    pool: Arc<TilePool>,
    render_timeout: Option<Duration>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("unable to bind {addr}"))?;

    tracing::info!(
        "Starting tile service on {} with {} workers (render timeout: {:?})",
        addr,
        pool.worker_count(),
        render_timeout
    );

    let app = router(AppState::new(pool, render_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal(token: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }

    tracing::info!("Shutdown signal received, terminating gracefully...");
    token.cancel();
}
