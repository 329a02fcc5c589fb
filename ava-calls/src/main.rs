//! ava-calls - Call ingestion and analytics service for the AVA receptionist
//!
//! Serves tenant call history and dashboard analytics, accepts provider
//! webhooks, and runs the transcript retention sweeper in the background.

use std::path::PathBuf;

use anyhow::{Context, Result};
use ava_calls::services::spawn_retention_sweeper;
use ava_calls::{build_router, AppState};
use ava_common::config::AppConfig;
use ava_common::db::init_database;
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Command-line arguments for ava-calls
#[derive(Parser, Debug)]
#[command(name = "ava-calls")]
#[command(about = "Call ingestion and analytics service for AVA")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = "AVA_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Build identification first, before any database delay
    info!(
        "Starting AVA call engine (ava-calls) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let mut config = AppConfig::resolve(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if config.reconciler.single_tenant_mode {
        warn!("Single-tenant mode enabled: unresolved webhook events go to the first user");
    }

    info!("Database path: {}", config.database.path.display());
    let pool = init_database(&config.database.path)
        .await
        .context("Failed to initialize database")?;

    let shutdown = CancellationToken::new();
    let sweeper = spawn_retention_sweeper(pool.clone(), config.retention.clone(), shutdown.clone());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::from_config(pool, config).context("Failed to build application state")?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    info!("ava-calls listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .context("Server error")?;

    shutdown.cancel();
    if let Some(handle) = sweeper {
        if let Err(e) = handle.await {
            warn!("Retention sweeper ended abnormally: {}", e);
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM and cancels background tasks
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
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
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }

    token.cancel();
}
