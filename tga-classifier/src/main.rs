//! tga-classifier - Reference keyword classifier
//!
//! Accepts scoring jobs from tga-api, reads the request from the shared database
//! read-only and reports per-genre probabilities back through the callback.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tga_classifier::callback::HttpResultSink;
use tga_classifier::config::{Args, ClassifierConfig};
use tga_classifier::worker::{Analyzer, DelayRange};
use tga_classifier::{build_router, db, AppState};
use tga_common::config::TomlConfig;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let file = TomlConfig::load(args.config.as_deref()).context("Failed to load config file")?;

    let default_filter = match file.logging.level.as_deref() {
        Some(level) => format!("tga_classifier={},tower_http={}", level, level),
        None => "tga_classifier=info,tower_http=info".to_string(),
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting tga-classifier v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let config = ClassifierConfig::resolve(&args, &file).context("Invalid configuration")?;
    info!("Database (read-only): {}", config.database_path.display());
    info!("Callback endpoint: {}", config.callback_url);
    info!(
        "Processing delay: {}..={} ms",
        config.min_delay.as_millis(),
        config.max_delay.as_millis()
    );

    let pool = db::connect_readonly(&config.database_path)
        .await
        .context("Failed to open database")?;
    let sink = HttpResultSink::new(&config.callback_url)
        .context("Failed to build callback HTTP client")?;

    let analyzer = Analyzer::new(
        pool,
        Arc::new(sink),
        config.callback_secret.clone(),
        DelayRange {
            min: config.min_delay,
            max: config.max_delay,
        },
    );
    let app = build_router(AppState::new(analyzer));

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.listen_addr))?;
    info!("Listening on http://{}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
