//! tga-api - Text genre analysis service
//!
//! Creators collect a text and candidate genres in a draft, form it, and a
//! moderator either rejects it or sends it to the classifier, which scores the
//! genres and calls back to complete the request.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tga_api::auth::TokenService;
use tga_api::config::{Args, ServiceConfig};
use tga_api::services::HttpClassifierClient;
use tga_api::{build_router, AppState};
use tga_common::config::TomlConfig;
use tga_common::db::init_database;
use tga_common::revocation::SqliteRevocationStore;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let file = TomlConfig::load(args.config.as_deref()).context("Failed to load config file")?;

    // RUST_LOG wins over the config file's level
    let default_filter = match file.logging.level.as_deref() {
        Some(level) => format!("tga_api={},tga_common={},tower_http={}", level, level, level),
        None => "tga_api=info,tga_common=info,tower_http=info".to_string(),
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting tga-api v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let config = ServiceConfig::resolve(&args, &file).context("Invalid configuration")?;
    info!("Database: {}", config.database_path.display());
    info!("Classifier endpoint: {}", config.classifier_url);

    let pool = init_database(&config.database_path)
        .await
        .context("Failed to initialize database")?;
    info!("Database ready");

    let revocation = Arc::new(SqliteRevocationStore::new(pool.clone()));
    match revocation.purge_expired().await {
        Ok(0) => {}
        Ok(purged) => info!(purged, "Purged expired token revocations"),
        Err(e) => warn!(error = %e, "Could not purge expired token revocations"),
    }

    let token_lifetime = chrono::Duration::from_std(config.token_lifetime)
        .context("Token lifetime out of range")?;
    let tokens = TokenService::new(&config.jwt_secret, token_lifetime);
    let classifier = HttpClassifierClient::new(&config.classifier_url, config.dispatch_timeout)
        .context("Failed to build classifier HTTP client")?;

    let (state, worker) = AppState::new(
        pool,
        tokens,
        revocation,
        Arc::new(classifier),
        config.callback_secret.clone(),
        config.cookie_secure,
    );

    if let Some(moderator) = &config.bootstrap_moderator {
        state
            .users
            .ensure_moderator(&moderator.login, &moderator.password)
            .await
            .context("Failed to ensure bootstrap moderator")?;
    }

    // Worker first: recovery blocks on a full queue otherwise
    tokio::spawn(worker.run());
    if let Err(e) = state.gateway.recover_pending().await {
        error!(error = %e, "Failed to recover pending dispatches");
    }

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.listen_addr))?;
    info!("Listening on http://{}", config.listen_addr);
    info!("Health check: http://{}/health", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
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
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
