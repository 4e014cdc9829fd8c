//! tga-api library interface
//!
//! The analysis service: text analysis requests moving through a moderated
//! lifecycle, scored asynchronously by an external classifier.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::FromRef;
use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tga_common::revocation::RevocationStore;
use tower_http::trace::TraceLayer;

use crate::auth::{AccessGuard, TokenService};
use crate::services::{
    ClassificationGateway, ClassifierClient, DispatchWorker, LifecycleManager, UserService,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub lifecycle: LifecycleManager,
    pub gateway: ClassificationGateway,
    pub users: UserService,
    pub guard: AccessGuard,
    /// Add `Secure` to the session cookie
    pub cookie_secure: bool,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Wire the services together
    ///
    /// The returned worker must be spawned for dispatches to leave the outbox.
    pub fn new(
        db: SqlitePool,
        tokens: TokenService,
        revocation: Arc<dyn RevocationStore>,
        classifier: Arc<dyn ClassifierClient>,
        callback_secret: impl Into<String>,
        cookie_secure: bool,
    ) -> (Self, DispatchWorker) {
        let lifecycle = LifecycleManager::new(db.clone());
        let (gateway, worker) =
            ClassificationGateway::new(lifecycle.clone(), classifier, callback_secret);
        let guard = AccessGuard::new(tokens, revocation);
        let users = UserService::new(db.clone(), guard.clone());

        let state = Self {
            db,
            lifecycle,
            gateway,
            users,
            guard,
            cookie_secure,
            startup_time: Utc::now(),
        };
        (state, worker)
    }
}

impl FromRef<AppState> for AccessGuard {
    fn from_ref(state: &AppState) -> Self {
        state.guard.clone()
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::genre_routes())
        .merge(api::request_routes())
        .merge(api::attachment_routes())
        .merge(api::callback_routes())
        .merge(api::user_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
