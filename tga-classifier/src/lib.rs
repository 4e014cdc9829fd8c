//! tga-classifier library interface
//!
//! Reference implementation of the classifier the analysis service dispatches
//! to: keyword scoring over the shared database, results returned by callback.

pub mod api;
pub mod callback;
pub mod config;
pub mod db;
pub mod worker;

use axum::Router;
use chrono::{DateTime, Utc};
use tower_http::trace::TraceLayer;

use crate::worker::Analyzer;

#[derive(Clone)]
pub struct AppState {
    pub analyzer: Analyzer,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(analyzer: Analyzer) -> Self {
        Self {
            analyzer,
            startup_time: Utc::now(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::classifier_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
