//! HTTP handlers for tga-classifier

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tga_common::api::DispatchRequest;
use tracing::{debug, info};

use crate::AppState;

/// Request rejected before any work was scheduled
#[derive(Debug)]
pub struct BadRequest(pub String);

impl IntoResponse for BadRequest {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "code": "VALIDATION_FAILED",
                "message": self.0,
            }
        }));
        (StatusCode::BAD_REQUEST, body).into_response()
    }
}

/// POST /asyncapi/v1/calculate-text-genre-probability
///
/// Accepts the job and answers 204 straight away; scoring runs in the background.
pub async fn calculate_probability(
    State(state): State<AppState>,
    payload: Result<Json<DispatchRequest>, JsonRejection>,
) -> Result<StatusCode, BadRequest> {
    let Json(job) = payload.map_err(|rejection| {
        debug!(reason = %rejection.body_text(), "Malformed job");
        BadRequest(format!("malformed request body: {}", rejection.body_text()))
    })?;
    if job.analysis_request_id <= 0 {
        return Err(BadRequest("analysis_request_id is required".to_string()));
    }

    info!(request_id = job.analysis_request_id, "Scoring job accepted");
    state.analyzer.spawn(job.analysis_request_id);
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "tga-classifier".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
    })
}

pub fn classifier_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/asyncapi/v1/calculate-text-genre-probability",
            post(calculate_probability),
        )
        .route("/health", get(health_check))
}
