//! Classifier callback endpoint

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tga_common::api::AnalysisCallback;

use crate::error::ApiResult;
use crate::services::CallbackOutcome;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    pub analysis_request_id: i64,
    /// "completed" or "already_completed"
    pub result: &'static str,
    pub updated_genres: usize,
}

/// POST|PUT /api/v1/internal/update-analysis
pub async fn update_analysis(
    State(state): State<AppState>,
    payload: Result<Json<AnalysisCallback>, JsonRejection>,
) -> ApiResult<Json<CallbackResponse>> {
    let Json(callback) = payload?;
    let outcome = state.gateway.accept_callback(&callback).await?;

    let (result, updated_genres) = match outcome {
        CallbackOutcome::Applied { updated } => ("completed", updated),
        CallbackOutcome::AlreadyCompleted => ("already_completed", 0),
    };
    Ok(Json(CallbackResponse {
        analysis_request_id: callback.analysis_request_id,
        result,
        updated_genres,
    }))
}

pub fn callback_routes() -> Router<AppState> {
    Router::new().route(
        "/api/v1/internal/update-analysis",
        post(update_analysis).put(update_analysis),
    )
}
