//! Attachment handlers, always against the caller's current draft

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::put,
    Json, Router,
};
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateAttachmentRequest {
    pub comment: Option<String>,
    pub probability_percent: Option<i64>,
}

/// PUT /api/v1/analysis-genres/{genre_id}
pub async fn update_attachment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(genre_id): Path<i64>,
    payload: Result<Json<UpdateAttachmentRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    let Json(request) = payload?;
    state
        .lifecycle
        .update_attachment(
            user.id,
            genre_id,
            request.comment.as_deref(),
            request.probability_percent,
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/analysis-genres/{genre_id}
pub async fn detach_genre(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(genre_id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.lifecycle.detach_genre(user.id, genre_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn attachment_routes() -> Router<AppState> {
    Router::new().route(
        "/api/v1/analysis-genres/:genre_id",
        put(update_attachment).delete(detach_genre),
    )
}
