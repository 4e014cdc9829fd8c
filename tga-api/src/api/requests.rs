//! Analysis request handlers

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::actor;
use crate::auth::{CurrentUser, MaybeUser, Moderator};
use crate::error::{ApiError, ApiResult};
use crate::models::{DraftIcon, RequestView};
use crate::services::ListParams;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct EditRequest {
    #[serde(default)]
    pub text_to_analyse: String,
}

#[derive(Debug, Deserialize)]
pub struct ProcessQuery {
    pub action: Option<String>,
}

/// Body of a 202 answer to `action=complete`
#[derive(Debug, Serialize)]
pub struct DispatchAccepted {
    pub analysis_request_id: i64,
    pub dispatch_id: i64,
    pub moderator_id: i64,
}

/// GET /api/v1/analysis-requests/draft-icon
pub async fn draft_icon(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
) -> ApiResult<Json<DraftIcon>> {
    let icon = state.lifecycle.draft_icon(user.map(|u| u.id)).await?;
    Ok(Json(icon))
}

/// GET /api/v1/analysis-requests
pub async fn list_requests(
    State(state): State<AppState>,
    user: CurrentUser,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Json<Vec<RequestView>>> {
    let Query(params) = params?;
    let views = state.lifecycle.list(actor(&user), &params).await?;
    Ok(Json(views))
}

/// GET /api/v1/analysis-requests/{id}
pub async fn get_request(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<RequestView>> {
    let view = state.lifecycle.get(actor(&user), id).await?;
    Ok(Json(view))
}

/// PUT /api/v1/analysis-requests/{id}
pub async fn edit_request(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    payload: Result<Json<EditRequest>, JsonRejection>,
) -> ApiResult<Json<RequestView>> {
    let Json(request) = payload?;
    state
        .lifecycle
        .edit(actor(&user), id, &request.text_to_analyse)
        .await?;
    let view = state.lifecycle.get(actor(&user), id).await?;
    Ok(Json(view))
}

/// DELETE /api/v1/analysis-requests/{id}
pub async fn delete_request(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.lifecycle.delete(actor(&user), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/analysis-requests/{id}/form
pub async fn form_request(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<RequestView>> {
    state.lifecycle.form(actor(&user), id).await?;
    let view = state.lifecycle.get(actor(&user), id).await?;
    Ok(Json(view))
}

/// PUT /api/v1/analysis-requests/{id}/process?action=complete|reject
///
/// `complete` answers 202 once the dispatch is queued; the request completes when
/// the classifier calls back.
pub async fn process_request(
    State(state): State<AppState>,
    Moderator(moderator): Moderator,
    Path(id): Path<i64>,
    query: Result<Query<ProcessQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(query) = query?;
    match query.action.as_deref() {
        Some("complete") => {
            let job = state.gateway.dispatch(moderator.id, id).await?;
            let body = DispatchAccepted {
                analysis_request_id: job.request_id,
                dispatch_id: job.dispatch_id,
                moderator_id: job.moderator_id,
            };
            Ok((StatusCode::ACCEPTED, Json(body)).into_response())
        }
        Some("reject") => {
            state.lifecycle.reject(moderator.id, id).await?;
            let view = state.lifecycle.get(actor(&moderator), id).await?;
            Ok(Json(view).into_response())
        }
        Some(other) => Err(ApiError::ValidationFailed(format!(
            "unknown action '{}', expected complete or reject",
            other
        ))),
        None => Err(ApiError::ValidationFailed(
            "action is required (complete or reject)".to_string(),
        )),
    }
}

/// Build analysis request routes
pub fn request_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/analysis-requests/draft-icon", get(draft_icon))
        .route("/api/v1/analysis-requests", get(list_requests))
        .route(
            "/api/v1/analysis-requests/:id",
            get(get_request).put(edit_request).delete(delete_request),
        )
        .route("/api/v1/analysis-requests/:id/form", put(form_request))
        .route("/api/v1/analysis-requests/:id/process", put(process_request))
}
