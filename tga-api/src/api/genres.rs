//! Genre catalogue handlers
//!
//! Reads are public; mutations need the moderator role. Attaching a genre to the
//! caller's draft lives here too since it is addressed by genre id.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::{CurrentUser, Moderator};
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::GenreView;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct GenreQuery {
    /// Case-insensitive substring of the genre name
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateGenreRequest {
    pub name: String,
    #[serde(default)]
    pub keywords: String,
    pub image_url: Option<String>,
}

/// Partial update; absent fields stay unchanged
#[derive(Debug, Deserialize)]
pub struct UpdateGenreRequest {
    pub name: Option<String>,
    pub keywords: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetImageRequest {
    pub image_url: String,
}

#[derive(Debug, Serialize)]
pub struct DraftAttachResponse {
    pub analysis_request_id: i64,
    pub genre_id: i64,
}

/// GET /api/v1/genres
pub async fn list_genres(
    State(state): State<AppState>,
    query: Result<Query<GenreQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<GenreView>>> {
    let Query(query) = query?;
    let needle = query
        .name
        .map(|n| n.trim().to_lowercase())
        .filter(|n| !n.is_empty());

    let genres = db::genres::list_active(&state.db)
        .await?
        .into_iter()
        .filter(|g| match &needle {
            Some(needle) => g.name.to_lowercase().contains(needle.as_str()),
            None => true,
        })
        .map(GenreView::from)
        .collect();

    Ok(Json(genres))
}

/// GET /api/v1/genres/{id}
pub async fn get_genre(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<GenreView>> {
    let genre = db::genres::find_active(&state.db, id)
        .await?
        .ok_or_else(|| genre_not_found(id))?;
    Ok(Json(genre.into()))
}

/// POST /api/v1/genres
pub async fn create_genre(
    State(state): State<AppState>,
    Moderator(moderator): Moderator,
    payload: Result<Json<CreateGenreRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<GenreView>)> {
    let Json(request) = payload?;
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ApiError::ValidationFailed("genre name is required".to_string()));
    }

    let id = db::genres::insert(
        &state.db,
        name,
        request.keywords.trim(),
        request.image_url.as_deref(),
    )
    .await?;
    info!(genre_id = id, moderator_id = moderator.id, "Genre created");

    let genre = db::genres::find_active(&state.db, id)
        .await?
        .ok_or_else(|| genre_not_found(id))?;
    Ok((StatusCode::CREATED, Json(genre.into())))
}

/// PUT /api/v1/genres/{id}
pub async fn update_genre(
    State(state): State<AppState>,
    Moderator(_): Moderator,
    Path(id): Path<i64>,
    payload: Result<Json<UpdateGenreRequest>, JsonRejection>,
) -> ApiResult<Json<GenreView>> {
    let Json(request) = payload?;
    let name = request.name.as_deref().map(str::trim);
    if name.is_some_and(str::is_empty) {
        return Err(ApiError::ValidationFailed("genre name must not be empty".to_string()));
    }

    if !db::genres::update(&state.db, id, name, request.keywords.as_deref().map(str::trim)).await? {
        return Err(genre_not_found(id));
    }
    get_genre(State(state), Path(id)).await
}

/// DELETE /api/v1/genres/{id}
pub async fn delete_genre(
    State(state): State<AppState>,
    Moderator(moderator): Moderator,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if !db::genres::soft_delete(&state.db, id).await? {
        return Err(genre_not_found(id));
    }
    info!(genre_id = id, moderator_id = moderator.id, "Genre deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/genres/{id}/image
pub async fn set_genre_image(
    State(state): State<AppState>,
    Moderator(_): Moderator,
    Path(id): Path<i64>,
    payload: Result<Json<SetImageRequest>, JsonRejection>,
) -> ApiResult<Json<GenreView>> {
    let Json(request) = payload?;
    let image_url = request.image_url.trim();
    if image_url.is_empty() {
        return Err(ApiError::ValidationFailed("image_url is required".to_string()));
    }

    if !db::genres::set_image(&state.db, id, image_url).await? {
        return Err(genre_not_found(id));
    }
    get_genre(State(state), Path(id)).await
}

/// POST /api/v1/genres/{id}/draft
pub async fn add_to_draft(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<(StatusCode, Json<DraftAttachResponse>)> {
    let draft = state.lifecycle.attach_genre(user.id, id).await?;
    Ok((
        StatusCode::CREATED,
        Json(DraftAttachResponse {
            analysis_request_id: draft.id,
            genre_id: id,
        }),
    ))
}

fn genre_not_found(id: i64) -> ApiError {
    ApiError::NotFound(format!("genre {} not found", id))
}

/// Build genre catalogue routes
pub fn genre_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/genres", get(list_genres).post(create_genre))
        .route(
            "/api/v1/genres/:id",
            get(get_genre).put(update_genre).delete(delete_genre),
        )
        .route("/api/v1/genres/:id/image", put(set_genre_image))
        .route("/api/v1/genres/:id/draft", post(add_to_draft))
}
