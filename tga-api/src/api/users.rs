//! Account handlers: register, login, profile, logout

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{AppendHeaders, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::auth::guard::extract_token;
use crate::auth::{CurrentUser, SESSION_COOKIE};
use crate::error::{ApiError, ApiResult};
use crate::services::users::Profile;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub login: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    /// Seconds until the token expires
    pub expires_in: i64,
}

/// POST /api/v1/user/register
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Profile>)> {
    let Json(credentials) = payload?;
    let profile = state
        .users
        .register(&credentials.login, &credentials.password)
        .await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// POST /api/v1/user/login
///
/// The token is returned in the body and also set as an HttpOnly session cookie.
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(credentials) = payload?;
    let issued = state
        .users
        .login(&credentials.login, &credentials.password)
        .await?;

    let cookie = session_cookie(&issued.token, issued.expires_in, state.cookie_secure)?;
    let body = LoginResponse {
        access_token: issued.token,
        token_type: "Bearer",
        expires_in: issued.expires_in,
    };
    Ok((AppendHeaders([(header::SET_COOKIE, cookie)]), Json(body)))
}

/// GET /api/v1/user/profile
pub async fn get_profile(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<Profile>> {
    Ok(Json(state.users.profile(user.id).await?))
}

/// PUT /api/v1/user/profile
pub async fn update_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> ApiResult<Json<Profile>> {
    let Json(request) = payload?;
    let profile = state
        .users
        .update_profile(user.id, request.login.as_deref(), request.password.as_deref())
        .await?;
    Ok(Json(profile))
}

/// POST /api/v1/user/logout
///
/// Always clears the cookie. A token that still verifies is revoked until it
/// would have expired anyway.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    if let Some(token) = extract_token(&headers) {
        state.users.logout(&token).await?;
    }

    let cookie = session_cookie("", 0, state.cookie_secure)?;
    Ok((StatusCode::NO_CONTENT, AppendHeaders([(header::SET_COOKIE, cookie)])))
}

fn session_cookie(token: &str, max_age: i64, secure: bool) -> ApiResult<HeaderValue> {
    let mut cookie = format!(
        "{}={}; HttpOnly; Path=/; Max-Age={}; SameSite=Lax",
        SESSION_COOKIE,
        token,
        max_age.max(0)
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
        .map_err(|e| ApiError::Infrastructure(format!("invalid cookie header: {}", e)))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/user/register", post(register))
        .route("/api/v1/user/login", post(login))
        .route("/api/v1/user/profile", get(get_profile).put(update_profile))
        .route("/api/v1/user/logout", post(logout))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("abc", 3600, false).unwrap();
        assert_eq!(
            cookie.to_str().unwrap(),
            "session_token=abc; HttpOnly; Path=/; Max-Age=3600; SameSite=Lax"
        );

        let secure = session_cookie("abc", 60, true).unwrap();
        assert!(secure.to_str().unwrap().ends_with("; Secure"));
    }

    #[test]
    fn test_cleared_cookie_expires_immediately() {
        let cookie = session_cookie("", 0, false).unwrap();
        assert!(cookie.to_str().unwrap().starts_with("session_token=; "));
        assert!(cookie.to_str().unwrap().contains("Max-Age=0"));
    }
}
