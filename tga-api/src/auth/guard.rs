//! Access guard
//!
//! Resolves the caller from `Authorization: Bearer <token>` or the `session_token`
//! cookie, verifies the token and consults the revocation store. Handlers pick the
//! strictness they need through the extractor they take:
//!
//! - [`CurrentUser`]: credential required
//! - [`MaybeUser`]: guest tolerated
//! - [`Moderator`]: credential with moderator role required

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use std::sync::Arc;
use tga_common::revocation::RevocationStore;
use tracing::{debug, error};

use super::jwt::{Claims, Role, TokenService};
use crate::error::{ApiError, ApiResult};

/// Name of the session cookie set at login
pub const SESSION_COOKIE: &str = "session_token";

#[derive(Clone)]
pub struct AccessGuard {
    tokens: TokenService,
    revocation: Arc<dyn RevocationStore>,
}

impl AccessGuard {
    pub fn new(tokens: TokenService, revocation: Arc<dyn RevocationStore>) -> Self {
        Self { tokens, revocation }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn revocation(&self) -> &Arc<dyn RevocationStore> {
        &self.revocation
    }

    /// Verify a presented token and check it has not been revoked
    pub async fn authenticate(&self, token: &str) -> ApiResult<CurrentUser> {
        let claims = self.tokens.verify(token)?;

        let revoked = self.revocation.is_revoked(token).await.map_err(|e| {
            error!(error = %e, "Revocation store unavailable");
            ApiError::Infrastructure(format!("revocation check failed: {}", e))
        })?;
        if revoked {
            return Err(ApiError::Unauthorized("token has been revoked".to_string()));
        }

        Ok(CurrentUser::from_claims(claims, token.to_string()))
    }
}

/// Pull the raw token from the request headers, bearer header first
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Authenticated caller
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub login: String,
    pub role: Role,
    /// The token as presented, needed for logout
    pub token: String,
    pub claims: Claims,
}

impl CurrentUser {
    fn from_claims(claims: Claims, token: String) -> Self {
        Self {
            id: claims.sub,
            login: claims.login.clone(),
            role: claims.role,
            token,
            claims,
        }
    }

    pub fn is_moderator(&self) -> bool {
        self.role == Role::Moderator
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AccessGuard: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let guard = AccessGuard::from_ref(state);
        let token = extract_token(&parts.headers)
            .ok_or_else(|| ApiError::Unauthorized("missing credentials".to_string()))?;
        guard.authenticate(&token).await
    }
}

/// Caller who may be a guest
///
/// A credential that fails verification or has been revoked is treated as absent.
/// A revocation store failure is still an error.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<CurrentUser>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    AccessGuard: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let guard = AccessGuard::from_ref(state);
        let Some(token) = extract_token(&parts.headers) else {
            return Ok(MaybeUser(None));
        };

        match guard.authenticate(&token).await {
            Ok(user) => Ok(MaybeUser(Some(user))),
            Err(ApiError::Unauthorized(reason)) => {
                debug!(%reason, "Ignoring unusable credential on guest-tolerant route");
                Ok(MaybeUser(None))
            }
            Err(other) => Err(other),
        }
    }
}

/// Caller holding the moderator role
#[derive(Debug, Clone)]
pub struct Moderator(pub CurrentUser);

#[async_trait]
impl<S> FromRequestParts<S> for Moderator
where
    AccessGuard: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_moderator() {
            return Err(ApiError::Forbidden("moderator role required".to_string()));
        }
        Ok(Moderator(user))
    }
}
