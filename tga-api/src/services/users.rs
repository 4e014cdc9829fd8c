//! Accounts, login and logout

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::auth::jwt::{IssuedToken, Role};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::AccessGuard;
use crate::db;
use crate::error::{is_unique_violation, ApiError, ApiResult};

/// Public view of an account
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub id: i64,
    pub login: String,
    pub role: Role,
}

#[derive(Clone)]
pub struct UserService {
    db: SqlitePool,
    guard: AccessGuard,
}

impl UserService {
    pub fn new(db: SqlitePool, guard: AccessGuard) -> Self {
        Self { db, guard }
    }

    /// Create a creator account
    pub async fn register(&self, login: &str, password: &str) -> ApiResult<Profile> {
        let login = login.trim();
        if login.is_empty() || password.is_empty() {
            return Err(ApiError::ValidationFailed(
                "login and password are required".to_string(),
            ));
        }

        let hash = hash_password(password)?;
        let id = db::users::insert(&self.db, login, &hash, false)
            .await
            .map_err(|e| map_login_taken(e, login))?;

        info!(user_id = id, login, "User registered");
        Ok(Profile {
            id,
            login: login.to_string(),
            role: Role::Creator,
        })
    }

    /// Check credentials and issue a session token
    pub async fn login(&self, login: &str, password: &str) -> ApiResult<IssuedToken> {
        let user = db::users::find_by_login(&self.db, login.trim()).await?;
        let user = match user {
            Some(user) if verify_password(password, &user.password_hash) => user,
            _ => {
                debug!(login, "Login rejected");
                return Err(ApiError::Unauthorized("invalid login or password".to_string()));
            }
        };

        let role = Role::from_flag(user.is_moderator);
        let issued = self.guard.tokens().issue(user.id, &user.login, role)?;
        info!(user_id = user.id, "User logged in");
        Ok(issued)
    }

    pub async fn profile(&self, user_id: i64) -> ApiResult<Profile> {
        let user = db::users::find_by_id(&self.db, user_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("user {} not found", user_id)))?;

        Ok(Profile {
            id: user.id,
            login: user.login,
            role: Role::from_flag(user.is_moderator),
        })
    }

    /// Change login and/or password; empty values are rejected
    pub async fn update_profile(
        &self,
        user_id: i64,
        login: Option<&str>,
        password: Option<&str>,
    ) -> ApiResult<Profile> {
        let login = login.map(str::trim);
        if login.is_some_and(str::is_empty) || password.is_some_and(str::is_empty) {
            return Err(ApiError::ValidationFailed(
                "login and password must not be empty".to_string(),
            ));
        }

        let hash = password.map(hash_password).transpose()?;
        let updated = db::users::update(&self.db, user_id, login, hash.as_deref())
            .await
            .map_err(|e| map_login_taken(e, login.unwrap_or_default()))?;
        if !updated {
            return Err(ApiError::NotFound(format!("user {} not found", user_id)));
        }
        self.profile(user_id).await
    }

    /// Revoke a token for the rest of its natural lifetime
    ///
    /// A token that is already expired or unparsable needs no revocation.
    pub async fn logout(&self, token: &str) -> ApiResult<()> {
        let claims = match self.guard.tokens().verify(token) {
            Ok(claims) => claims,
            Err(_) => {
                debug!("Logout with unusable token, nothing to revoke");
                return Ok(());
            }
        };

        self.guard
            .revocation()
            .revoke(token, claims.remaining())
            .await?;
        info!(user_id = claims.sub, "User logged out");
        Ok(())
    }

    /// Make sure a moderator account with this login exists
    ///
    /// An existing account is promoted; its password is left unchanged.
    pub async fn ensure_moderator(&self, login: &str, password: &str) -> ApiResult<i64> {
        if let Some(user) = db::users::find_by_login(&self.db, login).await? {
            if !user.is_moderator {
                db::users::set_moderator(&self.db, user.id, true).await?;
                info!(user_id = user.id, login, "Promoted existing user to moderator");
            }
            return Ok(user.id);
        }

        let hash = hash_password(password)?;
        let id = db::users::insert(&self.db, login, &hash, true).await?;
        info!(user_id = id, login, "Created bootstrap moderator");
        Ok(id)
    }
}

fn map_login_taken(err: tga_common::Error, login: &str) -> ApiError {
    match err {
        tga_common::Error::Database(ref e) if is_unique_violation(e) => {
            ApiError::Conflict(format!("login '{}' is already taken", login))
        }
        other => other.into(),
    }
}
