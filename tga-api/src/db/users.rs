//! User accounts

use chrono::Utc;
use sqlx::{Executor, Sqlite, SqlitePool};
use tga_common::db::UserRow;
use tga_common::Result;

const COLUMNS: &str = "id, login, password_hash, is_moderator, created_at";

/// Create an account; fails with a unique violation on a taken login
pub async fn insert(
    pool: &SqlitePool,
    login: &str,
    password_hash: &str,
    is_moderator: bool,
) -> Result<i64> {
    let id = sqlx::query(
        "INSERT INTO users (login, password_hash, is_moderator, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(login)
    .bind(password_hash)
    .bind(is_moderator)
    .bind(Utc::now())
    .execute(pool)
    .await?
    .last_insert_rowid();
    Ok(id)
}

pub async fn find_by_login(pool: &SqlitePool, login: &str) -> Result<Option<UserRow>> {
    let row = sqlx::query_as(&format!("SELECT {} FROM users WHERE login = ?", COLUMNS))
        .bind(login)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<UserRow>> {
    let row = sqlx::query_as(&format!("SELECT {} FROM users WHERE id = ?", COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Login of a user, for projections
pub async fn login_of<'e, E>(exec: E, id: i64) -> Result<Option<String>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let login = sqlx::query_scalar("SELECT login FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(exec)
        .await?;
    Ok(login)
}

/// Change login and/or password hash; `None` leaves a field as is
pub async fn update(
    pool: &SqlitePool,
    id: i64,
    login: Option<&str>,
    password_hash: Option<&str>,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE users SET login = COALESCE(?, login), password_hash = COALESCE(?, password_hash) \
         WHERE id = ?",
    )
    .bind(login)
    .bind(password_hash)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn set_moderator(pool: &SqlitePool, id: i64, is_moderator: bool) -> Result<()> {
    sqlx::query("UPDATE users SET is_moderator = ? WHERE id = ?")
        .bind(is_moderator)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
