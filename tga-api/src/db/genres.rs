//! Genre catalogue queries

use chrono::Utc;
use sqlx::{Executor, Sqlite, SqlitePool};
use tga_common::db::GenreRow;
use tga_common::Result;

const COLUMNS: &str = "id, name, image_url, keywords, is_deleted, created_at";

/// All genres that are not soft-deleted
pub async fn list_active(pool: &SqlitePool) -> Result<Vec<GenreRow>> {
    let rows = sqlx::query_as(&format!(
        "SELECT {} FROM genres WHERE is_deleted = 0 ORDER BY id",
        COLUMNS
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// A genre that is not soft-deleted
pub async fn find_active<'e, E>(exec: E, id: i64) -> Result<Option<GenreRow>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as(&format!(
        "SELECT {} FROM genres WHERE id = ? AND is_deleted = 0",
        COLUMNS
    ))
    .bind(id)
    .fetch_optional(exec)
    .await?;
    Ok(row)
}

pub async fn insert(
    pool: &SqlitePool,
    name: &str,
    keywords: &str,
    image_url: Option<&str>,
) -> Result<i64> {
    let id = sqlx::query(
        "INSERT INTO genres (name, keywords, image_url, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(name)
    .bind(keywords)
    .bind(image_url)
    .bind(Utc::now())
    .execute(pool)
    .await?
    .last_insert_rowid();
    Ok(id)
}

/// Partial update of an active genre; returns false when it does not exist
pub async fn update(
    pool: &SqlitePool,
    id: i64,
    name: Option<&str>,
    keywords: Option<&str>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE genres
        SET name = COALESCE(?, name), keywords = COALESCE(?, keywords)
        WHERE id = ? AND is_deleted = 0
        "#,
    )
    .bind(name)
    .bind(keywords)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn set_image(pool: &SqlitePool, id: i64, image_url: &str) -> Result<bool> {
    let result = sqlx::query("UPDATE genres SET image_url = ? WHERE id = ? AND is_deleted = 0")
        .bind(image_url)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Hide a genre from listings and attach; existing attachments keep pointing at it
pub async fn soft_delete(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("UPDATE genres SET is_deleted = 1 WHERE id = ? AND is_deleted = 0")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() == 1)
}
