//! Genre attachments of a request

use sqlx::{Executor, Sqlite};
use tga_common::db::AttachmentRow;
use tga_common::Result;

/// Attach a genre with probability 0, only while the request is a draft
///
/// Returns false when the request is no longer a draft. Fails with a unique
/// violation when the pair already exists.
pub async fn insert<'e, E>(exec: E, request_id: i64, genre_id: i64) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO analysis_genres (analysis_request_id, genre_id, comment, probability_percent)
        SELECT id, ?, '', 0 FROM analysis_requests WHERE id = ? AND status = 'draft'
        "#,
    )
    .bind(genre_id)
    .bind(request_id)
    .execute(exec)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Update annotation and/or probability on a draft; `None` leaves a field as is
///
/// Returns false when the pair does not exist or the request left `draft`.
pub async fn update<'e, E>(
    exec: E,
    request_id: i64,
    genre_id: i64,
    comment: Option<&str>,
    probability_percent: Option<i64>,
) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE analysis_genres
        SET comment = COALESCE(?, comment),
            probability_percent = COALESCE(?, probability_percent)
        WHERE analysis_request_id = ? AND genre_id = ?
          AND EXISTS (SELECT 1 FROM analysis_requests WHERE id = ? AND status = 'draft')
        "#,
    )
    .bind(comment)
    .bind(probability_percent)
    .bind(request_id)
    .bind(genre_id)
    .bind(request_id)
    .execute(exec)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Detach a genre from a draft
pub async fn delete<'e, E>(exec: E, request_id: i64, genre_id: i64) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        DELETE FROM analysis_genres
        WHERE analysis_request_id = ? AND genre_id = ?
          AND EXISTS (SELECT 1 FROM analysis_requests WHERE id = ? AND status = 'draft')
        "#,
    )
    .bind(request_id)
    .bind(genre_id)
    .bind(request_id)
    .execute(exec)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Record a classifier score; unknown genres match no row
pub async fn set_probability<'e, E>(
    exec: E,
    request_id: i64,
    genre_id: i64,
    probability_percent: i64,
) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE analysis_genres SET probability_percent = ? \
         WHERE analysis_request_id = ? AND genre_id = ?",
    )
    .bind(probability_percent)
    .bind(request_id)
    .bind(genre_id)
    .execute(exec)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn count<'e, E>(exec: E, request_id: i64) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM analysis_genres WHERE analysis_request_id = ?")
        .bind(request_id)
        .fetch_one(exec)
        .await?;
    Ok(count)
}

/// Attachments with genre details, soft-deleted genres included
pub async fn list_for_request<'e, E>(exec: E, request_id: i64) -> Result<Vec<AttachmentRow>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as(
        r#"
        SELECT ag.genre_id, g.name AS genre_name, g.image_url, ag.comment, ag.probability_percent
        FROM analysis_genres ag
        JOIN genres g ON g.id = ag.genre_id
        WHERE ag.analysis_request_id = ?
        ORDER BY ag.id
        "#,
    )
    .bind(request_id)
    .fetch_all(exec)
    .await?;
    Ok(rows)
}
