//! Classification dispatch outbox
//!
//! A `pending` row is written in the same transaction that assigns the moderator, so
//! a dispatch is never lost between commit and send. The worker resolves each row to
//! `accepted` or `failed`; rows still `pending` at startup are sent again.

use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite, SqlitePool};
use tga_common::db::DispatchRow;
use tga_common::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    Pending,
    Accepted,
    Failed,
}

impl DispatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchStatus::Pending => "pending",
            DispatchStatus::Accepted => "accepted",
            DispatchStatus::Failed => "failed",
        }
    }
}

pub async fn insert_pending<'e, E>(
    exec: E,
    request_id: i64,
    moderator_id: i64,
    now: DateTime<Utc>,
) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let id = sqlx::query(
        r#"
        INSERT INTO classification_dispatches
            (analysis_request_id, moderator_id, status, created_at, updated_at)
        VALUES (?, ?, 'pending', ?, ?)
        "#,
    )
    .bind(request_id)
    .bind(moderator_id)
    .bind(now)
    .bind(now)
    .execute(exec)
    .await?
    .last_insert_rowid();
    Ok(id)
}

/// Resolve a pending row; returns false if it was already resolved
pub async fn resolve<'e, E>(
    exec: E,
    dispatch_id: i64,
    status: DispatchStatus,
    error: Option<&str>,
) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE classification_dispatches
        SET status = ?, error = ?, updated_at = ?
        WHERE id = ? AND status = 'pending'
        "#,
    )
    .bind(status.as_str())
    .bind(error)
    .bind(Utc::now())
    .bind(dispatch_id)
    .execute(exec)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Oldest first
pub async fn list_pending(pool: &SqlitePool) -> Result<Vec<DispatchRow>> {
    let rows = sqlx::query_as(
        r#"
        SELECT id, analysis_request_id, moderator_id, status, error, created_at, updated_at
        FROM classification_dispatches
        WHERE status = 'pending'
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn find<'e, E>(exec: E, dispatch_id: i64) -> Result<Option<DispatchRow>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as(
        r#"
        SELECT id, analysis_request_id, moderator_id, status, error, created_at, updated_at
        FROM classification_dispatches
        WHERE id = ?
        "#,
    )
    .bind(dispatch_id)
    .fetch_optional(exec)
    .await?;
    Ok(row)
}
