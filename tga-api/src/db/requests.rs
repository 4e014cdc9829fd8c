//! Analysis request persistence
//!
//! State changes go through [`compare_and_set`], which only writes when the stored
//! status and moderator still match what the caller read. Two racing transitions on
//! the same request therefore cannot both succeed.

use chrono::{DateTime, Utc};
use sqlx::{Executor, QueryBuilder, Sqlite, SqlitePool};
use tga_common::db::{AnalysisRequestRow, RequestStatus};
use tga_common::Result;

use crate::models::{AnalysisRequest, Lifecycle};

const COLUMNS: &str = "id, status, creator_id, moderator_id, text_to_analyse, created_at, \
                       formed_at, completed_at, last_dispatch_error";

/// Load a request in any status
pub async fn find<'e, E>(exec: E, id: i64) -> Result<Option<AnalysisRequest>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row: Option<AnalysisRequestRow> =
        sqlx::query_as(&format!("SELECT {} FROM analysis_requests WHERE id = ?", COLUMNS))
            .bind(id)
            .fetch_optional(exec)
            .await?;

    row.map(AnalysisRequest::try_from).transpose()
}

/// The creator's draft, if any
pub async fn find_draft<'e, E>(exec: E, creator_id: i64) -> Result<Option<AnalysisRequest>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row: Option<AnalysisRequestRow> = sqlx::query_as(&format!(
        "SELECT {} FROM analysis_requests WHERE creator_id = ? AND status = 'draft'",
        COLUMNS
    ))
    .bind(creator_id)
    .fetch_optional(exec)
    .await?;

    row.map(AnalysisRequest::try_from).transpose()
}

/// Insert an empty draft unless the creator already has one
///
/// The partial unique index turns a concurrent second insert into a no-op.
/// Returns true when a row was created.
pub async fn insert_draft_if_absent<'e, E>(
    exec: E,
    creator_id: i64,
    now: DateTime<Utc>,
) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "INSERT OR IGNORE INTO analysis_requests (status, creator_id, created_at) \
         VALUES ('draft', ?, ?)",
    )
    .bind(creator_id)
    .bind(now)
    .execute(exec)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Replace the body text; only touches a draft
pub async fn update_text<'e, E>(exec: E, id: i64, text: &str) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE analysis_requests SET text_to_analyse = ? WHERE id = ? AND status = 'draft'",
    )
    .bind(text)
    .bind(id)
    .execute(exec)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Write `next` if the stored state still matches `current`
///
/// Returns false when another writer got there first.
pub async fn compare_and_set<'e, E>(
    exec: E,
    id: i64,
    current: &Lifecycle,
    next: &Lifecycle,
) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE analysis_requests
        SET status = ?, moderator_id = ?, formed_at = ?, completed_at = ?
        WHERE id = ? AND status = ? AND moderator_id IS ?
        "#,
    )
    .bind(next.status().as_str())
    .bind(next.moderator_id())
    .bind(next.formed_at())
    .bind(next.completed_at())
    .bind(id)
    .bind(current.status().as_str())
    .bind(current.moderator_id())
    .execute(exec)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Record (or clear) the reason the last dispatch failed
pub async fn set_dispatch_error<'e, E>(exec: E, id: i64, reason: Option<&str>) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("UPDATE analysis_requests SET last_dispatch_error = ? WHERE id = ?")
        .bind(reason)
        .bind(id)
        .execute(exec)
        .await?;
    Ok(())
}

/// Conjunctive list filter
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    /// Who is asking; their own drafts are included, nobody else's
    pub viewer_id: i64,
    pub creator_id: Option<i64>,
    pub status: Option<RequestStatus>,
    /// Inclusive bounds on the formation timestamp
    pub formed_from: Option<DateTime<Utc>>,
    pub formed_to: Option<DateTime<Utc>>,
}

/// Non-deleted requests matching the filter, newest first
pub async fn list(pool: &SqlitePool, filter: &RequestFilter) -> Result<Vec<AnalysisRequest>> {
    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {} FROM analysis_requests WHERE status != 'deleted' \
         AND (status != 'draft' OR creator_id = ",
        COLUMNS
    ));
    query.push_bind(filter.viewer_id).push(")");

    if let Some(creator_id) = filter.creator_id {
        query.push(" AND creator_id = ").push_bind(creator_id);
    }
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(from) = filter.formed_from {
        query.push(" AND formed_at >= ").push_bind(from);
    }
    if let Some(to) = filter.formed_to {
        query.push(" AND formed_at <= ").push_bind(to);
    }
    query.push(" ORDER BY created_at DESC, id DESC");

    let rows: Vec<AnalysisRequestRow> = query.build_query_as().fetch_all(pool).await?;
    rows.into_iter().map(AnalysisRequest::try_from).collect()
}
