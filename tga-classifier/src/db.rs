//! Read-only access to the analysis database
//!
//! The classifier never writes: results go back through the callback so the
//! analysis service stays the only writer.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tga_common::{Error, Result};

/// Text and candidate genres of one analysis request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoringInput {
    pub text: String,
    /// (genre id, comma-separated keywords), in attachment order
    pub genres: Vec<(i64, String)>,
}

/// Open the shared database read-only
///
/// The file must already exist; tga-api creates it.
pub async fn connect_readonly(db_path: &Path) -> Result<SqlitePool> {
    if !db_path.exists() {
        return Err(Error::Config(format!(
            "Database not found: {} (start tga-api first to initialize it)",
            db_path.display()
        )));
    }

    // Not immutable: tga-api keeps writing while we read
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .read_only(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Everything needed to score one request; `None` when it does not exist
pub async fn load_scoring_input(pool: &SqlitePool, request_id: i64) -> Result<Option<ScoringInput>> {
    let text: Option<String> =
        sqlx::query_scalar("SELECT text_to_analyse FROM analysis_requests WHERE id = ?")
            .bind(request_id)
            .fetch_optional(pool)
            .await?;
    let Some(text) = text else {
        return Ok(None);
    };

    let genres: Vec<(i64, String)> = sqlx::query_as(
        r#"
        SELECT ag.genre_id, g.keywords
        FROM analysis_genres ag
        JOIN genres g ON g.id = ag.genre_id
        WHERE ag.analysis_request_id = ?
        ORDER BY ag.id
        "#,
    )
    .bind(request_id)
    .fetch_all(pool)
    .await?;

    Ok(Some(ScoringInput { text, genres }))
}
