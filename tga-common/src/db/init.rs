//! Database initialization
//!
//! Creates the database file on first run, applies connection pragmas and
//! creates every table idempotently. The analysis service owns the file; the
//! classifier opens it read-only.

use crate::Result;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// How long a connection waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Genres seeded into an empty catalogue: (name, keywords, image)
const DEFAULT_GENRES: &[(&str, &str, &str)] = &[
    (
        "Хроника",
        "жизнь, лицо, домой, времени, голос, стоял",
        "http://localhost:9000/genreanalysis/chronicle.png",
    ),
    (
        "Житие",
        "опять, совсем, спросил, стал, дело, почти, сказала, день, лет, голову, сразу, руки",
        "http://localhost:9000/genreanalysis/hagiography.png",
    ),
    (
        "Договор",
        "несколько, вместе, году, вообще, совершенно, людей, говорит, мог, кажется, два, сразу",
        "http://localhost:9000/genreanalysis/treaty.png",
    ),
    (
        "Поэма",
        "бог, быть, сын, были, одиссей, а, долго, отец, дом, давно, мог, старик, лет, опять",
        "http://localhost:9000/genreanalysis/poem.png",
    ),
];

/// Open (creating if needed) the database and bring the schema up to date
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Pragmas go on the connect options so every pooled connection gets them
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        // WAL lets the classifier read while the analysis service writes
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;
    seed_default_genres(&pool).await?;

    Ok(pool)
}

/// Create all tables and indexes (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_users_table(pool).await?;
    create_genres_table(pool).await?;
    create_analysis_requests_table(pool).await?;
    create_analysis_genres_table(pool).await?;
    create_classification_dispatches_table(pool).await?;
    create_revoked_tokens_table(pool).await?;
    Ok(())
}

async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            login TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            is_moderator INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_genres_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS genres (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            image_url TEXT,
            keywords TEXT NOT NULL DEFAULT '',
            is_deleted INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_analysis_requests_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analysis_requests (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            status TEXT NOT NULL CHECK (status IN
                ('draft', 'formed', 'processing', 'completed', 'rejected', 'deleted')),
            creator_id INTEGER NOT NULL REFERENCES users(id),
            moderator_id INTEGER REFERENCES users(id),
            text_to_analyse TEXT NOT NULL DEFAULT '',
            created_at TIMESTAMP NOT NULL,
            formed_at TIMESTAMP,
            completed_at TIMESTAMP,
            last_dispatch_error TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One draft per creator, enforced by storage so concurrent get-or-create
    // calls cannot both insert
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS ux_analysis_requests_one_draft
        ON analysis_requests(creator_id) WHERE status = 'draft'
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_analysis_requests_status ON analysis_requests(status)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_analysis_genres_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analysis_genres (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            analysis_request_id INTEGER NOT NULL REFERENCES analysis_requests(id),
            genre_id INTEGER NOT NULL REFERENCES genres(id),
            comment TEXT NOT NULL DEFAULT '',
            probability_percent INTEGER NOT NULL DEFAULT 0
                CHECK (probability_percent BETWEEN 0 AND 100),
            UNIQUE (analysis_request_id, genre_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_classification_dispatches_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS classification_dispatches (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            analysis_request_id INTEGER NOT NULL REFERENCES analysis_requests(id),
            moderator_id INTEGER NOT NULL REFERENCES users(id),
            status TEXT NOT NULL CHECK (status IN ('pending', 'accepted', 'failed')),
            error TEXT,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_dispatches_status ON classification_dispatches(status)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_revoked_tokens_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS revoked_tokens (
            token TEXT PRIMARY KEY,
            expires_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Seed the default catalogue, only when no genre has ever been created
async fn seed_default_genres(pool: &SqlitePool) -> Result<()> {
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM genres")
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        return Ok(());
    }

    let now = Utc::now();
    let mut tx = pool.begin().await?;
    for (name, keywords, image_url) in DEFAULT_GENRES {
        sqlx::query(
            "INSERT INTO genres (name, keywords, image_url, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(name)
        .bind(keywords)
        .bind(image_url)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    info!("Seeded {} default genres", DEFAULT_GENRES.len());
    Ok(())
}
