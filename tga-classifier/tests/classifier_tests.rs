//! Integration tests for tga-classifier
//!
//! A writable pool seeds the shared database the way tga-api would; the service
//! under test only gets a read-only pool.

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    routing::put,
    Json, Router,
};
use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tga_classifier::callback::{CallbackError, HttpResultSink, ResultSink};
use tga_classifier::worker::{Analyzer, DelayRange};
use tga_classifier::{build_router, db, AppState};
use tga_common::api::{AnalysisCallback, GenreScore};
use tokio::sync::mpsc;
use tower::util::ServiceExt;

const SECRET: &str = "classifier-test-secret";

/// Sink that forwards every callback to the test
struct ChannelSink(mpsc::UnboundedSender<AnalysisCallback>);

#[async_trait]
impl ResultSink for ChannelSink {
    async fn deliver(&self, callback: &AnalysisCallback) -> Result<(), CallbackError> {
        self.0
            .send(callback.clone())
            .map_err(|e| CallbackError::Transport(e.to_string()))
    }
}

struct Fixture {
    router: Router,
    writer: SqlitePool,
    callbacks: mpsc::UnboundedReceiver<AnalysisCallback>,
    _dir: TempDir,
}

async fn setup() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.db");
    let writer = tga_common::db::init_database(&path).await.unwrap();
    sqlx::query(
        "INSERT INTO users (login, password_hash, is_moderator, created_at) VALUES ('alice', 'x', 0, ?)",
    )
    .bind(Utc::now())
    .execute(&writer)
    .await
    .unwrap();

    let reader = db::connect_readonly(&path).await.unwrap();
    let (tx, callbacks) = mpsc::unbounded_channel();
    let analyzer = Analyzer::new(reader, Arc::new(ChannelSink(tx)), SECRET, DelayRange::NONE);

    Fixture {
        router: build_router(AppState::new(analyzer)),
        writer,
        callbacks,
        _dir: dir,
    }
}

/// Insert a processing request with the given genres attached
async fn insert_request(pool: &SqlitePool, text: &str, genres: &[i64]) -> i64 {
    let now = Utc::now();
    let id = sqlx::query(
        "INSERT INTO analysis_requests (status, creator_id, moderator_id, text_to_analyse, created_at, formed_at) \
         VALUES ('processing', 1, 1, ?, ?, ?)",
    )
    .bind(text)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid();

    for genre_id in genres {
        sqlx::query("INSERT INTO analysis_genres (analysis_request_id, genre_id) VALUES (?, ?)")
            .bind(id)
            .bind(genre_id)
            .execute(pool)
            .await
            .unwrap();
    }
    id
}

fn job_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/asyncapi/v1/calculate-text-genre-probability")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn next_callback(fixture: &mut Fixture) -> Option<AnalysisCallback> {
    tokio::time::timeout(Duration::from_secs(2), fixture.callbacks.recv())
        .await
        .ok()
        .flatten()
}

#[tokio::test]
async fn test_health() {
    let fixture = setup().await;
    let response = fixture
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["module"], "tga-classifier");
}

#[tokio::test]
async fn test_job_is_scored_and_reported() {
    let mut fixture = setup().await;
    // Chronicle keywords hit "стоял" and "домой": 2 of 7 words
    let id = insert_request(&fixture.writer, "Он стоял у окна и смотрел домой", &[1, 3]).await;

    let response = fixture
        .router
        .clone()
        .oneshot(job_request(&format!(r#"{{"analysis_request_id": {}}}"#, id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let callback = next_callback(&mut fixture).await.expect("callback expected");
    assert_eq!(callback.analysis_request_id, id);
    assert_eq!(callback.secret_key, SECRET);
    assert_eq!(
        callback.analysis_genre_data,
        vec![
            GenreScore { genre_id: 1, probability_percent: 29 },
            GenreScore { genre_id: 3, probability_percent: 0 },
        ]
    );
}

#[tokio::test]
async fn test_empty_text_reports_empty_scores() {
    let mut fixture = setup().await;
    let id = insert_request(&fixture.writer, "", &[1]).await;

    let response = fixture
        .router
        .clone()
        .oneshot(job_request(&format!(r#"{{"analysis_request_id": {}}}"#, id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let callback = next_callback(&mut fixture).await.expect("callback expected");
    assert!(callback.analysis_genre_data.is_empty());
}

#[tokio::test]
async fn test_unknown_request_gets_no_callback() {
    let mut fixture = setup().await;
    let response = fixture
        .router
        .clone()
        .oneshot(job_request(r#"{"analysis_request_id": 999}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let received = tokio::time::timeout(Duration::from_millis(300), fixture.callbacks.recv()).await;
    assert!(received.is_err(), "no callback for a missing request");
}

#[tokio::test]
async fn test_malformed_jobs_rejected() {
    let fixture = setup().await;
    for body in ["{not json", "{}", r#"{"analysis_request_id": 0}"#, r#"{"analysis_request_id": "x"}"#] {
        let response = fixture.router.clone().oneshot(job_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
    }
}

async fn capture(
    State(tx): State<mpsc::UnboundedSender<AnalysisCallback>>,
    Json(callback): Json<AnalysisCallback>,
) -> StatusCode {
    let _ = tx.send(callback);
    StatusCode::OK
}

#[tokio::test]
async fn test_http_sink_puts_callback() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let app = Router::new()
        .route("/api/v1/internal/update-analysis", put(capture))
        .with_state(tx);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });

    let sink = HttpResultSink::new(format!("http://{}/api/v1/internal/update-analysis", addr)).unwrap();
    let callback = AnalysisCallback {
        analysis_request_id: 3,
        secret_key: SECRET.to_string(),
        analysis_genre_data: vec![GenreScore { genre_id: 2, probability_percent: 12 }],
    };
    sink.deliver(&callback).await.unwrap();
    assert_eq!(rx.recv().await.unwrap(), callback);

    let missing = HttpResultSink::new(format!("http://{}/nowhere", addr)).unwrap();
    assert!(matches!(
        missing.deliver(&callback).await,
        Err(CallbackError::Status(404))
    ));
}
