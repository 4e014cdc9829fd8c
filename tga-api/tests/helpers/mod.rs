//! Shared fixtures for tga-api integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::Value;
use sqlx::SqlitePool;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tga_api::auth::TokenService;
use tga_api::services::{Actor, ClassifierClient, DispatchError, DispatchWorker};
use tga_api::{build_router, AppState};
use tga_common::api::DispatchRequest;
use tga_common::revocation::SqliteRevocationStore;
use tower::util::ServiceExt;

pub const CALLBACK_SECRET: &str = "test-callback-secret";
pub const JWT_SECRET: &str = "test-jwt-secret";

/// Seeded catalogue ids
pub const GENRE_CHRONICLE: i64 = 1;
pub const GENRE_HAGIOGRAPHY: i64 = 2;
pub const GENRE_TREATY: i64 = 3;

/// How the fake classifier answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierMode {
    Accept,
    Refuse(u16),
    Unreachable,
    Slow,
}

/// Classifier double recording the jobs it was handed
pub struct FakeClassifier {
    mode: Mutex<ClassifierMode>,
    submitted: Mutex<Vec<i64>>,
}

impl FakeClassifier {
    pub fn new(mode: ClassifierMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn set_mode(&self, mode: ClassifierMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn submitted(&self) -> Vec<i64> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClassifierClient for FakeClassifier {
    async fn submit(&self, job: DispatchRequest) -> Result<(), DispatchError> {
        self.submitted.lock().unwrap().push(job.analysis_request_id);
        let mode = *self.mode.lock().unwrap();
        match mode {
            ClassifierMode::Accept => Ok(()),
            ClassifierMode::Refuse(status) => Err(DispatchError::Rejected(status)),
            ClassifierMode::Unreachable => {
                Err(DispatchError::Transport("connection refused".to_string()))
            }
            ClassifierMode::Slow => Err(DispatchError::Timeout(Duration::from_millis(50))),
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub pool: SqlitePool,
    pub classifier: Arc<FakeClassifier>,
    /// Not spawned; tests drive delivery explicitly or call `spawn_worker`
    pub worker: Option<DispatchWorker>,
    _dir: TempDir,
}

impl TestApp {
    pub fn spawn_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            tokio::spawn(worker.run());
        }
    }
}

/// Fresh service over a temporary database
pub async fn create_test_app() -> TestApp {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let pool = tga_common::db::init_database(&dir.path().join("test.db"))
        .await
        .expect("Failed to initialize test database");

    let classifier = Arc::new(FakeClassifier::new(ClassifierMode::Accept));
    let (state, worker) = AppState::new(
        pool.clone(),
        TokenService::new(JWT_SECRET, chrono::Duration::hours(1)),
        Arc::new(SqliteRevocationStore::new(pool.clone())),
        classifier.clone(),
        CALLBACK_SECRET,
        false,
    );

    TestApp {
        router: build_router(state.clone()),
        state,
        pool,
        classifier,
        worker: Some(worker),
        _dir: dir,
    }
}

/// Register (or promote) a user and log in; returns (user id, token)
pub async fn create_user(app: &TestApp, login: &str, moderator: bool) -> (i64, String) {
    let id = if moderator {
        app.state.users.ensure_moderator(login, "password").await.unwrap()
    } else {
        app.state.users.register(login, "password").await.unwrap().id
    };
    let issued = app.state.users.login(login, "password").await.unwrap();
    (id, issued.token)
}

pub fn creator(id: i64) -> Actor {
    Actor {
        user_id: id,
        is_moderator: false,
    }
}

/// A formed request with text and the given genres attached
pub async fn formed_request(app: &TestApp, creator_id: i64, text: &str, genres: &[i64]) -> i64 {
    let lifecycle = &app.state.lifecycle;
    let mut request_id = 0;
    for genre_id in genres {
        request_id = lifecycle.attach_genre(creator_id, *genre_id).await.unwrap().id;
    }
    lifecycle.edit(creator(creator_id), request_id, text).await.unwrap();
    lifecycle.form(creator(creator_id), request_id).await.unwrap();
    request_id
}

/// Build a request with optional bearer token and JSON body
pub fn test_request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Send a request; returns status and parsed JSON body (Null when empty)
pub async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Should parse JSON")
    };
    (status, body)
}

pub async fn request_status(pool: &SqlitePool, id: i64) -> String {
    sqlx::query_scalar("SELECT status FROM analysis_requests WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn probabilities(pool: &SqlitePool, id: i64) -> Vec<(i64, i64)> {
    sqlx::query_as(
        "SELECT genre_id, probability_percent FROM analysis_genres \
         WHERE analysis_request_id = ? ORDER BY genre_id",
    )
    .bind(id)
    .fetch_all(pool)
    .await
    .unwrap()
}
