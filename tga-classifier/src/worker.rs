//! Background scoring jobs
//!
//! Each accepted job waits out the simulated processing delay, scores every
//! attached genre against the request text and calls back once. Nothing is
//! retried: a lost callback leaves the request in `processing`.

use rand::Rng;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tga_common::api::{AnalysisCallback, GenreScore};
use tga_common::scoring::score;
use tracing::{error, info, warn};

use crate::callback::ResultSink;
use crate::db::{self, ScoringInput};

/// Inclusive range the per-job delay is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min: Duration,
    pub max: Duration,
}

impl DelayRange {
    pub const NONE: DelayRange = DelayRange {
        min: Duration::ZERO,
        max: Duration::ZERO,
    };

    fn pick(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let (min, max) = (self.min.as_millis() as u64, self.max.as_millis() as u64);
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

/// Scores requests and reports back
#[derive(Clone)]
pub struct Analyzer {
    db: SqlitePool,
    sink: Arc<dyn ResultSink>,
    secret: String,
    delay: DelayRange,
}

impl Analyzer {
    pub fn new(
        db: SqlitePool,
        sink: Arc<dyn ResultSink>,
        secret: impl Into<String>,
        delay: DelayRange,
    ) -> Self {
        Self {
            db,
            sink,
            secret: secret.into(),
            delay,
        }
    }

    /// Run one job in the background
    pub fn spawn(&self, request_id: i64) {
        let analyzer = self.clone();
        tokio::spawn(async move { analyzer.run(request_id).await });
    }

    /// Delay, score and call back; every failure ends in a log line
    pub async fn run(&self, request_id: i64) {
        let delay = self.delay.pick();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        info!(request_id, delay_ms = delay.as_millis() as u64, "Scoring started");

        let input = match db::load_scoring_input(&self.db, request_id).await {
            Ok(Some(input)) => input,
            Ok(None) => {
                error!(request_id, "Analysis request not found, no callback sent");
                return;
            }
            Err(e) => {
                error!(request_id, error = %e, "Failed to read analysis request");
                return;
            }
        };

        let scores = score_input(request_id, &input);
        let callback = AnalysisCallback {
            analysis_request_id: request_id,
            secret_key: self.secret.clone(),
            analysis_genre_data: scores,
        };

        match self.sink.deliver(&callback).await {
            Ok(()) => info!(
                request_id,
                genres = callback.analysis_genre_data.len(),
                "Results delivered"
            ),
            Err(e) => error!(request_id, error = %e, "Failed to deliver results"),
        }
    }
}

/// Score every attached genre; empty text or no genres gives an empty list
pub fn score_input(request_id: i64, input: &ScoringInput) -> Vec<GenreScore> {
    if input.text.trim().is_empty() {
        warn!(request_id, "Text to analyse is empty");
        return Vec::new();
    }
    if input.genres.is_empty() {
        warn!(request_id, "No genres attached");
        return Vec::new();
    }

    input
        .genres
        .iter()
        .map(|(genre_id, keywords)| GenreScore {
            genre_id: *genre_id,
            probability_percent: score(&input.text, keywords),
        })
        .collect()
}
