//! Delivery of scoring results to the analysis service

use async_trait::async_trait;
use std::time::Duration;
use tga_common::api::AnalysisCallback;
use thiserror::Error;

/// Bound on a single callback call
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("callback transport failed: {0}")]
    Transport(String),

    #[error("analysis service answered HTTP {0}")]
    Status(u16),
}

/// Destination of finished results
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn deliver(&self, callback: &AnalysisCallback) -> Result<(), CallbackError>;
}

/// PUTs results to the analysis service's internal endpoint
pub struct HttpResultSink {
    http: reqwest::Client,
    url: String,
}

impl HttpResultSink {
    pub fn new(url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(CALLBACK_TIMEOUT)
            .user_agent(concat!("tga-classifier/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ResultSink for HttpResultSink {
    async fn deliver(&self, callback: &AnalysisCallback) -> Result<(), CallbackError> {
        let response = self
            .http
            .put(&self.url)
            .json(callback)
            .send()
            .await
            .map_err(|e| CallbackError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(CallbackError::Status(status.as_u16()))
        }
    }
}
