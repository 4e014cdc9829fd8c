//! Outbound calls to the classifier service

use async_trait::async_trait;
use std::time::Duration;
use tga_common::api::DispatchRequest;
use thiserror::Error;
use tracing::debug;

/// Why a dispatch did not reach an accepting classifier
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("classifier did not answer within {0:?}")]
    Timeout(Duration),

    #[error("classifier unreachable: {0}")]
    Transport(String),

    #[error("classifier refused the job with HTTP {0}")]
    Rejected(u16),
}

/// Something that accepts scoring jobs
#[async_trait]
pub trait ClassifierClient: Send + Sync {
    /// Hand over a job; Ok means the classifier accepted it (2xx)
    async fn submit(&self, job: DispatchRequest) -> Result<(), DispatchError>;
}

/// HTTP classifier client with a bounded per-call timeout
pub struct HttpClassifierClient {
    http: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpClassifierClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tga-api/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            url: url.into(),
            timeout,
        })
    }
}

#[async_trait]
impl ClassifierClient for HttpClassifierClient {
    async fn submit(&self, job: DispatchRequest) -> Result<(), DispatchError> {
        debug!(request_id = job.analysis_request_id, url = %self.url, "Submitting scoring job");

        let response = self
            .http
            .post(&self.url)
            .json(&job)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DispatchError::Timeout(self.timeout)
                } else {
                    DispatchError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(DispatchError::Rejected(status.as_u16()))
        }
    }
}
