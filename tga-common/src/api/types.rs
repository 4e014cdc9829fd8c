//! Dispatch and callback payloads

use serde::{Deserialize, Serialize};

/// Job sent to the classifier: only the id, the classifier reads the rest itself
///
/// # Examples
///
/// ```
/// use tga_common::api::DispatchRequest;
///
/// let body = serde_json::to_string(&DispatchRequest { analysis_request_id: 7 }).unwrap();
/// assert_eq!(body, r#"{"analysis_request_id":7}"#);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub analysis_request_id: i64,
}

/// One scored genre in a callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenreScore {
    pub genre_id: i64,
    pub probability_percent: i64,
}

/// Results delivered back to the analysis service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisCallback {
    pub analysis_request_id: i64,
    pub secret_key: String,
    #[serde(default)]
    pub analysis_genre_data: Vec<GenreScore>,
}
