//! Wire contract between the analysis service and the classifier
//!
//! Both services depend on this module, so the dispatch and callback payloads cannot
//! drift apart. Only pure types and functions live here; each service wraps them
//! with its own axum handlers.

pub mod auth;
pub mod types;

pub use auth::secret_matches;
pub use types::{AnalysisCallback, DispatchRequest, GenreScore};
