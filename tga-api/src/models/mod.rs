//! Domain models

pub mod lifecycle;
pub mod views;

pub use lifecycle::{AnalysisRequest, Lifecycle};
pub use views::{DraftIcon, GenreView, RequestView};
