//! # TGA Common Library
//!
//! Shared code for the text genre analysis services:
//! - Database schema initialization and row models
//! - Wire types exchanged with the classifier service
//! - Configuration loading
//! - Keyword scoring
//! - Token revocation store

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod revocation;
pub mod scoring;

pub use error::{Error, Result};
pub use scoring::score;
