//! Shared error type for the analysis and classifier services

use thiserror::Error;

/// Result alias used by everything in `tga-common`
pub type Result<T> = std::result::Result<T, Error>;

/// Failures that can come out of the shared layer
///
/// Service crates wrap this in their own HTTP-facing error types; nothing here
/// knows about status codes.
#[derive(Error, Debug)]
pub enum Error {
    /// Storage failure (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Filesystem failure while preparing the database or reading config
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed TOML configuration file
    #[error("Config file parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration present but unusable
    #[error("Configuration error: {0}")]
    Config(String),

    /// Row that should exist is missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Stored value violates an invariant (e.g. unknown status text)
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}
