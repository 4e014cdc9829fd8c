//! Configuration file loading and default locations
//!
//! Settings are resolved in this order by each service:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Steps 1 and 2 are handled by each binary's `clap` definition. This module owns
//! the TOML layer and the compiled defaults shared by both services.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "TGA_CONFIG";

/// Default analysis service port
pub const DEFAULT_API_PORT: u16 = 8082;

/// Default classifier service port
pub const DEFAULT_CLASSIFIER_PORT: u16 = 8000;

/// Default token lifetime (1 hour)
pub const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

/// Default bound on the classifier dispatch HTTP call
pub const DEFAULT_DISPATCH_TIMEOUT_SECS: u64 = 10;

/// Default classifier job endpoint
pub const DEFAULT_CLASSIFIER_URL: &str =
    "http://127.0.0.1:8000/asyncapi/v1/calculate-text-genre-probability";

/// Default analysis service callback endpoint
pub const DEFAULT_CALLBACK_URL: &str = "http://127.0.0.1:8082/api/v1/internal/update-analysis";

/// Contents of `config.toml`
///
/// Every field is optional; a missing file is equivalent to an empty one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// SQLite database shared by both services
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Address the analysis service binds to
    #[serde(default)]
    pub bind_address: Option<String>,

    /// Analysis service port
    #[serde(default)]
    pub port: Option<u16>,

    /// Classifier job endpoint the gateway posts to
    #[serde(default)]
    pub classifier_url: Option<String>,

    /// Secret the classifier presents on callback
    #[serde(default)]
    pub callback_secret: Option<String>,

    /// HMAC secret for session tokens
    #[serde(default)]
    pub jwt_secret: Option<String>,

    #[serde(default)]
    pub token_lifetime_secs: Option<u64>,

    #[serde(default)]
    pub dispatch_timeout_secs: Option<u64>,

    /// Mark the session cookie `Secure`
    #[serde(default)]
    pub cookie_secure: Option<bool>,

    #[serde(default)]
    pub bootstrap_moderator: Option<BootstrapModerator>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub classifier: ClassifierSection,
}

/// Moderator account ensured at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapModerator {
    pub login: String,
    pub password: String,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level directive (trace, debug, info, warn, error)
    #[serde(default)]
    pub level: Option<String>,
}

/// `[classifier]` section, read only by the classifier service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifierSection {
    #[serde(default)]
    pub port: Option<u16>,

    /// Where scored results are delivered
    #[serde(default)]
    pub callback_url: Option<String>,

    /// Artificial processing delay range, simulating a slow model
    #[serde(default)]
    pub min_delay_ms: Option<u64>,

    #[serde(default)]
    pub max_delay_ms: Option<u64>,
}

impl TomlConfig {
    /// Parse a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Locate and load the config file, falling back to defaults
    ///
    /// A file named explicitly (argument or `TGA_CONFIG`) must parse. A missing
    /// file at a default location only produces a log line.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let explicit = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from));

        if let Some(path) = explicit {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            info!("Loading config file: {}", path.display());
            return Self::from_file(&path);
        }

        match find_config_file() {
            Some(path) => {
                info!("Loading config file: {}", path.display());
                Self::from_file(&path)
            }
            None => {
                warn!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Search the platform config locations
fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("tga").join("config.toml"));
    let system_config = PathBuf::from("/etc/tga/config.toml");

    for candidate in user_config.into_iter().chain(std::iter::once(system_config)) {
        debug!("Checking for config file at {}", candidate.display());
        if candidate.exists() {
            return Some(candidate);
        }
    }
    None
}

/// OS-dependent default database location
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("tga"))
        .unwrap_or_else(|| PathBuf::from("./tga_data"))
        .join("tga.db")
}
