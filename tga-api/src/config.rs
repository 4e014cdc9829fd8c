//! Analysis service configuration
//!
//! Command-line flags (with environment fallbacks) are layered over the TOML file,
//! which is layered over compiled defaults.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tga_common::config::{
    default_database_path, BootstrapModerator, TomlConfig, DEFAULT_API_PORT,
    DEFAULT_CLASSIFIER_URL, DEFAULT_DISPATCH_TIMEOUT_SECS, DEFAULT_TOKEN_LIFETIME_SECS,
};
use tga_common::{Error, Result};

/// Command-line arguments for tga-api
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "tga-api")]
#[command(about = "Text genre analysis service")]
#[command(version)]
pub struct Args {
    /// Path to config.toml
    #[arg(short, long, env = "TGA_CONFIG")]
    pub config: Option<PathBuf>,

    /// SQLite database file
    #[arg(long, env = "TGA_DATABASE_PATH")]
    pub database_path: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "TGA_BIND_ADDRESS")]
    pub bind_address: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "TGA_PORT")]
    pub port: Option<u16>,

    /// Classifier job endpoint
    #[arg(long, env = "TGA_CLASSIFIER_URL")]
    pub classifier_url: Option<String>,

    /// Secret the classifier must present on callback
    #[arg(long, env = "TGA_CALLBACK_SECRET", hide_env_values = true)]
    pub callback_secret: Option<String>,

    /// Session token signing secret
    #[arg(long, env = "TGA_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Session token lifetime in seconds
    #[arg(long, env = "TGA_TOKEN_LIFETIME_SECS")]
    pub token_lifetime_secs: Option<u64>,

    /// Timeout of the dispatch call to the classifier, in seconds
    #[arg(long, env = "TGA_DISPATCH_TIMEOUT_SECS")]
    pub dispatch_timeout_secs: Option<u64>,

    /// Mark the session cookie Secure
    #[arg(long, env = "TGA_COOKIE_SECURE")]
    pub cookie_secure: Option<bool>,
}

/// Fully resolved settings
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub database_path: PathBuf,
    pub listen_addr: SocketAddr,
    pub classifier_url: String,
    pub callback_secret: String,
    pub jwt_secret: String,
    pub token_lifetime: Duration,
    pub dispatch_timeout: Duration,
    pub cookie_secure: bool,
    pub bootstrap_moderator: Option<BootstrapModerator>,
}

impl ServiceConfig {
    pub fn resolve(args: &Args, file: &TomlConfig) -> Result<Self> {
        let database_path = args
            .database_path
            .clone()
            .or_else(|| file.database_path.clone())
            .unwrap_or_else(default_database_path);

        let bind_address = args
            .bind_address
            .clone()
            .or_else(|| file.bind_address.clone())
            .unwrap_or_else(|| "127.0.0.1".to_string());
        let port = args.port.or(file.port).unwrap_or(DEFAULT_API_PORT);
        let listen_addr: SocketAddr = format!("{}:{}", bind_address, port)
            .parse()
            .map_err(|e| Error::Config(format!("invalid bind address '{}': {}", bind_address, e)))?;

        let token_lifetime_secs = args
            .token_lifetime_secs
            .or(file.token_lifetime_secs)
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        if token_lifetime_secs == 0 {
            return Err(Error::Config("token_lifetime_secs must be positive".to_string()));
        }

        let dispatch_timeout_secs = args
            .dispatch_timeout_secs
            .or(file.dispatch_timeout_secs)
            .unwrap_or(DEFAULT_DISPATCH_TIMEOUT_SECS);
        if dispatch_timeout_secs == 0 {
            return Err(Error::Config("dispatch_timeout_secs must be positive".to_string()));
        }

        Ok(Self {
            database_path,
            listen_addr,
            classifier_url: args
                .classifier_url
                .clone()
                .or_else(|| file.classifier_url.clone())
                .unwrap_or_else(|| DEFAULT_CLASSIFIER_URL.to_string()),
            callback_secret: required_secret(
                args.callback_secret.as_ref().or(file.callback_secret.as_ref()),
                "callback_secret",
            )?,
            jwt_secret: required_secret(
                args.jwt_secret.as_ref().or(file.jwt_secret.as_ref()),
                "jwt_secret",
            )?,
            token_lifetime: Duration::from_secs(token_lifetime_secs),
            dispatch_timeout: Duration::from_secs(dispatch_timeout_secs),
            cookie_secure: args.cookie_secure.or(file.cookie_secure).unwrap_or(false),
            bootstrap_moderator: file.bootstrap_moderator.clone(),
        })
    }
}

fn required_secret(value: Option<&String>, name: &str) -> Result<String> {
    match value.map(|s| s.trim()).filter(|s| !s.is_empty()) {
        Some(secret) => Ok(secret.to_string()),
        None => Err(Error::Config(format!("{} is not configured", name))),
    }
}
