//! Classifier service configuration

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tga_common::config::{
    default_database_path, TomlConfig, DEFAULT_CALLBACK_URL, DEFAULT_CLASSIFIER_PORT,
};
use tga_common::{Error, Result};

/// Processing delay used when nothing is configured
const DEFAULT_MIN_DELAY_MS: u64 = 5_000;
const DEFAULT_MAX_DELAY_MS: u64 = 10_000;

/// Command-line arguments for tga-classifier
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "tga-classifier")]
#[command(about = "Reference keyword classifier for the text genre analysis service")]
#[command(version)]
pub struct Args {
    /// Path to config.toml
    #[arg(short, long, env = "TGA_CONFIG")]
    pub config: Option<PathBuf>,

    /// SQLite database shared with tga-api (opened read-only)
    #[arg(long, env = "TGA_DATABASE_PATH")]
    pub database_path: Option<PathBuf>,

    #[arg(long, env = "TGA_BIND_ADDRESS")]
    pub bind_address: Option<String>,

    #[arg(short, long, env = "TGA_CLASSIFIER_PORT")]
    pub port: Option<u16>,

    /// Where scored results are sent
    #[arg(long, env = "TGA_CALLBACK_URL")]
    pub callback_url: Option<String>,

    /// Secret presented to the analysis service
    #[arg(long, env = "TGA_CALLBACK_SECRET", hide_env_values = true)]
    pub callback_secret: Option<String>,

    #[arg(long, env = "TGA_MIN_DELAY_MS")]
    pub min_delay_ms: Option<u64>,

    #[arg(long, env = "TGA_MAX_DELAY_MS")]
    pub max_delay_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub database_path: PathBuf,
    pub listen_addr: SocketAddr,
    pub callback_url: String,
    pub callback_secret: String,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl ClassifierConfig {
    pub fn resolve(args: &Args, file: &TomlConfig) -> Result<Self> {
        let section = &file.classifier;

        let bind_address = args
            .bind_address
            .clone()
            .or_else(|| file.bind_address.clone())
            .unwrap_or_else(|| "127.0.0.1".to_string());
        let port = args.port.or(section.port).unwrap_or(DEFAULT_CLASSIFIER_PORT);
        let listen_addr: SocketAddr = format!("{}:{}", bind_address, port)
            .parse()
            .map_err(|e| Error::Config(format!("invalid bind address '{}': {}", bind_address, e)))?;

        let min_delay_ms = args
            .min_delay_ms
            .or(section.min_delay_ms)
            .unwrap_or(DEFAULT_MIN_DELAY_MS);
        let max_delay_ms = args
            .max_delay_ms
            .or(section.max_delay_ms)
            .unwrap_or(DEFAULT_MAX_DELAY_MS.max(min_delay_ms));
        if min_delay_ms > max_delay_ms {
            return Err(Error::Config(format!(
                "min_delay_ms ({}) exceeds max_delay_ms ({})",
                min_delay_ms, max_delay_ms
            )));
        }

        let callback_secret = args
            .callback_secret
            .as_ref()
            .or(file.callback_secret.as_ref())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Config("callback_secret is not configured".to_string()))?;

        Ok(Self {
            database_path: args
                .database_path
                .clone()
                .or_else(|| file.database_path.clone())
                .unwrap_or_else(default_database_path),
            listen_addr,
            callback_url: args
                .callback_url
                .clone()
                .or_else(|| section.callback_url.clone())
                .unwrap_or_else(|| DEFAULT_CALLBACK_URL.to_string()),
            callback_secret,
            min_delay: Duration::from_millis(min_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
        })
    }
}
