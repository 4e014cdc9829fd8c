//! Tests for TOML config loading
//!
//! Tests that touch `TGA_CONFIG` are marked `#[serial]` so they do not race on the
//! process environment.

use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;
use tga_common::config::{TomlConfig, CONFIG_ENV_VAR};
use tga_common::Error;

const FULL_CONFIG: &str = r#"
database_path = "/var/lib/tga/tga.db"
port = 9090
classifier_url = "http://classifier:8000/asyncapi/v1/calculate-text-genre-probability"
callback_secret = "s3cret"
jwt_secret = "jwt"
token_lifetime_secs = 600
cookie_secure = true

[bootstrap_moderator]
login = "admin"
password = "admin-pass"

[logging]
level = "debug"

[classifier]
port = 8001
min_delay_ms = 0
max_delay_ms = 10
"#;

#[test]
fn test_full_config_parses() {
    let config: TomlConfig = toml::from_str(FULL_CONFIG).unwrap();

    assert_eq!(config.database_path, Some(PathBuf::from("/var/lib/tga/tga.db")));
    assert_eq!(config.port, Some(9090));
    assert_eq!(config.callback_secret.as_deref(), Some("s3cret"));
    assert_eq!(config.token_lifetime_secs, Some(600));
    assert_eq!(config.cookie_secure, Some(true));
    assert_eq!(config.bootstrap_moderator.unwrap().login, "admin");
    assert_eq!(config.logging.level.as_deref(), Some("debug"));
    assert_eq!(config.classifier.port, Some(8001));
    assert_eq!(config.classifier.max_delay_ms, Some(10));
    assert!(config.bind_address.is_none());
}

#[test]
#[serial]
fn test_explicit_path_wins_over_env() {
    let dir = TempDir::new().unwrap();
    let explicit = dir.path().join("explicit.toml");
    let from_env = dir.path().join("env.toml");
    std::fs::write(&explicit, "port = 1111").unwrap();
    std::fs::write(&from_env, "port = 2222").unwrap();

    env::set_var(CONFIG_ENV_VAR, &from_env);
    let config = TomlConfig::load(Some(&explicit)).unwrap();
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.port, Some(1111));
}

#[test]
#[serial]
fn test_env_var_names_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("env.toml");
    std::fs::write(&path, "callback_secret = \"from-env-file\"").unwrap();

    env::set_var(CONFIG_ENV_VAR, &path);
    let config = TomlConfig::load(None).unwrap();
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.callback_secret.as_deref(), Some("from-env-file"));
}

#[test]
#[serial]
fn test_missing_explicit_file_is_error() {
    env::remove_var(CONFIG_ENV_VAR);
    let result = TomlConfig::load(Some(&PathBuf::from("/nonexistent/tga/config.toml")));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_malformed_file_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "port = \"not a number\"").unwrap();

    let result = TomlConfig::from_file(&path);
    assert!(matches!(result, Err(Error::ConfigParse(_))));
}
