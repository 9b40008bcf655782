//! Configuration loader
//!
//! Loads client configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! Whatever the source, the result is validated before it is returned.
//!
//! ## Environment Variables
//! Required:
//! - `RESTBATCH_BASE_URL`: API base URL
//! - `RESTBATCH_LOGIN`, `RESTBATCH_PASSWORD`, `RESTBATCH_TENANT`: credentials
//!
//! Optional (defaults in parentheses):
//! - `RESTBATCH_CONNECT_TIMEOUT_MS` (5000)
//! - `RESTBATCH_RESPONSE_TIMEOUT_MS` (20000)
//! - `RESTBATCH_RETRY_COUNT` (0)
//! - `RESTBATCH_MAX_CONCURRENT_REQUESTS` (10)
//! - `RESTBATCH_PROXY_HOST` / `RESTBATCH_PROXY_PORT`: proxy, used when both are set
//! - `RESTBATCH_PROXY_USER` / `RESTBATCH_PROXY_PASSWORD`: proxy credentials
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./restbatch.toml` or `./restbatch.json` (current working directory)
//! 2. `./config.toml` or `./config.json` (current working directory)
//! 3. The same names in the parent directory
//! 4. The same names next to the executable

use std::path::{Path, PathBuf};
use std::str::FromStr;

use restbatch_domain::constants::{
    DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_MAX_CONCURRENT_REQUESTS, DEFAULT_RESPONSE_TIMEOUT_MS,
    DEFAULT_RETRY_COUNT,
};
use restbatch_domain::{ClientConfig, CredentialKey, ProxyConfig, RestError, Result};

const CONFIG_FILE_NAMES: [&str; 4] =
    ["restbatch.toml", "restbatch.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `RestError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - The loaded configuration fails validation
pub fn load() -> Result<ClientConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns `RestError::Config` if required variables are missing or have
/// invalid values.
pub fn load_from_env() -> Result<ClientConfig> {
    let base_url = env_var("RESTBATCH_BASE_URL")?;
    let credentials = CredentialKey::new(
        env_var("RESTBATCH_LOGIN")?,
        env_var("RESTBATCH_PASSWORD")?,
        env_var("RESTBATCH_TENANT")?,
    );

    let proxy_host = std::env::var("RESTBATCH_PROXY_HOST").ok();
    let proxy = match (proxy_host, env_opt::<u16>("RESTBATCH_PROXY_PORT")?) {
        (Some(host), Some(port)) => Some(ProxyConfig {
            host,
            port,
            user: std::env::var("RESTBATCH_PROXY_USER").ok(),
            password: std::env::var("RESTBATCH_PROXY_PASSWORD").ok(),
        }),
        _ => None,
    };

    let config = ClientConfig {
        base_url,
        credentials,
        connect_timeout_ms: env_parse("RESTBATCH_CONNECT_TIMEOUT_MS", DEFAULT_CONNECT_TIMEOUT_MS)?,
        response_timeout_ms: env_parse(
            "RESTBATCH_RESPONSE_TIMEOUT_MS",
            DEFAULT_RESPONSE_TIMEOUT_MS,
        )?,
        retry_count: env_parse("RESTBATCH_RETRY_COUNT", DEFAULT_RETRY_COUNT)?,
        max_concurrent_requests: env_parse(
            "RESTBATCH_MAX_CONCURRENT_REQUESTS",
            DEFAULT_MAX_CONCURRENT_REQUESTS,
        )?,
        proxy,
    };

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations (see
/// [`probe_config_paths`]). Format is detected by file extension.
///
/// # Errors
/// Returns `RestError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid or the configuration fails validation
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(RestError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            RestError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| RestError::Config(format!("Failed to read config file: {}", e)))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| RestError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| RestError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(RestError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd.clone());
        dirs.push(cwd.join(".."));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            dirs.push(exe_dir.to_path_buf());
        }
    }

    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| RestError::Config(format!("Missing required environment variable: {}", key)))
}

/// Parse an optional environment variable
///
/// Unset yields `Ok(None)`; set but unparseable is an error.
fn env_opt<T: FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| RestError::Config(format!("Invalid value for {}: {}", key, e))),
        Err(_) => Ok(None),
    }
}

/// Parse an environment variable, falling back to `default` when unset.
fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    Ok(env_opt(key)?.unwrap_or(default))
}
