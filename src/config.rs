//! Configuration loader for the `gnss-pw-service` backend.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). Components receive the values they need at
//! construction time and never read the environment themselves.
//!
use std::{env, net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::{anyhow, Result};

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u32 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u32>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Read an optional string environment variable, treating blank values as unset.
macro_rules! optional_env {
    ($var_name:expr) => {
        env::var($var_name).ok().filter(|v| !v.trim().is_empty())
    };
}

const DEFAULT_WEATHER_API_URL: &str = "https://archive-api.open-meteo.com";

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// PostgreSQL connection string for the station catalog.
    pub db_url: String,

    /// Maximum number of database connections in the pool.
    pub db_pool_max: u32,

    /// Address the HTTP server binds to.
    pub bind_addr: SocketAddr,

    /// External scorer program followed by its arguments. `None` leaves the
    /// scorer unavailable, so every estimate takes the fallback path.
    pub predictor_command: Option<Vec<String>>,

    /// Hard limit on a single scorer invocation.
    pub predictor_timeout: Duration,

    /// Weather service base URL.
    pub weather_api_url: String,

    /// Hard limit on a single weather lookup.
    pub weather_timeout: Duration,

    /// Directory for request-scoped upload files.
    pub upload_dir: PathBuf,

    /// Multipart body limit in megabytes.
    pub max_upload_mb: u32,

    /// Expected bearer token. `None` disables the check.
    pub api_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        // ---
        Config {
            db_url: String::new(),
            db_pool_max: 5,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3001)),
            predictor_command: None,
            predictor_timeout: Duration::from_secs(10),
            weather_api_url: DEFAULT_WEATHER_API_URL.to_string(),
            weather_timeout: Duration::from_secs(5),
            upload_dir: env::temp_dir(),
            max_upload_mb: 50,
            api_token: None,
        }
    }
}

/// Load configuration from environment variables with defaults.
///
/// Required:
/// - `DATABASE_URL` – PostgreSQL connection string
///
/// Optional:
/// - `DB_POOL_MAX` – max DB connections (default: 5)
/// - `BIND_ADDR` – listen address (default: 0.0.0.0:3001)
/// - `PREDICTOR_COMMAND` – scorer program and arguments (default: unset)
/// - `PREDICTOR_TIMEOUT_SECS` – scorer timeout (default: 10)
/// - `WEATHER_API_URL` – weather service base URL (default: Open-Meteo archive)
/// - `WEATHER_TIMEOUT_SECS` – weather lookup timeout (default: 5)
/// - `UPLOAD_DIR` – upload scratch directory (default: OS temp dir)
/// - `MAX_UPLOAD_MB` – multipart body limit (default: 50)
/// - `API_TOKEN` – expected bearer token (default: unset)
///
/// Returns an error if any required variable is missing or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let db_url = require_env!("DATABASE_URL");
    let db_pool_max = parse_env_u32!("DB_POOL_MAX", 5);
    let predictor_timeout_secs = parse_env_u32!("PREDICTOR_TIMEOUT_SECS", 10);
    let weather_timeout_secs = parse_env_u32!("WEATHER_TIMEOUT_SECS", 5);
    let max_upload_mb = parse_env_u32!("MAX_UPLOAD_MB", 50);

    let bind_addr = match optional_env!("BIND_ADDR") {
        Some(addr) => addr
            .parse::<SocketAddr>()
            .map_err(|e| anyhow!("Invalid BIND_ADDR '{}': {}", addr, e))?,
        None => SocketAddr::from(([0, 0, 0, 0], 3001)),
    };

    if predictor_timeout_secs == 0 {
        return Err(anyhow!("PREDICTOR_TIMEOUT_SECS must be greater than zero"));
    }

    let predictor_command = optional_env!("PREDICTOR_COMMAND").map(|cmd| split_command(&cmd));

    Ok(Config {
        db_url,
        db_pool_max,
        bind_addr,
        predictor_command,
        predictor_timeout: Duration::from_secs(u64::from(predictor_timeout_secs)),
        weather_api_url: optional_env!("WEATHER_API_URL")
            .unwrap_or_else(|| DEFAULT_WEATHER_API_URL.to_string()),
        weather_timeout: Duration::from_secs(u64::from(weather_timeout_secs)),
        upload_dir: optional_env!("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(env::temp_dir),
        max_upload_mb,
        api_token: optional_env!("API_TOKEN"),
    })
}

/// Split a command line on whitespace. Quoting is not supported.
fn split_command(cmd: &str) -> Vec<String> {
    cmd.split_whitespace().map(str::to_string).collect()
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    ///
    /// Masks sensitive information like database passwords and the API token
    /// while showing all configuration values that were loaded.
    pub fn log_config(&self) {
        // ---
        // Mask the password in the database URL for security
        let masked_db_url = if let Some(at_pos) = self.db_url.rfind('@') {
            if let Some(colon_pos) = self.db_url[..at_pos].rfind(':') {
                format!(
                    "{}:****{}",
                    &self.db_url[..colon_pos],
                    &self.db_url[at_pos..]
                )
            } else {
                self.db_url.clone()
            }
        } else {
            self.db_url.clone()
        };

        let predictor = self
            .predictor_command
            .as_ref()
            .map(|c| c.join(" "))
            .unwrap_or_else(|| "<unset: fallback only>".to_string());

        tracing::info!("Configuration loaded:");
        tracing::info!("  DATABASE_URL           : {}", masked_db_url);
        tracing::info!("  DB_POOL_MAX            : {}", self.db_pool_max);
        tracing::info!("  BIND_ADDR              : {}", self.bind_addr);
        tracing::info!("  PREDICTOR_COMMAND      : {}", predictor);
        tracing::info!("  PREDICTOR_TIMEOUT_SECS : {}", self.predictor_timeout.as_secs());
        tracing::info!("  WEATHER_API_URL        : {}", self.weather_api_url);
        tracing::info!("  WEATHER_TIMEOUT_SECS   : {}", self.weather_timeout.as_secs());
        tracing::info!("  UPLOAD_DIR             : {}", self.upload_dir.display());
        tracing::info!("  MAX_UPLOAD_MB          : {}", self.max_upload_mb);
        tracing::info!(
            "  API_TOKEN              : {}",
            if self.api_token.is_some() { "****" } else { "<unset>" }
        );
    }
}
