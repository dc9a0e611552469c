//! Process configuration, read once at startup.
//!
//! Values come from the environment (after an optional `.env` file).
//! A missing API key is fatal: the server must not start without one.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub const API_KEY_VAR: &str = "GOOGLE_MAPS_API_KEY";
const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("GOOGLE_MAPS_API_KEY is not set; refusing to start without a provider key")]
    MissingApiKey,

    #[error("Invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

/// Settings for the mapping provider client.
#[derive(Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    pub base_url: String,
    pub http_timeout: Duration,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = get(API_KEY_VAR).ok_or(ConfigError::MissingApiKey)?;

        let provider = ProviderConfig {
            api_key,
            base_url: get("GOOGLE_MAPS_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            http_timeout: Duration::from_secs(parse_or(
                "GOOGLE_MAPS_HTTP_TIMEOUT_SECS",
                get("GOOGLE_MAPS_HTTP_TIMEOUT_SECS"),
                10,
            )?),
        };

        let port_raw = get("SITESCOUT_PORT").or_else(|| get("PORT"));
        let server = ServerConfig {
            host: get("SITESCOUT_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or("SITESCOUT_PORT", port_raw, 8080)?,
            request_timeout: Duration::from_secs(parse_or(
                "SITESCOUT_REQUEST_TIMEOUT_SECS",
                get("SITESCOUT_REQUEST_TIMEOUT_SECS"),
                30,
            )?),
        };

        Ok(Self { provider, server })
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { key, value }),
    }
}
