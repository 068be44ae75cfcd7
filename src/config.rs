use std::{env, fmt::Display, str::FromStr};

use log::info;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid value for {key}: {reason}")]
pub(crate) struct ConfigError {
    key: &'static str,
    reason: String,
}

#[derive(Debug, Clone)]
pub(crate) struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub pool_size: u32,
}

impl Config {
    /// Reads the process environment; call after `dotenv::dotenv()`.
    pub(crate) fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: try_load("DATABASE_URL", "tracker.sqlite3")?,
            host: try_load("TRACKER_HOST", "127.0.0.1")?,
            port: try_load("TRACKER_PORT", "8080")?,
            pool_size: try_load("DATABASE_POOL_SIZE", "8")?,
        })
    }
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.parse().map_err(|e: T::Err| ConfigError {
        key,
        reason: e.to_string(),
    })
}
