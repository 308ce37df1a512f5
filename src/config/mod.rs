//! Typed configuration from environment variables.
//!
//! Loads once at startup and fails fast on malformed values. Every
//! variable is optional; defaults match the library's own defaults.

use crate::error::{Error, Result};
use crate::queue::DEFAULT_CONCURRENCY;

#[derive(Debug, Clone)]
pub struct Config {
    /// Concurrency limit for queues built with `WorkingQueue::from_config`.
    pub default_concurrency: usize,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_concurrency: DEFAULT_CONCURRENCY,
            otel_endpoint: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let default_concurrency = match std::env::var("WORKLINE_CONCURRENCY") {
            Ok(raw) => parse_concurrency(&raw)?,
            Err(_) => DEFAULT_CONCURRENCY,
        };

        Ok(Self {
            default_concurrency,
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn parse_concurrency(raw: &str) -> Result<usize> {
    match raw.trim().parse::<usize>() {
        Ok(0) => Err(Error::Config(
            "WORKLINE_CONCURRENCY must be at least 1".to_string(),
        )),
        Ok(n) => Ok(n),
        Err(e) => Err(Error::Config(format!(
            "WORKLINE_CONCURRENCY is not a valid integer ({raw:?}): {e}"
        ))),
    }
}
