//! Client configuration from `OCR_*` environment variables.
//!
//! Every value has a default, so an empty environment talks to the public
//! Job Service with the standard poll cadence.

use std::time::Duration;

use ocrjob_core::poll::{PollPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL};

/// Job Service used when `OCR_API_BASE_URL` is not set.
pub const DEFAULT_BASE_URL: &str = "https://ocr-api-1bet.onrender.com/v1";

/// Per-request HTTP timeout used when `OCR_REQUEST_TIMEOUT_SECS` is not set.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Client configuration loaded from environment variables.
///
/// All fields have defaults that talk to the public Job Service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Job Service base URL, without the `/jobs` suffix.
    pub base_url: String,
    /// Cadence and attempt budget for polling.
    pub poll: PollPolicy,
    /// Timeout applied to every HTTP request.
    pub request_timeout: Duration,
}

/// Configuration values that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has invalid value '{value}'")]
    Invalid { var: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            poll: PollPolicy::default(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                                |
    /// |----------------------------|----------------------------------------|
    /// | `OCR_API_BASE_URL`         | `https://ocr-api-1bet.onrender.com/v1` |
    /// | `OCR_POLL_INTERVAL_MS`     | `2000`                                 |
    /// | `OCR_POLL_MAX_ATTEMPTS`    | `150`                                  |
    /// | `OCR_REQUEST_TIMEOUT_SECS` | `30`                                   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reads values through
    /// `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup("OCR_API_BASE_URL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let interval_ms = parse_var(
            &lookup,
            "OCR_POLL_INTERVAL_MS",
            DEFAULT_POLL_INTERVAL.as_millis() as u64,
        )?;

        let max_attempts: u32 = parse_var(&lookup, "OCR_POLL_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?;
        if max_attempts == 0 {
            return Err(ConfigError::Zero("OCR_POLL_MAX_ATTEMPTS"));
        }

        let timeout_secs = parse_var(
            &lookup,
            "OCR_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?;
        if timeout_secs == 0 {
            return Err(ConfigError::Zero("OCR_REQUEST_TIMEOUT_SECS"));
        }

        Ok(Self {
            base_url,
            poll: PollPolicy {
                interval: Duration::from_millis(interval_ms),
                max_attempts,
            },
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}
