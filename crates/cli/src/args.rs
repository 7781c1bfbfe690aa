use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use ocrjob_client::ClientConfig;

/// Upload images to the OCR Job Service and print the parsed result.
///
/// Every flag falls back to its `OCR_*` environment variable, then to the
/// built-in default.
#[derive(Debug, Parser)]
#[command(name = "ocrjob")]
#[command(version)]
pub struct Cli {
    /// Image files to submit together as one job
    pub files: Vec<PathBuf>,

    /// Job Service base URL [env: OCR_API_BASE_URL]
    #[arg(long)]
    pub base_url: Option<String>,

    /// Delay between status checks in milliseconds [env: OCR_POLL_INTERVAL_MS]
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Maximum number of status checks before giving up [env: OCR_POLL_MAX_ATTEMPTS]
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_attempts: Option<u32>,

    /// Per-request HTTP timeout in seconds [env: OCR_REQUEST_TIMEOUT_SECS]
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub request_timeout_secs: Option<u64>,

    /// Also write the result JSON to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl Cli {
    /// Overlay command-line flags on a configuration loaded from the
    /// environment.
    pub fn apply(&self, mut config: ClientConfig) -> ClientConfig {
        if let Some(url) = &self.base_url {
            config.base_url = url.clone();
        }
        if let Some(ms) = self.poll_interval_ms {
            config.poll.interval = Duration::from_millis(ms);
        }
        if let Some(n) = self.max_attempts {
            config.poll.max_attempts = n;
        }
        if let Some(secs) = self.request_timeout_secs {
            config.request_timeout = Duration::from_secs(secs);
        }
        config
    }
}
