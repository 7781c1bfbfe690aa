//! `ocrjob` -- submit image files to the OCR Job Service and print the
//! parsed result.
//!
//! # Environment variables
//!
//! | Variable                   | Required | Default                                | Description                     |
//! |----------------------------|----------|----------------------------------------|---------------------------------|
//! | `OCR_API_BASE_URL`         | no       | `https://ocr-api-1bet.onrender.com/v1` | Job Service base URL            |
//! | `OCR_POLL_INTERVAL_MS`     | no       | `2000`                                 | Delay between status checks     |
//! | `OCR_POLL_MAX_ATTEMPTS`    | no       | `150`                                  | Status checks before timing out |
//! | `OCR_REQUEST_TIMEOUT_SECS` | no       | `30`                                   | Per-request HTTP timeout        |
//! | `RUST_LOG`                 | no       | `ocrjob=info`                          | Log filter                      |
//! | `LOG_FORMAT`               | no       | --                                     | `json` for JSON log lines       |

use std::process::ExitCode;

use clap::Parser;
use ocrjob_cli::app;
use ocrjob_cli::args::Cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    match app::run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stdout carries only the result JSON.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ocrjob=info".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
