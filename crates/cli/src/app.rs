//! One submit-and-wait run of the command-line client.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use ocrjob_client::{ClientConfig, JobController, JobEvent, OcrApi};
use ocrjob_core::error::JobError;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::args::Cli;
use crate::{input, render};

/// Load the files named on the command line, run them as one job, and
/// print the pretty-printed result to stdout.
///
/// Progress lines go to stderr. Ctrl-C resets the controller and ends the
/// run with [`JobError::Abandoned`].
pub async fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = cli.apply(ClientConfig::from_env()?);

    tracing::info!(
        base_url = %config.base_url,
        interval_ms = config.poll.interval.as_millis() as u64,
        max_attempts = config.poll.max_attempts,
        "Starting ocrjob",
    );

    let files = input::load_files(&cli.files).await?;
    let api = OcrApi::new(config.base_url.clone(), config.request_timeout)?;
    let controller = Arc::new(JobController::new(Arc::new(api), config.poll));
    let progress = tokio::spawn(print_progress(controller.subscribe()));

    let outcome = tokio::select! {
        result = controller.run(files) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, abandoning job");
            controller.reset();
            Err(JobError::Abandoned)
        }
    };

    controller.shutdown();
    // Dropping the controller closes the event channel so the printer ends.
    drop(controller);
    finish_progress(progress).await;

    let result = outcome?;
    let rendered = render::render_result(&result)?;
    println!("{rendered}");

    if let Some(path) = &cli.output {
        write_output(path, &rendered).await?;
    }

    Ok(())
}

async fn write_output(path: &Path, rendered: &str) -> anyhow::Result<()> {
    tokio::fs::write(path, format!("{rendered}\n"))
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), "Result written");
    Ok(())
}

/// Wait for the progress printer. Returns whether it ended cleanly; a
/// panic there is logged and does not fail the run.
async fn finish_progress(progress: JoinHandle<()>) -> bool {
    match progress.await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Progress printer failed");
            false
        }
    }
}

async fn print_progress(mut events: broadcast::Receiver<JobEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Some(line) = render::describe_event(&event) {
                    eprintln!("{line}");
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Progress printer lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
