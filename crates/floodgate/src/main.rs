//! floodgate CLI: run one import job described by a YAML file.

use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use floodgate::{CliArgs, Config, ImportJob, init_tracing};
use floodgate_core::signal::cancel_on_shutdown;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args = CliArgs::parse();

    info!("Loading config from {}", args.config.display());

    let config = match Config::from_file(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(address) = &config.metrics.address {
        if let Err(e) = floodgate_core::metrics::init(address) {
            eprintln!("Failed to start metrics exporter: {e}");
            return ExitCode::FAILURE;
        }
    }

    info!(
        database = %config.database,
        files = config.files.len(),
        tables = config.schemas.len(),
        "Starting floodgate import"
    );

    let job = match ImportJob::connect(config).await {
        Ok(job) => job,
        Err(e) => {
            eprintln!("Failed to connect: {e}");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = CancellationToken::new();
    let signal_task = cancel_on_shutdown(shutdown.clone());
    let result = job.run(shutdown).await;
    signal_task.abort();
    job.close().await;

    match result {
        Ok(summary) => {
            info!(
                files = summary.files,
                bytes = summary.bytes,
                readiness_attempts = summary.readiness.attempts,
                "Import complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            if let Some(written) = e.partially_written() {
                error!(written, "Upload interrupted after bytes were already stored");
            }
            eprintln!("Import failed: {e}");
            ExitCode::FAILURE
        }
    }
}
