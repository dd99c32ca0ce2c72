//! tskdash - live task dashboard
//!
//! Follows a job system's task event stream and history listing, and shows
//! them as a filterable terminal dashboard.

use std::fs::OpenOptions;
use std::sync::Mutex;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use tskdash::cli::{Cli, LogTarget};
use tskdash::output::{emit_error, infer_command_name_from_args};

#[tokio::main]
async fn main() {
    let command = infer_command_name_from_args();
    let cli = Cli::parse();
    let json = cli.json && !cli.events_to_stdout();

    if let Err(err) = init_tracing(cli.log_target()) {
        let _ = emit_error(&command, &err, json);
        std::process::exit(err.exit_code());
    }

    if let Err(err) = cli.run().await {
        let _ = emit_error(&command, &err, json);
        std::process::exit(err.exit_code());
    }
}

fn init_tracing(target: LogTarget) -> tskdash::Result<()> {
    // Tracing is opt-in via RUST_LOG.
    // Keep startup robust in CI/robot envs: ignore invalid/huge filters.
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|raw| {
            let raw = raw.trim();
            if raw.is_empty() || raw.len() > 4096 {
                return None;
            }
            EnvFilter::try_new(raw).ok()
        })
        .unwrap_or_else(|| EnvFilter::new("off"));

    match target {
        LogTarget::Off => {}
        LogTarget::Stderr => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(filter)
                .init();
        }
        LogTarget::File(path) => {
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            tracing_subscriber::registry()
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .with(filter)
                .init();
        }
    }
    Ok(())
}
