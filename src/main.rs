mod board;
mod cli;
mod engine;
mod error;
mod filters;
mod model;
mod monitor;
mod orchestrator;
mod roster;
mod text_summary;
#[cfg(feature = "tui")]
mod tui;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Install the log subscriber. The TUI owns the terminal, so without a log
/// file it gets no subscriber at all.
fn init_tracing(args: &cli::Cli) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if let Some(path) = args.log_file.as_deref() {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open log file {}", path.display()))?;
        builder
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init();
    } else if args.json || args.text || args.command.is_some() {
        builder.with_writer(std::io::stderr).init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    init_tracing(&args)?;
    let is_non_tui = args.json || args.text || args.command.is_some();

    cli::run(args).await?;
    // A fire-and-forget stop notification may still be pending; don't wait on it.
    if is_non_tui {
        std::process::exit(0);
    }
    Ok(())
}
