mod analysis;
mod cli;
mod gateway;
mod logging;
mod metrics;
mod model;
mod orchestrator;
mod storage;
mod text_summary;
#[cfg(feature = "tui")]
mod tui;

use anyhow::Result;
use clap::Parser;
use logging::LogTarget;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let is_non_tui = args.command.is_some() || cfg!(not(feature = "tui"));

    let target = match (&args.log_file, is_non_tui) {
        (Some(path), _) => LogTarget::File(path),
        (None, true) => LogTarget::Stderr,
        (None, false) => LogTarget::Off,
    };
    logging::init(target)?;

    cli::run(args).await?;
    // Explicitly exit with code 0 on success for non-TUI modes
    if is_non_tui {
        std::process::exit(0);
    }
    Ok(())
}
