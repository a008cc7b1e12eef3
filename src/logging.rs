//! Structured logging setup.
//!
//! Filtering follows `RUST_LOG`; without it only warnings and errors are shown. Logs
//! go to stderr, or to a file when one is given (the TUI owns the terminal, so it
//! logs nowhere unless a file is requested).

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::{Mutex, Once};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_DIRECTIVE: &str = "warn";

static INIT: Once = Once::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget<'a> {
    Stderr,
    File(&'a Path),
    Off,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Install the global subscriber. Later calls are ignored.
pub fn init(target: LogTarget<'_>) -> Result<()> {
    let writer = match target {
        LogTarget::Off => return Ok(()),
        LogTarget::File(path) => Some(
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("open log file {}", path.display()))?,
        ),
        LogTarget::Stderr => None,
    };

    INIT.call_once(|| {
        let registry = tracing_subscriber::registry().with(env_filter());
        let res = match writer {
            Some(file) => registry
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .try_init(),
            None => registry
                .with(fmt::layer().with_writer(std::io::stderr))
                .try_init(),
        };
        if let Err(e) = res {
            eprintln!("logging already initialized: {e}");
        }
    });
    Ok(())
}
