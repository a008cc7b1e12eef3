use crate::analysis::{AnalysisState, RenderedChart};
use crate::gateway::HttpGateway;
use crate::model::{
    ClientConfig, CriteriaEdit, FilterCriteria, PokemonRecord, RemoteEvent, RunStatus,
    VisibilityFlags,
};
use crate::orchestrator::App;
use crate::storage::{self, FileStore, SessionPersistence};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "pokelytics",
    version,
    about = "Run the Pokelytics ETL pipeline, filter its results and chart the analysis"
)]
pub struct Cli {
    /// Base URL of the Pokelytics backend
    #[arg(long, default_value = "http://localhost:8000")]
    pub base_url: String,

    /// Session file (defaults to the platform data dir)
    #[arg(long)]
    pub session_file: Option<PathBuf>,

    /// Timeout for each backend request
    #[arg(long, default_value = "30s")]
    pub timeout: humantime::Duration,

    /// Print JSON instead of text (non-interactive commands only)
    #[arg(long, global = true)]
    pub json: bool,

    /// Write logs to this file (the TUI logs nowhere otherwise)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the ETL pipeline, then load results with the saved filters
    Run,
    /// Edit the saved filters and print the matching Pokémon
    Filter {
        /// Type name, e.g. water (empty string clears it)
        #[arg(long = "type")]
        type_name: Option<String>,
        /// Minimum HP (empty string clears it)
        #[arg(long)]
        hp_min: Option<String>,
        /// Only evolved Pokémon (--evolved false turns it off)
        #[arg(
            long,
            num_args = 0..=1,
            default_missing_value = "true",
            action = clap::ArgAction::Set
        )]
        evolved: Option<bool>,
    },
    /// Fetch the analysis dataset and print every chart
    Analysis {
        /// Fetch a single chart by name, e.g. type_distribution
        #[arg(long)]
        chart: Option<String>,
    },
    /// Print the saved session without contacting the backend
    Status,
    /// Forget the saved session
    Reset,
}

/// Build a `ClientConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> ClientConfig {
    ClientConfig {
        base_url: args.base_url.clone(),
        timeout: Duration::from(args.timeout),
        user_agent: format!("pokelytics/{}", env!("CARGO_PKG_VERSION")),
        session_file: args
            .session_file
            .clone()
            .unwrap_or_else(storage::default_session_path),
    }
}

pub(crate) fn open_persistence(cfg: &ClientConfig) -> Result<SessionPersistence> {
    let store = FileStore::open(&cfg.session_file)?;
    Ok(SessionPersistence::new(Box::new(store)))
}

/// Hydrate the session and wire it to the HTTP backend.
pub(crate) fn open_app(cfg: &ClientConfig) -> Result<(App, UnboundedReceiver<RemoteEvent>)> {
    let gateway = HttpGateway::new(cfg)?;
    let persistence = open_persistence(cfg)?;
    Ok(App::new(Arc::new(gateway), persistence))
}

pub async fn run(args: Cli) -> Result<()> {
    match args.command.clone() {
        Some(command) => run_command(&args, command).await,
        #[cfg(feature = "tui")]
        None => crate::tui::run(args).await,
        // Fallback when built without TUI support.
        #[cfg(not(feature = "tui"))]
        None => run_command(&args, Command::Status).await,
    }
}

fn generated_at() -> Result<String> {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .context("format timestamp")
}

#[derive(Serialize)]
struct SessionView<'a> {
    generated_at: String,
    status: &'a RunStatus,
    flags: VisibilityFlags,
    criteria: &'a FilterCriteria,
    records: &'a [PokemonRecord],
}

#[derive(Serialize)]
struct AnalysisView<'a> {
    generated_at: String,
    charts: &'a [RenderedChart],
    skipped: Vec<String>,
    error: Option<&'a str>,
}

async fn run_command(args: &Cli, command: Command) -> Result<()> {
    let cfg = build_config(args);
    let (out_tx, out_handle) = spawn_output_writer();

    let res = match command {
        Command::Status => {
            let snap = open_persistence(&cfg)?.hydrate();
            emit_session(
                args,
                &out_tx,
                &snap.status,
                snap.flags,
                &snap.criteria,
                &snap.records,
            )
        }
        Command::Reset => {
            open_persistence(&cfg)?.clear();
            let _ = out_tx.send(OutputLine::Stderr(format!(
                "Session cleared: {}",
                cfg.session_file.display()
            )));
            Ok(())
        }
        Command::Run => {
            let (mut app, mut event_rx) = open_app(&cfg)?;
            app.start_pipeline()?;
            let _ = out_tx.send(OutputLine::Stderr(app.status().message().to_string()));
            app.settle(&mut event_rx).await;
            emit_app(args, &out_tx, &app)
        }
        Command::Filter {
            type_name,
            hp_min,
            evolved,
        } => {
            let (mut app, mut event_rx) = open_app(&cfg)?;
            let edits = [
                type_name.map(CriteriaEdit::TypeName),
                hp_min.map(CriteriaEdit::HpMin),
                evolved.map(CriteriaEdit::Evolved),
            ];
            for edit in edits.into_iter().flatten() {
                app.edit_filter(edit);
            }
            if !app.flags().filters_shown {
                let _ = out_tx.send(OutputLine::Stderr(
                    "Filters saved. Run the pipeline first: pokelytics run".into(),
                ));
            }
            app.settle(&mut event_rx).await;
            emit_app(args, &out_tx, &app)
        }
        Command::Analysis { chart } => {
            let (mut app, mut event_rx) = open_app(&cfg)?;
            match chart.as_deref() {
                Some(name) => app.request_chart(name).map_err(anyhow::Error::msg)?,
                None => app.request_analysis(),
            }
            app.settle(&mut event_rx).await;
            emit_analysis(args, &out_tx, app.analysis().state())
        }
    };

    drop(out_tx);
    let _ = out_handle.await;
    res
}

fn emit_app(args: &Cli, out_tx: &mpsc::UnboundedSender<OutputLine>, app: &App) -> Result<()> {
    emit_session(
        args,
        out_tx,
        app.status(),
        app.flags(),
        app.criteria(),
        app.records(),
    )?;
    if let RunStatus::Failed(msg) = app.status() {
        return Err(anyhow::anyhow!("{msg}"));
    }
    Ok(())
}

fn emit_session(
    args: &Cli,
    out_tx: &mpsc::UnboundedSender<OutputLine>,
    status: &RunStatus,
    flags: VisibilityFlags,
    criteria: &FilterCriteria,
    records: &[PokemonRecord],
) -> Result<()> {
    if args.json {
        let view = SessionView {
            generated_at: generated_at()?,
            status,
            flags,
            criteria,
            records,
        };
        let out = serde_json::to_string_pretty(&view).context("encode session")?;
        let _ = out_tx.send(OutputLine::Stdout(out));
        return Ok(());
    }
    let summary = crate::text_summary::build_session_summary(status, flags, records);
    for line in summary.lines {
        let _ = out_tx.send(OutputLine::Stdout(line));
    }
    Ok(())
}

fn emit_analysis(
    args: &Cli,
    out_tx: &mpsc::UnboundedSender<OutputLine>,
    state: &AnalysisState,
) -> Result<()> {
    if args.json {
        let generated_at = generated_at()?;
        let view = match state {
            AnalysisState::Ready(r) => AnalysisView {
                generated_at,
                charts: &r.charts,
                skipped: r
                    .skipped
                    .iter()
                    .map(|s| format!("{}: {}", s.id, s.reason))
                    .collect(),
                error: None,
            },
            AnalysisState::Failed(msg) => AnalysisView {
                generated_at,
                charts: &[],
                skipped: Vec::new(),
                error: Some(msg),
            },
            AnalysisState::Idle | AnalysisState::Loading => AnalysisView {
                generated_at,
                charts: &[],
                skipped: Vec::new(),
                error: None,
            },
        };
        let out = serde_json::to_string_pretty(&view).context("encode analysis")?;
        let _ = out_tx.send(OutputLine::Stdout(out));
    } else {
        for line in crate::text_summary::build_analysis_summary(state).lines {
            let _ = out_tx.send(OutputLine::Stdout(line));
        }
    }
    if let AnalysisState::Failed(msg) = state {
        return Err(anyhow::anyhow!("{msg}"));
    }
    Ok(())
}
