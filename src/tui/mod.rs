mod charts;
mod export;
mod help;
mod state;

use crate::analysis::{AnalysisState, KNOWN_CHARTS};
use crate::cli::{build_config, open_app, Cli};
use crate::metrics;
use crate::model::{CriteriaEdit, RemoteEvent, RunStatus};
use crate::orchestrator::App;
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs, Wrap},
    Terminal,
};
use state::{EditField, UiState, TAB_ANALYSIS, TAB_HELP, TAB_PIPELINE};
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc::UnboundedReceiver;

const HP_GAUGE_WIDTH: usize = 20;
const CHART_ROW_HEIGHT: u16 = 14;

pub async fn run(args: Cli) -> Result<()> {
    let cfg = build_config(&args);
    let (app, event_rx) = open_app(&cfg)?;

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    // Remote calls it issues are still spawned onto this runtime.
    let runtime = tokio::runtime::Handle::current();
    let ui_handle = std::thread::spawn(move || {
        let _guard = runtime.enter();
        run_threaded(app, event_rx)
    });

    match tokio::task::spawn_blocking(move || ui_handle.join()).await {
        Ok(Ok(res)) => res,
        Ok(Err(_)) => Err(anyhow::anyhow!("TUI thread panicked")),
        Err(e) => Err(e).context("join TUI thread"),
    }
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(mut app: App, mut event_rx: UnboundedReceiver<RemoteEvent>) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let mut state = UiState::default();
    let tick_rate = Duration::from_millis(50);
    terminal.draw(|f| draw(f.area(), f, &app, &state)).ok();
    let mut last_tick = Instant::now();

    let res = loop {
        // Drain continuations without blocking to keep the UI responsive.
        while let Ok(ev) = event_rx.try_recv() {
            apply_event(&mut app, &mut state, ev);
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &app, &state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                if handle_key(&mut app, &mut state, k) {
                    break Ok(());
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

fn apply_event(app: &mut App, state: &mut UiState, ev: RemoteEvent) {
    let is_analysis = match &ev {
        RemoteEvent::AnalysisFinished { seq, .. } | RemoteEvent::ChartFinished { seq, .. } => {
            *seq == app.analysis().latest_seq()
        }
        _ => false,
    };
    app.handle(ev);
    if is_analysis {
        state.mark_analysis_ready(Instant::now());
    }
}

/// Apply one key press. Returns true when the user asked to quit.
fn handle_key(app: &mut App, state: &mut UiState, k: KeyEvent) -> bool {
    if let (KeyModifiers::CONTROL, KeyCode::Char('c')) = (k.modifiers, k.code) {
        return true;
    }

    if state.editing.is_some() {
        match k.code {
            KeyCode::Enter => {
                if let Some(edit) = state.commit() {
                    app.edit_filter(edit);
                }
            }
            KeyCode::Esc => state.cancel(),
            KeyCode::Backspace => state.pop_char(),
            KeyCode::Char(c) => state.push_char(c),
            _ => {}
        }
        return false;
    }

    match k.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('r') => {
            state.tab = TAB_PIPELINE;
            state.info = match app.start_pipeline() {
                Ok(()) => String::new(),
                Err(e) => e.to_string(),
            };
        }
        KeyCode::Char(c @ ('t' | 'h')) => {
            if app.flags().filters_shown {
                state.tab = TAB_PIPELINE;
                let field = if c == 't' {
                    EditField::TypeName
                } else {
                    EditField::HpMin
                };
                state.begin_edit(field, app.criteria());
            } else {
                state.info = "Run the pipeline to unlock filters".into();
            }
        }
        KeyCode::Char('e') => {
            if app.flags().filters_shown {
                let evolved = !app.criteria().is_evolved;
                app.edit_filter(CriteriaEdit::Evolved(evolved));
            }
        }
        KeyCode::Char('a') => {
            state.tab = TAB_ANALYSIS;
            app.request_analysis();
        }
        KeyCode::Char(c @ '1'..='6') if state.tab == TAB_ANALYSIS => {
            let idx = (c as usize) - ('1' as usize);
            if let Some(name) = KNOWN_CHARTS.get(idx) {
                if let Err(e) = app.request_chart(name) {
                    state.info = e;
                }
            }
        }
        KeyCode::Char('y') => {
            if app.flags().results_shown && !app.records().is_empty() {
                let text = export::records_text(app.records());
                state.info = match export::copy_to_clipboard(&text) {
                    Ok(()) => format!("✓ Copied {} name(s) to clipboard", app.records().len()),
                    Err(e) => format!("Clipboard copy failed: {e:#}"),
                };
            } else {
                state.info = "No results to copy".into();
            }
        }
        KeyCode::Char('x') => {
            state.info = match app.reset() {
                Ok(()) => "Session reset".into(),
                Err(e) => e.to_string(),
            };
        }
        KeyCode::Tab => state.next_tab(),
        KeyCode::Char('?') => state.tab = TAB_HELP,
        KeyCode::Up | KeyCode::Char('k') => scroll(app, state, -1),
        KeyCode::Down | KeyCode::Char('j') => scroll(app, state, 1),
        _ => {}
    }
    false
}

fn scroll(app: &App, state: &mut UiState, delta: isize) {
    if let AnalysisState::Ready(rendering) = app.analysis().state() {
        state.scroll_charts(delta, rendering.charts.len());
    }
}

fn draw(area: Rect, f: &mut ratatui::Frame, app: &App, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(area);

    let tabs = Tabs::new(vec![
        Line::from("Pipeline"),
        Line::from("Analysis"),
        Line::from("Help"),
    ])
    .select(state.tab)
    .block(Block::default().borders(Borders::ALL).title("pokelytics"))
    .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match state.tab {
        TAB_PIPELINE => draw_pipeline(chunks[1], f, app, state),
        TAB_ANALYSIS => draw_analysis(chunks[1], f, app, state),
        _ => help::draw_help(chunks[1], f),
    }
}

fn status_color(status: &RunStatus) -> Color {
    match status {
        RunStatus::Ready(_) => Color::Gray,
        RunStatus::Running(_) => Color::Yellow,
        RunStatus::Succeeded(_) => Color::Green,
        RunStatus::Failed(_) => Color::Red,
    }
}

fn draw_pipeline(area: Rect, f: &mut ratatui::Frame, app: &App, state: &UiState) {
    let flags = app.flags();
    let main = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(4),                                     // Status
                Constraint::Length(if flags.filters_shown { 5 } else { 0 }), // Filters
                Constraint::Min(0),                                        // Results
                Constraint::Length(1),                                     // Info
            ]
            .as_ref(),
        )
        .split(area);

    let status = app.status();
    let run_hint = if status.is_running() {
        Span::styled("running…", Style::default().fg(Color::DarkGray))
    } else {
        Span::styled("press r to run", Style::default().fg(Color::DarkGray))
    };
    let p = Paragraph::new(vec![
        Line::from(Span::styled(
            status.message().to_string(),
            Style::default()
                .fg(status_color(status))
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(run_hint),
    ])
    .wrap(Wrap { trim: true })
    .block(Block::default().borders(Borders::ALL).title("ETL Pipeline"));
    f.render_widget(p, main[0]);

    if flags.filters_shown {
        f.render_widget(filters_panel(app, state), main[1]);
    }
    if flags.results_shown {
        draw_results(main[2], f, app);
    }

    f.render_widget(
        Paragraph::new(state.info.clone()).style(Style::default().fg(Color::Gray)),
        main[3],
    );
}

fn filters_panel<'a>(app: &App, state: &'a UiState) -> Paragraph<'a> {
    let criteria = app.criteria();
    let field_line = |field: EditField, saved: &str| {
        let editing = state.editing == Some(field);
        let value = if editing {
            format!("{}▏", state.input)
        } else if saved.is_empty() {
            "any".to_string()
        } else {
            saved.to_string()
        };
        let value_style = if editing {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        Line::from(vec![
            Span::styled(format!("{:<8}", field.label()), Style::default().fg(Color::Gray)),
            Span::styled(value, value_style),
        ])
    };
    let evolved = if criteria.is_evolved { "[x]" } else { "[ ]" };
    Paragraph::new(vec![
        field_line(EditField::TypeName, &criteria.type_name),
        field_line(EditField::HpMin, &criteria.hp_min),
        Line::from(vec![
            Span::styled(format!("{:<8}", "Evolved"), Style::default().fg(Color::Gray)),
            Span::raw(evolved),
        ]),
    ])
    .block(Block::default().borders(Borders::ALL).title("Filters (t / h / e)"))
}

fn draw_results(area: Rect, f: &mut ratatui::Frame, app: &App) {
    let records = app.records();
    let title = format!("{} Found", records.len());
    let lines: Vec<Line> = if records.is_empty() {
        vec![Line::from(Span::styled(
            "No Pokémon match your filters",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        let width = records
            .iter()
            .map(|r| r.name.chars().count())
            .max()
            .unwrap_or(0);
        records
            .iter()
            .map(|r| {
                let filled = (metrics::hp_fraction(r.hp) * HP_GAUGE_WIDTH as f64).round() as usize;
                Line::from(vec![
                    Span::styled(r.avatar(), Style::default().fg(Color::Cyan)),
                    Span::raw(format!(" {:<width$}  ", r.name)),
                    Span::styled(format!("HP {:>3} ", r.hp), Style::default().fg(Color::Gray)),
                    Span::styled("█".repeat(filled), Style::default().fg(Color::Green)),
                    Span::styled(
                        "░".repeat(HP_GAUGE_WIDTH.saturating_sub(filled)),
                        Style::default().fg(Color::DarkGray),
                    ),
                ])
            })
            .collect()
    };
    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(p, area);
}

fn draw_analysis(area: Rect, f: &mut ratatui::Frame, app: &App, state: &UiState) {
    let main = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)].as_ref())
        .split(area);

    match app.analysis().state() {
        AnalysisState::Idle => {
            let p = Paragraph::new("Press a to fetch the analysis, 1-6 for a single chart")
                .block(Block::default().borders(Borders::ALL).title("Analysis"));
            f.render_widget(p, main[0]);
        }
        AnalysisState::Loading => {
            let p = Paragraph::new(Span::styled(
                "Analyzing...",
                Style::default().fg(Color::Yellow),
            ))
            .block(Block::default().borders(Borders::ALL).title("Analysis"));
            f.render_widget(p, main[0]);
        }
        AnalysisState::Failed(msg) => {
            let p = Paragraph::new(Span::styled(msg.clone(), Style::default().fg(Color::Red)))
                .wrap(Wrap { trim: true })
                .block(Block::default().borders(Borders::ALL).title("Analysis"));
            f.render_widget(p, main[0]);
        }
        AnalysisState::Ready(rendering) => {
            let revealed = state.revealed_charts(rendering, Instant::now());
            let visible: Vec<_> = rendering
                .charts
                .iter()
                .take(revealed)
                .skip(state.chart_offset)
                .collect();
            let rows = (main[0].height / CHART_ROW_HEIGHT).max(1) as usize;
            let row_areas = Layout::default()
                .direction(Direction::Vertical)
                .constraints(vec![Constraint::Ratio(1, rows as u32); rows])
                .split(main[0]);
            for (row, pair) in visible.chunks(2).take(rows).enumerate() {
                let cols = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints([Constraint::Percentage(50), Constraint::Percentage(50)].as_ref())
                    .split(row_areas[row]);
                for (col, chart) in pair.iter().enumerate() {
                    charts::render_chart(f, cols[col], chart);
                }
            }

            let total = app
                .analysis()
                .dataset()
                .map(|d| d.entries.len())
                .unwrap_or(rendering.charts.len());
            let mut footer = format!("{} of {} chart(s)", revealed, total);
            if !rendering.skipped.is_empty() {
                let ids: Vec<&str> = rendering.skipped.iter().map(|s| s.id.as_str()).collect();
                footer.push_str(&format!("  skipped: {}", ids.join(", ")));
            }
            if !state.info.is_empty() {
                footer.push_str(&format!("  {}", state.info));
            }
            f.render_widget(
                Paragraph::new(footer).style(Style::default().fg(Color::Gray)),
                main[1],
            );
            return;
        }
    }
    f.render_widget(
        Paragraph::new(state.info.clone()).style(Style::default().fg(Color::Gray)),
        main[1],
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::ScriptedGateway;
    use crate::storage::{MemoryStore, SessionPersistence};
    use std::sync::Arc;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app() -> (App, UnboundedReceiver<RemoteEvent>) {
        let gateway = Arc::new(ScriptedGateway::with_records(Vec::new()));
        App::new(
            gateway,
            SessionPersistence::new(Box::new(MemoryStore::default())),
        )
    }

    #[tokio::test]
    async fn filters_are_locked_until_a_run_succeeds() {
        let (mut app, _rx) = app();
        let mut state = UiState::default();
        assert!(!handle_key(&mut app, &mut state, press(KeyCode::Char('t'))));
        assert!(state.editing.is_none());
        assert_eq!(state.info, "Run the pipeline to unlock filters");
    }

    #[tokio::test]
    async fn typed_filter_is_applied_on_enter() {
        let (mut app, mut rx) = app();
        app.start_pipeline().unwrap();
        app.settle(&mut rx).await;
        assert!(app.flags().filters_shown);

        let mut state = UiState::default();
        handle_key(&mut app, &mut state, press(KeyCode::Char('t')));
        // 'q' is text while editing, not quit.
        for c in ['w', 'a', 'q'] {
            assert!(!handle_key(&mut app, &mut state, press(KeyCode::Char(c))));
        }
        handle_key(&mut app, &mut state, press(KeyCode::Backspace));
        handle_key(&mut app, &mut state, press(KeyCode::Enter));
        assert_eq!(app.criteria().type_name, "wa");
        app.settle(&mut rx).await;
    }

    #[tokio::test]
    async fn second_run_press_reports_in_progress() {
        let (mut app, mut rx) = app();
        let mut state = UiState::default();
        handle_key(&mut app, &mut state, press(KeyCode::Char('r')));
        handle_key(&mut app, &mut state, press(KeyCode::Char('r')));
        assert_eq!(state.info, "a pipeline run is already in progress");
        app.settle(&mut rx).await;
    }

    #[tokio::test]
    async fn quit_keys() {
        let (mut app, _rx) = app();
        let mut state = UiState::default();
        assert!(handle_key(&mut app, &mut state, press(KeyCode::Char('q'))));
        assert!(handle_key(
            &mut app,
            &mut state,
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)
        ));
    }
}
