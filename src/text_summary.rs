//! Text summary builder for CLI output.
//!
//! This module formats human-readable lines for text mode.

use crate::analysis::{AnalysisState, ChartRender, Rendering};
use crate::metrics;
use crate::model::{PokemonRecord, RunStatus, VisibilityFlags};

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

pub(crate) fn status_line(status: &RunStatus) -> String {
    format!("[{}] {}", status.label(), status.message())
}

/// Status plus, when visible, the filtered records.
pub(crate) fn build_session_summary(
    status: &RunStatus,
    flags: VisibilityFlags,
    records: &[PokemonRecord],
) -> TextSummary {
    let mut lines = vec![status_line(status)];
    if !flags.results_shown {
        return TextSummary { lines };
    }
    lines.push(format!("{} Found", records.len()));
    if records.is_empty() {
        lines.push("No Pokémon match your filters".into());
        return TextSummary { lines };
    }
    let width = records.iter().map(|r| r.name.chars().count()).max().unwrap_or(0);
    for r in records {
        let filled = (metrics::hp_fraction(r.hp) * 20.0).round() as usize;
        lines.push(format!(
            "  {} {:<width$}  HP {:>3} {}{}",
            r.avatar(),
            r.name,
            r.hp,
            "█".repeat(filled),
            "░".repeat(20 - filled),
        ));
    }
    TextSummary { lines }
}

pub(crate) fn build_analysis_summary(state: &AnalysisState) -> TextSummary {
    let lines = match state {
        AnalysisState::Idle => vec!["No analysis requested".to_string()],
        AnalysisState::Loading => vec!["Analyzing...".to_string()],
        AnalysisState::Failed(msg) => vec![msg.clone()],
        AnalysisState::Ready(rendering) => rendering_lines(rendering),
    };
    TextSummary { lines }
}

fn rendering_lines(rendering: &Rendering) -> Vec<String> {
    let mut lines = Vec::new();
    for chart in &rendering.charts {
        lines.push(format!("== {} ({}) ==", chart.title, chart.id));
        match &chart.render {
            ChartRender::Radar { axes, range } => {
                lines.push(format!("  radial range 0 – {:.1}", range.1));
                for a in axes {
                    lines.push(format!("  {:<16} {:.2}", a.label, a.value));
                }
            }
            ChartRender::Pie { slices } => {
                let values: Vec<f64> = slices.iter().map(|s| s.value).collect();
                let shares = metrics::percent_shares(&values);
                for (i, s) in slices.iter().enumerate() {
                    match shares.as_ref() {
                        Some(p) => {
                            lines.push(format!("  {:<16} {} ({:.1}%)", s.label, s.value, p[i]))
                        }
                        None => lines.push(format!("  {:<16} {}", s.label, s.value)),
                    }
                }
            }
            ChartRender::Bar { bars } => {
                for b in bars {
                    lines.push(format!("  {:<24} {}", b.label, b.value));
                }
            }
        }
    }
    for skipped in &rendering.skipped {
        lines.push(format!("(skipped {}: {})", skipped.id, skipped.reason));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{render_all, AnalysisDataset};
    use serde_json::json;

    #[test]
    fn hidden_results_print_status_only() {
        let s = build_session_summary(&RunStatus::default(), VisibilityFlags::default(), &[]);
        assert_eq!(s.lines, vec!["[ready] Ready to process your data".to_string()]);
    }

    #[test]
    fn empty_results_say_so() {
        let flags = VisibilityFlags {
            filters_shown: true,
            results_shown: true,
        };
        let s = build_session_summary(&RunStatus::Succeeded("ok".into()), flags, &[]);
        assert_eq!(s.lines[1], "0 Found");
        assert_eq!(s.lines[2], "No Pokémon match your filters");
    }

    #[test]
    fn pie_lines_show_percent_share() {
        let dataset = AnalysisDataset::from_response(json!({
            "data": {"type_distribution": {"title": "Type Distribution", "type": "pie",
                                           "data": {"water": 3, "fire": 1}}}
        }))
        .unwrap();
        let s = build_analysis_summary(&AnalysisState::Ready(render_all(&dataset)));
        assert!(s.lines[1].contains("Water"));
        assert!(s.lines[1].ends_with("(75.0%)"));
    }
}
