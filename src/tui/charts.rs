use ratatui::{
    layout::{Direction, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::canvas::Line as CanvasLine,
    widgets::{canvas::Canvas, Bar, BarChart, BarGroup, Block, Borders, Paragraph},
    Frame,
};
use std::f64::consts::PI;

use crate::analysis::{BarEntry, ChartRender, RadarAxis, RenderedChart, Slice};

const PALETTE: [Color; 8] = [
    Color::Cyan,
    Color::Yellow,
    Color::Green,
    Color::Magenta,
    Color::LightRed,
    Color::Blue,
    Color::LightGreen,
    Color::Gray,
];

const PIE_BAR_WIDTH: usize = 24;

/// Helper function to draw a line on a canvas
pub fn draw_line(
    ctx: &mut ratatui::widgets::canvas::Context,
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    color: Color,
) {
    ctx.draw(&CanvasLine {
        x1,
        y1,
        x2,
        y2,
        color,
    });
}

/// Unit-circle point for axis `i` of `n`, starting at twelve o'clock.
pub fn radar_point(i: usize, n: usize, r: f64) -> (f64, f64) {
    let angle = PI / 2.0 - 2.0 * PI * i as f64 / n as f64;
    (r * angle.cos(), r * angle.sin())
}

pub fn render_chart(f: &mut Frame, area: Rect, chart: &RenderedChart) {
    let title = Line::from(vec![
        Span::styled(chart.title.clone(), Style::default().fg(Color::White)),
        Span::styled(format!(" ({})", chart.id), Style::default().fg(Color::DarkGray)),
    ]);
    match &chart.render {
        ChartRender::Radar { axes, range } => render_radar(f, area, title, axes, *range),
        ChartRender::Pie { slices } => render_pie(f, area, title, slices),
        ChartRender::Bar { bars } => render_bar(f, area, title, bars),
    }
}

fn render_radar(f: &mut Frame, area: Rect, title: Line, axes: &[RadarAxis], range: (f64, f64)) {
    let n = axes.len();
    let span = range.1 - range.0;
    let radii: Vec<f64> = axes
        .iter()
        .map(|a| {
            if span > 0.0 {
                ((a.value - range.0) / span).clamp(0.0, 1.0)
            } else {
                0.0
            }
        })
        .collect();
    let labels: Vec<String> = axes.iter().map(|a| a.label.clone()).collect();

    let canvas = Canvas::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .title_bottom(Line::from(format!("0 – {:.1}", range.1)).right_aligned()),
        )
        .x_bounds([-1.6, 1.6])
        .y_bounds([-1.3, 1.3])
        .paint(move |ctx| {
            if n == 0 {
                return;
            }
            // Grid rings and spokes
            for ring in [0.5, 1.0] {
                for i in 0..n {
                    let (x1, y1) = radar_point(i, n, ring);
                    let (x2, y2) = radar_point((i + 1) % n, n, ring);
                    draw_line(ctx, x1, y1, x2, y2, Color::DarkGray);
                }
            }
            for i in 0..n {
                let (x, y) = radar_point(i, n, 1.0);
                draw_line(ctx, 0.0, 0.0, x, y, Color::DarkGray);
            }

            // Series polygon
            for i in 0..n {
                let (x1, y1) = radar_point(i, n, radii[i]);
                let (x2, y2) = radar_point((i + 1) % n, n, radii[(i + 1) % n]);
                draw_line(ctx, x1, y1, x2, y2, Color::Cyan);
            }

            for (i, label) in labels.iter().enumerate() {
                let (x, y) = radar_point(i, n, 1.15);
                ctx.print(x, y, label.clone());
            }
        });
    f.render_widget(canvas, area);
}

/// Share bars per slice, with the percentage computed only for display.
pub fn pie_lines(slices: &[Slice]) -> Vec<Line<'static>> {
    let values: Vec<f64> = slices.iter().map(|s| s.value).collect();
    let shares = crate::metrics::percent_shares(&values);
    let width = slices
        .iter()
        .map(|s| s.label.chars().count())
        .max()
        .unwrap_or(0);

    slices
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let color = PALETTE[i % PALETTE.len()];
            let share = shares.as_ref().map(|p| p[i]).unwrap_or(0.0);
            let filled = ((share / 100.0) * PIE_BAR_WIDTH as f64).round() as usize;
            Line::from(vec![
                Span::styled("● ", Style::default().fg(color)),
                Span::raw(format!("{:<width$} ", s.label)),
                Span::styled("█".repeat(filled), Style::default().fg(color)),
                Span::raw(" ".repeat(PIE_BAR_WIDTH.saturating_sub(filled))),
                Span::styled(
                    format!(" {:>5.1}%  ({})", share, s.value),
                    Style::default().fg(Color::Gray),
                ),
            ])
        })
        .collect()
}

fn render_pie(f: &mut Frame, area: Rect, title: Line, slices: &[Slice]) {
    let p = Paragraph::new(pie_lines(slices))
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(p, area);
}

fn render_bar(f: &mut Frame, area: Rect, title: Line, bars: &[BarEntry]) {
    let max = crate::metrics::max_value(&bars.iter().map(|b| b.value).collect::<Vec<_>>())
        .unwrap_or(0.0)
        .max(1.0);
    let data: Vec<Bar> = bars
        .iter()
        .enumerate()
        .map(|(i, b)| {
            Bar::default()
                .value(b.value.max(0.0).round() as u64)
                .text_value(format!("{}", b.value))
                .label(Line::from(b.label.clone()))
                .style(Style::default().fg(PALETTE[i % PALETTE.len()]))
        })
        .collect();

    let chart = BarChart::default()
        .block(Block::default().borders(Borders::ALL).title(title))
        .direction(Direction::Horizontal)
        .data(BarGroup::default().bars(&data))
        .bar_width(1)
        .bar_gap(0)
        .max(max.ceil() as u64);
    f.render_widget(chart, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_axis_points_up() {
        let (x, y) = radar_point(0, 6, 1.0);
        assert!(x.abs() < 1e-9);
        assert!((y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn pie_lines_carry_percent_share() {
        let slices = vec![
            Slice {
                label: "Water".into(),
                value: 3.0,
            },
            Slice {
                label: "Fire".into(),
                value: 1.0,
            },
        ];
        let lines = pie_lines(&slices);
        let text: String = lines[0].spans.iter().map(|s| s.content.as_ref()).collect();
        assert!(text.contains("Water"));
        assert!(text.contains("75.0%"));
    }
}
