use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

fn key_line(key: &'static str, pad: usize, desc: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(key, Style::default().fg(Color::Magenta)),
        Span::raw(" ".repeat(pad)),
        Span::raw(desc),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let p = Paragraph::new(vec![
        Line::from("Keybinds:"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("q", Style::default().fg(Color::Magenta)),
            Span::raw(" / "),
            Span::styled("Ctrl-C", Style::default().fg(Color::Magenta)),
            Span::raw("  Quit"),
        ]),
        key_line("r", 11, "Run ETL pipeline"),
        key_line("tab", 9, "Switch tabs"),
        key_line("?", 11, "Show this help"),
        key_line("x", 11, "Reset saved session"),
        Line::from(""),
        Line::from("Pipeline tab:"),
        key_line("t", 11, "Edit type filter"),
        key_line("h", 11, "Edit HP min filter"),
        key_line("e", 11, "Toggle evolved only"),
        key_line("Enter", 7, "Apply edit"),
        key_line("Esc", 9, "Cancel edit"),
        key_line("y", 11, "Copy result names to clipboard"),
        Line::from(""),
        Line::from("Analysis tab:"),
        key_line("a", 11, "Fetch analysis"),
        key_line("1-6", 9, "Fetch a single chart"),
        key_line("↑/↓", 9, "Scroll charts"),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
