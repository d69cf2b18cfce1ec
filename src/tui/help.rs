use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

fn key(k: &'static str, pad: usize, what: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(k, Style::default().fg(Color::Magenta)),
        Span::raw(" ".repeat(pad)),
        Span::raw(what),
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
            Span::raw("  Quit (stops any running task)"),
        ]),
        key("tab", 9, "Switch tabs"),
        key("?", 11, "Show this help"),
        Line::from(""),
        Line::from("Card lists:"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("↑/↓", Style::default().fg(Color::Magenta)),
            Span::raw(" or "),
            Span::styled("j/k", Style::default().fg(Color::Magenta)),
            Span::raw("  Navigate"),
        ]),
        key("enter", 7, "Run the AI task for the selected card"),
        key("a", 11, "Run all visible pending cards, one after another"),
        key("s", 11, "Stop the running task or batch"),
        key("/", 11, "Search by name (enter/esc to finish)"),
        key("f", 11, "Cycle filter: insurance, amount, priority"),
        key("o", 11, "Cycle sort order"),
        key("x", 11, "Close the result card"),
        Line::from(""),
        Line::from("Only one task runs at a time; a second trigger is rejected until it ends."),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
