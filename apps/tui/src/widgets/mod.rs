//! Reusable TUI widgets.

use insightlens_shared::ConnectionType;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Bottom status bar.
pub(crate) fn status_bar<'a>(msg: &'a str, backend: &'a str) -> Paragraph<'a> {
    Paragraph::new(Line::from(vec![
        Span::raw(format!(" {msg}")),
        Span::styled(format!("  ·  {backend}"), Style::default().fg(Color::Gray)),
    ]))
    .style(Style::default().bg(Color::DarkGray).fg(Color::White))
}

/// Accent color for a recommendation's relationship.
pub(crate) fn connection_color(kind: ConnectionType) -> Color {
    match kind {
        ConnectionType::Elaboration => Color::Green,
        ConnectionType::Correlation => Color::Cyan,
        ConnectionType::Contradiction => Color::Red,
        ConnectionType::Context => Color::Gray,
    }
}
