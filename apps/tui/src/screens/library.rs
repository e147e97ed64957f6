//! "Library" screen: documents known to the backend.

use crossterm::event::{KeyCode, KeyModifiers};
use insightlens_shared::Document;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph};

use super::Action;

pub(crate) struct LibraryScreen {
    selected: usize,
    pub(crate) status: String,
}

impl LibraryScreen {
    pub(crate) fn new() -> Self {
        Self {
            selected: 0,
            status: "Press 'r' to refresh the library.".to_string(),
        }
    }

    /// Keep the cursor inside a list of `len` entries.
    pub(crate) fn clamp(&mut self, len: usize) {
        self.selected = self.selected.min(len.saturating_sub(1));
    }

    pub(crate) fn draw(&self, f: &mut Frame, area: Rect, documents: &[Document]) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Min(1),    // List
                Constraint::Length(3), // Status
            ])
            .split(area);

        if documents.is_empty() {
            let empty = Paragraph::new(
                "No documents yet.\n\nUpload PDFs from the Upload screen, \
                 or press 'r' to ask the backend again.",
            )
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title(" Library "));
            f.render_widget(empty, chunks[0]);
        } else {
            let items: Vec<ListItem> = documents
                .iter()
                .enumerate()
                .map(|(i, doc)| {
                    let style = if i == self.selected {
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
                    } else {
                        Style::default()
                    };
                    let prefix = if i == self.selected { "▸ " } else { "  " };
                    ListItem::new(format!(
                        "{prefix}{}  ({})  {}",
                        doc.name,
                        doc.id,
                        doc.uploaded_at.format("%Y-%m-%d %H:%M")
                    ))
                    .style(style)
                })
                .collect();

            let list = List::new(items).block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!(" Library ({}) ", documents.len())),
            );
            f.render_widget(list, chunks[0]);
        }

        let status = Paragraph::new(self.status.as_str())
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center);
        f.render_widget(status, chunks[1]);
    }

    pub(crate) fn handle_key(
        &mut self,
        code: KeyCode,
        _modifiers: KeyModifiers,
        len: usize,
    ) -> Option<Action> {
        match code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
                None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < len {
                    self.selected += 1;
                }
                None
            }
            KeyCode::Char('r') => Some(Action::RefreshLibrary),
            KeyCode::Char('u') => Some(Action::ShowUpload),
            KeyCode::Enter if len > 0 => Some(Action::OpenDocument(self.selected)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_stays_in_bounds() {
        let mut screen = LibraryScreen::new();
        screen.handle_key(KeyCode::Up, KeyModifiers::NONE, 2);
        screen.handle_key(KeyCode::Down, KeyModifiers::NONE, 2);
        screen.handle_key(KeyCode::Down, KeyModifiers::NONE, 2);

        let action = screen.handle_key(KeyCode::Enter, KeyModifiers::NONE, 2);
        assert_eq!(action, Some(Action::OpenDocument(1)));
    }

    #[test]
    fn enter_on_empty_library_does_nothing() {
        let mut screen = LibraryScreen::new();
        assert_eq!(screen.handle_key(KeyCode::Enter, KeyModifiers::NONE, 0), None);
    }

    #[test]
    fn clamp_after_shrink() {
        let mut screen = LibraryScreen::new();
        screen.handle_key(KeyCode::Down, KeyModifiers::NONE, 5);
        screen.handle_key(KeyCode::Down, KeyModifiers::NONE, 5);
        screen.clamp(1);
        assert_eq!(
            screen.handle_key(KeyCode::Enter, KeyModifiers::NONE, 1),
            Some(Action::OpenDocument(0))
        );
    }
}
