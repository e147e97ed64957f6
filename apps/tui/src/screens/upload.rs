//! "Upload" screen: file paths to send to the library or open locally.

use std::path::PathBuf;

use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use super::Action;

pub(crate) struct UploadScreen {
    paths: String,
    editing: bool,
    pub(crate) status: String,
}

impl UploadScreen {
    pub(crate) fn new() -> Self {
        Self {
            paths: String::new(),
            editing: false,
            status: "Enter to type PDF paths, separated by spaces.".to_string(),
        }
    }

    pub(crate) fn is_editing(&self) -> bool {
        self.editing
    }

    /// Paths typed so far. Whitespace separates them.
    pub(crate) fn parsed_paths(&self) -> Vec<PathBuf> {
        self.paths.split_whitespace().map(PathBuf::from).collect()
    }

    pub(crate) fn draw(&self, f: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3), // Paths
                Constraint::Length(3), // Hint
                Constraint::Min(1),    // Status
            ])
            .split(area);

        let style = if self.editing {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::Cyan)
        };
        let input = Paragraph::new(self.paths.as_str()).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" PDF files ")
                .border_style(style),
        );
        f.render_widget(input, chunks[0]);

        let hint = if self.editing {
            "Type paths · Esc to stop editing"
        } else {
            "Enter to edit · u upload · o open first file locally · l library"
        };
        let hint = Paragraph::new(hint)
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center);
        f.render_widget(hint, chunks[1]);

        let status = Paragraph::new(self.status.as_str())
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title(" Status "));
        f.render_widget(status, chunks[2]);
    }

    pub(crate) fn handle_key(&mut self, code: KeyCode, _modifiers: KeyModifiers) -> Option<Action> {
        if self.editing {
            match code {
                KeyCode::Esc | KeyCode::Enter => self.editing = false,
                KeyCode::Backspace => {
                    self.paths.pop();
                }
                KeyCode::Char(c) => self.paths.push(c),
                _ => {}
            }
            return None;
        }

        match code {
            KeyCode::Enter => {
                self.editing = true;
                None
            }
            KeyCode::Char('u') => {
                let paths = self.parsed_paths();
                if paths.is_empty() {
                    self.status = "No files entered.".to_string();
                    None
                } else {
                    Some(Action::Upload(paths))
                }
            }
            KeyCode::Char('o') => match self.parsed_paths().into_iter().next() {
                Some(path) => Some(Action::OpenLocal(path)),
                None => {
                    self.status = "No file to open.".to_string();
                    None
                }
            },
            KeyCode::Char('l') => Some(Action::ShowLibrary),
            _ => None,
        }
    }

    /// Forget the typed paths after a successful upload.
    pub(crate) fn clear(&mut self) {
        self.paths.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_text(screen: &mut UploadScreen, text: &str) {
        screen.handle_key(KeyCode::Enter, KeyModifiers::NONE);
        for c in text.chars() {
            screen.handle_key(KeyCode::Char(c), KeyModifiers::NONE);
        }
        screen.handle_key(KeyCode::Esc, KeyModifiers::NONE);
    }

    #[test]
    fn upload_collects_every_path() {
        let mut screen = UploadScreen::new();
        type_text(&mut screen, "a.pdf  docs/b.pdf");

        let action = screen.handle_key(KeyCode::Char('u'), KeyModifiers::NONE);
        assert_eq!(
            action,
            Some(Action::Upload(vec![PathBuf::from("a.pdf"), PathBuf::from("docs/b.pdf")]))
        );
    }

    #[test]
    fn upload_without_paths_only_updates_status() {
        let mut screen = UploadScreen::new();
        assert_eq!(screen.handle_key(KeyCode::Char('u'), KeyModifiers::NONE), None);
        assert_eq!(screen.status, "No files entered.");
    }

    #[test]
    fn letters_are_text_while_editing() {
        let mut screen = UploadScreen::new();
        type_text(&mut screen, "lou.pdf");
        assert_eq!(screen.parsed_paths(), vec![PathBuf::from("lou.pdf")]);
        assert!(!screen.is_editing());
    }
}
