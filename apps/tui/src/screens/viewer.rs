//! "Viewer" screen: selection input, live recommendations, insight panel.
//!
//! The terminal has no document renderer, so the document pane shows what
//! the recording surface was asked to do: the page it jumped to and the
//! highlight drawn on it.

use crossterm::event::{KeyCode, KeyModifiers};
use insightlens_core::{InsightState, PipelineState, SurfaceRecord};
use insightlens_shared::Document;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph, Wrap};

use super::Action;
use crate::widgets::connection_color;

/// Everything the viewer draws, borrowed from the session for one frame.
pub(crate) struct ViewerModel<'a> {
    pub document: &'a Document,
    pub pipeline: &'a PipelineState,
    pub insights: &'a InsightState,
    pub surface: &'a SurfaceRecord,
}

pub(crate) struct ViewerScreen {
    selection: String,
    editing: bool,
    cursor: usize,
}

impl ViewerScreen {
    pub(crate) fn new() -> Self {
        Self {
            selection: String::new(),
            editing: false,
            cursor: 0,
        }
    }

    pub(crate) fn is_editing(&self) -> bool {
        self.editing
    }

    /// Fresh input for a newly opened document.
    pub(crate) fn reset(&mut self) {
        *self = Self::new();
    }

    pub(crate) fn draw(&self, f: &mut Frame, area: Rect, model: &ViewerModel<'_>) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3),      // Selection
                Constraint::Min(8),         // Document + recommendations
                Constraint::Percentage(30), // Insight panel
            ])
            .split(area);

        let style = if self.editing {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::Cyan)
        };
        let selection = Paragraph::new(self.selection.as_str()).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Selection (e to edit) ")
                .border_style(style),
        );
        f.render_widget(selection, rows[0]);

        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
            .split(rows[1]);

        self.draw_document(f, cols[0], model);
        self.draw_results(f, cols[1], model.pipeline);
        draw_insights(f, rows[2], model.insights);
    }

    fn draw_document(&self, f: &mut Frame, area: Rect, model: &ViewerModel<'_>) {
        let mut lines = vec![
            Line::from(model.document.name.clone()).style(Style::default().add_modifier(Modifier::BOLD)),
            Line::from(""),
        ];
        match model.surface.current_page {
            Some(page) => lines.push(Line::from(format!("Page {page}"))),
            None => lines.push(Line::from("Page 1")),
        }
        for annotation in &model.surface.annotations {
            let [x0, y0, x1, y1] = annotation.bounding_box.0;
            lines.push(
                Line::from(format!(
                    "▌ highlight p.{} [{x0:.0}, {y0:.0}, {x1:.0}, {y1:.0}]",
                    annotation.page_number
                ))
                .style(Style::default().fg(Color::Yellow)),
            );
        }

        let pane = Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title(" Document "));
        f.render_widget(pane, area);
    }

    fn draw_results(&self, f: &mut Frame, area: Rect, state: &PipelineState) {
        let title = if state.loading {
            " Recommendations (searching…) ".to_string()
        } else {
            format!(" Recommendations ({}) ", state.results.len())
        };
        let block = Block::default().borders(Borders::ALL).title(title);

        if let Some(error) = &state.error {
            let message = Paragraph::new(error.as_str())
                .style(Style::default().fg(Color::Red))
                .wrap(Wrap { trim: true })
                .block(block);
            f.render_widget(message, area);
            return;
        }

        if state.results.is_empty() {
            let hint = if state.query.is_some() && !state.loading {
                "No related passages found."
            } else {
                "Select some text to find related passages."
            };
            let empty = Paragraph::new(hint)
                .style(Style::default().fg(Color::DarkGray))
                .alignment(Alignment::Center)
                .block(block);
            f.render_widget(empty, area);
            return;
        }

        let items: Vec<ListItem> = state
            .results
            .iter()
            .enumerate()
            .map(|(i, rec)| {
                let prefix = if i == self.cursor { "▸ " } else { "  " };
                let header = Line::from(vec![
                    Span::raw(format!("{prefix}{} p.{} ", rec.source_document, rec.page_number)),
                    Span::styled(
                        format!("[{}]", rec.connection_type),
                        Style::default().fg(connection_color(rec.connection_type)),
                    ),
                    Span::raw(format!(" {:.0}%", rec.relevance_score * 100.0)),
                ]);
                let snippet = Line::from(format!("    {}", rec.snippet.replace('\n', " ")))
                    .style(Style::default().fg(Color::Gray));
                let style = if i == self.cursor {
                    Style::default().add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                ListItem::new(vec![header, snippet]).style(style)
            })
            .collect();

        f.render_widget(List::new(items).block(block), area);
    }

    pub(crate) fn handle_key(
        &mut self,
        code: KeyCode,
        _modifiers: KeyModifiers,
        results: usize,
    ) -> Option<Action> {
        if self.editing {
            return match code {
                KeyCode::Esc | KeyCode::Enter => {
                    self.editing = false;
                    None
                }
                KeyCode::Backspace => {
                    self.selection.pop();
                    Some(Action::Select(self.selection.clone()))
                }
                KeyCode::Char(c) => {
                    self.selection.push(c);
                    Some(Action::Select(self.selection.clone()))
                }
                _ => None,
            };
        }

        match code {
            KeyCode::Char('e') | KeyCode::Char('/') => {
                self.editing = true;
                None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.cursor = self.cursor.saturating_sub(1);
                None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.cursor + 1 < results {
                    self.cursor += 1;
                }
                None
            }
            KeyCode::Enter if self.cursor < results => Some(Action::Highlight(self.cursor)),
            KeyCode::Char('i') => Some(Action::RequestInsight),
            KeyCode::Char('p') => Some(Action::RequestPodcast),
            KeyCode::Char('b') | KeyCode::Esc => Some(Action::ShowLibrary),
            _ => None,
        }
    }
}

fn draw_insights(f: &mut Frame, area: Rect, state: &InsightState) {
    let title = if state.loading {
        " Insights (generating…) "
    } else {
        " Insights (i insight · p podcast) "
    };

    let mut lines: Vec<Line> = Vec::new();
    if let Some(error) = &state.error {
        lines.push(Line::from(error.clone()).style(Style::default().fg(Color::Red)));
    }
    if let Some(insight) = &state.insight {
        lines.extend(insight.text.lines().map(|l| Line::from(l.to_string())));
    }
    if let Some(podcast) = &state.podcast {
        if !lines.is_empty() {
            lines.push(Line::from(""));
        }
        for turn in podcast.turns() {
            lines.push(Line::from(vec![
                Span::styled(
                    format!("{}: ", turn.speaker),
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                ),
                Span::raw(turn.line),
            ]));
        }
    }

    let panel = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(panel, area);
}
