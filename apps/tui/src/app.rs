//! Core TUI application state and event loop.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use color_eyre::eyre::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use insightlens_core::{HighlightOutcome, RecordingSurface, Session};
use insightlens_gateway::UploadFile;
use insightlens_shared::{AppConfig, InsightError, UploadReceipt, ViewState};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Tabs};
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::screens::{Action, LibraryScreen, ScreenId, UploadScreen, ViewerModel, ViewerScreen};
use crate::widgets::status_bar;

/// Application state.
pub(crate) struct App {
    runtime: Runtime,
    session: Session,
    /// Surface backing the open document, replaced on every open.
    surface: Option<Arc<RecordingSurface>>,
    /// Upload running on the runtime, collected by [`App::tick`].
    pending_upload: Option<JoinHandle<insightlens_shared::Result<UploadReceipt>>>,
    upload: UploadScreen,
    library: LibraryScreen,
    viewer: ViewerScreen,
    /// Whether the app should quit.
    pub should_quit: bool,
    /// Status message shown in bottom bar.
    pub status: String,
    /// Whether help overlay is visible.
    pub show_help: bool,
}

impl App {
    pub(crate) fn new(runtime: Runtime, config: &AppConfig) -> Result<Self> {
        let session = Session::new(config)?;
        Ok(Self {
            runtime,
            session,
            surface: None,
            pending_upload: None,
            upload: UploadScreen::new(),
            library: LibraryScreen::new(),
            viewer: ViewerScreen::new(),
            should_quit: false,
            status: "Ready. Press ? for help.".to_string(),
            show_help: false,
        })
    }

    fn screen(&self) -> ScreenId {
        ScreenId::of(self.session.view())
    }

    fn is_editing(&self) -> bool {
        match self.screen() {
            ScreenId::Upload => self.upload.is_editing(),
            ScreenId::Library => false,
            ScreenId::Viewer => self.viewer.is_editing(),
        }
    }

    fn result_count(&self) -> usize {
        self.session.pipeline().snapshot().results.len()
    }

    /// Run a screen's request against the session.
    fn perform(&mut self, action: Action) {
        match action {
            Action::Upload(paths) => self.upload_files(paths),
            Action::OpenLocal(path) => match self.session.open_local_file(&path) {
                Ok(_) => self.entered_viewer(),
                Err(e) => self.fail(&e),
            },
            Action::RefreshLibrary => self.refresh_library(),
            Action::OpenDocument(index) => {
                if let Some(doc) = self.session.library().get(index).cloned() {
                    self.session.open_document(doc);
                    self.entered_viewer();
                }
            }
            Action::ShowUpload => {
                self.session.show_upload();
                self.surface = None;
            }
            Action::ShowLibrary => {
                self.session.show_library();
                self.surface = None;
            }
            Action::Select(text) => self.select(text),
            Action::Highlight(index) => {
                match self.runtime.block_on(self.session.highlight_result(index)) {
                    Ok(Some(HighlightOutcome::Applied(a))) => {
                        self.status = format!("Highlighted page {}", a.page_number);
                    }
                    Ok(Some(HighlightOutcome::Dropped)) => {
                        self.status = "Viewer not ready, highlight skipped.".to_string();
                    }
                    Ok(_) => {}
                    Err(e) => self.fail(&e),
                }
            }
            Action::RequestInsight => {
                let panel = self.session.insights().clone();
                self.runtime.spawn(async move {
                    panel.request_insight().await;
                });
            }
            Action::RequestPodcast => {
                let panel = self.session.insights().clone();
                self.runtime.spawn(async move {
                    panel.request_podcast().await;
                });
            }
        }
    }

    /// Start an upload without blocking the event loop.
    fn upload_files(&mut self, paths: Vec<PathBuf>) {
        if self.pending_upload.is_some() {
            self.status = "An upload is already running.".to_string();
            return;
        }

        let gateway = self.session.gateway().clone();
        self.pending_upload = Some(self.runtime.spawn(async move {
            let mut files = Vec::with_capacity(paths.len());
            for path in &paths {
                files.push(UploadFile::from_path(path).await?);
            }
            gateway.upload_documents(files).await
        }));
        self.upload.status = "Uploading…".to_string();
        self.status = "Uploading…".to_string();
    }

    /// Collect background work that has finished since the last frame.
    fn tick(&mut self) {
        if !self.pending_upload.as_ref().is_some_and(|h| h.is_finished()) {
            return;
        }
        let Some(handle) = self.pending_upload.take() else {
            return;
        };

        let result = match self.runtime.block_on(handle) {
            Ok(result) => result,
            Err(e) => Err(InsightError::Transport(format!("upload task failed: {e}"))),
        };

        match result {
            Ok(receipt) => {
                info!(files = receipt.files.len(), "upload finished");
                self.upload.clear();
                self.upload.status = receipt.message.clone();
                self.status = receipt.message;
                self.session.upload_completed();
                if matches!(self.session.view(), ViewState::Library) {
                    self.refresh_library();
                }
            }
            Err(e) => {
                self.upload.status = e.to_string();
                self.fail(&e);
            }
        }
    }

    fn refresh_library(&mut self) {
        match self.runtime.block_on(self.session.refresh_library()) {
            Ok(docs) => {
                let count = docs.len();
                self.library.clamp(count);
                self.library.status = format!("{count} document(s) in the library.");
            }
            Err(e) => {
                self.library.status = e.user_message();
                self.fail(&e);
            }
        }
    }

    /// Handshake with a fresh surface for the document just opened.
    fn entered_viewer(&mut self) {
        let surface = Arc::new(RecordingSurface::new());
        self.session.attach_surface(surface.clone());
        self.surface = Some(surface);
        self.viewer.reset();
        if let Some(doc) = self.session.view().active_document() {
            self.status = format!("Viewing {}", doc.name);
        }
    }

    fn select(&mut self, text: String) {
        let Some(surface) = &self.surface else {
            return;
        };
        surface.select_text(text);
        if let Err(e) = self.runtime.block_on(self.session.on_selection_end()) {
            self.fail(&e);
        }
    }

    fn fail(&mut self, err: &InsightError) {
        warn!(error = %err, "action failed");
        self.status = err.user_message();
    }
}

/// Set up the terminal, run the event loop, then restore the terminal.
pub(crate) fn run(runtime: Runtime, config: &AppConfig) -> Result<()> {
    let mut app = App::new(runtime, config)?;

    // Setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run app
    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    loop {
        app.tick();
        terminal.draw(|f| draw(f, app))?;

        // Poll for events with 100ms timeout so pipeline results show up promptly
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Some(action) = handle_key(app, key.code, key.modifiers) {
                        app.perform(action);
                    }
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

fn handle_key(app: &mut App, code: KeyCode, modifiers: KeyModifiers) -> Option<Action> {
    // Global keybindings (always active)
    match code {
        KeyCode::Char('q') | KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
            app.should_quit = true;
            return None;
        }
        KeyCode::Char('q') if !app.is_editing() => {
            app.should_quit = true;
            return None;
        }
        KeyCode::Char('?') if !app.is_editing() => {
            app.show_help = !app.show_help;
            return None;
        }
        KeyCode::Esc if app.show_help => {
            app.show_help = false;
            return None;
        }
        KeyCode::Char('1') if !app.is_editing() => return Some(Action::ShowUpload),
        KeyCode::Char('2') if !app.is_editing() => return Some(Action::ShowLibrary),
        _ => {}
    }

    // If help is showing, consume any key to dismiss
    if app.show_help {
        app.show_help = false;
        return None;
    }

    // Delegate to current screen
    match app.screen() {
        ScreenId::Upload => app.upload.handle_key(code, modifiers),
        ScreenId::Library => {
            let len = app.session.library().len();
            app.library.handle_key(code, modifiers, len)
        }
        ScreenId::Viewer => {
            let len = app.result_count();
            app.viewer.handle_key(code, modifiers, len)
        }
    }
}

fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tab bar
            Constraint::Min(1),    // Content
            Constraint::Length(1), // Status bar
        ])
        .split(f.area());

    // Tab bar
    let tab_titles: Vec<Line> = ScreenId::ALL
        .iter()
        .map(|s| Line::from(format!("{s}")))
        .collect();

    let tabs = Tabs::new(tab_titles)
        .block(Block::default().borders(Borders::ALL).title(" InsightLens "))
        .select(app.screen().index())
        .style(Style::default().fg(Color::White))
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .divider(" │ ");

    f.render_widget(tabs, chunks[0]);

    // Content area
    match app.session.view() {
        ViewState::Upload => app.upload.draw(f, chunks[1]),
        ViewState::Library => app.library.draw(f, chunks[1], app.session.library()),
        ViewState::Viewer { document } => {
            let pipeline = app.session.pipeline().snapshot();
            let insights = app.session.insights().snapshot();
            let surface = app
                .surface
                .as_ref()
                .map(|s| s.snapshot())
                .unwrap_or_default();
            let model = ViewerModel {
                document,
                pipeline: &pipeline,
                insights: &insights,
                surface: &surface,
            };
            app.viewer.draw(f, chunks[1], &model);
        }
    }

    // Status bar
    let backend = app.session.gateway().base_url().as_str();
    let bar = status_bar(&app.status, backend);
    f.render_widget(bar, chunks[2]);

    // Help overlay
    if app.show_help {
        draw_help_overlay(f);
    }
}

fn draw_help_overlay(f: &mut Frame) {
    let area = centered_rect(60, 60, f.area());

    let help_text = vec![
        Line::from("Keybindings").style(Style::default().add_modifier(Modifier::BOLD)),
        Line::from(""),
        Line::from("  1 / 2        Upload / Library"),
        Line::from("  ?            Toggle this help"),
        Line::from("  q / Ctrl-C   Quit"),
        Line::from(""),
        Line::from("Viewer:").style(Style::default().add_modifier(Modifier::BOLD)),
        Line::from("  e            Edit the selection"),
        Line::from("  ↑/↓          Choose a recommendation"),
        Line::from("  Enter        Highlight it in the document"),
        Line::from("  i / p        Insight / podcast"),
        Line::from("  b / Esc      Back to the library"),
    ];

    let help = Paragraph::new(help_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Help (any key closes) ")
                .style(Style::default().bg(Color::DarkGray)),
        )
        .style(Style::default().fg(Color::White).bg(Color::DarkGray));

    // Clear background
    f.render_widget(ratatui::widgets::Clear, area);
    f.render_widget(help, area);
}

/// Create a centered rectangle with percentage width and height.
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn upload_does_not_block_the_event_loop() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        let server = runtime.block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/upload_pdfs"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_string(r#"{"message": "1 PDF uploaded.", "files": ["notes.pdf"]}"#)
                        .set_delay(Duration::from_millis(300)),
                )
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path("/list_pdfs"))
                .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"pdfs": ["notes.pdf"]}"#))
                .mount(&server)
                .await;
            server
        });

        let dir = std::env::temp_dir().join(format!("il-tui-upload-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("notes.pdf");
        std::fs::write(&file, b"%PDF-1.4").unwrap();

        let mut config = AppConfig::default();
        config.backend.base_url = server.uri();
        let mut app = App::new(runtime, &config).unwrap();

        app.perform(Action::Upload(vec![file]));
        // back in the event loop while the server is still answering
        assert!(app.pending_upload.is_some());
        assert_eq!(app.screen(), ScreenId::Upload);

        for _ in 0..100 {
            app.tick();
            if app.pending_upload.is_none() {
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }

        assert!(app.pending_upload.is_none());
        assert_eq!(app.screen(), ScreenId::Library);
        assert_eq!(app.session.library().len(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
