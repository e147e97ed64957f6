//! Upload → Library → Viewer navigation.

use std::path::Path;

use chrono::Utc;
use insightlens_shared::{Document, InsightError, Result, ViewState};
use tracing::info;
use url::Url;

/// A state change and whether it entered the Viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: ViewState,
    pub to: ViewState,
    /// True whenever the new state is a Viewer, including reopening one.
    pub entered_viewer: bool,
}

impl Transition {
    pub fn left_viewer(&self) -> bool {
        self.from.is_viewer() && !self.to.is_viewer()
    }
}

/// Owns the current [`ViewState`]. Starts on the Upload screen.
#[derive(Debug, Default)]
pub struct ViewController {
    state: ViewState,
}

impl ViewController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    /// An upload finished. Moves to the Library only from the Upload screen.
    pub fn upload_completed(&mut self) -> Transition {
        if matches!(self.state, ViewState::Upload) {
            self.go(ViewState::Library)
        } else {
            self.stay()
        }
    }

    pub fn show_library(&mut self) -> Transition {
        self.go(ViewState::Library)
    }

    pub fn show_upload(&mut self) -> Transition {
        self.go(ViewState::Upload)
    }

    pub fn open_document(&mut self, document: Document) -> Transition {
        self.go(ViewState::Viewer { document })
    }

    /// Open a file from disk without going through the backend library.
    pub fn open_local_file(&mut self, path: &Path) -> Result<Transition> {
        let document = local_document(path)?;
        Ok(self.open_document(document))
    }

    fn go(&mut self, to: ViewState) -> Transition {
        let from = std::mem::replace(&mut self.state, to.clone());
        let transition = Transition {
            entered_viewer: to.is_viewer(),
            from,
            to,
        };
        info!(from = %transition.from, to = %transition.to, "view changed");
        transition
    }

    fn stay(&self) -> Transition {
        Transition {
            from: self.state.clone(),
            to: self.state.clone(),
            entered_viewer: false,
        }
    }
}

/// A [`Document`] describing a local file.
pub fn local_document(path: &Path) -> Result<Document> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| InsightError::validation(format!("not a file path: {}", path.display())))?
        .to_string();

    let absolute = std::path::absolute(path).map_err(|e| InsightError::io(path, e))?;
    let url = Url::from_file_path(&absolute)
        .map_err(|()| InsightError::validation(format!("cannot build file URL for {}", absolute.display())))?;

    Ok(Document {
        id: Document::fallback_id(&name, 0),
        name,
        uploaded_at: Utc::now(),
        url: Some(url.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str) -> Document {
        Document {
            id: Document::fallback_id(name, 0),
            name: name.into(),
            uploaded_at: Utc::now(),
            url: None,
        }
    }

    #[test]
    fn starts_on_upload() {
        assert_eq!(*ViewController::new().state(), ViewState::Upload);
    }

    #[test]
    fn upload_completion_moves_to_library() {
        let mut view = ViewController::new();
        let t = view.upload_completed();
        assert_eq!(t.from, ViewState::Upload);
        assert_eq!(t.to, ViewState::Library);
        assert!(!t.entered_viewer);
    }

    #[test]
    fn upload_completion_elsewhere_is_ignored() {
        let mut view = ViewController::new();
        view.open_document(doc("a.pdf"));
        let t = view.upload_completed();
        assert_eq!(t.from, t.to);
        assert!(view.state().is_viewer());
    }

    #[test]
    fn viewer_carries_its_document() {
        let mut view = ViewController::new();
        let t = view.open_document(doc("a.pdf"));
        assert!(t.entered_viewer);
        assert_eq!(view.state().active_document().unwrap().name, "a.pdf");

        // reopening counts as entering again
        let again = view.open_document(doc("a.pdf"));
        assert!(again.entered_viewer);
    }

    #[test]
    fn leaving_viewer_drops_the_document() {
        let mut view = ViewController::new();
        view.open_document(doc("a.pdf"));
        let t = view.show_library();
        assert!(t.left_viewer());
        assert!(view.state().active_document().is_none());
    }

    #[test]
    fn local_file_becomes_a_document() {
        let mut view = ViewController::new();
        let t = view.open_local_file(Path::new("/tmp/papers/notes.pdf")).unwrap();
        let document = t.to.active_document().unwrap();
        assert_eq!(document.name, "notes.pdf");
        assert_eq!(document.id, "notes-0");
        assert_eq!(document.url.as_deref(), Some("file:///tmp/papers/notes.pdf"));
    }

    #[test]
    fn local_file_without_name_is_rejected() {
        let mut view = ViewController::new();
        assert!(view.open_local_file(Path::new("/")).is_err());
        assert_eq!(*view.state(), ViewState::Upload);
    }
}
