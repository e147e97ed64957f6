//! TUI screen definitions.
//!
//! One screen per [`ViewState`]. Screens own their input state and turn key
//! presses into [`Action`]s; the app performs them against the session.

mod library;
mod upload;
mod viewer;

use std::fmt;
use std::path::PathBuf;

use insightlens_shared::ViewState;

pub(crate) use library::LibraryScreen;
pub(crate) use upload::UploadScreen;
pub(crate) use viewer::{ViewerModel, ViewerScreen};

/// Screen identifiers, in tab order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScreenId {
    Upload,
    Library,
    Viewer,
}

impl ScreenId {
    pub(crate) const ALL: [ScreenId; 3] = [Self::Upload, Self::Library, Self::Viewer];

    pub(crate) fn of(state: &ViewState) -> Self {
        match state {
            ViewState::Upload => Self::Upload,
            ViewState::Library => Self::Library,
            ViewState::Viewer { .. } => Self::Viewer,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Upload => 0,
            Self::Library => 1,
            Self::Viewer => 2,
        }
    }
}

impl fmt::Display for ScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upload => write!(f, "Upload"),
            Self::Library => write!(f, "Library"),
            Self::Viewer => write!(f, "Viewer"),
        }
    }
}

/// Something a screen asks the app to do.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Action {
    Upload(Vec<PathBuf>),
    OpenLocal(PathBuf),
    RefreshLibrary,
    OpenDocument(usize),
    ShowUpload,
    ShowLibrary,
    /// The viewer's selection changed to this text.
    Select(String),
    Highlight(usize),
    RequestInsight,
    RequestPodcast,
}
