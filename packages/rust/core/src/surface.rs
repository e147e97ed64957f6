//! Capability interface to the rendering surface.
//!
//! The pipeline never touches rendering internals. It only needs the four
//! operations of [`ViewerCapability`], reached through a [`SurfaceSlot`] that
//! always holds the handle of the most recently loaded document.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use insightlens_shared::{Annotation, Result};

/// Text currently selected on the surface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectedContent {
    pub text: String,
}

/// Operations the core requires from any rendering surface.
#[async_trait]
pub trait ViewerCapability: Send + Sync {
    /// Scroll the surface to a 1-based page.
    async fn go_to_location(&self, page: u32) -> Result<()>;

    /// Draw the given annotations on top of the document.
    async fn add_annotations(&self, annotations: Vec<Annotation>) -> Result<()>;

    /// Remove every annotation previously added.
    async fn clear_annotations(&self) -> Result<()>;

    /// Read the current text selection.
    async fn get_selected_content(&self) -> Result<SelectedContent>;
}

// ---------------------------------------------------------------------------
// SurfaceSlot
// ---------------------------------------------------------------------------

/// Shared, latest-wins reference to the current surface handle.
///
/// Written once per document load, read by the pipeline and the annotation
/// synchronizer. The lock is never held across an `.await`.
#[derive(Clone, Default)]
pub struct SurfaceSlot {
    inner: Arc<RwLock<Option<Arc<dyn ViewerCapability>>>>,
}

impl SurfaceSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the handle for the document that just finished loading.
    pub fn attach(&self, surface: Arc<dyn ViewerCapability>) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(surface);
    }

    /// Drop the handle; callers must wait for a new handshake.
    pub fn detach(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn current(&self) -> Option<Arc<dyn ViewerCapability>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_ready(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl std::fmt::Debug for SurfaceSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceSlot")
            .field("ready", &self.is_ready())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// RecordingSurface
// ---------------------------------------------------------------------------

/// What a [`RecordingSurface`] has been asked to show.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurfaceRecord {
    /// Page the surface is scrolled to, if any jump happened.
    pub current_page: Option<u32>,
    /// Every page jump, oldest first.
    pub page_jumps: Vec<u32>,
    /// Annotations currently drawn.
    pub annotations: Vec<Annotation>,
    /// Text the user has selected.
    pub selected_text: String,
}

/// In-memory surface that records every capability call.
///
/// Backs the terminal viewer pane, which has no rendering engine of its own.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    record: Mutex<SurfaceRecord>,
    render_delay: Option<Duration>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `add_annotations` take `delay` before the annotations appear.
    pub fn with_render_delay(mut self, delay: Duration) -> Self {
        self.render_delay = Some(delay);
        self
    }

    /// Set the text the surface reports as selected.
    pub fn select_text(&self, text: impl Into<String>) {
        self.lock().selected_text = text.into();
    }

    pub fn snapshot(&self) -> SurfaceRecord {
        self.lock().clone()
    }

    pub fn annotations(&self) -> Vec<Annotation> {
        self.lock().annotations.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SurfaceRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ViewerCapability for RecordingSurface {
    async fn go_to_location(&self, page: u32) -> Result<()> {
        let mut record = self.lock();
        record.current_page = Some(page);
        record.page_jumps.push(page);
        Ok(())
    }

    async fn add_annotations(&self, annotations: Vec<Annotation>) -> Result<()> {
        if let Some(delay) = self.render_delay {
            tokio::time::sleep(delay).await;
        }
        self.lock().annotations.extend(annotations);
        Ok(())
    }

    async fn clear_annotations(&self) -> Result<()> {
        self.lock().annotations.clear();
        Ok(())
    }

    async fn get_selected_content(&self) -> Result<SelectedContent> {
        Ok(SelectedContent {
            text: self.lock().selected_text.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_latest_handle_wins() {
        let slot = SurfaceSlot::new();
        assert!(!slot.is_ready());
        assert!(slot.current().is_none());

        let first = Arc::new(RecordingSurface::new());
        let second = Arc::new(RecordingSurface::new());
        second.select_text("second");

        slot.attach(first);
        slot.attach(second.clone());
        assert!(slot.is_ready());

        let current = slot.current().expect("attached");
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let content = rt.block_on(current.get_selected_content()).unwrap();
        assert_eq!(content.text, "second");

        slot.detach();
        assert!(!slot.is_ready());
    }

    #[test]
    fn slot_clones_share_the_handle() {
        let slot = SurfaceSlot::new();
        let reader = slot.clone();
        slot.attach(Arc::new(RecordingSurface::new()));
        assert!(reader.is_ready());
    }

    #[tokio::test]
    async fn recording_surface_tracks_calls() {
        let surface = RecordingSurface::new();
        surface.go_to_location(4).await.unwrap();
        surface.go_to_location(2).await.unwrap();
        surface.clear_annotations().await.unwrap();

        let record = surface.snapshot();
        assert_eq!(record.current_page, Some(2));
        assert_eq!(record.page_jumps, vec![4, 2]);
        assert!(record.annotations.is_empty());
    }
}
