//! Keeps exactly one recommendation highlight on the rendering surface.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use insightlens_shared::{Annotation, HighlightStyle, Recommendation, Result};
use tracing::{debug, instrument};

use crate::surface::SurfaceSlot;

/// What happened to a highlight request.
#[derive(Debug, Clone, PartialEq)]
pub enum HighlightOutcome {
    /// The annotation is now the only one on the surface.
    Applied(Annotation),
    /// No surface was attached; the request is not queued.
    Dropped,
    /// A newer highlight or clear arrived before this one could run.
    Superseded,
}

/// Serializes highlight operations against the current surface.
///
/// Calls are applied one at a time, in call order; a request that is
/// overtaken while waiting its turn is skipped.
#[derive(Debug)]
pub struct AnnotationSync {
    slot: SurfaceSlot,
    style: HighlightStyle,
    latest: AtomicU64,
    turn: tokio::sync::Mutex<()>,
    active: Mutex<Option<Annotation>>,
}

impl AnnotationSync {
    pub fn new(slot: SurfaceSlot, style: HighlightStyle) -> Self {
        Self {
            slot,
            style,
            latest: AtomicU64::new(0),
            turn: tokio::sync::Mutex::new(()),
            active: Mutex::new(None),
        }
    }

    /// Scroll to `rec` and replace any existing highlight with one for it.
    #[instrument(skip_all, fields(rec = %rec.id, page = rec.page_number))]
    pub async fn highlight(&self, rec: &Recommendation) -> Result<HighlightOutcome> {
        let ticket = self.latest.fetch_add(1, Ordering::SeqCst) + 1;

        let Some(surface) = self.slot.current() else {
            debug!("no surface attached, highlight dropped");
            return Ok(HighlightOutcome::Dropped);
        };

        let _turn = self.turn.lock().await;
        if self.latest.load(Ordering::SeqCst) != ticket {
            debug!("highlight superseded");
            return Ok(HighlightOutcome::Superseded);
        }

        let annotation = Annotation::highlight(rec, &self.style);
        surface.go_to_location(rec.page_number).await?;
        surface.clear_annotations().await?;
        surface.add_annotations(vec![annotation.clone()]).await?;

        *self.lock_active() = Some(annotation.clone());
        Ok(HighlightOutcome::Applied(annotation))
    }

    /// Remove the active highlight from the surface.
    pub async fn clear(&self) -> Result<()> {
        self.latest.fetch_add(1, Ordering::SeqCst);

        let Some(surface) = self.slot.current() else {
            self.lock_active().take();
            return Ok(());
        };

        let _turn = self.turn.lock().await;
        surface.clear_annotations().await?;
        self.lock_active().take();
        Ok(())
    }

    /// Forget the active highlight without touching the surface.
    ///
    /// Used when the surface itself is being replaced.
    pub fn reset(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
        self.lock_active().take();
    }

    pub fn active(&self) -> Option<Annotation> {
        self.lock_active().clone()
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, Option<Annotation>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
