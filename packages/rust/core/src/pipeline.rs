//! Selection pipeline: debounce → capture → search → normalize → commit.
//!
//! Every run carries a [`GenerationToken`]. Results, errors and the loading
//! flag are only written for the latest token, so a slow response for an
//! old selection can never overwrite a newer one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use insightlens_gateway::SelectionSearch;
use insightlens_shared::{
    CaptureRegion, GenerationToken, PipelineConfig, Recommendation, Result, Selection,
};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::annotate::AnnotationSync;
use crate::capture::{PlaceholderCapturer, ScreenshotCapturer};
use crate::debounce::Debouncer;
use crate::normalize::normalize_recommendations;
use crate::surface::SurfaceSlot;

/// Observable state of the recommendation panel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineState {
    pub results: Vec<Recommendation>,
    pub loading: bool,
    /// User-facing message from the latest failed run.
    pub error: Option<String>,
    /// Text of the latest run, once it has started.
    pub query: Option<String>,
    pub generation: GenerationToken,
}

/// What [`SelectionPipeline::on_raw_selection`] did with its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// Blank selection; nothing was scheduled or changed.
    Ignored,
    /// A run will start once the quiet period passes.
    Scheduled,
}

/// Turns raw selection events into committed recommendations.
pub struct SelectionPipeline {
    shared: Arc<Shared>,
    debouncer: Debouncer,
    debounce: Duration,
}

struct Shared {
    search: Arc<dyn SelectionSearch>,
    capturer: Arc<dyn ScreenshotCapturer>,
    slot: SurfaceSlot,
    annotations: Arc<AnnotationSync>,
    latest: AtomicU64,
    /// Bumped by every reset; a run scheduled under an older epoch never starts.
    epoch: AtomicU64,
    state: watch::Sender<PipelineState>,
}

impl SelectionPipeline {
    pub fn new(
        search: Arc<dyn SelectionSearch>,
        capturer: Arc<dyn ScreenshotCapturer>,
        slot: SurfaceSlot,
        annotations: Arc<AnnotationSync>,
        config: &PipelineConfig,
    ) -> Self {
        let (state, _) = watch::channel(PipelineState::default());
        Self {
            shared: Arc::new(Shared {
                search,
                capturer,
                slot,
                annotations,
                latest: AtomicU64::new(0),
                epoch: AtomicU64::new(0),
                state,
            }),
            debouncer: Debouncer::new(),
            debounce: config.debounce,
        }
    }

    /// Feed one raw selection event.
    ///
    /// Non-blank text clears the current highlight and restarts the quiet
    /// period; only the last text of a burst is searched. Blank text ends
    /// the burst with nothing to search, so the pending run is cancelled.
    pub async fn on_raw_selection(&self, text: &str) -> SelectionOutcome {
        let selection = Selection::new(text);
        if selection.is_blank() {
            if self.debouncer.cancel() {
                debug!("blank selection cancelled the pending run");
            }
            return SelectionOutcome::Ignored;
        }

        if let Err(e) = self.shared.annotations.clear().await {
            warn!(error = %e, "failed to clear highlight for new selection");
        }

        let shared = self.shared.clone();
        let epoch = shared.epoch.load(Ordering::SeqCst);
        self.debouncer
            .schedule(self.debounce, async move { shared.run(selection, epoch).await });
        SelectionOutcome::Scheduled
    }

    /// Read the surface's current selection and feed it in.
    ///
    /// Without an attached surface this does nothing.
    pub async fn on_selection_end(&self) -> Result<SelectionOutcome> {
        let Some(surface) = self.shared.slot.current() else {
            debug!("selection ended with no surface attached");
            return Ok(SelectionOutcome::Ignored);
        };
        let content = surface.get_selected_content().await?;
        Ok(self.on_raw_selection(&content.text).await)
    }

    /// Drop everything tied to the current document.
    ///
    /// Cancels the pending run and invalidates in-flight ones.
    pub fn reset(&self) {
        self.debouncer.cancel();
        let shared = &self.shared;
        let mut generation = GenerationToken::default();
        shared.state.send_modify(|state| {
            shared.epoch.fetch_add(1, Ordering::SeqCst);
            generation = shared.advance();
            *state = PipelineState {
                generation,
                ..PipelineState::default()
            };
        });
        debug!(%generation, "pipeline reset");
    }

    /// Stop the pending run without touching state.
    pub fn cancel_pending(&self) -> bool {
        self.debouncer.cancel()
    }

    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.shared.state.subscribe()
    }

    pub fn snapshot(&self) -> PipelineState {
        self.shared.state.borrow().clone()
    }
}

impl std::fmt::Debug for SelectionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionPipeline")
            .field("debounce", &self.debounce)
            .field("pending", &self.debouncer.is_pending())
            .field("state", &*self.shared.state.borrow())
            .finish()
    }
}

impl Shared {
    fn advance(&self) -> GenerationToken {
        GenerationToken(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn is_latest(&self, token: GenerationToken) -> bool {
        self.latest.load(Ordering::SeqCst) == token.0
    }

    /// Apply `update` only while `token` is still the latest run.
    fn commit(&self, token: GenerationToken, update: impl FnOnce(&mut PipelineState)) -> bool {
        self.state.send_if_modified(|state| {
            if !self.is_latest(token) {
                debug!(%token, "discarding stale result");
                return false;
            }
            update(state);
            true
        })
    }

    /// Issue the run's token and mark it loading, unless a reset happened
    /// since the run was scheduled.
    fn start(&self, epoch: u64, query: String) -> Option<GenerationToken> {
        let mut started = None;
        self.state.send_if_modified(|state| {
            if self.epoch.load(Ordering::SeqCst) != epoch {
                return false;
            }
            let token = self.advance();
            state.loading = true;
            state.error = None;
            state.query = Some(query);
            state.generation = token;
            started = Some(token);
            true
        });
        started
    }

    #[instrument(skip_all, fields(len = selection.text.len()))]
    async fn run(&self, selection: Selection, epoch: u64) {
        let Some(token) = self.start(epoch, selection.text.clone()) else {
            debug!("run scheduled before a reset, skipped");
            return;
        };

        let region = CaptureRegion::default();
        let screenshot = match self.capturer.capture(&region, &selection.text).await {
            Ok(shot) => shot,
            Err(e) => {
                warn!(error = %e, "screenshot capture failed, sending text only");
                PlaceholderCapturer::screenshot()
            }
        };

        match self.search.search_selection(&screenshot, &selection.text).await {
            Ok(payload) => {
                let results = normalize_recommendations(&payload);
                let count = results.len();
                if self.commit(token, |state| {
                    state.results = results;
                    state.loading = false;
                    state.error = None;
                }) {
                    info!(%token, count, "recommendations committed");
                }
            }
            Err(e) => {
                warn!(%token, error = %e, "selection search failed");
                let message = e.user_message();
                self.commit(token, |state| {
                    state.loading = false;
                    state.error = Some(message);
                });
            }
        }
    }
}
