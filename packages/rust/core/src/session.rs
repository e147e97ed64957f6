//! One user session: navigation plus the per-document transient state.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use insightlens_gateway::{Gateway, UploadFile};
use insightlens_shared::{
    AppConfig, Document, PipelineConfig, Recommendation, Result, UploadReceipt, ViewState,
};
use tracing::{debug, info, instrument};

use crate::annotate::{AnnotationSync, HighlightOutcome};
use crate::capture::{PlaceholderCapturer, ScreenshotCapturer};
use crate::insights::InsightPanel;
use crate::normalize::normalize_documents;
use crate::pipeline::{SelectionOutcome, SelectionPipeline};
use crate::surface::{SurfaceSlot, ViewerCapability};
use crate::view::{Transition, ViewController};

/// Everything a front end needs to drive InsightLens.
#[derive(Debug)]
pub struct Session {
    gateway: Arc<Gateway>,
    view: ViewController,
    library: Vec<Document>,
    slot: SurfaceSlot,
    annotations: Arc<AnnotationSync>,
    pipeline: SelectionPipeline,
    insights: Arc<InsightPanel>,
}

impl Session {
    /// Build a session against the configured backend, capturing with the
    /// placeholder screenshot.
    pub fn new(config: &AppConfig) -> Result<Self> {
        let gateway = Arc::new(Gateway::from_config(config)?);
        Ok(Self::with_parts(
            gateway,
            Arc::new(PlaceholderCapturer),
            &PipelineConfig::from(config),
        ))
    }

    pub fn with_parts(
        gateway: Arc<Gateway>,
        capturer: Arc<dyn ScreenshotCapturer>,
        config: &PipelineConfig,
    ) -> Self {
        let slot = SurfaceSlot::new();
        let annotations = Arc::new(AnnotationSync::new(slot.clone(), config.highlight.clone()));
        let pipeline = SelectionPipeline::new(
            gateway.clone(),
            capturer,
            slot.clone(),
            annotations.clone(),
            config,
        );
        let insights = Arc::new(InsightPanel::new(gateway.clone()));

        Self {
            gateway,
            view: ViewController::new(),
            library: Vec::new(),
            slot,
            annotations,
            pipeline,
            insights,
        }
    }

    // -- navigation ---------------------------------------------------------

    pub fn view(&self) -> &ViewState {
        self.view.state()
    }

    pub fn show_library(&mut self) -> Transition {
        let t = self.view.show_library();
        self.apply(&t);
        t
    }

    pub fn show_upload(&mut self) -> Transition {
        let t = self.view.show_upload();
        self.apply(&t);
        t
    }

    pub fn open_document(&mut self, document: Document) -> Transition {
        let t = self.view.open_document(document);
        self.apply(&t);
        t
    }

    pub fn open_local_file(&mut self, path: &Path) -> Result<Transition> {
        let t = self.view.open_local_file(path)?;
        self.apply(&t);
        Ok(t)
    }

    /// Entering or leaving a Viewer starts the document state from scratch.
    fn apply(&self, transition: &Transition) {
        if transition.entered_viewer || transition.left_viewer() {
            self.pipeline.reset();
            self.annotations.reset();
            self.insights.reset();
            self.slot.detach();
            debug!(to = %transition.to, "document state cleared");
        }
    }

    // -- backend library ----------------------------------------------------

    /// Upload files and, from the Upload screen, move to the Library.
    #[instrument(skip_all, fields(count = files.len()))]
    pub async fn upload(&mut self, files: Vec<UploadFile>) -> Result<(UploadReceipt, Transition)> {
        let receipt = self.gateway.upload_documents(files).await?;
        Ok((receipt, self.upload_completed()))
    }

    /// Record an upload finished elsewhere; from the Upload screen this
    /// moves to the Library.
    pub fn upload_completed(&mut self) -> Transition {
        let t = self.view.upload_completed();
        self.apply(&t);
        t
    }

    /// Reload the document list from the backend.
    pub async fn refresh_library(&mut self) -> Result<&[Document]> {
        let payload = self.gateway.list_documents().await?;
        self.library = normalize_documents(&payload, Utc::now());
        info!(count = self.library.len(), "library refreshed");
        Ok(&self.library)
    }

    pub fn library(&self) -> &[Document] {
        &self.library
    }

    pub async fn fetch_document(&self, document: &Document) -> Result<Vec<u8>> {
        self.gateway.fetch_document(&document.name).await
    }

    // -- viewer -------------------------------------------------------------

    /// Complete the handshake with the surface showing the open document.
    ///
    /// Returns `false` outside the Viewer, where no surface is wanted.
    pub fn attach_surface(&self, surface: Arc<dyn ViewerCapability>) -> bool {
        if !self.view().is_viewer() {
            debug!("surface offered outside the viewer, ignored");
            return false;
        }
        self.slot.attach(surface);
        true
    }

    pub fn surface_ready(&self) -> bool {
        self.slot.is_ready()
    }

    /// Raw selection event from the surface.
    pub async fn on_selection(&self, text: &str) -> SelectionOutcome {
        if !self.view().is_viewer() {
            return SelectionOutcome::Ignored;
        }
        self.pipeline.on_raw_selection(text).await
    }

    /// "Selection ended" event from the surface.
    pub async fn on_selection_end(&self) -> Result<SelectionOutcome> {
        if !self.view().is_viewer() {
            return Ok(SelectionOutcome::Ignored);
        }
        self.pipeline.on_selection_end().await
    }

    pub async fn highlight(&self, rec: &Recommendation) -> Result<HighlightOutcome> {
        self.annotations.highlight(rec).await
    }

    /// Highlight the `index`-th committed recommendation, if there is one.
    pub async fn highlight_result(&self, index: usize) -> Result<Option<HighlightOutcome>> {
        let Some(rec) = self.pipeline.snapshot().results.get(index).cloned() else {
            return Ok(None);
        };
        self.highlight(&rec).await.map(Some)
    }

    pub fn pipeline(&self) -> &SelectionPipeline {
        &self.pipeline
    }

    pub fn annotations(&self) -> &AnnotationSync {
        &self.annotations
    }

    /// Shared so slow requests can run on their own task.
    pub fn insights(&self) -> &Arc<InsightPanel> {
        &self.insights
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }
}
