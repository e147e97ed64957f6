//! Selection-to-recommendation orchestration for InsightLens.
//!
//! This crate turns raw selection events into ranked recommendations,
//! keeps the surface's highlight in sync with the chosen one, and owns the
//! view navigation that decides when all of that state is thrown away.

pub mod annotate;
pub mod capture;
pub mod debounce;
pub mod insights;
pub mod normalize;
pub mod pipeline;
pub mod session;
pub mod surface;
pub mod view;

pub use annotate::{AnnotationSync, HighlightOutcome};
pub use capture::{PlaceholderCapturer, ScreenshotCapturer, StaticCapturer};
pub use debounce::Debouncer;
pub use insights::{InsightPanel, InsightState};
pub use normalize::{normalize_documents, normalize_recommendations};
pub use pipeline::{PipelineState, SelectionOutcome, SelectionPipeline};
pub use session::Session;
pub use surface::{
    RecordingSurface, SelectedContent, SurfaceRecord, SurfaceSlot, ViewerCapability,
};
pub use view::{Transition, ViewController};
