//! Shared types, error model, and configuration for InsightLens.
//!
//! This crate is the foundation depended on by all other InsightLens crates.
//! It provides:
//! - [`InsightError`] (the unified error type)
//! - Domain types ([`Document`], [`Recommendation`], [`Annotation`], [`ViewState`])
//! - Configuration ([`AppConfig`], [`PipelineConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BASE_URL_ENV, BackendConfig, HighlightSection, PipelineConfig, PipelineSection,
    config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{
    BACKEND_OFFLINE_MESSAGE, BACKEND_TIMEOUT_MESSAGE, GENERIC_FAILURE_MESSAGE, InsightError, Result,
};
pub use types::{
    Annotation, AnnotationKind, BoundingBox, CaptureRegion, ConnectionType, Document,
    GenerationToken, HighlightStyle, Insight, MAX_RECOMMENDATIONS, PodcastScript, PodcastTurn,
    Recommendation, Screenshot, Selection, UploadReceipt, ViewState,
};
