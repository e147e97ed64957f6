//! Core domain types for InsightLens.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum number of recommendations ever shown for one selection.
pub const MAX_RECOMMENDATIONS: usize = 3;

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A document known to the backend library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Stable identity, never empty.
    pub id: String,
    /// File name as stored by the backend.
    pub name: String,
    /// When the document was uploaded (or listed, if the backend does not say).
    pub uploaded_at: DateTime<Utc>,
    /// Where the document can be fetched from, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Document {
    /// Deterministic id for documents whose origin data carries none:
    /// the name without its extension plus the ordinal index.
    pub fn fallback_id(name: &str, index: usize) -> String {
        let stem = match name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => name,
        };
        let stem = if stem.trim().is_empty() { "document" } else { stem };
        format!("{stem}-{index}")
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// A text selection reported by the rendering surface.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Selection {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    /// Empty or whitespace-only selections are skipped, not errors.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Recommendation
// ---------------------------------------------------------------------------

/// How a recommended passage relates to the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    Correlation,
    Contradiction,
    Elaboration,
    Context,
}

impl ConnectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Correlation => "correlation",
            Self::Contradiction => "contradiction",
            Self::Elaboration => "elaboration",
            Self::Context => "context",
        }
    }

    /// Case-insensitive parse of a wire value.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "correlation" => Some(Self::Correlation),
            "contradiction" => Some(Self::Contradiction),
            "elaboration" => Some(Self::Elaboration),
            "context" => Some(Self::Context),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `[x1, y1, x2, y2]` in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoundingBox(pub [f64; 4]);

impl BoundingBox {
    pub const ZERO: Self = Self([0.0; 4]);
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::ZERO
    }
}

/// A passage from another document related to the current selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub id: String,
    pub source_document: String,
    pub snippet: String,
    /// 1-based page number for display and navigation.
    pub page_number: u32,
    pub bounding_box: BoundingBox,
    /// Always within `[0, 1]`.
    pub relevance_score: f64,
    pub connection_type: ConnectionType,
}

// ---------------------------------------------------------------------------
// Annotation
// ---------------------------------------------------------------------------

/// Annotation kinds understood by the rendering surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AnnotationKind {
    Highlight,
}

/// Visual style of a highlight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightStyle {
    pub color: String,
    pub opacity: f64,
}

impl Default for HighlightStyle {
    fn default() -> Self {
        Self {
            color: "#FFD54F".into(),
            opacity: 0.4,
        }
    }
}

/// An overlay instruction sent to the rendering surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: Uuid,
    pub page_number: u32,
    #[serde(rename = "type")]
    pub kind: AnnotationKind,
    pub bounding_box: BoundingBox,
    pub color: String,
    pub opacity: f64,
}

impl Annotation {
    /// Highlight covering a recommendation's passage.
    pub fn highlight(rec: &Recommendation, style: &HighlightStyle) -> Self {
        Self {
            id: Uuid::now_v7(),
            page_number: rec.page_number,
            kind: AnnotationKind::Highlight,
            bounding_box: rec.bounding_box,
            color: style.color.clone(),
            opacity: style.opacity.clamp(0.0, 1.0),
        }
    }
}

// ---------------------------------------------------------------------------
// ViewState
// ---------------------------------------------------------------------------

/// Top-level navigation state. Only `Viewer` carries a document.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ViewState {
    #[default]
    Upload,
    Library,
    Viewer { document: Document },
}

impl ViewState {
    pub fn active_document(&self) -> Option<&Document> {
        match self {
            Self::Viewer { document } => Some(document),
            _ => None,
        }
    }

    pub fn is_viewer(&self) -> bool {
        matches!(self, Self::Viewer { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Upload => "Upload",
            Self::Library => "Library",
            Self::Viewer { .. } => "Viewer",
        }
    }
}

impl std::fmt::Display for ViewState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Generation token
// ---------------------------------------------------------------------------

/// Identifies one pipeline run; only the latest one may commit results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct GenerationToken(pub u64);

impl std::fmt::Display for GenerationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Screenshots
// ---------------------------------------------------------------------------

/// The part of the rendering surface a screenshot should cover.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureRegion {
    /// 1-based page, when the surface knows it.
    pub page: Option<u32>,
    /// Sub-rectangle of the page; whole page when absent.
    pub bounds: Option<BoundingBox>,
}

/// An encoded image sent alongside the selection text.
#[derive(Debug, Clone, PartialEq)]
pub struct Screenshot {
    pub bytes: Vec<u8>,
    /// MIME type, e.g. `image/png`.
    pub mime: String,
    pub width: u32,
    pub height: u32,
}

impl Screenshot {
    /// File name used for the multipart upload.
    pub fn file_name(&self) -> &'static str {
        match self.mime.as_str() {
            "image/jpeg" => "selection.jpg",
            "image/webp" => "selection.webp",
            _ => "selection.png",
        }
    }
}

// ---------------------------------------------------------------------------
// Backend payloads
// ---------------------------------------------------------------------------

/// Response of a bulk upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub message: String,
    #[serde(default)]
    pub files: Vec<String>,
}

/// Summarized insight for the most recent selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    #[serde(rename = "insight")]
    pub text: String,
}

/// Two-speaker podcast script for the most recent selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodcastScript {
    #[serde(rename = "podcast_script")]
    pub text: String,
}

/// One spoken turn of a podcast script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodcastTurn {
    pub speaker: String,
    pub line: String,
}

/// Speaker used for lines that precede the first labeled turn.
const NARRATOR: &str = "Narrator";

impl PodcastScript {
    /// Split the script into speaker turns.
    ///
    /// Accepts `Alex: ...`, `**Alex:** ...` and `Alex (Host): ...` labels.
    /// Unlabeled lines continue the previous turn.
    pub fn turns(&self) -> Vec<PodcastTurn> {
        static SPEAKER_RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^\s*\**\s*([A-Z][\w .'-]{0,30}?)\s*(?:\([^)]*\))?\s*\**\s*:\s*\**\s*(.*)$")
                .expect("valid regex")
        });

        let mut turns: Vec<PodcastTurn> = Vec::new();
        for raw in self.text.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line == "---" {
                continue;
            }

            if let Some(caps) = SPEAKER_RE.captures(line) {
                let speaker = caps[1].trim().to_string();
                let spoken = caps[2].trim().to_string();
                turns.push(PodcastTurn {
                    speaker,
                    line: spoken,
                });
                continue;
            }

            match turns.last_mut() {
                Some(turn) if !turn.line.is_empty() => {
                    turn.line.push(' ');
                    turn.line.push_str(line);
                }
                Some(turn) => turn.line.push_str(line),
                None => turns.push(PodcastTurn {
                    speaker: NARRATOR.to_string(),
                    line: line.to_string(),
                }),
            }
        }

        turns.retain(|t| !t.line.is_empty());
        turns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_id_strips_extension() {
        assert_eq!(Document::fallback_id("report.pdf", 0), "report-0");
        assert_eq!(Document::fallback_id("archive.tar.gz", 4), "archive.tar-4");
        assert_eq!(Document::fallback_id("README", 2), "README-2");
        assert_eq!(Document::fallback_id(".pdf", 1), ".pdf-1");
        assert_eq!(Document::fallback_id("", 3), "document-3");
    }

    #[test]
    fn blank_selection_detection() {
        assert!(Selection::new("").is_blank());
        assert!(Selection::new(" \n\t ").is_blank());
        assert!(!Selection::new(" neural nets ").is_blank());
    }

    #[test]
    fn recommendation_wire_format_is_camel_case() {
        let rec = sample_recommendation();
        let json = serde_json::to_value(&rec).expect("serialize");
        assert_eq!(json["sourceDocument"], "paper.pdf");
        assert_eq!(json["pageNumber"], 3);
        assert_eq!(json["connectionType"], "elaboration");

        let parsed: Recommendation = serde_json::from_value(json).expect("deserialize");
        assert_eq!(parsed, rec);
    }

    #[test]
    fn annotation_serializes_type_field() {
        let rec = sample_recommendation();
        let ann = Annotation::highlight(&rec, &HighlightStyle::default());
        let json = serde_json::to_value(&ann).expect("serialize");
        assert_eq!(json["type"], "HIGHLIGHT");
        assert_eq!(json["pageNumber"], 3);
        assert_eq!(json["boundingBox"], serde_json::json!([1.0, 2.0, 3.0, 4.0]));
    }

    #[test]
    fn view_state_document_only_in_viewer() {
        assert!(ViewState::Upload.active_document().is_none());
        assert!(ViewState::Library.active_document().is_none());
        let doc = Document {
            id: "a-0".into(),
            name: "a.pdf".into(),
            uploaded_at: Utc::now(),
            url: None,
        };
        let state = ViewState::Viewer {
            document: doc.clone(),
        };
        assert_eq!(state.active_document(), Some(&doc));
        assert_eq!(state.to_string(), "Viewer");
    }

    #[test]
    fn podcast_turns_parse_common_labels() {
        let script = PodcastScript {
            text: "# Episode 1\n\
                   **Alex:** Welcome back to the show.\n\
                   Today we look at transformers.\n\
                   \n\
                   **Ben (Expert):** Thanks, Alex.\n\
                   Alex: So what connects these papers?\n"
                .into(),
        };
        let turns = script.turns();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].speaker, "Alex");
        assert_eq!(
            turns[0].line,
            "Welcome back to the show. Today we look at transformers."
        );
        assert_eq!(turns[1].speaker, "Ben");
        assert_eq!(turns[1].line, "Thanks, Alex.");
        assert_eq!(turns[2].speaker, "Alex");
    }

    #[test]
    fn podcast_leading_lines_go_to_narrator() {
        let script = PodcastScript {
            text: "[Intro music fades]\nAlex: Hi.".into(),
        };
        let turns = script.turns();
        assert_eq!(turns[0].speaker, "Narrator");
        assert_eq!(turns[1].speaker, "Alex");
    }

    fn sample_recommendation() -> Recommendation {
        Recommendation {
            id: "doc_1".into(),
            source_document: "paper.pdf".into(),
            snippet: "Attention is all you need".into(),
            page_number: 3,
            bounding_box: BoundingBox([1.0, 2.0, 3.0, 4.0]),
            relevance_score: 0.9,
            connection_type: ConnectionType::Elaboration,
        }
    }
}
