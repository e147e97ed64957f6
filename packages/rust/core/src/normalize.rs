//! Normalization of heterogeneous backend payloads.
//!
//! Search responses arrive either already shaped (`{recommendations: [...]}`)
//! or as a column-oriented vector-search bundle, optionally wrapped in
//! `{search_results: ...}`. Document lists arrive as `{documents: [...]}` or
//! the legacy `{pdfs: [...]}`. Each payload is sniffed once into a tagged
//! union here; nothing else in the workspace branches on response shape.
//!
//! Field-level failures never abort a batch: every field has a default.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use insightlens_shared::{
    BoundingBox, ConnectionType, Document, MAX_RECOMMENDATIONS, Recommendation,
};
use serde_json::Value;
use tracing::debug;

/// Longest snippet shown before truncation.
pub const SNIPPET_LIMIT: usize = 200;

const ELLIPSIS: &str = "...";

const UNKNOWN_SOURCE: &str = "Unknown document";

// ---------------------------------------------------------------------------
// Search payloads
// ---------------------------------------------------------------------------

/// Known shapes of a selection-search response.
#[derive(Debug, Clone, Copy)]
pub enum SearchPayload<'a> {
    /// Entries already in the recommendation contract.
    Shaped(&'a [Value]),
    /// Raw vector-search columns for a single query.
    Bundle(ResultBundle<'a>),
    /// Nothing recognizable.
    Empty,
}

/// Parallel columns of a vector-search result, batch 0 only.
#[derive(Debug, Clone, Copy)]
pub struct ResultBundle<'a> {
    pub documents: &'a [Value],
    pub metadatas: &'a [Value],
    pub ids: &'a [Value],
    pub distances: &'a [Value],
}

impl<'a> SearchPayload<'a> {
    /// Decide which shape `payload` has.
    pub fn sniff(payload: &'a Value) -> Self {
        if let Some(entries) = payload.get("recommendations").and_then(Value::as_array) {
            return Self::Shaped(entries);
        }

        let root = payload
            .get("search_results")
            .filter(|v| v.is_object())
            .unwrap_or(payload);

        match ResultBundle::from_value(root) {
            Some(bundle) => Self::Bundle(bundle),
            None => Self::Empty,
        }
    }
}

impl<'a> ResultBundle<'a> {
    fn from_value(root: &'a Value) -> Option<Self> {
        // `documents` is the only column a bundle cannot do without.
        root.get("documents")?.as_array()?;

        Some(Self {
            documents: first_batch(root, "documents"),
            metadatas: first_batch(root, "metadatas"),
            ids: first_batch(root, "ids"),
            distances: first_batch(root, "distances"),
        })
    }

    fn len(&self) -> usize {
        self.documents.len()
    }
}

/// Column `key` at batch index 0; flat columns are accepted as-is.
fn first_batch<'a>(root: &'a Value, key: &str) -> &'a [Value] {
    let Some(outer) = root.get(key).and_then(Value::as_array) else {
        return &[];
    };
    match outer.first() {
        Some(Value::Array(batch)) => batch,
        Some(Value::Null) => &[],
        _ => outer,
    }
}

/// Turn any search payload into at most three recommendations.
pub fn normalize_recommendations(payload: &Value) -> Vec<Recommendation> {
    let recs: Vec<Recommendation> = match SearchPayload::sniff(payload) {
        SearchPayload::Shaped(entries) => entries
            .iter()
            .take(MAX_RECOMMENDATIONS)
            .enumerate()
            .map(|(i, entry)| shaped_entry(i, entry))
            .collect(),
        SearchPayload::Bundle(bundle) => (0..bundle.len().min(MAX_RECOMMENDATIONS))
            .map(|i| bundle_entry(&bundle, i))
            .collect(),
        SearchPayload::Empty => {
            debug!("search payload has no recognizable shape");
            Vec::new()
        }
    };

    debug!(count = recs.len(), "normalized recommendations");
    recs
}

/// An entry that already follows the contract; only invariants are enforced.
fn shaped_entry(index: usize, entry: &Value) -> Recommendation {
    let relevance_score = entry
        .get("relevanceScore")
        .and_then(number_of)
        .map(clamp_unit)
        .unwrap_or_else(|| placeholder_score(index));

    let connection_type = entry
        .get("connectionType")
        .and_then(Value::as_str)
        .and_then(ConnectionType::parse)
        .unwrap_or_else(|| connection_for(relevance_score));

    let page_number = entry
        .get("pageNumber")
        .and_then(number_of)
        .filter(|n| *n >= 1.0)
        .map(|n| n.min(u32::MAX as f64) as u32)
        .unwrap_or(1);

    Recommendation {
        id: first_text(entry, &["id"]).unwrap_or_else(|| format!("rec-{index}")),
        source_document: first_text(entry, &["sourceDocument", "source_document", "document"])
            .unwrap_or_else(|| UNKNOWN_SOURCE.to_string()),
        snippet: first_text(entry, &["snippet", "text"]).unwrap_or_default(),
        page_number,
        bounding_box: bounding_box_of(entry.get("boundingBox")),
        relevance_score,
        connection_type,
    }
}

/// Row `index` of a raw result bundle.
fn bundle_entry(bundle: &ResultBundle<'_>, index: usize) -> Recommendation {
    let metadata = bundle.metadatas.get(index).unwrap_or(&Value::Null);

    let relevance_score = match bundle.distances.get(index).and_then(Value::as_f64) {
        Some(distance) if !distance.is_nan() => 1.0 - distance.clamp(0.0, 1.0),
        _ => placeholder_score(index),
    };

    let source_document = metadata
        .get("document")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(UNKNOWN_SOURCE)
        .to_string();

    let id = bundle
        .ids
        .get(index)
        .and_then(text_of)
        .unwrap_or_else(|| format!("rec-{index}"));

    let snippet = bundle
        .documents
        .get(index)
        .and_then(text_of)
        .unwrap_or_default();

    Recommendation {
        id,
        source_document,
        snippet: truncate_snippet(&snippet),
        page_number: page_from_range(metadata.get("page_range")),
        bounding_box: bounding_box_of(metadata.get("chunk_bboxes")),
        relevance_score,
        connection_type: connection_for(relevance_score),
    }
}

/// Heuristic type for bundles that carry no classification of their own.
pub fn connection_for(relevance: f64) -> ConnectionType {
    if relevance > 0.8 {
        ConnectionType::Elaboration
    } else if relevance > 0.6 {
        ConnectionType::Correlation
    } else {
        ConnectionType::Context
    }
}

/// Decreasing score used when the backend sends no distance.
fn placeholder_score(index: usize) -> f64 {
    // 0.8, 0.7, 0.6, ...
    clamp_unit((8.0 - index as f64) / 10.0)
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Cut to [`SNIPPET_LIMIT`] characters, marking the cut with an ellipsis.
pub fn truncate_snippet(text: &str) -> String {
    match text.char_indices().nth(SNIPPET_LIMIT) {
        Some((cut, _)) => format!("{}{ELLIPSIS}", &text[..cut]),
        None => text.to_string(),
    }
}

/// 1-based page from a page-range field; unparseable ranges mean page 1.
fn page_from_range(value: Option<&Value>) -> u32 {
    let first = list_of(value)
        .and_then(|list| list.into_iter().next())
        .and_then(|v| number_of(&v))
        .filter(|n| n.is_finite() && *n >= 0.0)
        .map(|n| n.min(u32::MAX as f64 - 1.0) as u32)
        .unwrap_or(0);
    first + 1
}

/// First quartet of a bounding-box list; anything malformed is all zeros.
fn bounding_box_of(value: Option<&Value>) -> BoundingBox {
    let Some(list) = list_of(value) else {
        return BoundingBox::ZERO;
    };

    let quartet = match list.first() {
        Some(Value::Array(inner)) => inner.clone(),
        _ => list,
    };

    if quartet.len() != 4 {
        return BoundingBox::ZERO;
    }

    let mut coords = [0.0; 4];
    for (slot, v) in coords.iter_mut().zip(&quartet) {
        match number_of(v) {
            Some(n) if n.is_finite() => *slot = n,
            _ => return BoundingBox::ZERO,
        }
    }
    BoundingBox(coords)
}

/// A JSON list given either as a real array or as a string such as
/// `"[0, 2]"` or `"['a', 'b']"` (single quotes are normalized first).
fn list_of(value: Option<&Value>) -> Option<Vec<Value>> {
    match value? {
        Value::Array(items) => Some(items.clone()),
        Value::String(raw) => {
            let normalized = raw.replace('\'', "\"");
            match serde_json::from_str::<Value>(&normalized) {
                Ok(Value::Array(items)) => Some(items),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Numbers, or strings holding numbers.
fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Non-empty text from strings or numbers.
fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_text(entry: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| entry.get(*k).and_then(text_of))
}

// ---------------------------------------------------------------------------
// Document lists
// ---------------------------------------------------------------------------

/// Known shapes of a document-list response.
#[derive(Debug, Clone, Copy)]
pub enum DocumentListPayload<'a> {
    /// `{documents: [...]}` with objects or bare names.
    Current(&'a [Value]),
    /// `{pdfs: [...]}` from older backends.
    Legacy(&'a [Value]),
    /// A bare top-level array.
    Bare(&'a [Value]),
    Empty,
}

impl<'a> DocumentListPayload<'a> {
    pub fn sniff(payload: &'a Value) -> Self {
        if let Some(items) = payload.get("documents").and_then(Value::as_array) {
            Self::Current(items)
        } else if let Some(items) = payload.get("pdfs").and_then(Value::as_array) {
            Self::Legacy(items)
        } else if let Some(items) = payload.as_array() {
            Self::Bare(items)
        } else {
            Self::Empty
        }
    }

    fn entries(&self) -> &'a [Value] {
        match self {
            Self::Current(items) | Self::Legacy(items) | Self::Bare(items) => items,
            Self::Empty => &[],
        }
    }
}

/// Turn any list payload into documents with unique, non-empty ids.
///
/// `fetched_at` stands in for missing upload timestamps.
pub fn normalize_documents(payload: &Value, fetched_at: DateTime<Utc>) -> Vec<Document> {
    let shape = DocumentListPayload::sniff(payload);
    let mut seen = HashSet::new();

    let docs: Vec<Document> = shape
        .entries()
        .iter()
        .enumerate()
        .filter_map(|(i, entry)| document_entry(i, entry, fetched_at))
        .map(|mut doc| {
            if !seen.insert(doc.id.clone()) {
                doc.id = unique_id(&doc.id, &mut seen);
            }
            doc
        })
        .collect();

    debug!(count = docs.len(), "normalized document list");
    docs
}

/// First `<base>-<n>` not yet taken, counting up from the number of ids seen.
fn unique_id(base: &str, seen: &mut HashSet<String>) -> String {
    let mut n = seen.len();
    loop {
        let candidate = format!("{base}-{n}");
        if seen.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

fn document_entry(index: usize, entry: &Value, fetched_at: DateTime<Utc>) -> Option<Document> {
    match entry {
        Value::String(name) if !name.trim().is_empty() => Some(Document {
            id: Document::fallback_id(name, index),
            name: name.clone(),
            uploaded_at: fetched_at,
            url: None,
        }),
        Value::Object(_) => {
            let id = first_text(entry, &["id", "_id"]);
            let name = first_text(entry, &["name", "filename", "title"]).or_else(|| id.clone())?;
            let uploaded_at = first_text(entry, &["uploadedAt", "uploaded_at"])
                .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or(fetched_at);

            Some(Document {
                id: id.unwrap_or_else(|| Document::fallback_id(&name, index)),
                name,
                uploaded_at,
                url: first_text(entry, &["url"]),
            })
        }
        _ => None,
    }
}
