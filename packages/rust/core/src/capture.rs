//! Screenshot capture for selection requests.
//!
//! The backend uses the image as visual context around the selected text.
//! Images under 1000 bytes are treated as "text only", which is what the
//! [`PlaceholderCapturer`] relies on.

use std::path::Path;

use async_trait::async_trait;
use insightlens_shared::{CaptureRegion, InsightError, Result, Screenshot};
use tracing::debug;

/// A valid 1×1 transparent PNG.
const PLACEHOLDER_PNG: [u8; 67] = [
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Produces an image of a region of the rendering surface.
#[async_trait]
pub trait ScreenshotCapturer: Send + Sync {
    /// Capture `region`; `hint` is the selected text the image should contain.
    async fn capture(&self, region: &CaptureRegion, hint: &str) -> Result<Screenshot>;
}

// ---------------------------------------------------------------------------
// PlaceholderCapturer
// ---------------------------------------------------------------------------

/// Returns a fixed 1×1 PNG, so the backend falls back to the text hint.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderCapturer;

impl PlaceholderCapturer {
    pub fn screenshot() -> Screenshot {
        Screenshot {
            bytes: PLACEHOLDER_PNG.to_vec(),
            mime: "image/png".into(),
            width: 1,
            height: 1,
        }
    }
}

#[async_trait]
impl ScreenshotCapturer for PlaceholderCapturer {
    async fn capture(&self, region: &CaptureRegion, hint: &str) -> Result<Screenshot> {
        debug!(page = ?region.page, hint_len = hint.len(), "using placeholder screenshot");
        Ok(Self::screenshot())
    }
}

// ---------------------------------------------------------------------------
// StaticCapturer
// ---------------------------------------------------------------------------

/// Serves the same pre-loaded image for every capture.
#[derive(Debug, Clone)]
pub struct StaticCapturer {
    screenshot: Screenshot,
}

impl StaticCapturer {
    pub fn new(screenshot: Screenshot) -> Self {
        Self { screenshot }
    }

    /// Load an image file; the MIME type comes from the extension.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let mime = mime_for_path(path).ok_or_else(|| {
            InsightError::validation(format!(
                "unsupported image type: {} (expected png, jpg or webp)",
                path.display()
            ))
        })?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| InsightError::io(path, e))?;
        if bytes.is_empty() {
            return Err(InsightError::Capture(format!("{} is empty", path.display())));
        }

        let (width, height) = png_dimensions(&bytes).unwrap_or((0, 0));
        Ok(Self::new(Screenshot {
            bytes,
            mime: mime.to_string(),
            width,
            height,
        }))
    }
}

#[async_trait]
impl ScreenshotCapturer for StaticCapturer {
    async fn capture(&self, _region: &CaptureRegion, _hint: &str) -> Result<Screenshot> {
        Ok(self.screenshot.clone())
    }
}

fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Width and height from a PNG's IHDR chunk.
fn png_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    if bytes.len() < 24 || bytes[..8] != PNG_SIGNATURE || &bytes[12..16] != b"IHDR" {
        return None;
    }
    let width = u32::from_be_bytes(bytes[16..20].try_into().ok()?);
    let height = u32::from_be_bytes(bytes[20..24].try_into().ok()?);
    Some((width, height))
}
