//! Files queued for a bulk upload and their multipart encoding.

use std::path::Path;

use insightlens_shared::{InsightError, Result};
use reqwest::multipart::{Form, Part};

/// MIME type used for every uploaded document.
const PDF_MIME: &str = "application/pdf";

/// One file to send to `/upload_pdfs`.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Read a local file, keeping only its file name for the upload.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                InsightError::validation(format!("not a file path: {}", path.display()))
            })?
            .to_string();

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| InsightError::io(path, e))?;

        Ok(Self { name, bytes })
    }
}

/// Build the multipart form: one repeated `files` field per document.
pub(crate) fn upload_form(files: Vec<UploadFile>) -> Result<Form> {
    if files.is_empty() {
        return Err(InsightError::validation("no files to upload"));
    }

    let mut form = Form::new();
    for file in files {
        if file.name.trim().is_empty() {
            return Err(InsightError::validation("upload file has an empty name"));
        }
        let part = Part::bytes(file.bytes)
            .file_name(file.name)
            .mime_str(PDF_MIME)
            .map_err(|e| InsightError::validation(format!("invalid MIME type: {e}")))?;
        form = form.part("files", part);
    }
    Ok(form)
}
