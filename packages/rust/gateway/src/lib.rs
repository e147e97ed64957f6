//! HTTP gateway to the InsightLens backend.
//!
//! One method per backend capability. Every call either returns the parsed
//! success payload or fails with [`InsightError::Transport`],
//! [`InsightError::Http`] or [`InsightError::Decode`]. Nothing here retries;
//! retry policy belongs to callers.

mod upload;

use std::time::Duration;

use async_trait::async_trait;
use insightlens_shared::{
    AppConfig, Insight, InsightError, PodcastScript, Result, Screenshot, UploadReceipt,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde_json::Value;
use tracing::{debug, info, instrument};
use url::Url;

pub use upload::UploadFile;

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 3;

/// Default timeout in seconds; insight and podcast generation are slow.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// User-Agent string for backend requests.
const USER_AGENT: &str = concat!("InsightLens/", env!("CARGO_PKG_VERSION"));

/// Fields a FastAPI-style error body may carry a human-readable reason in.
const DETAIL_FIELDS: [&str; 3] = ["detail", "message", "error"];

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// Submits a selection (image + text) and returns the raw search payload.
#[async_trait]
pub trait SelectionSearch: Send + Sync {
    async fn search_selection(&self, screenshot: &Screenshot, text: &str) -> Result<Value>;
}

/// Produces on-demand insights and podcast scripts.
#[async_trait]
pub trait InsightSource: Send + Sync {
    async fn fetch_insight(&self) -> Result<Insight>;
    async fn fetch_podcast(&self) -> Result<PodcastScript>;
}

// ---------------------------------------------------------------------------
// Gateway options
// ---------------------------------------------------------------------------

/// Configuration for the gateway's HTTP client.
#[derive(Debug, Clone)]
pub struct GatewayOptions {
    /// Timeout for HTTP requests in seconds.
    pub timeout_secs: u64,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// Thin transport layer over the backend's HTTP surface.
#[derive(Debug, Clone)]
pub struct Gateway {
    client: Client,
    base_url: Url,
}

impl Gateway {
    /// Create a gateway for the backend at `base_url`.
    pub fn new(base_url: Url, opts: &GatewayOptions) -> Result<Self> {
        if base_url.cannot_be_a_base() {
            return Err(InsightError::config(format!(
                "base URL cannot carry paths: {base_url}"
            )));
        }

        Ok(Self {
            client: build_client(opts)?,
            base_url,
        })
    }

    /// Create a gateway from the `[backend]` config section.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let opts = GatewayOptions {
            timeout_secs: config.backend.timeout_secs,
        };
        Self::new(config.base_url()?, &opts)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// POST `/upload_pdfs` with one multipart `files` part per document.
    #[instrument(skip_all, fields(count = files.len()))]
    pub async fn upload_documents(&self, files: Vec<UploadFile>) -> Result<UploadReceipt> {
        let url = self.endpoint(&["upload_pdfs"])?;
        let form = upload::upload_form(files)?;

        let response = self.send(self.client.post(url.clone()).multipart(form), &url).await?;
        let receipt: UploadReceipt = decode_json(response, &url).await?;

        info!(files = receipt.files.len(), "upload accepted");
        Ok(receipt)
    }

    /// POST `/extract_and_search/` with the screenshot and selected text.
    ///
    /// The payload is returned raw; its shape varies between backend versions.
    #[instrument(skip_all, fields(text_len = text.len(), image_bytes = screenshot.bytes.len()))]
    pub async fn search_selection(&self, screenshot: &Screenshot, text: &str) -> Result<Value> {
        let url = self.endpoint(&["extract_and_search", ""])?;

        let image = Part::bytes(screenshot.bytes.clone())
            .file_name(screenshot.file_name())
            .mime_str(&screenshot.mime)
            .map_err(|e| InsightError::validation(format!("invalid screenshot MIME type: {e}")))?;
        let form = Form::new().part("image", image).text("text", text.to_string());

        let response = self.send(self.client.post(url.clone()).multipart(form), &url).await?;
        decode_json(response, &url).await
    }

    /// GET `/generate_insights`.
    #[instrument(skip_all)]
    pub async fn fetch_insight(&self) -> Result<Insight> {
        let url = self.endpoint(&["generate_insights"])?;
        let response = self.send(self.client.get(url.clone()), &url).await?;
        decode_json(response, &url).await
    }

    /// GET `/generate_podcast`.
    #[instrument(skip_all)]
    pub async fn fetch_podcast(&self) -> Result<PodcastScript> {
        let url = self.endpoint(&["generate_podcast"])?;
        let response = self.send(self.client.get(url.clone()), &url).await?;
        decode_json(response, &url).await
    }

    /// GET `/list_pdfs`. Returned raw: current and legacy backends differ.
    #[instrument(skip_all)]
    pub async fn list_documents(&self) -> Result<Value> {
        let url = self.endpoint(&["list_pdfs"])?;
        let response = self.send(self.client.get(url.clone()), &url).await?;
        decode_json(response, &url).await
    }

    /// GET `/get_pdf/{name}` and return the document bytes.
    #[instrument(skip_all, fields(name = %name))]
    pub async fn fetch_document(&self, name: &str) -> Result<Vec<u8>> {
        if name.trim().is_empty() {
            return Err(InsightError::validation("document name is empty"));
        }

        let url = self.endpoint(&["get_pdf", name])?;
        let response = self.send(self.client.get(url.clone()), &url).await?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| send_error(&url, "failed to read body: ", e))?;

        debug!(bytes = bytes.len(), "document fetched");
        Ok(bytes.to_vec())
    }

    /// Append path segments to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| InsightError::config("base URL cannot carry paths"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request, mapping connection failures and non-2xx statuses.
    async fn send(&self, request: reqwest::RequestBuilder, url: &Url) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| send_error(url, "", e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = error_detail(&body);
        debug!(%url, status = status.as_u16(), ?detail, "backend returned an error status");

        Err(InsightError::Http {
            status: status.as_u16(),
            detail,
        })
    }
}

#[async_trait]
impl SelectionSearch for Gateway {
    async fn search_selection(&self, screenshot: &Screenshot, text: &str) -> Result<Value> {
        Gateway::search_selection(self, screenshot, text).await
    }
}

#[async_trait]
impl InsightSource for Gateway {
    async fn fetch_insight(&self) -> Result<Insight> {
        Gateway::fetch_insight(self).await
    }

    async fn fetch_podcast(&self) -> Result<PodcastScript> {
        Gateway::fetch_podcast(self).await
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a reqwest client with appropriate settings.
fn build_client(opts: &GatewayOptions) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(Duration::from_secs(opts.timeout_secs))
        .build()
        .map_err(|e| InsightError::Transport(format!("failed to build HTTP client: {e}")))
}

/// Timeouts are slow answers, not an unreachable host.
fn send_error(url: &Url, context: &str, e: reqwest::Error) -> InsightError {
    if e.is_timeout() {
        InsightError::Timeout(format!("{url}: {context}{e}"))
    } else {
        InsightError::Transport(format!("{url}: {context}{e}"))
    }
}

/// Read the whole body and parse it as JSON into `T`.
async fn decode_json<T: serde::de::DeserializeOwned>(response: Response, url: &Url) -> Result<T> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| InsightError::Transport(format!("{url}: failed to read body: {e}")))?;

    serde_json::from_slice(&bytes).map_err(|e| InsightError::decode(format!("{url}: {e}")))
}

/// Pull a readable reason out of an error body, if it has one.
fn error_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;

    DETAIL_FIELDS.iter().find_map(|field| match value.get(*field)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Null => None,
        Value::String(_) => None,
        // FastAPI validation errors carry a list of objects
        other => Some(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway_for(server: &MockServer) -> Gateway {
        let url = Url::parse(&server.uri()).unwrap();
        Gateway::new(url, &GatewayOptions::default()).unwrap()
    }

    fn tiny_png() -> Screenshot {
        Screenshot {
            bytes: vec![0x89, b'P', b'N', b'G'],
            mime: "image/png".into(),
            width: 1,
            height: 1,
        }
    }

    #[test]
    fn test_endpoint_joins_segments() {
        let gw = Gateway::new(
            Url::parse("http://localhost:8000/api/").unwrap(),
            &GatewayOptions::default(),
        )
        .unwrap();
        assert_eq!(
            gw.endpoint(&["list_pdfs"]).unwrap().as_str(),
            "http://localhost:8000/api/list_pdfs"
        );
        assert_eq!(
            gw.endpoint(&["extract_and_search", ""]).unwrap().as_str(),
            "http://localhost:8000/api/extract_and_search/"
        );
    }

    #[test]
    fn test_endpoint_encodes_file_names() {
        let gw = Gateway::new(
            Url::parse("http://localhost:8000").unwrap(),
            &GatewayOptions::default(),
        )
        .unwrap();
        assert_eq!(
            gw.endpoint(&["get_pdf", "My Report #2.pdf"]).unwrap().as_str(),
            "http://localhost:8000/get_pdf/My%20Report%20%232.pdf"
        );
    }

    #[test]
    fn test_error_detail_fields() {
        assert_eq!(
            error_detail(r#"{"detail": "File not found in database."}"#),
            Some("File not found in database.".into())
        );
        assert_eq!(
            error_detail(r#"{"message": "quota exceeded"}"#),
            Some("quota exceeded".into())
        );
        assert_eq!(error_detail(r#"{"error": ""}"#), None);
        assert_eq!(error_detail("<html>Bad Gateway</html>"), None);
        assert!(error_detail(r#"{"detail": [{"loc": ["body", "text"]}]}"#)
            .unwrap()
            .contains("loc"));
    }

    #[tokio::test]
    async fn test_list_documents_returns_raw_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list_pdfs"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"pdfs": ["a.pdf", "b.pdf"]})),
            )
            .mount(&server)
            .await;

        let payload = gateway_for(&server).list_documents().await.unwrap();
        assert_eq!(payload["pdfs"][1], "b.pdf");
    }

    #[tokio::test]
    async fn test_search_sends_image_and_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/extract_and_search/"))
            .and(body_string_contains("name=\"image\""))
            .and(body_string_contains("name=\"text\""))
            .and(body_string_contains("gradient descent"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"recommendations": []})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let payload = gateway_for(&server)
            .search_selection(&tiny_png(), "gradient descent")
            .await
            .unwrap();
        assert!(payload["recommendations"].is_array());
    }

    #[tokio::test]
    async fn test_upload_documents() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload_pdfs"))
            .and(body_string_contains("filename=\"one.pdf\""))
            .and(body_string_contains("filename=\"two.pdf\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": "2 PDFs uploaded.",
                "files": ["one.pdf", "two.pdf"]
            })))
            .mount(&server)
            .await;

        let receipt = gateway_for(&server)
            .upload_documents(vec![
                UploadFile::new("one.pdf", b"%PDF-1".to_vec()),
                UploadFile::new("two.pdf", b"%PDF-2".to_vec()),
            ])
            .await
            .unwrap();
        assert_eq!(receipt.message, "2 PDFs uploaded.");
        assert_eq!(receipt.files, vec!["one.pdf", "two.pdf"]);
    }

    #[tokio::test]
    async fn test_insight_and_podcast() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/generate_insights"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"insight": "Both papers agree."})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/generate_podcast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"podcast_script": "Alex: Hi.\nBen: Hello."}),
            ))
            .mount(&server)
            .await;

        let gw = gateway_for(&server);
        assert_eq!(gw.fetch_insight().await.unwrap().text, "Both papers agree.");
        assert_eq!(gw.fetch_podcast().await.unwrap().turns().len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_document_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/get_pdf/report.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.7".to_vec()))
            .mount(&server)
            .await;

        let bytes = gateway_for(&server).fetch_document("report.pdf").await.unwrap();
        assert_eq!(bytes, b"%PDF-1.7");
    }

    #[tokio::test]
    async fn test_http_error_carries_detail() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/generate_podcast"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "detail": "Required result and insight files not found."
            })))
            .mount(&server)
            .await;

        let err = gateway_for(&server).fetch_podcast().await.unwrap_err();
        match err {
            InsightError::Http { status, detail } => {
                assert_eq!(status, 404);
                assert_eq!(
                    detail.as_deref(),
                    Some("Required result and insight files not found.")
                );
            }
            other => panic!("expected Http error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/generate_insights"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = gateway_for(&server).fetch_insight().await.unwrap_err();
        assert!(matches!(err, InsightError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        // Port 9 (discard) is closed on test machines.
        let url = Url::parse("http://127.0.0.1:9").unwrap();
        let gw = Gateway::new(url, &GatewayOptions { timeout_secs: 2 }).unwrap();
        let err = gw.list_documents().await.unwrap_err();
        assert!(err.is_offline(), "expected transport error, got {err:?}");
    }

    #[tokio::test]
    async fn test_slow_backend_is_timeout_not_offline() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/generate_podcast"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"podcast_script": "Alex: Hi."}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let url = Url::parse(&server.uri()).unwrap();
        let gw = Gateway::new(url, &GatewayOptions { timeout_secs: 1 }).unwrap();
        let err = gw.fetch_podcast().await.unwrap_err();

        assert!(matches!(err, InsightError::Timeout(_)), "got {err:?}");
        assert!(!err.is_offline());
    }

    #[tokio::test]
    async fn test_empty_document_name_rejected() {
        let server = MockServer::start().await;
        let err = gateway_for(&server).fetch_document("  ").await.unwrap_err();
        assert!(matches!(err, InsightError::Validation { .. }));
    }
}
