use std::path::Path;

use base64::Engine;
use reqwest::{multipart::{Form, Part}, Client};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, error, debug};

use crate::{config::Config, models::UploadedImage};

pub const EDIT_MODEL: &str = "gpt-image-1";
pub const EDIT_SIZE: &str = "1024x1024";
const DEFAULT_UPLOAD_NAME: &str = "upload.png";

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("HTTP error: {0}")] Http(String),
    #[error("OpenAI error {status}: {body}")] Status { status: u16, body: String },
    #[error("No image returned from OpenAI")] NoImage,
    #[error("Other: {0}")] Other(String),
}

/// Extension (with or without the dot) to the mime type sent upstream.
pub fn mime_for(ext: &str) -> &'static str {
    match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

fn preview(b64: &str) -> String {
    match b64.get(..50) {
        Some(head) if b64.len() > 50 => format!("{}...[{} chars total]", head, b64.len()),
        _ => b64.to_string(),
    }
}

/// Guess the format from the leading bytes of a base64 payload, for logs only.
fn sniff_kind(b64: &str) -> &'static str {
    let Some(head) = b64.get(..b64.len().min(16)) else { return "Unknown" };
    match base64::engine::general_purpose::STANDARD.decode(head) {
        Ok(bytes) if bytes.starts_with(b"\x89PNG") => "PNG",
        Ok(bytes) if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) => "JPEG",
        Ok(bytes) if bytes.starts_with(b"RIFF") => "WEBP",
        _ => "Unknown",
    }
}

pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self { client: Client::new(), api_key, base_url }
    }

    pub fn from_config(config: &Config) -> Result<Self, UpstreamError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.upstream_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| UpstreamError::Http(e.to_string()))?;
        Ok(Self {
            client,
            api_key: config.openai_api_key.clone(),
            base_url: config.openai_api_base.clone(),
        })
    }

    fn image_part(image: &UploadedImage) -> Result<Part, UpstreamError> {
        let filename = image.filename.clone().filter(|n| !n.is_empty()).unwrap_or_else(|| DEFAULT_UPLOAD_NAME.to_string());
        let mime = match image.content_type.as_deref() {
            Some(declared) if !declared.is_empty() => declared.to_string(),
            _ => {
                let ext = Path::new(&filename).extension().and_then(|e| e.to_str()).unwrap_or("png");
                mime_for(ext).to_string()
            }
        };
        Part::stream(image.bytes.clone())
            .file_name(filename)
            .mime_str(&mime)
            .map_err(|e| UpstreamError::Other(format!("invalid image mime type {mime:?}: {e}")))
    }

    /// One `images/edits` call. Returns the base64 PNG payload.
    pub async fn edit_image(&self, image: &UploadedImage, prompt: &str) -> Result<String, UpstreamError> {
        let url = format!("{}/images/edits", self.base_url);
        info!("🔗 Making edit request to: {} ({} image bytes)", url, image.bytes.len());
        debug!("📤 Prompt: {}", prompt);

        let form = Form::new()
            .text("model", EDIT_MODEL)
            .text("prompt", prompt.to_string())
            .text("size", EDIT_SIZE)
            .text("n", "1")
            .part("image", Self::image_part(image)?);

        let response = self.client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UpstreamError::Http(e.to_string()))?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("❌ API Error response: {}", body);
            return Err(UpstreamError::Status { status: status.as_u16(), body });
        }

        let parsed: EditResponse = response.json().await
            .map_err(|e| UpstreamError::Other(format!("parse error: {e}")))?;

        match extract_first_b64(parsed) {
            Some(b64) => {
                info!("🖼️ Extracted {} image from API response: {}", sniff_kind(&b64), preview(&b64));
                Ok(b64)
            }
            None => {
                info!("⚠️ No image data found in API response");
                Err(UpstreamError::NoImage)
            }
        }
    }
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
struct EditResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    #[serde(default)]
    b64_json: Option<String>,
}

fn extract_first_b64(resp: EditResponse) -> Option<String> {
    resp.data.into_iter().next().and_then(|d| d.b64_json).filter(|b64| !b64.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PNG_B64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR4nGNgYGBgAAAABQABpfZFQAAAAABJRU5ErkJggg==";

    fn image() -> UploadedImage {
        UploadedImage {
            bytes: Bytes::from_static(b"PNG fake bytes"),
            filename: Some("art.png".into()),
            content_type: Some("image/png".into()),
        }
    }

    #[test]
    fn mime_lookup() {
        assert_eq!(mime_for(".png"), "image/png");
        assert_eq!(mime_for("PNG"), "image/png");
        assert_eq!(mime_for(".JPG"), "image/jpeg");
        assert_eq!(mime_for("jpeg"), "image/jpeg");
        assert_eq!(mime_for(".webp"), "image/webp");
        assert_eq!(mime_for(".gif"), "application/octet-stream");
        assert_eq!(mime_for(""), "application/octet-stream");
    }

    #[test]
    fn sniffs_png_payloads() {
        assert_eq!(sniff_kind(PNG_B64), "PNG");
        assert_eq!(sniff_kind("/9j/4AAQSkZJRgABAQ"), "JPEG");
        assert_eq!(sniff_kind("!!"), "Unknown");
    }

    #[test]
    fn image_part_falls_back_to_extension_mime() {
        let mut img = image();
        img.content_type = None;
        img.filename = Some("photo.jpeg".into());
        assert!(OpenAiClient::image_part(&img).is_ok());
        img.filename = None;
        assert!(OpenAiClient::image_part(&img).is_ok());
    }

    #[tokio::test]
    async fn returns_b64_payload_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/images/edits"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_string_contains("gpt-image-1"))
            .and(body_string_contains("1024x1024"))
            .and(body_string_contains("add a moon"))
            .and(body_string_contains("filename=\"art.png\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [{"b64_json": PNG_B64}]})))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiClient::new("sk-test".into(), format!("{}/v1", server.uri()));
        let b64 = client.edit_image(&image(), "add a moon").await.unwrap();
        assert_eq!(b64, PNG_B64);
    }

    #[tokio::test]
    async fn non_success_status_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let client = OpenAiClient::new("k".into(), server.uri());
        let err = client.edit_image(&image(), "p").await.unwrap_err();
        assert!(matches!(err, UpstreamError::Status { status: 429, .. }));
        assert_eq!(err.to_string(), "OpenAI error 429: slow down");
    }

    #[tokio::test]
    async fn missing_payload_is_no_image_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [{"url": "https://x"}]})))
            .mount(&server)
            .await;

        let client = OpenAiClient::new("k".into(), server.uri());
        let err = client.edit_image(&image(), "p").await.unwrap_err();
        assert_eq!(err.to_string(), "No image returned from OpenAI");
    }

    #[tokio::test]
    async fn empty_data_array_is_no_image_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let client = OpenAiClient::new("k".into(), server.uri());
        assert!(matches!(client.edit_image(&image(), "p").await, Err(UpstreamError::NoImage)));
    }
}
