use bytes::Bytes;
use serde::{Serialize, Deserialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StylePreset {
    pub slug: String,
    pub prompt: String,
}

/// The `image` file field of an incoming multipart form.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Bytes,
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EditResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>, // absent for custom edits
    pub data_url: String,
}

impl EditResult {
    pub fn from_b64(slug: Option<String>, b64: &str) -> Self {
        Self { slug, data_url: format!("data:image/png;base64,{b64}") }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PresetEditResponse {
    pub results: Vec<EditResult>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CustomEditResponse {
    pub result: EditResult,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UploadResult {
    pub success: bool,
    pub key: String,
    pub link: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ErrorBody {
    pub error: String,
}
