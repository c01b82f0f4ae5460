//! Upload transport strategies
//!
//! The endpoint accepts either a multipart form or a JSON envelope carrying
//! the payload as base64. Strategies are tried in [`UploadStrategy::ORDER`].

use crate::UploadError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};

/// Longest response excerpt kept in an error message
const MAX_ERROR_BODY: usize = 200;

/// How a payload is sent to the endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadStrategy {
    /// Form fields `file`, `filename`, `folderId?`, `session?`
    Multipart,
    /// JSON body `{filename, folderId, session, type, data}`
    JsonEnvelope,
}

impl UploadStrategy {
    /// Primary first, then the fallback
    pub const ORDER: [UploadStrategy; 2] = [Self::Multipart, Self::JsonEnvelope];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Multipart => "multipart",
            Self::JsonEnvelope => "json",
        }
    }

    /// Builds the POST request for this strategy
    pub fn build_request(
        &self,
        client: &Client,
        endpoint: &str,
        payload: &UploadPayload<'_>,
    ) -> Result<RequestBuilder, UploadError> {
        let request = client.post(endpoint);
        match self {
            Self::Multipart => Ok(request.multipart(multipart_form(payload)?)),
            Self::JsonEnvelope => Ok(request.json(&JsonEnvelope::new(payload))),
        }
    }
}

/// Where uploads go on the remote side
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DestinationMeta {
    pub folder_id: Option<String>,
    pub session: Option<String>,
}

/// One item to upload
#[derive(Debug, Clone, Copy)]
pub struct UploadPayload<'a> {
    pub data: &'a [u8],
    pub filename: &'a str,
    pub mime: &'a str,
    pub meta: &'a DestinationMeta,
}

#[derive(Debug, Serialize)]
struct JsonEnvelope<'a> {
    filename: &'a str,
    #[serde(rename = "folderId")]
    folder_id: Option<&'a str>,
    session: Option<&'a str>,
    #[serde(rename = "type")]
    mime: &'a str,
    data: String,
}

impl<'a> JsonEnvelope<'a> {
    fn new(payload: &UploadPayload<'a>) -> Self {
        Self {
            filename: payload.filename,
            folder_id: payload.meta.folder_id.as_deref(),
            session: payload.meta.session.as_deref(),
            mime: payload.mime,
            data: STANDARD.encode(payload.data),
        }
    }
}

fn multipart_form(payload: &UploadPayload<'_>) -> Result<Form, UploadError> {
    let file = Part::bytes(payload.data.to_vec())
        .file_name(payload.filename.to_string())
        .mime_str(payload.mime)
        .map_err(|e| UploadError::Encoding(e.to_string()))?;

    let mut form = Form::new()
        .part("file", file)
        .text("filename", payload.filename.to_string());
    if let Some(folder_id) = &payload.meta.folder_id {
        form = form.text("folderId", folder_id.clone());
    }
    if let Some(session) = &payload.meta.session {
        form = form.text("session", session.clone());
    }
    Ok(form)
}

/// Response body the endpoint sends back
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(rename = "webViewLink", default)]
    pub web_view_link: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl UploadResponse {
    /// Remote reference on success, error otherwise
    pub fn into_reference(self) -> Result<String, UploadError> {
        if !self.ok {
            return Err(UploadError::Remote(
                self.error
                    .unwrap_or_else(|| "endpoint returned ok=false".to_string()),
            ));
        }
        Ok(self.web_view_link.or(self.url).unwrap_or_default())
    }
}

/// Interprets an endpoint response
///
/// Non-2xx is a rejection; a 2xx body must be JSON with `ok: true`.
pub async fn read_response(response: Response) -> Result<String, UploadError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| UploadError::Transport(e.to_string()))?;

    if !status.is_success() {
        return Err(UploadError::Rejected {
            status: status.as_u16(),
            message: excerpt(&body),
        });
    }

    let parsed: UploadResponse = serde_json::from_str(&body)
        .map_err(|e| UploadError::Remote(format!("invalid response ({}): {}", e, excerpt(&body))))?;
    parsed.into_reference()
}

/// MIME type for an uploaded file name
pub fn mime_for(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "zip" => "application/zip",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> DestinationMeta {
        DestinationMeta {
            folder_id: Some("folder-1".to_string()),
            session: None,
        }
    }

    #[test]
    fn test_order_is_multipart_then_json() {
        assert_eq!(
            UploadStrategy::ORDER,
            [UploadStrategy::Multipart, UploadStrategy::JsonEnvelope]
        );
        assert_eq!(UploadStrategy::JsonEnvelope.name(), "json");
    }

    #[test]
    fn test_json_envelope_shape() {
        let meta = meta();
        let payload = UploadPayload {
            data: b"hello",
            filename: "images_part01.zip",
            mime: "application/zip",
            meta: &meta,
        };

        let value = serde_json::to_value(JsonEnvelope::new(&payload)).unwrap();
        assert_eq!(value["filename"], "images_part01.zip");
        assert_eq!(value["folderId"], "folder-1");
        assert!(value["session"].is_null());
        assert_eq!(value["type"], "application/zip");
        assert_eq!(value["data"], "aGVsbG8=");
    }

    #[test]
    fn test_response_reference() {
        let response: UploadResponse =
            serde_json::from_str(r#"{"ok":true,"webViewLink":"https://view/1","url":"https://u/1"}"#)
                .unwrap();
        assert_eq!(response.into_reference().unwrap(), "https://view/1");

        let response: UploadResponse =
            serde_json::from_str(r#"{"ok":true,"url":"https://u/1"}"#).unwrap();
        assert_eq!(response.into_reference().unwrap(), "https://u/1");
    }

    #[test]
    fn test_response_not_ok() {
        let response: UploadResponse =
            serde_json::from_str(r#"{"ok":false,"error":"quota exceeded"}"#).unwrap();
        assert_eq!(
            response.into_reference(),
            Err(UploadError::Remote("quota exceeded".to_string()))
        );

        let response: UploadResponse = serde_json::from_str("{}").unwrap();
        assert!(response.into_reference().is_err());
    }

    #[test]
    fn test_build_requests() {
        let client = Client::new();
        let meta = meta();
        let payload = UploadPayload {
            data: b"x",
            filename: "a.jpg",
            mime: "image/jpeg",
            meta: &meta,
        };

        for strategy in UploadStrategy::ORDER {
            let request = strategy
                .build_request(&client, "https://upload.example.com/exec", &payload)
                .unwrap()
                .build()
                .unwrap();
            assert_eq!(request.method(), reqwest::Method::POST);
        }
    }

    #[test]
    fn test_mime_for() {
        assert_eq!(mime_for("images_part01_20240101_0000.zip"), "application/zip");
        assert_eq!(mime_for("A1/A1_01.JPG"), "image/jpeg");
        assert_eq!(mime_for("A1_01.bin"), "application/octet-stream");
    }

    #[test]
    fn test_excerpt_truncates() {
        let long = "x".repeat(500);
        assert_eq!(excerpt(&long).len(), MAX_ERROR_BODY + 3);
        assert_eq!(excerpt(" short "), "short");
    }
}
