//! Request and response types passed between the gateway and plugin handlers

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Inbound request as seen by a plugin handler.
///
/// `params` is pre-populated by the outer router (at least the agent
/// reference segment) and extended with named captures from the matched
/// route template before the handler runs. When the body was multipart,
/// `uploads` holds the already-materialized file parts and text fields are
/// merged into `params`.
#[derive(Debug, Clone)]
pub struct PluginRequest {
    pub method: String,
    /// Path relative to the plugin namespace, always starting with `/`
    pub path: String,
    pub params: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub body: Vec<u8>,
    pub uploads: Vec<UploadedFile>,
}

impl PluginRequest {
    /// Create a request with empty parameters and body
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            params: HashMap::new(),
            query: HashMap::new(),
            body: Vec::new(),
            uploads: Vec::new(),
        }
    }

    /// Get a named parameter (path capture, outer-router segment, or form field)
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(|v| v.as_str())
    }
}

/// An uploaded file part, materialized into temporary storage before dispatch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedFile {
    /// Multipart field name the file arrived under
    pub field: String,
    /// Sanitized original filename
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub size: u64,
    /// Where the bytes were written
    pub path: PathBuf,
}

/// Response produced by a plugin handler
#[derive(Debug, Clone)]
pub struct PluginResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl PluginResponse {
    /// Empty response with the given status code
    pub fn new(status: u16) -> Self {
        Self {
            status,
            content_type: None,
            body: Vec::new(),
        }
    }

    /// 200 response with a JSON body
    pub fn json<T: Serialize>(value: &T) -> serde_json::Result<Self> {
        Ok(Self {
            status: 200,
            content_type: Some("application/json".to_string()),
            body: serde_json::to_vec(value)?,
        })
    }

    /// 200 response with a plain-text body
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: Some("text/plain".to_string()),
            body: body.into().into_bytes(),
        }
    }

    /// Override the status code
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_param() {
        let mut req = PluginRequest::new("GET", "/docs/documents/42");
        req.params.insert("id".to_string(), "42".to_string());
        assert_eq!(req.param("id"), Some("42"));
        assert_eq!(req.param("missing"), None);
    }

    #[test]
    fn test_response_json() {
        let resp = PluginResponse::json(&serde_json::json!({"ok": true})).unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.content_type.as_deref(), Some("application/json"));
        assert_eq!(resp.body, br#"{"ok":true}"#);
    }

    #[test]
    fn test_response_text_with_status() {
        let resp = PluginResponse::text("created").with_status(201);
        assert_eq!(resp.status, 201);
        assert_eq!(resp.body, b"created");
    }
}
