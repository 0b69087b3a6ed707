//! Multipart pre-processing for the plugin namespace.
//!
//! Every request entering the namespace passes through here before the
//! matching route is known. Multipart bodies are parsed eagerly: file parts
//! are written to per-request temporary storage and text fields merge into
//! the request's parameter map, so a matched handler never has to touch an
//! unparsed upload. Non-multipart bodies are buffered unchanged.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use portico_core::{PluginRequest, UploadedFile};

/// Maximum buffered size for non-multipart bodies (1MB)
const MAX_REQUEST_BODY_SIZE: usize = 1_048_576;

/// A request body the pre-processor could not accept
#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("invalid multipart body: {0}")]
    Multipart(#[from] MultipartError),

    #[error("expected multipart body: {0}")]
    Rejected(#[from] MultipartRejection),

    #[error("failed to read request body: {0}")]
    Body(#[from] axum::Error),

    #[error("failed to store upload '{filename}': {source}")]
    Store {
        filename: String,
        source: std::io::Error,
    },
}

/// Build a [`PluginRequest`] from an inbound HTTP request, parsing any
/// multipart body before dispatch. `path` is the namespace-relative path
/// the dispatcher will match against.
pub async fn preprocess(
    req: Request,
    path: String,
    uploads_dir: &Path,
) -> Result<PluginRequest, PreprocessError> {
    let method = req.method().as_str().to_string();
    let query = req
        .uri()
        .query()
        .map(parse_query)
        .unwrap_or_default();

    let is_multipart = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let mut request = PluginRequest::new(method, path);
    request.query = query;

    if is_multipart {
        let mut multipart = Multipart::from_request(req, &()).await?;
        let mut request_dir: Option<PathBuf> = None;

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().map(str::to_string).unwrap_or_default();
            if let Some(filename) = field.file_name().map(str::to_string) {
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await?;

                let dir = match &request_dir {
                    Some(dir) => dir.clone(),
                    None => {
                        let dir = uploads_dir.join(Uuid::new_v4().to_string());
                        tokio::fs::create_dir_all(&dir).await.map_err(|source| {
                            PreprocessError::Store {
                                filename: filename.clone(),
                                source,
                            }
                        })?;
                        request_dir = Some(dir.clone());
                        dir
                    }
                };

                let safe_name = sanitize_filename(&filename);
                let dest = dir.join(safe_name);
                tokio::fs::write(&dest, &data).await.map_err(|source| {
                    PreprocessError::Store {
                        filename: filename.clone(),
                        source,
                    }
                })?;
                debug!(
                    "Materialized upload '{}' ({} bytes) at {}",
                    filename,
                    data.len(),
                    dest.display()
                );
                request.uploads.push(UploadedFile {
                    field: name,
                    filename: safe_name.to_string(),
                    content_type,
                    size: data.len() as u64,
                    path: dest,
                });
            } else if !name.is_empty() {
                let text = field.text().await?;
                request.params.insert(name, text);
            }
        }
    } else {
        let body = axum::body::to_bytes(req.into_body(), MAX_REQUEST_BODY_SIZE).await?;
        request.body = body.to_vec();
    }

    Ok(request)
}

/// Strip any directory components so an upload cannot escape its spool dir
fn sanitize_filename(filename: &str) -> &str {
    Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload.bin")
}

fn parse_query(query: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}
