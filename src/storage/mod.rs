pub mod cdn;
pub mod keys;
pub mod local;
pub mod memory;
pub mod remote_blob;
pub mod signing;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::photo::{BackendKind, RawPhoto};

pub use cdn::CdnStorage;
pub use keys::{generate_blob_key, normalize_prefix, resolve_extension};
pub use local::LocalFileStorage;
pub use memory::MemoryStorage;
pub use remote_blob::RemoteBlobStorage;
pub use signing::compute_hash;

/// A file accepted from a client, ready to be written to a backend.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub bytes: Bytes,
    pub original_name: String,
    pub content_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Boundary between the gallery service and a concrete storage backend.
///
/// Each call maps to one request against the backend. Implementations report
/// what the backend knows and leave shaping to the normalizer.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    fn kind(&self) -> BackendKind;

    async fn put(&self, upload: PhotoUpload) -> Result<RawPhoto>;

    async fn list(&self, limit: usize) -> Result<Vec<RawPhoto>>;

    async fn delete(&self, backend_ref: &str) -> Result<DeleteOutcome>;
}

pub fn get_extension_from_mime_type(mime_type: &str) -> Option<&'static str> {
    match mime_type.to_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/bmp" => Some("bmp"),
        "image/svg+xml" => Some("svg"),
        "image/avif" => Some("avif"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

pub(crate) async fn assert_ok_response(
    response: reqwest::Response,
    service: &str,
) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    Err(anyhow!("{service} request failed: {status} {text}"))
}

/// Backends report RFC 3339 timestamps; anything unparseable counts as unknown.
pub(crate) fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|value| DateTime::parse_from_rfc3339(value.trim()).ok())
        .map(|at| at.with_timezone(&Utc))
}

/// Decodes listing entries one at a time so a malformed entry drops only
/// itself.
pub(crate) fn decode_entries<T: DeserializeOwned>(
    entries: Vec<serde_json::Value>,
    service: &str,
) -> Vec<T> {
    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value(entry) {
            Ok(decoded) => Some(decoded),
            Err(err) => {
                warn!(service, error = %err, "skipping malformed listing entry");
                None
            }
        })
        .collect()
}
