use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder used when neither the uploader nor the backend knows a name.
pub const DEFAULT_ORIGINAL_NAME: &str = "uploaded_image";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Key-addressed object storage without transformations.
    Blob,
    /// Image CDN serving resized variants through URL parameters.
    Cdn,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Blob => "blob",
            BackendKind::Cdn => "cdn",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BackendKind::Blob => "Blob Storage",
            BackendKind::Cdn => "Image CDN",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a storage adapter reports about one stored object.
///
/// Only `storage_key` is guaranteed; everything else depends on what the
/// backend exposes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPhoto {
    pub storage_key: String,
    pub url: Option<String>,
    pub asset_id: Option<String>,
    pub original_name: Option<String>,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub size: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: Option<String>,
}

impl RawPhoto {
    pub fn new(storage_key: impl Into<String>) -> Self {
        Self {
            storage_key: storage_key.into(),
            ..Default::default()
        }
    }
}

/// Canonical photo metadata returned to clients, whatever backend stored it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub id: String,
    pub filename: String,
    pub original_name: String,
    pub url: String,
    pub thumbnail_url: String,
    pub grid_url: String,
    pub large_url: String,
    pub uploaded_at: DateTime<Utc>,
    pub size: u64,
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub backend_ref: String,
}
