use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::warn;

use super::record::{BackendKind, DEFAULT_ORIGINAL_NAME, PhotoRecord, RawPhoto};
use super::variants::UrlVariants;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("stored object `{storage_key}` has no access url")]
    MissingUrl { storage_key: String },
}

/// Maps a raw adapter response onto the canonical record.
///
/// Every field except `url` has a zero-value fallback, so the only failure is
/// an object the backend reported without an address.
pub fn normalize(raw: RawPhoto, kind: BackendKind) -> Result<PhotoRecord, NormalizeError> {
    let url = match non_blank(raw.url) {
        Some(url) => url,
        None => {
            return Err(NormalizeError::MissingUrl {
                storage_key: raw.storage_key,
            });
        }
    };

    let key = raw.storage_key;
    let segment = filename_segment(&key);
    let (id, format, variants) = match kind {
        BackendKind::Blob => (
            blob_id(&key).to_string(),
            extension_of(segment),
            UrlVariants::identical(&url),
        ),
        BackendKind::Cdn => {
            let id = non_blank(raw.asset_id).unwrap_or_else(|| key.clone());
            let format = non_blank(raw.format)
                .map(|format| format.to_lowercase())
                .unwrap_or_else(|| extension_of(segment));
            (id, format, UrlVariants::transformed(&url))
        }
    };
    let original_name = non_blank(raw.original_name)
        .or_else(|| (!segment.is_empty()).then(|| segment.to_string()))
        .unwrap_or_else(|| DEFAULT_ORIGINAL_NAME.to_string());
    let (width, height) = match kind {
        BackendKind::Blob => (0, 0),
        BackendKind::Cdn => (raw.width.unwrap_or(0), raw.height.unwrap_or(0)),
    };

    Ok(PhotoRecord {
        id,
        filename: key.clone(),
        original_name,
        url,
        thumbnail_url: variants.thumbnail,
        grid_url: variants.grid,
        large_url: variants.large,
        uploaded_at: raw.uploaded_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        size: raw.size.unwrap_or(0),
        width,
        height,
        format,
        backend_ref: key,
    })
}

/// Normalizes a whole listing, newest first.
///
/// Records that cannot be normalized are logged and skipped. The sort is
/// stable, so equal timestamps keep the backend's order.
pub fn normalize_listing(raws: Vec<RawPhoto>, kind: BackendKind) -> Vec<PhotoRecord> {
    let mut records: Vec<PhotoRecord> = raws
        .into_iter()
        .filter_map(|raw| match normalize(raw, kind) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(backend = %kind, "skipping stored object: {err}");
                None
            }
        })
        .collect();
    records.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
    records
}

/// Blob keys are written as `<timestamp>-<random>.<ext>`; the timestamp is the
/// id. Keys without that prefix use the whole key.
pub fn blob_id(storage_key: &str) -> &str {
    let segment = filename_segment(storage_key);
    let digits = segment
        .bytes()
        .take_while(|byte| byte.is_ascii_digit())
        .count();
    if digits > 0 && segment.as_bytes().get(digits) == Some(&b'-') {
        &segment[..digits]
    } else {
        storage_key
    }
}

pub fn filename_segment(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Lower-cased text after the last dot, or empty when there is none.
pub fn extension_of(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((_, ext)) => ext.trim().to_lowercase(),
        None => String::new(),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}
