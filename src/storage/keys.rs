use chrono::{DateTime, Utc};
use rand::{Rng, distr::Alphanumeric};

use super::get_extension_from_mime_type;

const RANDOM_SUFFIX_LEN: usize = 6;
const FALLBACK_EXTENSION: &str = "jpg";

fn extension_from_filename(file_name: &str) -> Option<String> {
    if let Some((_, ext)) = file_name.rsplit_once('.') {
        let trimmed = ext.trim();
        if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Some(trimmed.to_lowercase());
        }
    }
    None
}

pub fn resolve_extension(file_name: &str, content_type: &str) -> String {
    if let Some(ext) = extension_from_filename(file_name) {
        return ext;
    }
    if let Some(ext) = get_extension_from_mime_type(content_type) {
        return ext.to_string();
    }
    FALLBACK_EXTENSION.to_string()
}

/// Empty, or the trimmed prefix followed by exactly one `/`.
pub fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}/")
    }
}

/// `<prefix><unix millis>-<random>.<ext>`, the shape blob ids are derived from.
pub fn generate_blob_key(
    prefix: &str,
    uploaded_at: DateTime<Utc>,
    file_name: &str,
    content_type: &str,
) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_SUFFIX_LEN)
        .map(|byte| char::from(byte).to_ascii_lowercase())
        .collect();
    let ext = resolve_extension(file_name, content_type);
    format!(
        "{}{}-{suffix}.{ext}",
        normalize_prefix(prefix),
        uploaded_at.timestamp_millis()
    )
}
