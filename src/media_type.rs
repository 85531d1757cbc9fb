use image::ImageFormat;

const GENERIC_BINARY: &str = "application/octet-stream";

/// Sniffs the image type from magic bytes.
pub fn detect_mime_type(bytes: &[u8]) -> Option<&'static str> {
    match image::guess_format(bytes).ok()? {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Bmp => Some("image/bmp"),
        ImageFormat::Tiff => Some("image/tiff"),
        ImageFormat::Avif => Some("image/avif"),
        ImageFormat::Ico => Some("image/x-icon"),
        _ => None,
    }
}

/// Picks the content type to store an upload under.
///
/// A declared `image/*` type wins. Missing or generic declarations fall back
/// to sniffing; anything else is not an image.
pub fn resolve_image_mime_type(declared: Option<&str>, bytes: &[u8]) -> Option<String> {
    let declared = declared
        .map(|value| value.split(';').next().unwrap_or(value).trim().to_lowercase())
        .filter(|value| !value.is_empty());
    match declared.as_deref() {
        Some(value) if value.starts_with("image/") => Some(value.to_string()),
        None | Some(GENERIC_BINARY) => detect_mime_type(bytes).map(str::to_string),
        Some(_) => None,
    }
}
