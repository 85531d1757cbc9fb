const UPLOAD_SEGMENT: &str = "/upload/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizePreset {
    pub width: u32,
    pub height: u32,
}

impl SizePreset {
    pub const THUMBNAIL: SizePreset = SizePreset::square(300);
    pub const GRID: SizePreset = SizePreset::square(400);
    pub const LARGE: SizePreset = SizePreset::square(800);

    const fn square(side: u32) -> Self {
        Self {
            width: side,
            height: side,
        }
    }

    /// CDN parameter segment: fill-crop around the detected subject, automatic
    /// quality and output format.
    pub fn transformation(&self) -> String {
        format!(
            "w_{},h_{},c_fill,g_auto,q_auto,f_auto",
            self.width, self.height
        )
    }
}

/// Eager transformation list sent with CDN uploads so the variants exist
/// before the first request.
pub fn eager_transformations() -> String {
    [SizePreset::GRID, SizePreset::LARGE, SizePreset::THUMBNAIL]
        .iter()
        .map(SizePreset::transformation)
        .collect::<Vec<_>>()
        .join("|")
}

/// Injects the preset after the first `/upload/` segment. URLs without that
/// segment are returned unchanged.
pub fn transformed_url(url: &str, preset: SizePreset) -> String {
    match url.find(UPLOAD_SEGMENT) {
        Some(index) => {
            let split = index + UPLOAD_SEGMENT.len();
            format!("{}{}/{}", &url[..split], preset.transformation(), &url[split..])
        }
        None => url.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlVariants {
    pub thumbnail: String,
    pub grid: String,
    pub large: String,
}

impl UrlVariants {
    pub fn identical(url: &str) -> Self {
        Self {
            thumbnail: url.to_string(),
            grid: url.to_string(),
            large: url.to_string(),
        }
    }

    pub fn transformed(url: &str) -> Self {
        Self {
            thumbnail: transformed_url(url, SizePreset::THUMBNAIL),
            grid: transformed_url(url, SizePreset::GRID),
            large: transformed_url(url, SizePreset::LARGE),
        }
    }
}
