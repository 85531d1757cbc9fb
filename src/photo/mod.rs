pub mod normalize;
pub mod record;
pub mod variants;

pub use normalize::{NormalizeError, blob_id, extension_of, normalize, normalize_listing};
pub use record::{BackendKind, DEFAULT_ORIGINAL_NAME, PhotoRecord, RawPhoto};
pub use variants::{SizePreset, UrlVariants, eager_transformations, transformed_url};
