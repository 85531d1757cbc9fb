use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, instrument};

use crate::{
    error::GalleryError,
    media_type::resolve_image_mime_type,
    photo::{BackendKind, DEFAULT_ORIGINAL_NAME, PhotoRecord, normalize, normalize_listing},
    storage::{DeleteOutcome, PhotoUpload, StorageAdapter},
};

/// Upload, list and delete against one storage adapter.
///
/// Every operation makes exactly one adapter call; upload and list results go
/// through the normalizer before they leave.
#[derive(Clone)]
pub struct GalleryService {
    adapter: Arc<dyn StorageAdapter>,
    list_limit: usize,
}

impl GalleryService {
    pub fn new(adapter: Arc<dyn StorageAdapter>, list_limit: usize) -> Self {
        Self {
            adapter,
            list_limit,
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.adapter.kind()
    }

    pub fn list_limit(&self) -> usize {
        self.list_limit
    }

    #[instrument(skip(self, bytes), fields(backend = %self.kind(), size = bytes.len()))]
    pub async fn upload(
        &self,
        bytes: Bytes,
        original_name: &str,
        mime_type: Option<&str>,
    ) -> Result<PhotoRecord, GalleryError> {
        if bytes.is_empty() {
            return Err(GalleryError::validation("Uploaded file is empty"));
        }
        let content_type = resolve_image_mime_type(mime_type, &bytes)
            .ok_or_else(|| GalleryError::validation("File must be an image"))?;
        let original_name = match original_name.trim() {
            "" => DEFAULT_ORIGINAL_NAME.to_string(),
            name => name.to_string(),
        };

        let raw = self
            .adapter
            .put(PhotoUpload {
                bytes,
                original_name,
                content_type,
            })
            .await?;
        Ok(normalize(raw, self.kind())?)
    }

    #[instrument(skip(self), fields(backend = %self.kind()))]
    pub async fn list(&self, limit: usize) -> Result<Vec<PhotoRecord>, GalleryError> {
        let raws = self.adapter.list(limit).await?;
        let records = normalize_listing(raws, self.kind());
        debug!(count = records.len(), "listed photos");
        Ok(records)
    }

    #[instrument(skip(self), fields(backend = %self.kind()))]
    pub async fn delete(&self, backend_ref: &str) -> Result<DeleteOutcome, GalleryError> {
        let backend_ref = backend_ref.trim();
        if backend_ref.is_empty() {
            return Err(GalleryError::validation("Photo ID is required"));
        }
        Ok(self.adapter.delete(backend_ref).await?)
    }
}
