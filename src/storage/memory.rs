use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rand::{Rng, distr::Alphanumeric};
use tokio::sync::RwLock;
use tracing::info;

use super::{
    DeleteOutcome, PhotoUpload, StorageAdapter, compute_hash, generate_blob_key, normalize_prefix,
    resolve_extension,
};
use crate::photo::{BackendKind, RawPhoto};

/// Process-local store that keeps photo descriptions, not bytes. Contents
/// vanish on restart.
///
/// With [`BackendKind::Cdn`] it hands out CDN-shaped URLs, asset ids and
/// public ids so the transformation path can run without a CDN account.
pub struct MemoryStorage {
    kind: BackendKind,
    base_url: String,
    prefix: String,
    photos: RwLock<Vec<RawPhoto>>,
}

impl MemoryStorage {
    pub fn new(kind: BackendKind, base_url: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            kind,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            prefix: normalize_prefix(&prefix.into()),
            photos: RwLock::new(Vec::new()),
        }
    }

    /// Inserts an already-described object, as if another client had uploaded it.
    pub async fn insert(&self, photo: RawPhoto) {
        self.photos.write().await.push(photo);
    }

    pub async fn len(&self) -> usize {
        self.photos.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn describe_upload(&self, upload: &PhotoUpload) -> RawPhoto {
        let uploaded_at = Utc::now();
        match self.kind {
            BackendKind::Blob => {
                let key = generate_blob_key(
                    &self.prefix,
                    uploaded_at,
                    &upload.original_name,
                    &upload.content_type,
                );
                RawPhoto {
                    url: Some(format!("{}/{key}", self.base_url)),
                    ..RawPhoto::new(key)
                }
            }
            BackendKind::Cdn => {
                let random: String = rand::rng()
                    .sample_iter(&Alphanumeric)
                    .take(20)
                    .map(|byte| char::from(byte).to_ascii_lowercase())
                    .collect();
                let public_id = format!("{}{random}", self.prefix);
                let ext = resolve_extension(&upload.original_name, &upload.content_type);
                let mut asset_id = compute_hash(&public_id);
                asset_id.truncate(32);
                RawPhoto {
                    url: Some(format!(
                        "{}/image/upload/v{}/{public_id}.{ext}",
                        self.base_url,
                        uploaded_at.timestamp()
                    )),
                    asset_id: Some(asset_id),
                    format: Some(ext),
                    ..RawPhoto::new(public_id)
                }
            }
        }
    }
}

#[async_trait]
impl StorageAdapter for MemoryStorage {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn put(&self, upload: PhotoUpload) -> Result<RawPhoto> {
        let photo = RawPhoto {
            original_name: Some(upload.original_name.clone()),
            uploaded_at: Some(Utc::now()),
            size: Some(upload.bytes.len() as u64),
            ..self.describe_upload(&upload)
        };
        info!(key = %photo.storage_key, size = upload.bytes.len(), "stored photo in memory");
        self.insert(photo.clone()).await;
        Ok(photo)
    }

    async fn list(&self, limit: usize) -> Result<Vec<RawPhoto>> {
        let photos = self.photos.read().await;
        Ok(photos
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn delete(&self, backend_ref: &str) -> Result<DeleteOutcome> {
        let mut photos = self.photos.write().await;
        let before = photos.len();
        photos.retain(|photo| photo.storage_key != backend_ref);
        if photos.len() == before {
            Ok(DeleteOutcome::NotFound)
        } else {
            Ok(DeleteOutcome::Deleted)
        }
    }
}
