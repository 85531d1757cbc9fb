use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::{debug, info};

use super::{DeleteOutcome, PhotoUpload, StorageAdapter, generate_blob_key, normalize_prefix};
use crate::photo::{BackendKind, RawPhoto};

/// Blob store on the local filesystem. Files are served back by the gallery
/// server, so `base_url` must point at the `/media` mount.
#[derive(Clone, Debug)]
pub struct LocalFileStorage {
    base_dir: PathBuf,
    base_url: String,
    prefix: String,
}

impl LocalFileStorage {
    pub fn new(base_dir: PathBuf, base_url: String, prefix: String) -> Self {
        Self {
            base_dir,
            base_url,
            prefix: normalize_prefix(&prefix),
        }
    }

    pub fn get_public_url(&self, key: &str) -> String {
        let trimmed = self.base_url.trim_end_matches('/');
        let key = key.trim_start_matches('/');
        format!("{trimmed}/{key}")
    }

    /// Maps a storage key below `base_dir`, refusing keys that would escape it.
    pub fn resolve_path(&self, key: &str) -> Result<PathBuf> {
        let normalized = key.trim_start_matches('/');
        if normalized.is_empty()
            || normalized
                .split('/')
                .any(|part| part.is_empty() || part == "." || part == "..")
        {
            anyhow::bail!("invalid storage key `{key}`");
        }
        Ok(self.base_dir.join(Path::new(normalized)))
    }

    fn prefix_dir(&self) -> PathBuf {
        let prefix = self.prefix.trim_matches('/');
        if prefix.is_empty() {
            self.base_dir.clone()
        } else {
            self.base_dir.join(prefix)
        }
    }

    fn key_for(&self, file_name: &str) -> String {
        let prefix = self.prefix.trim_matches('/');
        if prefix.is_empty() {
            file_name.to_string()
        } else {
            format!("{prefix}/{file_name}")
        }
    }
}

#[async_trait]
impl StorageAdapter for LocalFileStorage {
    fn kind(&self) -> BackendKind {
        BackendKind::Blob
    }

    async fn put(&self, upload: PhotoUpload) -> Result<RawPhoto> {
        let uploaded_at = Utc::now();
        let key = generate_blob_key(
            &self.prefix,
            uploaded_at,
            &upload.original_name,
            &upload.content_type,
        );
        let path = self.resolve_path(&key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        fs::write(&path, &upload.bytes)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        info!(key = %key, size = upload.bytes.len(), "stored photo on disk");

        Ok(RawPhoto {
            url: Some(self.get_public_url(&key)),
            original_name: Some(upload.original_name),
            uploaded_at: Some(uploaded_at),
            size: Some(upload.bytes.len() as u64),
            ..RawPhoto::new(key)
        })
    }

    async fn list(&self, limit: usize) -> Result<Vec<RawPhoto>> {
        let dir_path = self.prefix_dir();
        let mut entries: Vec<(String, PathBuf)> = Vec::new();
        let mut dir = match fs::read_dir(&dir_path).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("reading {}", dir_path.display()));
            }
        };
        while let Some(entry) = dir.next_entry().await? {
            match entry.file_type().await {
                Ok(file_type) if file_type.is_file() => {}
                Ok(_) => continue,
                Err(err) => {
                    debug!(path = %entry.path().display(), error = %err, "skipping unreadable entry");
                    continue;
                }
            }
            if let Some(name) = entry.file_name().to_str() {
                entries.push((name.to_string(), entry.path()));
            }
        }
        entries.sort_by(|a, b| b.0.cmp(&a.0));
        debug!(dir = %dir_path.display(), found = entries.len(), "listed local photos");

        let mut photos = Vec::new();
        for (name, path) in entries.into_iter().take(limit) {
            let metadata = match fs::metadata(&path).await {
                Ok(metadata) => metadata,
                Err(err) => {
                    debug!(path = %path.display(), error = %err, "skipping vanished photo");
                    continue;
                }
            };
            let uploaded_at = metadata.modified().ok().map(DateTime::<Utc>::from);
            let key = self.key_for(&name);
            photos.push(RawPhoto {
                url: Some(self.get_public_url(&key)),
                uploaded_at,
                size: Some(metadata.len()),
                ..RawPhoto::new(key)
            });
        }
        Ok(photos)
    }

    async fn delete(&self, backend_ref: &str) -> Result<DeleteOutcome> {
        let Ok(path) = self.resolve_path(backend_ref) else {
            debug!(key = %backend_ref, "key cannot name a stored photo");
            return Ok(DeleteOutcome::NotFound);
        };
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!(key = %backend_ref, "deleted photo from disk");
                Ok(DeleteOutcome::Deleted)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(DeleteOutcome::NotFound),
            Err(err) => Err(err).with_context(|| format!("removing {}", path.display())),
        }
    }
}
