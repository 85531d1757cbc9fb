use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tracing::info;

use crate::{
    config::{BlobBackendConfig, GalleryConfig},
    photo::BackendKind,
    routes::{GalleryRoutes, create_routes},
    service::GalleryService,
    storage::{CdnStorage, LocalFileStorage, MemoryStorage, RemoteBlobStorage, StorageAdapter},
};

/// Builds the adapters named by the configuration and wires them into the
/// router state. The CDN, when configured, takes the plain endpoints.
pub fn build_routes(config: &GalleryConfig) -> Result<GalleryRoutes> {
    let mut media_dir = None;
    let blob_adapter: Arc<dyn StorageAdapter> = match &config.blob {
        BlobBackendConfig::Remote(remote) => {
            info!(api_url = %remote.api_url, "using remote blob store");
            Arc::new(RemoteBlobStorage::new(remote, config.timeouts)?)
        }
        BlobBackendConfig::Local { data_dir, prefix } => {
            info!(data_dir = %data_dir.display(), "using local blob store");
            media_dir = Some(data_dir.clone());
            Arc::new(LocalFileStorage::new(
                data_dir.clone(),
                config.media_base_url(),
                prefix.clone(),
            ))
        }
        BlobBackendConfig::Memory { prefix } => {
            info!("using in-memory blob store, photos are lost on restart");
            Arc::new(MemoryStorage::new(
                BackendKind::Blob,
                config.media_base_url(),
                prefix.clone(),
            ))
        }
    };
    let blob = Arc::new(GalleryService::new(blob_adapter, config.list_limit));

    let primary = match &config.cdn {
        Some(cdn) => {
            info!(cloud = %cdn.cloud_name, folder = %cdn.folder, "using image CDN");
            let adapter = Arc::new(CdnStorage::new(cdn.clone(), config.timeouts));
            Arc::new(GalleryService::new(adapter, config.list_limit))
        }
        None => blob.clone(),
    };

    Ok(GalleryRoutes {
        primary,
        blob,
        max_upload_bytes: config.max_upload_bytes,
        media_dir,
    })
}

pub fn build_app(config: &GalleryConfig) -> Result<Router> {
    Ok(create_routes(build_routes(config)?))
}
