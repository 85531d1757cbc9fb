use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::{
    DeleteOutcome, PhotoUpload, StorageAdapter, assert_ok_response, decode_entries,
    parse_timestamp, signing::sign_params,
};
use crate::config::{CdnConfig, Timeouts};
use crate::photo::{BackendKind, RawPhoto, eager_transformations};

const SERVICE: &str = "image CDN";
const SIGNATURE_ALGORITHM: &str = "sha256";
/// Applied to the stored original: automatic quality and delivery format.
const INCOMING_TRANSFORMATION: &str = "q_auto,f_auto";

#[derive(Debug, Default, Deserialize)]
struct CdnResource {
    asset_id: Option<String>,
    public_id: String,
    secure_url: Option<String>,
    url: Option<String>,
    bytes: Option<u64>,
    width: Option<u32>,
    height: Option<u32>,
    format: Option<String>,
    created_at: Option<String>,
    original_filename: Option<String>,
    filename: Option<String>,
}

impl From<CdnResource> for RawPhoto {
    fn from(resource: CdnResource) -> Self {
        RawPhoto {
            url: resource.secure_url.or(resource.url),
            asset_id: resource.asset_id,
            original_name: resource.filename.or(resource.original_filename),
            uploaded_at: parse_timestamp(resource.created_at.as_deref()),
            size: resource.bytes,
            width: resource.width,
            height: resource.height,
            format: resource.format,
            ..RawPhoto::new(resource.public_id)
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    resources: Vec<serde_json::Value>,
}

impl SearchResponse {
    fn into_photos(self) -> Vec<RawPhoto> {
        decode_entries::<CdnResource>(self.resources, SERVICE)
            .into_iter()
            .map(RawPhoto::from)
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

/// Image CDN client: signed uploads into a folder, folder search for
/// listings, signed destroy for deletes.
pub struct CdnStorage {
    client: Client,
    config: CdnConfig,
    timeouts: Timeouts,
}

impl CdnStorage {
    pub fn new(config: CdnConfig, timeouts: Timeouts) -> Self {
        Self {
            client: Client::new(),
            config,
            timeouts,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/v1_1/{}/{path}",
            self.config.api_url.trim_end_matches('/'),
            self.config.cloud_name
        )
    }

    /// Adds timestamp, key and signature to the parameters a write call needs.
    fn signed_form(&self, mut params: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
        params.push(("timestamp", Utc::now().timestamp().to_string()));
        let signature = sign_params(&params, &self.config.api_secret);
        params.push(("api_key", self.config.api_key.clone()));
        params.push(("signature_algorithm", SIGNATURE_ALGORITHM.to_string()));
        params.push(("signature", signature));
        params
    }
}

fn data_uri(upload: &PhotoUpload) -> String {
    format!(
        "data:{};base64,{}",
        upload.content_type,
        STANDARD.encode(&upload.bytes)
    )
}

#[async_trait]
impl StorageAdapter for CdnStorage {
    fn kind(&self) -> BackendKind {
        BackendKind::Cdn
    }

    async fn put(&self, upload: PhotoUpload) -> Result<RawPhoto> {
        let mut form = self.signed_form(vec![
            ("folder", self.config.folder.clone()),
            ("eager", eager_transformations()),
            ("transformation", INCOMING_TRANSFORMATION.to_string()),
        ]);
        form.push(("file", data_uri(&upload)));
        let response = self
            .client
            .post(self.endpoint("image/upload"))
            .form(&form)
            .timeout(self.timeouts.upload)
            .send()
            .await
            .with_context(|| format!("uploading {}", upload.original_name))?;
        let response = assert_ok_response(response, SERVICE).await?;
        let resource: CdnResource = response.json().await.context("decoding upload response")?;
        info!(public_id = %resource.public_id, size = upload.bytes.len(), "stored photo on CDN");

        let mut photo = RawPhoto::from(resource);
        photo.original_name = Some(upload.original_name);
        if photo.uploaded_at.is_none() {
            photo.uploaded_at = Some(Utc::now());
        }
        Ok(photo)
    }

    async fn list(&self, limit: usize) -> Result<Vec<RawPhoto>> {
        let response = self
            .client
            .post(self.endpoint("resources/search"))
            .basic_auth(&self.config.api_key, Some(&self.config.api_secret))
            .json(&json!({
                "expression": format!("folder:{}", self.config.folder),
                "sort_by": [{ "created_at": "desc" }],
                "max_results": limit,
            }))
            .timeout(self.timeouts.request)
            .send()
            .await
            .context("searching CDN folder")?;
        let response = assert_ok_response(response, SERVICE).await?;
        let search: SearchResponse = response.json().await.context("decoding search response")?;
        let photos = search.into_photos();
        debug!(count = photos.len(), "listed CDN resources");
        Ok(photos)
    }

    async fn delete(&self, backend_ref: &str) -> Result<DeleteOutcome> {
        let form = self.signed_form(vec![("public_id", backend_ref.to_string())]);
        let response = self
            .client
            .post(self.endpoint("image/destroy"))
            .form(&form)
            .timeout(self.timeouts.request)
            .send()
            .await
            .with_context(|| format!("destroying {backend_ref}"))?;
        let response = assert_ok_response(response, SERVICE).await?;
        let destroyed: DestroyResponse = response.json().await.context("decoding destroy response")?;
        match destroyed.result.as_str() {
            "ok" => {
                info!(public_id = %backend_ref, "deleted photo from CDN");
                Ok(DeleteOutcome::Deleted)
            }
            other => {
                warn!(public_id = %backend_ref, result = other, "CDN did not destroy photo");
                Ok(DeleteOutcome::NotFound)
            }
        }
    }
}
