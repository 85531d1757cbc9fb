use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};
use url::Url;

use super::{
    DeleteOutcome, PhotoUpload, StorageAdapter, assert_ok_response, decode_entries,
    generate_blob_key, normalize_prefix, parse_timestamp,
};
use crate::config::{RemoteBlobConfig, Timeouts};
use crate::photo::{BackendKind, RawPhoto};

const API_VERSION: &str = "7";
const SERVICE: &str = "blob store";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PutBlobResponse {
    url: Option<String>,
    pathname: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListBlobsResponse {
    #[serde(default)]
    blobs: Vec<serde_json::Value>,
}

impl ListBlobsResponse {
    fn into_photos(self) -> Vec<RawPhoto> {
        decode_entries::<ListedBlob>(self.blobs, SERVICE)
            .into_iter()
            .map(RawPhoto::from)
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListedBlob {
    url: Option<String>,
    pathname: String,
    size: Option<u64>,
    uploaded_at: Option<String>,
}

impl From<ListedBlob> for RawPhoto {
    fn from(blob: ListedBlob) -> Self {
        RawPhoto {
            url: blob.url,
            uploaded_at: parse_timestamp(blob.uploaded_at.as_deref()),
            size: blob.size,
            ..RawPhoto::new(blob.pathname)
        }
    }
}

#[derive(Debug, Deserialize)]
struct HeadBlobResponse {
    url: String,
}

/// Client for a hosted blob store addressed by pathname over a bearer-token
/// REST API.
pub struct RemoteBlobStorage {
    client: Client,
    api_url: Url,
    token: String,
    prefix: String,
    timeouts: Timeouts,
}

impl RemoteBlobStorage {
    pub fn new(config: &RemoteBlobConfig, timeouts: Timeouts) -> Result<Self> {
        let api_url = Url::parse(&config.api_url)
            .with_context(|| format!("invalid blob api url `{}`", config.api_url))?;
        Ok(Self {
            client: Client::new(),
            api_url,
            token: config.token.clone(),
            prefix: normalize_prefix(&config.prefix),
            timeouts,
        })
    }

    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.api_url.clone();
        let base = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{base}/{}", path.trim_start_matches('/')));
        url
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header("x-api-version", API_VERSION)
    }
}

#[async_trait]
impl StorageAdapter for RemoteBlobStorage {
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
        let size = upload.bytes.len() as u64;
        let response = self
            .request(reqwest::Method::PUT, self.endpoint(&key))
            .header("x-content-type", upload.content_type.as_str())
            .header("x-add-random-suffix", "0")
            .timeout(self.timeouts.upload)
            .body(upload.bytes)
            .send()
            .await
            .with_context(|| format!("uploading {key}"))?;
        let response = assert_ok_response(response, SERVICE).await?;
        let stored: PutBlobResponse = response.json().await.context("decoding put response")?;
        info!(key = %stored.pathname, size, "stored photo in blob store");

        Ok(RawPhoto {
            url: stored.url,
            original_name: Some(upload.original_name),
            uploaded_at: Some(uploaded_at),
            size: Some(size),
            ..RawPhoto::new(stored.pathname)
        })
    }

    async fn list(&self, limit: usize) -> Result<Vec<RawPhoto>> {
        let response = self
            .request(reqwest::Method::GET, self.api_url.clone())
            .query(&[("prefix", self.prefix.as_str()), ("limit", &limit.to_string())])
            .timeout(self.timeouts.request)
            .send()
            .await
            .context("listing blobs")?;
        let response = assert_ok_response(response, SERVICE).await?;
        let listing: ListBlobsResponse = response.json().await.context("decoding blob listing")?;
        let photos = listing.into_photos();
        debug!(count = photos.len(), "listed blobs");
        Ok(photos)
    }

    async fn delete(&self, backend_ref: &str) -> Result<DeleteOutcome> {
        let response = self
            .request(reqwest::Method::GET, self.api_url.clone())
            .query(&[("url", backend_ref)])
            .timeout(self.timeouts.request)
            .send()
            .await
            .with_context(|| format!("looking up {backend_ref}"))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(DeleteOutcome::NotFound);
        }
        let response = assert_ok_response(response, SERVICE).await?;
        let head: HeadBlobResponse = response.json().await.context("decoding blob lookup")?;

        let response = self
            .request(reqwest::Method::POST, self.endpoint("delete"))
            .json(&json!({ "urls": [head.url] }))
            .timeout(self.timeouts.request)
            .send()
            .await
            .with_context(|| format!("deleting {backend_ref}"))?;
        assert_ok_response(response, SERVICE).await?;
        info!(key = %backend_ref, "deleted photo from blob store");
        Ok(DeleteOutcome::Deleted)
    }
}
