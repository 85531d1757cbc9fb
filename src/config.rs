use std::{collections::HashMap, env, net::SocketAddr, path::PathBuf, time::Duration};

use thiserror::Error;

use crate::storage::normalize_prefix;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_LIST_LIMIT: usize = 30;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_BLOB_API_URL: &str = "https://blob.vercel-storage.com";
const DEFAULT_BLOB_PREFIX: &str = "photos/";
const DEFAULT_CDN_API_URL: &str = "https://api.cloudinary.com";
const DEFAULT_CDN_FOLDER: &str = "photos";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} has an invalid value `{value}`: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
    #[error("{name} is required when {reason}")]
    Missing {
        name: &'static str,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub upload: Duration,
    pub request: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            upload: Duration::from_secs(DEFAULT_UPLOAD_TIMEOUT_SECS),
            request: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteBlobConfig {
    pub api_url: String,
    pub token: String,
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobBackendConfig {
    Remote(RemoteBlobConfig),
    Local { data_dir: PathBuf, prefix: String },
    Memory { prefix: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdnConfig {
    pub api_url: String,
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub folder: String,
}

/// Process-wide settings, resolved once at startup and handed to the
/// components that need them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryConfig {
    pub listen_addr: SocketAddr,
    pub public_url: String,
    pub list_limit: usize,
    pub max_upload_bytes: usize,
    pub timeouts: Timeouts,
    pub blob: BlobBackendConfig,
    pub cdn: Option<CdnConfig>,
    pub log_format: LogFormat,
}

impl GalleryConfig {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick
    /// up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|name| vars.get(name).cloned())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let port = parse_or(&var, "GALLERY_PORT", DEFAULT_PORT)?;
        let listen_addr = SocketAddr::from(([0, 0, 0, 0], port));
        let public_url = resolve_public_url(
            var("GALLERY_PUBLIC_URL").or_else(|| var("DOMAIN")),
            &format!("127.0.0.1:{port}"),
        );

        let list_limit = parse_or(&var, "GALLERY_LIST_LIMIT", DEFAULT_LIST_LIMIT)?;
        if list_limit == 0 {
            return Err(ConfigError::Invalid {
                name: "GALLERY_LIST_LIMIT",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        let max_upload_bytes =
            parse_or(&var, "GALLERY_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;
        let timeouts = Timeouts {
            upload: Duration::from_secs(parse_or(
                &var,
                "GALLERY_UPLOAD_TIMEOUT_SECS",
                DEFAULT_UPLOAD_TIMEOUT_SECS,
            )?),
            request: Duration::from_secs(parse_or(
                &var,
                "GALLERY_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?),
        };

        let prefix = normalize_prefix(
            &var("GALLERY_BLOB_PREFIX").unwrap_or_else(|| DEFAULT_BLOB_PREFIX.to_string()),
        );
        let token = var("BLOB_READ_WRITE_TOKEN");
        let default_backend = if token.is_some() { "remote" } else { "local" };
        let blob_backend =
            var("GALLERY_BLOB_BACKEND").unwrap_or_else(|| default_backend.to_string());
        let blob = match blob_backend.to_lowercase().as_str() {
            "remote" => BlobBackendConfig::Remote(RemoteBlobConfig {
                api_url: var("BLOB_API_URL").unwrap_or_else(|| DEFAULT_BLOB_API_URL.to_string()),
                token: token.ok_or(ConfigError::Missing {
                    name: "BLOB_READ_WRITE_TOKEN",
                    reason: "GALLERY_BLOB_BACKEND is `remote`",
                })?,
                prefix,
            }),
            "local" => BlobBackendConfig::Local {
                data_dir: var("GALLERY_DATA_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(default_data_dir),
                prefix,
            },
            "memory" => BlobBackendConfig::Memory { prefix },
            other => {
                return Err(ConfigError::Invalid {
                    name: "GALLERY_BLOB_BACKEND",
                    value: other.to_string(),
                    reason: "expected remote, local or memory".to_string(),
                });
            }
        };

        let cdn = match (
            var("CLOUDINARY_CLOUD_NAME"),
            var("CLOUDINARY_API_KEY"),
            var("CLOUDINARY_API_SECRET"),
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(CdnConfig {
                api_url: var("CLOUDINARY_API_URL")
                    .unwrap_or_else(|| DEFAULT_CDN_API_URL.to_string()),
                cloud_name,
                api_key,
                api_secret,
                folder: var("CLOUDINARY_FOLDER").unwrap_or_else(|| DEFAULT_CDN_FOLDER.to_string()),
            }),
            _ => None,
        };

        let log_format = match var("GALLERY_LOG_FORMAT").as_deref() {
            None | Some("compact") => LogFormat::Compact,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "GALLERY_LOG_FORMAT",
                    value: other.to_string(),
                    reason: "expected compact or json".to_string(),
                });
            }
        };

        Ok(Self {
            listen_addr,
            public_url,
            list_limit,
            max_upload_bytes,
            timeouts,
            blob,
            cdn,
            log_format,
        })
    }

    /// Where files of the local blob store are served from.
    pub fn media_base_url(&self) -> String {
        format!("{}/media", self.public_url)
    }
}

fn parse_or<T, F>(var: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(value) => value.parse::<T>().map_err(|err| ConfigError::Invalid {
            name,
            value: value.clone(),
            reason: err.to_string(),
        }),
        None => Ok(default),
    }
}

fn default_data_dir() -> PathBuf {
    let mut base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    base.push("photo-gallery");
    base
}

fn resolve_public_url(raw: Option<String>, bind_address: &str) -> String {
    let raw = raw.unwrap_or_else(|| bind_address.to_string());
    let trimmed = raw.trim().trim_end_matches('/');
    let mut base = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    for (doubled, single) in [
        ("http://http://", "http://"),
        ("https://https://", "https://"),
        ("http://https://", "https://"),
        ("https://http://", "http://"),
    ] {
        while base.starts_with(doubled) {
            base = base.replacen(doubled, single, 1);
        }
    }
    base
}
