//! Handler and S3 configuration types.
//!
//! A handler binds one route prefix to one bucket, along with the cache
//! directory, fallback image and format rules used for its requests.
//! Field aliases accept the key names used by older JSON configuration files
//! (`aws`, `aws_access`, `bucket_name`, ...).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::cache::CacheTtl;
use crate::constants::{
    DEFAULT_ALLOWED_EXTENSIONS, DEFAULT_CACHE_TTL_SECONDS, DEFAULT_S3_REGION,
    DEFAULT_S3_TIMEOUT_SECS,
};
use crate::format::OutputFormat;

fn default_s3_timeout() -> u64 {
    DEFAULT_S3_TIMEOUT_SECS
}

fn default_s3_region() -> String {
    DEFAULT_S3_REGION.to_string()
}

fn default_error_resize_crop() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerConfig {
    pub name: String,
    /// Route prefix override; the handler name is used when absent or empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(alias = "aws")]
    pub s3: S3Config,
    /// Image served (with 404) when the real image cannot be produced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_image: Option<PathBuf>,
    /// Resize the fallback image to the requested dimensions
    #[serde(default = "default_error_resize_crop")]
    pub error_resize_crop: bool,
    /// Accepted source extensions; the leading dot is optional
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_formats: Option<Vec<String>>,
    /// Default output format name (`webp`, `jpeg`, `png`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,
    #[serde(default)]
    pub cache_path: PathBuf,
    /// Seconds a cached variant stays fresh: 0 never expires, negative disables the cache
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_time: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct S3Config {
    #[serde(default, alias = "bucket_name")]
    pub bucket: String,
    #[serde(default = "default_s3_region")]
    pub region: String,
    #[serde(default, alias = "aws_access")]
    pub access_key: String,
    #[serde(default, alias = "aws_secret")]
    pub secret_key: String,
    /// Key prefix prepended to every requested file name
    #[serde(default, alias = "file_path")]
    pub path: String,
    /// S3-compatible endpoint (MinIO, LocalStack); path-style addressing is used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Origin request timeout in seconds
    #[serde(default = "default_s3_timeout")]
    pub timeout: u64,
}

impl HandlerConfig {
    /// Route prefix this handler is mounted on (without slashes)
    pub fn route_prefix(&self) -> &str {
        match self.prefix.as_deref() {
            Some(prefix) if !prefix.is_empty() => prefix,
            _ => &self.name,
        }
    }

    /// Accepted source extensions, normalized to carry a leading dot
    pub fn allowed_extensions(&self) -> Vec<String> {
        match &self.allowed_formats {
            Some(list) if !list.is_empty() => list
                .iter()
                .map(|ext| {
                    if ext.starts_with('.') {
                        ext.clone()
                    } else {
                        format!(".{}", ext)
                    }
                })
                .collect(),
            _ => DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }

    /// Default output format. Unknown names fall back to WebP.
    pub fn default_format(&self) -> OutputFormat {
        match self.output_format.as_deref() {
            None | Some("") => OutputFormat::default(),
            Some(name) => name.parse().unwrap_or_else(|e| {
                tracing::warn!(
                    handler = %self.name,
                    output_format = %name,
                    error = %e,
                    "Ignoring unknown output format, using default"
                );
                OutputFormat::default()
            }),
        }
    }

    pub fn cache_ttl(&self) -> CacheTtl {
        CacheTtl::from_seconds(self.cache_time.unwrap_or(DEFAULT_CACHE_TTL_SECONDS))
    }
}
