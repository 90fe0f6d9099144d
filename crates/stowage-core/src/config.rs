//! Configuration module
//!
//! Settings for one storage instance: which backend to use, where its
//! physical root lives, the public base URL for served files, and whether
//! the metadata cache is enabled. Backend selection is a configuration
//! choice, not a runtime branch inside the engine.

use std::env;

use crate::storage_types::BackendKind;

/// Configuration for one storage instance.
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: BackendKind,
    /// Physical root directory for the filesystem backend.
    pub storage_root: Option<String>,
    /// Bucket for the S3-compatible backend.
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    /// Custom endpoint for S3-compatible providers (MinIO, Spaces, ...).
    pub s3_endpoint: Option<String>,
    /// Base URL joined with an item's logical path by `public_uri`.
    pub public_base_url: String,
    pub cache_enabled: bool,
}

impl StorageConfig {
    /// Filesystem-backed configuration with the metadata cache enabled.
    pub fn filesystem(storage_root: impl Into<String>, public_base_url: impl Into<String>) -> Self {
        StorageConfig {
            backend: BackendKind::FileSystem,
            storage_root: Some(storage_root.into()),
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            public_base_url: public_base_url.into(),
            cache_enabled: true,
        }
    }

    /// Load configuration from `STOWAGE_*` environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let backend = env::var("STOWAGE_BACKEND")
            .unwrap_or_else(|_| "filesystem".to_string())
            .parse::<BackendKind>()?;
        let public_base_url = env::var("STOWAGE_PUBLIC_BASE_URL")
            .map_err(|_| anyhow::anyhow!("STOWAGE_PUBLIC_BASE_URL not configured"))?;

        Ok(StorageConfig {
            backend,
            storage_root: env::var("STOWAGE_STORAGE_ROOT").ok(),
            s3_bucket: env::var("STOWAGE_S3_BUCKET").ok(),
            s3_region: env::var("STOWAGE_S3_REGION").ok(),
            s3_endpoint: env::var("STOWAGE_S3_ENDPOINT").ok(),
            public_base_url,
            cache_enabled: env::var("STOWAGE_CACHE_ENABLED")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(true),
        })
    }
}
