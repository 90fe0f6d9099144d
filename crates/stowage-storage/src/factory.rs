use std::sync::Arc;

use crate::cache::{InMemoryStorageCache, StorageCache};
use crate::engine::Storage;
#[cfg(feature = "storage-local")]
use crate::local::FileSystemBackend;
#[cfg(feature = "storage-s3")]
use crate::s3::S3Backend;
use crate::traits::{StorageBackend, StorageError, StorageResult};
use stowage_core::{BackendKind, StorageConfig};

/// Create a storage instance based on configuration.
///
/// The backend is chosen here, at configuration time; the engine itself
/// never branches on the backend kind.
pub async fn create_storage(config: &StorageConfig) -> StorageResult<Storage> {
    let backend: Arc<dyn StorageBackend> = match config.backend {
        #[cfg(feature = "storage-local")]
        BackendKind::FileSystem => {
            let root = config.storage_root.clone().ok_or_else(|| {
                StorageError::ConfigError("STOWAGE_STORAGE_ROOT not configured".to_string())
            })?;
            Arc::new(FileSystemBackend::new(root).await?)
        }

        #[cfg(not(feature = "storage-local"))]
        BackendKind::FileSystem => {
            return Err(StorageError::ConfigError(
                "Filesystem backend not available (storage-local feature not enabled)".to_string(),
            ))
        }

        #[cfg(feature = "storage-s3")]
        BackendKind::S3 => {
            let bucket = config.s3_bucket.clone().ok_or_else(|| {
                StorageError::ConfigError("STOWAGE_S3_BUCKET not configured".to_string())
            })?;
            let region = config.s3_region.clone().ok_or_else(|| {
                StorageError::ConfigError("STOWAGE_S3_REGION not configured".to_string())
            })?;
            Arc::new(S3Backend::new(bucket, region, config.s3_endpoint.clone())?)
        }

        #[cfg(not(feature = "storage-s3"))]
        BackendKind::S3 => {
            return Err(StorageError::ConfigError(
                "S3 backend not available (storage-s3 feature not enabled)".to_string(),
            ))
        }
    };

    let cache = config
        .cache_enabled
        .then(|| Arc::new(InMemoryStorageCache::new()) as Arc<dyn StorageCache>);

    Ok(Storage::new(backend, cache, config.public_base_url.clone()))
}
