//! Storage backend abstraction trait
//!
//! This module defines the `StorageBackend` trait that all physical
//! backends must implement, plus the error and result types shared by the
//! whole storage layer.

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncRead;

use stowage_core::{BackendKind, StorageFolder, StorageItem};

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Save failed: {0}")]
    SaveFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage path: {0}")]
    InvalidPath(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage backend capability
///
/// Backends perform the byte-level operations against a physical medium
/// (local filesystem, S3-compatible object storage). The `Storage` engine
/// is generic over any implementation: backend selection happens at
/// configuration time, not inside the engine.
///
/// Every operation receives an already-normalized logical path (forward
/// slashes, no repeated or leading/trailing separators). Backends own no
/// cross-call state beyond connection handles.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write `content` fully to `path`, creating any missing intermediate
    /// directories or prefixes and overwriting an existing object.
    ///
    /// Returns `Ok(false)` when the destination cannot be resolved (the
    /// path has no parent segment). I/O failures are errors.
    async fn save(
        &self,
        path: &str,
        content: &mut (dyn AsyncRead + Send + Unpin),
    ) -> StorageResult<bool>;

    /// Delete the object at `path`. Returns `Ok(false)` if the object does
    /// not exist; I/O failures are logged and also surface as `Ok(false)`,
    /// deletion failure is non-fatal to the caller.
    async fn delete(&self, path: &str) -> StorageResult<bool>;

    /// Physical existence check for an item, independent of any cache.
    async fn exists(&self, item: &StorageItem) -> StorageResult<bool>;

    /// Destroy everything under the storage root. Idempotent: a missing
    /// root is a no-op.
    async fn delete_all(&self) -> StorageResult<()>;

    /// Fetch one item's metadata plus an open content handle; ownership of
    /// the handle transfers to the caller. `Ok(None)` when nothing is
    /// stored at `path` (or the path names a directory).
    async fn get_file(&self, path: &str) -> StorageResult<Option<StorageItem>>;

    /// Materialize the full folder/file tree in one recursive scan.
    ///
    /// Returns `Ok(None)` when the storage root does not exist, or exists
    /// but is not a directory. Unreadable entries mid-scan propagate as
    /// errors; the scan is not partially recovered.
    async fn build_tree(&self) -> StorageResult<Option<StorageFolder>>;

    /// The backend kind this implementation serves.
    fn kind(&self) -> BackendKind;
}
