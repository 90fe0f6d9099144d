//! Stowage Storage Library
//!
//! This crate provides the backend-agnostic virtual file storage layer:
//! the `Storage` engine, the `StorageBackend` capability trait with
//! filesystem and S3-compatible implementations, and the read-through
//! metadata cache that sits in front of backend reads.
//!
//! # Logical paths
//!
//! Every path handed to a backend or used as a cache key is normalized
//! first: forward slashes only, no repeated slashes, no leading or
//! trailing separator. Normalization is centralized in
//! `stowage_core::path` so all backends stay consistent.

pub mod cache;
pub mod engine;
pub mod factory;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use cache::{InMemoryStorageCache, StorageCache};
pub use engine::Storage;
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::FileSystemBackend;
#[cfg(feature = "storage-s3")]
pub use s3::S3Backend;
pub use stowage_core::{
    BackendKind, StorageConfig, StorageContent, StorageFolder, StorageItem, StorageNode,
};
pub use traits::{StorageBackend, StorageError, StorageResult};
