//! Stowage Core Library
//!
//! This crate provides the shared domain types for the stowage storage
//! layer: the logical path normalizer, the storage node model, backend
//! kinds, and configuration.

pub mod config;
pub mod models;
pub mod path;
pub mod storage_types;

// Re-export commonly used types
pub use config::StorageConfig;
pub use models::{StorageContent, StorageFolder, StorageItem, StorageNode};
pub use path::{join_path, normalize_key, normalize_path, parent_path};
pub use storage_types::BackendKind;
