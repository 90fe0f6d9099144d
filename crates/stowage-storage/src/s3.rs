use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::{StreamExt, TryStreamExt};
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as ObjectPath;
use object_store::{Error as ObjectStoreError, ObjectStore, PutPayload};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::io::StreamReader;

use crate::traits::{StorageBackend, StorageError, StorageResult};
use stowage_core::{join_path, parent_path, BackendKind, StorageContent, StorageFolder, StorageItem, StorageNode};

/// S3-compatible object storage backend
///
/// Logical paths map directly to object keys; directories exist only as
/// key prefixes, so there are no intermediate directories to create and a
/// bucket root always "exists" (an empty bucket yields an empty tree).
pub struct S3Backend {
    store: AmazonS3,
    bucket: String,
}

impl S3Backend {
    /// Create a new S3Backend.
    ///
    /// # Arguments
    /// * `bucket` - bucket name
    /// * `region` - region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - optional custom endpoint for S3-compatible
    ///   providers (e.g., "http://localhost:9000" for MinIO)
    ///
    /// Credentials come from the environment (`AmazonS3Builder::from_env`).
    pub fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
    ) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket.clone());

        if let Some(endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder.with_endpoint(endpoint).with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3Backend { store, bucket })
    }

    async fn list_all(&self) -> StorageResult<Vec<TreeEntry>> {
        let metas = self
            .store
            .list(None)
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| StorageError::BackendError(e.to_string()))?;

        Ok(metas
            .into_iter()
            .map(|meta| TreeEntry {
                key: meta.location.to_string(),
                size: meta.size as u64,
                last_modified: meta.last_modified,
            })
            .collect())
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    async fn save(
        &self,
        path: &str,
        content: &mut (dyn AsyncRead + Send + Unpin),
    ) -> StorageResult<bool> {
        let start = std::time::Instant::now();

        let mut buffer = Vec::new();
        content.read_to_end(&mut buffer).await.map_err(|e| {
            StorageError::SaveFailed(format!("Failed to read content stream: {}", e))
        })?;
        let size_bytes = buffer.len();

        let location = ObjectPath::from(path);
        self.store
            .put(&location, PutPayload::from(Bytes::from(buffer)))
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %path,
                    size_bytes,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 save failed"
                );
                StorageError::SaveFailed(e.to_string())
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %path,
            size_bytes,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 save successful"
        );

        Ok(true)
    }

    async fn delete(&self, path: &str) -> StorageResult<bool> {
        let start = std::time::Instant::now();
        let location = ObjectPath::from(path);

        match self.store.delete(&location).await {
            Ok(()) => {
                tracing::info!(
                    bucket = %self.bucket,
                    key = %path,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 delete successful"
                );
                Ok(true)
            }
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %path,
                    "Error while deleting object"
                );
                Ok(false)
            }
        }
    }

    // Written in `async_trait`'s expanded form so the future captures an
    // owned copy of the path instead of the non-`Sync` `&StorageItem`.
    fn exists<'life0, 'life1, 'async_trait>(
        &'life0 self,
        item: &'life1 StorageItem,
    ) -> BoxFuture<'async_trait, StorageResult<bool>>
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        let location = ObjectPath::from(item.file_path.as_str());
        Box::pin(async move {
            match self.store.head(&location).await {
                Ok(_) => Ok(true),
                Err(ObjectStoreError::NotFound { .. }) => Ok(false),
                Err(e) => Err(StorageError::BackendError(e.to_string())),
            }
        })
    }

    async fn delete_all(&self) -> StorageResult<()> {
        let entries = self.list_all().await?;
        for entry in &entries {
            let location = ObjectPath::from(entry.key.as_str());
            match self.store.delete(&location).await {
                Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {}
                Err(e) => return Err(StorageError::BackendError(e.to_string())),
            }
        }
        tracing::info!(
            bucket = %self.bucket,
            objects = entries.len(),
            "S3 storage wiped"
        );
        Ok(())
    }

    async fn get_file(&self, path: &str) -> StorageResult<Option<StorageItem>> {
        let start = std::time::Instant::now();
        let location = ObjectPath::from(path);

        let result = match self.store.get(&location).await {
            Ok(result) => result,
            Err(ObjectStoreError::NotFound { .. }) => return Ok(None),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %path,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 get failed"
                );
                return Err(StorageError::BackendError(e.to_string()));
            }
        };

        let meta = result.meta.clone();
        let stream = result
            .into_stream()
            .map(|chunk| chunk.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)));
        let reader = StreamReader::new(stream);

        let file_name = path.rsplit('/').next().unwrap_or(path).to_string();

        Ok(Some(StorageItem {
            file_name,
            file_path: path.to_string(),
            path: parent_path(path),
            file_size: meta.size as u64,
            last_modified: Some(meta.last_modified),
            content: Some(StorageContent::new(reader)),
        }))
    }

    async fn build_tree(&self) -> StorageResult<Option<StorageFolder>> {
        let entries = self.list_all().await?;
        Ok(Some(fold_tree(entries)))
    }

    fn kind(&self) -> BackendKind {
        BackendKind::S3
    }
}

struct TreeEntry {
    key: String,
    size: u64,
    last_modified: DateTime<Utc>,
}

#[derive(Default)]
struct DirNode {
    folders: BTreeMap<String, DirNode>,
    files: Vec<StorageItem>,
}

/// Fold a flat object listing into the folder/file tree. Keys are logical
/// paths; every prefix segment becomes a folder.
fn fold_tree(entries: Vec<TreeEntry>) -> StorageFolder {
    let mut root = DirNode::default();

    for entry in entries {
        let segments: Vec<&str> = entry.key.split('/').collect();
        let Some((file_name, dirs)) = segments.split_last() else {
            continue;
        };

        let mut node = &mut root;
        for segment in dirs {
            node = node.folders.entry(segment.to_string()).or_default();
        }
        node.files.push(StorageItem {
            file_name: file_name.to_string(),
            file_path: entry.key.clone(),
            path: parent_path(&entry.key),
            file_size: entry.size,
            last_modified: Some(entry.last_modified),
            content: None,
        });
    }

    to_folder("/".to_string(), String::new(), root)
}

fn to_folder(name: String, full_path: String, node: DirNode) -> StorageFolder {
    let mut folder = StorageFolder::new(name, full_path.clone());
    for (child_name, child) in node.folders {
        let child_path = join_path(&full_path, &child_name);
        folder
            .children
            .push(StorageNode::Folder(to_folder(child_name, child_path, child)));
    }
    for item in node.files {
        folder.children.push(StorageNode::File(item));
    }
    folder.sort_children();
    folder
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, size: u64) -> TreeEntry {
        TreeEntry {
            key: key.to_string(),
            size,
            last_modified: Utc::now(),
        }
    }

    #[test]
    fn test_fold_tree_empty_listing() {
        let root = fold_tree(Vec::new());
        assert_eq!(root.name, "/");
        assert!(root.children.is_empty());
    }

    #[test]
    fn test_fold_tree_nests_prefixes() {
        let root = fold_tree(vec![
            entry("2024/reports/a.pdf", 10),
            entry("2024/reports/b.pdf", 20),
            entry("2024/c.txt", 5),
            entry("top.txt", 1),
        ]);

        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].name(), "2024");
        assert_eq!(root.children[1].name(), "top.txt");

        let year = root.child_folder("2024").unwrap();
        assert_eq!(year.full_path, "2024");
        assert_eq!(year.children[0].name(), "c.txt");

        let reports = year.child_folder("reports").unwrap();
        assert_eq!(reports.full_path, "2024/reports");
        match &reports.children[0] {
            StorageNode::File(item) => {
                assert_eq!(item.file_path, "2024/reports/a.pdf");
                assert_eq!(item.path, "2024/reports");
                assert_eq!(item.file_size, 10);
                assert!(item.last_modified.is_some());
            }
            StorageNode::Folder(_) => panic!("expected a file node"),
        }
    }

    #[test]
    fn test_fold_tree_sorts_children() {
        let root = fold_tree(vec![
            entry("b/x.txt", 1),
            entry("a/y.txt", 1),
            entry("a/z/deep.txt", 1),
        ]);
        assert_eq!(root.children[0].name(), "a");
        assert_eq!(root.children[1].name(), "b");

        let a = root.child_folder("a").unwrap();
        assert_eq!(a.children[0].name(), "y.txt");
        assert_eq!(a.children[1].name(), "z");
    }
}
