use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use tokio::fs;
use tokio::io::AsyncRead;
use uuid::Uuid;

use crate::traits::{StorageBackend, StorageError, StorageResult};
use stowage_core::{join_path, parent_path, BackendKind, StorageContent, StorageFolder, StorageItem, StorageNode};

/// Local filesystem storage backend
///
/// The logical path tree is mirrored directly under `root`; all metadata
/// (size, mtime) is derived from the filesystem entry itself at read time,
/// no sidecar files.
#[derive(Clone)]
pub struct FileSystemBackend {
    root: PathBuf,
}

impl FileSystemBackend {
    /// Create a new FileSystemBackend rooted at `root`, creating the
    /// directory if it does not exist yet.
    pub async fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();

        fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage root {}: {}",
                root.display(),
                e
            ))
        })?;

        Ok(FileSystemBackend { root })
    }

    /// Convert a logical path to a filesystem path, rejecting traversal
    /// sequences that could escape the storage root.
    fn resolve(&self, path: &str) -> StorageResult<PathBuf> {
        if path.starts_with('/') || path.split('/').any(|segment| segment == "..") {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(path))
    }

    fn scan_folder<'a>(
        &'a self,
        dir: PathBuf,
        name: String,
        logical: String,
    ) -> BoxFuture<'a, StorageResult<StorageFolder>> {
        Box::pin(async move {
            let mut folder = StorageFolder::new(name, logical.clone());
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let entry_name = entry.file_name().to_string_lossy().into_owned();
                // In-progress save temp files are not part of the tree.
                if entry_name.starts_with('.') && entry_name.ends_with(".tmp") {
                    continue;
                }
                // Follows symlinks; a broken link or unreadable entry is
                // fatal to the whole scan.
                let metadata = fs::metadata(entry.path()).await?;
                let child_path = join_path(&logical, &entry_name);
                if metadata.is_dir() {
                    let child = self
                        .scan_folder(entry.path(), entry_name, child_path)
                        .await?;
                    folder.children.push(StorageNode::Folder(child));
                } else if metadata.is_file() {
                    folder.children.push(StorageNode::File(StorageItem {
                        file_name: entry_name,
                        file_path: child_path,
                        path: logical.clone(),
                        file_size: metadata.len(),
                        last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
                        content: None,
                    }));
                } else {
                    return Err(StorageError::BackendError(format!(
                        "Unexpected entry type at {}",
                        entry.path().display()
                    )));
                }
            }
            folder.sort_children();
            Ok(folder)
        })
    }
}

#[async_trait]
impl StorageBackend for FileSystemBackend {
    async fn save(
        &self,
        path: &str,
        content: &mut (dyn AsyncRead + Send + Unpin),
    ) -> StorageResult<bool> {
        let full = self.resolve(path)?;
        let parent = parent_path(path);
        if parent.is_empty() {
            tracing::warn!(path = %path, "Destination has no parent segment, refusing save");
            return Ok(false);
        }

        fs::create_dir_all(self.root.join(&parent)).await.map_err(|e| {
            StorageError::SaveFailed(format!("Failed to create directory {}: {}", parent, e))
        })?;

        let start = std::time::Instant::now();

        // Write to a temp file in the destination directory, then rename,
        // so a racing reader never observes a partial write.
        let tmp = full.with_file_name(format!(".{}.tmp", Uuid::new_v4()));
        let mut file = fs::File::create(&tmp).await.map_err(|e| {
            StorageError::SaveFailed(format!("Failed to create file {}: {}", tmp.display(), e))
        })?;

        let size_bytes = match tokio::io::copy(content, &mut file).await {
            Ok(written) => written,
            Err(e) => {
                drop(file);
                let _ = fs::remove_file(&tmp).await;
                return Err(StorageError::SaveFailed(format!(
                    "Failed to write file {}: {}",
                    full.display(),
                    e
                )));
            }
        };

        file.sync_all().await.map_err(|e| {
            StorageError::SaveFailed(format!("Failed to sync file {}: {}", tmp.display(), e))
        })?;
        drop(file);

        fs::rename(&tmp, &full).await.map_err(|e| {
            StorageError::SaveFailed(format!("Failed to rename into {}: {}", full.display(), e))
        })?;

        tracing::info!(
            path = %full.display(),
            key = %path,
            size_bytes,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Filesystem save successful"
        );

        Ok(true)
    }

    async fn delete(&self, path: &str) -> StorageResult<bool> {
        let full = self.resolve(path)?;
        let start = std::time::Instant::now();

        match fs::try_exists(&full).await {
            Ok(true) => {}
            Ok(false) => return Ok(false),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    path = %full.display(),
                    key = %path,
                    "Error while checking file before deletion"
                );
                return Ok(false);
            }
        }

        match fs::remove_file(&full).await {
            Ok(()) => {
                tracing::info!(
                    path = %full.display(),
                    key = %path,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Filesystem delete successful"
                );
                Ok(true)
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    path = %full.display(),
                    key = %path,
                    "Error while deleting file"
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
        let path = item.file_path.clone();
        Box::pin(async move {
            let full = self.resolve(&path)?;
            match fs::try_exists(&full).await {
                Ok(exists) => Ok(exists),
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        path = %full.display(),
                        key = %path,
                        "Error while checking file existence"
                    );
                    Ok(false)
                }
            }
        })
    }

    async fn delete_all(&self) -> StorageResult<()> {
        if fs::try_exists(&self.root).await.unwrap_or(false) {
            fs::remove_dir_all(&self.root).await.map_err(|e| {
                StorageError::BackendError(format!(
                    "Failed to wipe storage root {}: {}",
                    self.root.display(),
                    e
                ))
            })?;
            tracing::info!(root = %self.root.display(), "Filesystem storage wiped");
        }
        Ok(())
    }

    async fn get_file(&self, path: &str) -> StorageResult<Option<StorageItem>> {
        let full = self.resolve(path)?;

        let metadata = match fs::metadata(&full).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if !metadata.is_file() {
            return Ok(None);
        }

        let file = fs::File::open(&full).await?;
        let file_name = path.rsplit('/').next().unwrap_or(path).to_string();

        Ok(Some(StorageItem {
            file_name,
            file_path: path.to_string(),
            path: parent_path(path),
            file_size: metadata.len(),
            last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            content: Some(StorageContent::new(file)),
        }))
    }

    async fn build_tree(&self) -> StorageResult<Option<StorageFolder>> {
        let metadata = match fs::metadata(&self.root).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        // A root that exists but is not a directory is treated as absent.
        if !metadata.is_dir() {
            return Ok(None);
        }

        let folder = self
            .scan_folder(self.root.clone(), "/".to_string(), String::new())
            .await?;
        Ok(Some(folder))
    }

    fn kind(&self) -> BackendKind {
        BackendKind::FileSystem
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::io::AsyncReadExt;

    async fn save_bytes(backend: &FileSystemBackend, path: &str, data: &[u8]) -> bool {
        let mut cursor = std::io::Cursor::new(data.to_vec());
        backend.save(path, &mut cursor).await.unwrap()
    }

    #[tokio::test]
    async fn test_save_and_get_file_round_trip() {
        let dir = tempdir().unwrap();
        let backend = FileSystemBackend::new(dir.path()).await.unwrap();

        assert!(save_bytes(&backend, "docs/a.txt", b"hello stowage").await);

        let mut item = backend.get_file("docs/a.txt").await.unwrap().unwrap();
        assert_eq!(item.file_name, "a.txt");
        assert_eq!(item.file_path, "docs/a.txt");
        assert_eq!(item.path, "docs");
        assert_eq!(item.file_size, 13);
        assert!(item.last_modified.is_some());

        let mut content = item.take_content().unwrap();
        let mut buf = Vec::new();
        content.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"hello stowage");
    }

    #[tokio::test]
    async fn test_save_without_parent_segment_refused() {
        let dir = tempdir().unwrap();
        let backend = FileSystemBackend::new(dir.path()).await.unwrap();

        let mut cursor = std::io::Cursor::new(b"x".to_vec());
        assert!(!backend.save("rootfile.txt", &mut cursor).await.unwrap());
        assert!(backend.get_file("rootfile.txt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_overwrites_existing() {
        let dir = tempdir().unwrap();
        let backend = FileSystemBackend::new(dir.path()).await.unwrap();

        save_bytes(&backend, "docs/a.txt", b"first").await;
        save_bytes(&backend, "docs/a.txt", b"second!").await;

        let item = backend.get_file("docs/a.txt").await.unwrap().unwrap();
        assert_eq!(item.file_size, 7);
    }

    #[tokio::test]
    async fn test_delete_missing_returns_false() {
        let dir = tempdir().unwrap();
        let backend = FileSystemBackend::new(dir.path()).await.unwrap();
        assert!(!backend.delete("nope/gone.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_existing() {
        let dir = tempdir().unwrap();
        let backend = FileSystemBackend::new(dir.path()).await.unwrap();

        save_bytes(&backend, "docs/a.txt", b"bye").await;
        assert!(backend.delete("docs/a.txt").await.unwrap());
        assert!(backend.get_file("docs/a.txt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_existence_check_failure_surfaces_as_false() {
        let dir = tempdir().unwrap();
        let backend = FileSystemBackend::new(dir.path()).await.unwrap();

        save_bytes(&backend, "docs/a.txt", b"x").await;

        // "docs/a.txt" is a file, so looking beneath it fails with
        // NotADirectory rather than NotFound.
        assert!(!backend.delete("docs/a.txt/child").await.unwrap());

        let mut item = backend.get_file("docs/a.txt").await.unwrap().unwrap();
        item.file_path = "docs/a.txt/child".to_string();
        assert!(!backend.exists(&item).await.unwrap());
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let backend = FileSystemBackend::new(dir.path()).await.unwrap();

        let result = backend.get_file("../../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidPath(_))));

        let result = backend.delete("/etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidPath(_))));
    }

    #[tokio::test]
    async fn test_get_file_on_directory_is_none() {
        let dir = tempdir().unwrap();
        let backend = FileSystemBackend::new(dir.path()).await.unwrap();

        save_bytes(&backend, "docs/a.txt", b"x").await;
        assert!(backend.get_file("docs").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_exists_checks_physical_path() {
        let dir = tempdir().unwrap();
        let backend = FileSystemBackend::new(dir.path()).await.unwrap();

        save_bytes(&backend, "docs/a.txt", b"x").await;
        let item = backend.get_file("docs/a.txt").await.unwrap().unwrap();
        assert!(backend.exists(&item).await.unwrap());

        backend.delete("docs/a.txt").await.unwrap();
        assert!(!backend.exists(&item).await.unwrap());
    }

    #[tokio::test]
    async fn test_build_tree_structure_sorted() {
        let dir = tempdir().unwrap();
        let backend = FileSystemBackend::new(dir.path()).await.unwrap();

        save_bytes(&backend, "b/two.txt", b"2").await;
        save_bytes(&backend, "a/one.txt", b"1").await;
        save_bytes(&backend, "a/nested/three.txt", b"3").await;

        let tree = backend.build_tree().await.unwrap().unwrap();
        assert_eq!(tree.name, "/");
        assert_eq!(tree.children.len(), 2);
        assert_eq!(tree.children[0].name(), "a");
        assert_eq!(tree.children[1].name(), "b");

        let a = tree.child_folder("a").unwrap();
        assert_eq!(a.full_path, "a");
        assert_eq!(a.children[0].name(), "nested");
        assert_eq!(a.children[1].name(), "one.txt");

        match &a.children[1] {
            StorageNode::File(item) => {
                assert_eq!(item.file_path, "a/one.txt");
                assert_eq!(item.path, "a");
                assert_eq!(item.file_size, 1);
            }
            StorageNode::Folder(_) => panic!("expected a file node"),
        }
    }

    #[tokio::test]
    async fn test_build_tree_missing_root_is_none() {
        let dir = tempdir().unwrap();
        let backend = FileSystemBackend::new(dir.path().join("store")).await.unwrap();

        backend.delete_all().await.unwrap();
        assert!(backend.build_tree().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_all_idempotent() {
        let dir = tempdir().unwrap();
        let backend = FileSystemBackend::new(dir.path().join("store")).await.unwrap();

        save_bytes(&backend, "docs/a.txt", b"x").await;
        backend.delete_all().await.unwrap();
        backend.delete_all().await.unwrap();
        assert!(backend.get_file("docs/a.txt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_new_on_file_root_fails() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("not-a-dir");
        tokio::fs::write(&file_path, b"x").await.unwrap();

        let result = FileSystemBackend::new(&file_path).await;
        assert!(matches!(result, Err(StorageError::ConfigError(_))));
    }
}
