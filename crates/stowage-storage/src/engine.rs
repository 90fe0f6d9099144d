//! The storage engine: orchestrates save/get/delete/list over a pluggable
//! backend, coordinates the metadata cache, and owns the lazily rebuilt
//! directory-tree snapshot used for listings.

use std::io::SeekFrom;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncSeek, AsyncSeekExt};
use tokio::sync::Mutex;
use tokio::time::Instant;
use url::Url;
use uuid::Uuid;

use crate::cache::StorageCache;
use crate::traits::{StorageBackend, StorageError, StorageResult};
use stowage_core::{join_path, normalize_key, parent_path, StorageFolder, StorageItem, StorageNode};

/// How long a tree snapshot stays fresh before the next listing rebuilds it.
/// Writes rebuild eagerly regardless of age.
const TREE_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Default)]
struct TreeState {
    root: Option<StorageFolder>,
    built_at: Option<Instant>,
}

/// One logical storage instance.
///
/// Constructed once per storage and long-lived. The backend is injected at
/// configuration time; the cache is an optional collaborator. Concurrent
/// callers may issue any mix of operations; a reader racing a write may
/// observe either the pre- or post-write tree until the write's rebuild
/// completes.
pub struct Storage {
    backend: Arc<dyn StorageBackend>,
    cache: Option<Arc<dyn StorageCache>>,
    public_base_url: String,
    tree: Mutex<TreeState>,
}

impl Storage {
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        cache: Option<Arc<dyn StorageCache>>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Storage {
            backend,
            cache,
            public_base_url: public_base_url.into(),
            tree: Mutex::new(TreeState::default()),
        }
    }

    /// Save `content` under `path` with a freshly generated stored name
    /// (`<uuid>.<original extension>`); the uuid space makes collisions
    /// negligible and no retry is attempted. The content stream is rewound
    /// to its start before writing and is not closed; the caller keeps
    /// ownership of it.
    ///
    /// On success a subsequent `get_file` for the returned `file_path`
    /// reflects the saved content.
    pub async fn save_file<R>(
        &self,
        content: &mut R,
        file_name: &str,
        path: &str,
    ) -> StorageResult<StorageItem>
    where
        R: AsyncRead + AsyncSeek + Send + Unpin,
    {
        let destination = join_path(path, &storage_file_name(file_name));
        let file_path = normalize_key(&destination)
            .ok_or_else(|| StorageError::InvalidPath(destination.clone()))?;

        let file_size = content.seek(SeekFrom::End(0)).await?;
        content.seek(SeekFrom::Start(0)).await?;

        let item = StorageItem {
            file_name: file_name.to_string(),
            file_path: file_path.clone(),
            path: parent_path(&file_path),
            file_size,
            last_modified: None,
            content: None,
        };

        let saved = self.backend.save(&file_path, content).await?;
        if !saved {
            tracing::error!(key = %file_path, "Backend refused to save file");
            return Err(StorageError::SaveFailed(file_path));
        }

        // A fresh path should never be cached, but guard against reuse.
        if let Some(cache) = &self.cache {
            cache.remove(&file_path).await;
        }

        tracing::info!(
            key = %file_path,
            file_name = %file_name,
            size_bytes = file_size,
            "File saved"
        );

        self.rebuild_tree().await?;
        Ok(item)
    }

    /// Delete the file at `file_path`. Returns the backend's success flag:
    /// `false` when the file was absent or the backend could not delete it.
    pub async fn delete_file(&self, file_path: &str) -> StorageResult<bool> {
        let Some(key) = normalize_key(file_path) else {
            return Ok(false);
        };

        if let Some(cache) = &self.cache {
            cache.remove(&key).await;
        }

        let deleted = self.backend.delete(&key).await?;
        self.rebuild_tree().await?;
        Ok(deleted)
    }

    /// Fetch one file's metadata (read-through the cache when one is
    /// configured). Items served from the cache carry no content handle;
    /// items freshly read from the backend do.
    pub async fn get_file(&self, path: &str) -> StorageResult<Option<StorageItem>> {
        let Some(key) = normalize_key(path) else {
            return Ok(None);
        };

        match &self.cache {
            Some(cache) => {
                let backend = Arc::clone(&self.backend);
                let fetch_key = key.clone();
                cache
                    .get_or_add(
                        &key,
                        Box::pin(async move { backend.get_file(&fetch_key).await }),
                    )
                    .await
            }
            None => self.backend.get_file(&key).await,
        }
    }

    /// Existence is answered through the same cached read path as
    /// `get_file`, not through the backend's physical check.
    pub async fn file_exists(&self, path: &str) -> StorageResult<bool> {
        Ok(self.get_file(path).await?.is_some())
    }

    /// Wipe the whole storage: clear the cache, destroy everything under
    /// the backend root, and reset the tree to unbuilt.
    pub async fn delete_all(&self) -> StorageResult<()> {
        if let Some(cache) = &self.cache {
            cache.clear().await;
        }

        self.backend.delete_all().await?;

        let mut state = self.tree.lock().await;
        *state = TreeState::default();
        Ok(())
    }

    /// List the nodes directly under `path`, rebuilding the tree snapshot
    /// first if it is unbuilt or older than 30 minutes. Path segments are
    /// matched case-sensitively against child folder names; an unmatched
    /// segment (or an unavailable tree) yields an empty listing. The
    /// trimmed-empty path (`""`, `"/"`) lists the root's children.
    pub async fn list_directory(&self, path: &str) -> StorageResult<Vec<StorageNode>> {
        // The check-and-rebuild runs under the tree mutex, so concurrent
        // listings coalesce into a single backend scan.
        let mut state = self.tree.lock().await;
        let stale = state.root.is_none()
            || state
                .built_at
                .map_or(true, |built_at| built_at.elapsed() > TREE_TTL);
        if stale {
            state.root = self.backend.build_tree().await?;
            state.built_at = Some(Instant::now());
        }

        let Some(root) = &state.root else {
            return Ok(Vec::new());
        };

        let mut current = root;
        if let Some(key) = normalize_key(path) {
            for segment in key.split('/') {
                match current.child_folder(segment) {
                    Some(folder) => current = folder,
                    None => return Ok(Vec::new()),
                }
            }
        }
        Ok(current.children.clone())
    }

    /// Public URL for an item: configured base joined with the item's
    /// logical path. Pure composition, no I/O.
    pub fn public_uri(&self, item: &StorageItem) -> StorageResult<Url> {
        let joined = format!(
            "{}/{}",
            self.public_base_url.trim_end_matches('/'),
            item.file_path
        );
        Url::parse(&joined)
            .map_err(|e| StorageError::ConfigError(format!("Invalid public URL {}: {}", joined, e)))
    }

    async fn rebuild_tree(&self) -> StorageResult<()> {
        let mut state = self.tree.lock().await;
        state.root = self.backend.build_tree().await?;
        state.built_at = Some(Instant::now());
        Ok(())
    }
}

/// Stored filename for an upload: a fresh uuid keeping the original
/// extension, or a bare uuid when there is none.
fn storage_file_name(file_name: &str) -> String {
    match file_name.rfind('.') {
        Some(idx) => format!("{}{}", Uuid::new_v4(), &file_name[idx..]),
        None => Uuid::new_v4().to_string(),
    }
}
