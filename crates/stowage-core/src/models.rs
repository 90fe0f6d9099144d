//! Storage node model: files, folders, and the tree they form.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::{AsyncRead, ReadBuf};

/// An open read handle to a stored file's content.
///
/// Handles are newly opened by a backend read and ownership transfers to the
/// caller, who is responsible for releasing it (dropping it). Handles are
/// never cached and never cloned.
pub struct StorageContent(Pin<Box<dyn AsyncRead + Send + Unpin>>);

impl StorageContent {
    pub fn new(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        StorageContent(Box::pin(reader))
    }

    pub fn into_inner(self) -> Pin<Box<dyn AsyncRead + Send + Unpin>> {
        self.0
    }
}

impl AsyncRead for StorageContent {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_read(cx, buf)
    }
}

impl fmt::Debug for StorageContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StorageContent(..)")
    }
}

/// Metadata for one stored file.
///
/// `file_path` is the normalized logical path and uniquely identifies the
/// item within one storage instance; `path` is its parent directory,
/// derived from `file_path`.
#[derive(Debug, Serialize)]
pub struct StorageItem {
    /// Display name; may differ from the stored path segment.
    pub file_name: String,
    /// Normalized logical path, the item's unique key.
    pub file_path: String,
    /// Normalized parent directory path.
    pub path: String,
    /// Byte length, fixed at creation/read time.
    pub file_size: u64,
    /// Backend modification time; absent for newly created, unsaved items.
    pub last_modified: Option<DateTime<Utc>>,
    /// Open content handle when the item was constructed from a read.
    /// Metadata served from a cache carries no handle.
    #[serde(skip)]
    pub content: Option<StorageContent>,
}

impl StorageItem {
    /// Take ownership of the content handle, if any. Subsequent calls
    /// return `None`.
    pub fn take_content(&mut self) -> Option<StorageContent> {
        self.content.take()
    }
}

/// Cloning an item clones metadata only; the content handle, if present,
/// stays with the original.
impl Clone for StorageItem {
    fn clone(&self) -> Self {
        StorageItem {
            file_name: self.file_name.clone(),
            file_path: self.file_path.clone(),
            path: self.path.clone(),
            file_size: self.file_size,
            last_modified: self.last_modified,
            content: None,
        }
    }
}

/// One directory in the storage tree.
///
/// `children` reflects a single point-in-time scan; it is not incrementally
/// maintained between rebuilds.
#[derive(Debug, Clone, Serialize)]
pub struct StorageFolder {
    /// The folder's own segment name.
    pub name: String,
    /// Normalized path of the folder within the storage root.
    pub full_path: String,
    pub children: Vec<StorageNode>,
}

impl StorageFolder {
    pub fn new(name: impl Into<String>, full_path: impl Into<String>) -> Self {
        StorageFolder {
            name: name.into(),
            full_path: full_path.into(),
            children: Vec::new(),
        }
    }

    /// Child folder with the given segment name, exact case-sensitive match.
    pub fn child_folder(&self, name: &str) -> Option<&StorageFolder> {
        self.children.iter().find_map(|node| match node {
            StorageNode::Folder(folder) if folder.name == name => Some(folder),
            _ => None,
        })
    }

    /// Sort children by name, folders and files interleaved, for a
    /// deterministic listing order regardless of scan order.
    pub fn sort_children(&mut self) {
        self.children.sort_by(|a, b| a.name().cmp(b.name()));
    }
}

/// A node in the storage tree: a stored file or a nested folder.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StorageNode {
    File(StorageItem),
    Folder(StorageFolder),
}

impl StorageNode {
    pub fn name(&self) -> &str {
        match self {
            StorageNode::File(item) => &item.file_name,
            StorageNode::Folder(folder) => &folder.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, path: &str) -> StorageItem {
        StorageItem {
            file_name: name.to_string(),
            file_path: format!("{}/{}", path, name),
            path: path.to_string(),
            file_size: 3,
            last_modified: None,
            content: Some(StorageContent::new(std::io::Cursor::new(b"abc".to_vec()))),
        }
    }

    #[test]
    fn test_clone_drops_content_handle() {
        let original = item("a.txt", "docs");
        let cloned = original.clone();
        assert!(original.content.is_some());
        assert!(cloned.content.is_none());
        assert_eq!(cloned.file_path, "docs/a.txt");
        assert_eq!(cloned.file_size, 3);
    }

    #[test]
    fn test_take_content_is_one_shot() {
        let mut stored = item("a.txt", "docs");
        assert!(stored.take_content().is_some());
        assert!(stored.take_content().is_none());
    }

    #[test]
    fn test_child_folder_is_case_sensitive() {
        let mut root = StorageFolder::new("/", "");
        root.children
            .push(StorageNode::Folder(StorageFolder::new("Docs", "Docs")));
        assert!(root.child_folder("Docs").is_some());
        assert!(root.child_folder("docs").is_none());
    }

    #[test]
    fn test_sort_children_orders_by_name() {
        let mut root = StorageFolder::new("/", "");
        root.children.push(StorageNode::File(item("b.txt", "")));
        root.children
            .push(StorageNode::Folder(StorageFolder::new("a", "a")));
        root.sort_children();
        assert_eq!(root.children[0].name(), "a");
        assert_eq!(root.children[1].name(), "b.txt");
    }
}
