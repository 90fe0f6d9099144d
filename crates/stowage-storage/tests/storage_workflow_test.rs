//! End-to-end workflow over the filesystem backend: configure, save,
//! list, read back, delete, wipe.

use std::io::Cursor;

use stowage_storage::{create_storage, StorageConfig, StorageNode};
use tempfile::tempdir;
use tokio::io::AsyncReadExt;

#[tokio::test]
async fn test_full_storage_workflow() {
    let dir = tempdir().unwrap();
    let config = StorageConfig::filesystem(
        dir.path().to_string_lossy().into_owned(),
        "https://cdn.example.com/files",
    );
    let storage = create_storage(&config).await.unwrap();

    // Save two files into the same directory and one elsewhere.
    let mut report = Cursor::new(b"annual report".to_vec());
    let report_item = storage
        .save_file(&mut report, "report.pdf", "/2024/reports")
        .await
        .unwrap();

    let mut summary = Cursor::new(b"summary".to_vec());
    storage
        .save_file(&mut summary, "summary.txt", "2024/reports")
        .await
        .unwrap();

    let mut avatar = Cursor::new(b"png bytes".to_vec());
    let avatar_item = storage
        .save_file(&mut avatar, "avatar.png", "profiles")
        .await
        .unwrap();

    // Listings reflect the writes once the eager rebuild has run.
    let reports = storage.list_directory("2024/reports").await.unwrap();
    assert_eq!(reports.len(), 2);
    assert!(reports
        .iter()
        .all(|node| matches!(node, StorageNode::File(_))));

    let root = storage.list_directory("/").await.unwrap();
    let mut top_level: Vec<&str> = root.iter().map(|node| node.name()).collect();
    top_level.sort_unstable();
    assert_eq!(top_level, ["2024", "profiles"]);

    // Read back content and check the public URL shape.
    let mut fetched = storage
        .get_file(&report_item.file_path)
        .await
        .unwrap()
        .unwrap();
    let mut body = Vec::new();
    fetched
        .take_content()
        .unwrap()
        .read_to_end(&mut body)
        .await
        .unwrap();
    assert_eq!(body, b"annual report");

    let uri = storage.public_uri(&report_item).unwrap();
    assert_eq!(
        uri.as_str(),
        format!("https://cdn.example.com/files/{}", report_item.file_path)
    );

    // Delete one file; the other survives.
    assert!(storage.delete_file(&avatar_item.file_path).await.unwrap());
    assert!(!storage.file_exists(&avatar_item.file_path).await.unwrap());
    assert!(storage.file_exists(&report_item.file_path).await.unwrap());
    assert!(storage.list_directory("profiles").await.unwrap().is_empty());

    // Full wipe: nothing listed, nothing readable.
    storage.delete_all().await.unwrap();
    assert!(storage.list_directory("/").await.unwrap().is_empty());
    assert!(storage
        .get_file(&report_item.file_path)
        .await
        .unwrap()
        .is_none());
}
