//! Transaction behaviour seen through the `Store` trait object.

use rrepo_core::types::{ArchiveDescriptor, Attributes, ChangeType};
use rrepo_storage::{MemoryStore, Store};
use chrono::{DateTime, Utc};
use std::sync::Arc;

fn archive(path: &str, name: &str, version: &str) -> ArchiveDescriptor {
    ArchiveDescriptor::archive(path, name, version, Attributes::default())
}

#[tokio::test]
async fn index_write_replaces_previous_document() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new("r-hosted"));

    for bytes in [b"first".to_vec(), b"second".to_vec()] {
        let mut tx = store.begin().await.unwrap();
        tx.write_index_document("src/contrib", bytes).await.unwrap();
        tx.commit().await.unwrap();
    }

    let asset = store.get_asset("/src/contrib/PACKAGES.gz").await.unwrap().unwrap();
    assert_eq!(asset.bytes, b"second");
}

#[tokio::test]
async fn commit_keeps_writes_made_after_begin() {
    let store = Arc::new(MemoryStore::new("r-hosted"));
    let mut rx = store.events().subscribe();

    let mut tx = store.begin().await.unwrap();
    store
        .put_archive(archive("src/contrib/a_1.0.tar.gz", "a", "1.0"), Vec::new(), None)
        .await
        .unwrap();

    let seen = tx.enumerate_archives("src/contrib").await.unwrap();
    tx.write_index_document("src/contrib", Vec::new()).await.unwrap();
    tx.commit().await.unwrap();

    assert!(seen.is_empty());
    assert_eq!(
        store.paths(),
        vec!["src/contrib/PACKAGES.gz".to_string(), "src/contrib/a_1.0.tar.gz".to_string()]
    );

    let archive_event = rx.recv().await.unwrap();
    assert_eq!(archive_event.path, "src/contrib/a_1.0.tar.gz");
    let index_event = rx.recv().await.unwrap();
    assert_eq!(index_event.path, "src/contrib/PACKAGES.gz");
    assert_eq!(index_event.change_type, ChangeType::Created);
}

#[tokio::test]
async fn last_modified_is_assigned_by_store() {
    let store = MemoryStore::new("r-hosted");
    let stale = archive("src/contrib/a_1.0.tar.gz", "a", "1.0")
        .with_last_modified(DateTime::<Utc>::UNIX_EPOCH);

    store.put_archive(stale, Vec::new(), None).await.unwrap();

    let asset = store.get_asset("src/contrib/a_1.0.tar.gz").await.unwrap().unwrap();
    assert!(asset.descriptor.last_modified > DateTime::<Utc>::UNIX_EPOCH);
}
