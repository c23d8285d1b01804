//! In-memory store
//!
//! Backs tests and embedded use. Assets live in a path-ordered map behind a
//! lock; transactions read from a snapshot taken at `begin` and apply their
//! staged writes under a single write lock on commit.

use crate::events::EventBus;
use crate::traits::{Store, StoreTransaction, StoredAsset};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use rrepo_core::error::{RepoError, Result};
use rrepo_core::path::{self, normalize, packages_path};
use rrepo_core::types::{ArchiveDescriptor, AssetKind, CacheInfo, ChangeType, MutationEvent};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

type AssetMap = BTreeMap<String, Arc<StoredAsset>>;

/// Store holding every asset in memory.
#[derive(Clone)]
pub struct MemoryStore {
    repository_id: String,
    assets: Arc<RwLock<AssetMap>>,
    events: EventBus,
}

impl MemoryStore {
    /// Create an empty store for one repository
    pub fn new(repository_id: impl Into<String>) -> Self {
        let repository_id = repository_id.into();
        info!("Creating in-memory store for repository {}", repository_id);

        Self {
            repository_id,
            assets: Arc::new(RwLock::new(BTreeMap::new())),
            events: EventBus::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.assets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.read().is_empty()
    }

    /// All stored paths in order
    pub fn paths(&self) -> Vec<String> {
        self.assets.read().keys().cloned().collect()
    }

    fn upsert(&self, mut asset: StoredAsset) -> ChangeType {
        let path = normalize(&asset.descriptor.path).to_string();
        asset.descriptor.path = path.clone();
        asset.descriptor.last_modified = Utc::now();

        let change_type = match self.assets.write().insert(path.clone(), Arc::new(asset)) {
            Some(_) => ChangeType::Updated,
            None => ChangeType::Created,
        };

        debug!("Stored {} ({:?})", path, change_type);
        self.events
            .publish(MutationEvent::local(&self.repository_id, path, change_type));
        change_type
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn repository_id(&self) -> &str {
        &self.repository_id
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let snapshot = self.assets.read().clone();
        let tx = MemoryTransaction {
            id: Uuid::new_v4(),
            repository_id: self.repository_id.clone(),
            snapshot,
            staged: Vec::new(),
            target: Arc::clone(&self.assets),
            events: self.events.clone(),
            committed: false,
        };
        debug!("Began transaction {} on {}", tx.id, self.repository_id);
        Ok(Box::new(tx))
    }

    async fn get_asset(&self, path: &str) -> Result<Option<StoredAsset>> {
        Ok(self
            .assets
            .read()
            .get(normalize(path))
            .map(|asset| asset.as_ref().clone()))
    }

    async fn put_archive(
        &self,
        descriptor: ArchiveDescriptor,
        bytes: Vec<u8>,
        cache_info: Option<CacheInfo>,
    ) -> Result<ChangeType> {
        if !descriptor.is_archive() {
            return Err(RepoError::invalid_path(format!(
                "{}: archive descriptor needs a package name and version",
                descriptor.path
            )));
        }

        Ok(self.upsert(StoredAsset {
            descriptor,
            bytes,
            cache_info,
        }))
    }

    async fn put_metadata(
        &self,
        path: &str,
        kind: AssetKind,
        bytes: Vec<u8>,
        cache_info: Option<CacheInfo>,
    ) -> Result<ChangeType> {
        if !kind.is_metadata() {
            return Err(RepoError::storage(format!("{} is not a metadata kind", kind)));
        }

        Ok(self.upsert(StoredAsset {
            descriptor: ArchiveDescriptor::metadata(path, kind),
            bytes,
            cache_info,
        }))
    }

    async fn set_cache_info(&self, path: &str, cache_info: CacheInfo) -> Result<()> {
        let mut assets = self.assets.write();
        let asset = assets
            .get_mut(normalize(path))
            .ok_or_else(|| RepoError::not_found(path))?;

        Arc::make_mut(asset).cache_info = Some(cache_info);
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        let path = normalize(path);
        let removed = self.assets.write().remove(path).is_some();

        if removed {
            debug!("Deleted {}", path);
            self.events
                .publish(MutationEvent::local(&self.repository_id, path, ChangeType::Deleted));
        }
        Ok(removed)
    }

    fn events(&self) -> EventBus {
        self.events.clone()
    }
}

/// Transaction over a [`MemoryStore`] snapshot.
pub struct MemoryTransaction {
    id: Uuid,
    repository_id: String,
    snapshot: AssetMap,
    staged: Vec<StoredAsset>,
    target: Arc<RwLock<AssetMap>>,
    events: EventBus,
    committed: bool,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn enumerate_archives(&self, base_path: &str) -> Result<Vec<ArchiveDescriptor>> {
        let base = normalize(base_path).trim_end_matches('/');

        Ok(self
            .snapshot
            .values()
            .filter(|asset| asset.kind() == AssetKind::Archive && path::base_path(asset.path()) == base)
            .map(|asset| asset.descriptor.clone())
            .collect())
    }

    async fn archive_base_paths(&self) -> Result<Vec<String>> {
        let bases: BTreeSet<&str> = self
            .snapshot
            .values()
            .filter(|asset| asset.kind() == AssetKind::Archive)
            .map(|asset| path::base_path(asset.path()))
            .collect();

        Ok(bases.into_iter().map(str::to_string).collect())
    }

    async fn write_index_document(&mut self, base_path: &str, bytes: Vec<u8>) -> Result<()> {
        let path = packages_path(normalize(base_path));
        self.staged.push(StoredAsset {
            descriptor: ArchiveDescriptor::metadata(path, AssetKind::IndexDocument),
            bytes,
            cache_info: None,
        });
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<()> {
        let now = Utc::now();
        let staged = std::mem::take(&mut self.staged);

        let changes: Vec<(String, ChangeType)> = {
            let mut assets = self.target.write();
            staged
                .into_iter()
                .map(|mut asset| {
                    asset.descriptor.last_modified = now;
                    let path = asset.descriptor.path.clone();
                    let change_type = match assets.insert(path.clone(), Arc::new(asset)) {
                        Some(_) => ChangeType::Updated,
                        None => ChangeType::Created,
                    };
                    (path, change_type)
                })
                .collect()
        };
        self.committed = true;

        debug!("Committed transaction {} ({} writes)", self.id, changes.len());
        for (path, change_type) in changes {
            self.events
                .publish(MutationEvent::local(&self.repository_id, path, change_type));
        }
        Ok(())
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if !self.committed {
            debug!(
                "Rolling back transaction {} ({} staged writes discarded)",
                self.id,
                self.staged.len()
            );
        }
    }
}
