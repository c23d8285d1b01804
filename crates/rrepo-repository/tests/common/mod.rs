//! Shared fakes for repository integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use rrepo_core::config::{ConfigProfile, RepoConfig};
use rrepo_core::error::{RepoError, Result};
use rrepo_core::types::{ArchiveDescriptor, AssetKind, CacheInfo, ChangeType, WritePolicy};
use rrepo_index::codec::parse_packages;
use rrepo_repository::{Conditional, Origin, OriginResponse};
use rrepo_storage::{DescriptorExtractor, EventBus, MemoryStore, Store, StoreTransaction, StoredAsset};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Archive bytes carrying a DESCRIPTION-style stanza.
pub fn description(package: &str, version: &str, depends: &str) -> Vec<u8> {
    format!("Package: {}\nVersion: {}\nDepends: {}\n", package, version, depends).into_bytes()
}

/// Reads the descriptor out of a [`description`] payload.
pub struct DescriptionExtractor;

impl DescriptorExtractor for DescriptionExtractor {
    fn extract(&self, path: &str, bytes: &[u8]) -> Result<ArchiveDescriptor> {
        let text = String::from_utf8_lossy(bytes);
        match parse_packages(&text).into_iter().next() {
            Some(entry) => Ok(ArchiveDescriptor::archive(path, entry.package, entry.version, entry.attributes)),
            None => Ok(ArchiveDescriptor::metadata(path, AssetKind::Archive)),
        }
    }
}

pub fn config(debounce_ms: u64, write_policy: WritePolicy) -> RepoConfig {
    let mut config = RepoConfig::with_profile(ConfigProfile::Test);
    config.indexing_mut().debounce_ms = debounce_ms;
    config.storage_mut().write_policy = write_policy;
    config
}

// ============================================================================
// Store with injectable commit failures
// ============================================================================

pub struct FlakyStore {
    inner: MemoryStore,
    fail_commits: Arc<AtomicBool>,
    fail_cache_updates: AtomicBool,
}

impl FlakyStore {
    pub fn new(repository_id: &str) -> Self {
        Self {
            inner: MemoryStore::new(repository_id),
            fail_commits: Arc::new(AtomicBool::new(false)),
            fail_cache_updates: AtomicBool::new(false),
        }
    }

    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    pub fn fail_cache_updates(&self, fail: bool) {
        self.fail_cache_updates.store(fail, Ordering::SeqCst);
    }
}

struct FlakyTransaction {
    inner: Box<dyn StoreTransaction>,
    fail: bool,
}

#[async_trait]
impl StoreTransaction for FlakyTransaction {
    async fn enumerate_archives(&self, base_path: &str) -> Result<Vec<ArchiveDescriptor>> {
        self.inner.enumerate_archives(base_path).await
    }

    async fn archive_base_paths(&self) -> Result<Vec<String>> {
        self.inner.archive_base_paths().await
    }

    async fn write_index_document(&mut self, base_path: &str, bytes: Vec<u8>) -> Result<()> {
        self.inner.write_index_document(base_path, bytes).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        if self.fail {
            return Err(RepoError::storage("disk full"));
        }
        self.inner.commit().await
    }
}

#[async_trait]
impl Store for FlakyStore {
    fn repository_id(&self) -> &str {
        self.inner.repository_id()
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        Ok(Box::new(FlakyTransaction {
            inner: self.inner.begin().await?,
            fail: self.fail_commits.load(Ordering::SeqCst),
        }))
    }

    async fn get_asset(&self, path: &str) -> Result<Option<StoredAsset>> {
        self.inner.get_asset(path).await
    }

    async fn put_archive(
        &self,
        descriptor: ArchiveDescriptor,
        bytes: Vec<u8>,
        cache_info: Option<CacheInfo>,
    ) -> Result<ChangeType> {
        self.inner.put_archive(descriptor, bytes, cache_info).await
    }

    async fn put_metadata(
        &self,
        path: &str,
        kind: AssetKind,
        bytes: Vec<u8>,
        cache_info: Option<CacheInfo>,
    ) -> Result<ChangeType> {
        self.inner.put_metadata(path, kind, bytes, cache_info).await
    }

    async fn set_cache_info(&self, path: &str, cache_info: CacheInfo) -> Result<()> {
        if self.fail_cache_updates.load(Ordering::SeqCst) {
            return Err(RepoError::storage("cache bookkeeping unavailable"));
        }
        self.inner.set_cache_info(path, cache_info).await
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        self.inner.delete(path).await
    }

    fn events(&self) -> EventBus {
        self.inner.events()
    }
}

// ============================================================================
// Scriptable origin
// ============================================================================

pub const ORIGIN_URL: &str = "https://cran.example.org";

#[derive(Default)]
pub struct FakeOrigin {
    assets: Mutex<HashMap<String, (Vec<u8>, String)>>,
    requests: Mutex<Vec<(String, Option<Conditional>)>>,
    down: AtomicBool,
}

impl FakeOrigin {
    pub fn publish(&self, path: &str, bytes: Vec<u8>, etag: &str) {
        self.assets.lock().insert(path.to_string(), (bytes, etag.to_string()));
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<(String, Option<Conditional>)> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Origin for FakeOrigin {
    fn url(&self) -> &str {
        ORIGIN_URL
    }

    async fn fetch(&self, path: &str, conditional: Option<&Conditional>) -> Result<OriginResponse> {
        self.requests.lock().push((path.to_string(), conditional.cloned()));

        if self.down.load(Ordering::SeqCst) {
            return Err(RepoError::internal("connection refused"));
        }

        let assets = self.assets.lock();
        let (bytes, etag) = assets.get(path).ok_or_else(|| RepoError::not_found(path))?;

        if conditional.and_then(|c| c.etag.as_deref()) == Some(etag.as_str()) {
            return Ok(OriginResponse::NotModified);
        }
        Ok(OriginResponse::Content {
            bytes: bytes.clone(),
            etag: Some(etag.clone()),
        })
    }
}
