//! Storage ports consumed by the index engine and repository facades.

use crate::events::EventBus;
use async_trait::async_trait;
use rrepo_core::error::Result;
use rrepo_core::types::{ArchiveDescriptor, AssetKind, CacheInfo, ChangeType, Content};

/// An asset as held by a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAsset {
    pub descriptor: ArchiveDescriptor,
    pub bytes: Vec<u8>,
    /// Present for assets cached from a remote origin
    pub cache_info: Option<CacheInfo>,
}

impl StoredAsset {
    pub fn path(&self) -> &str {
        &self.descriptor.path
    }

    pub fn kind(&self) -> AssetKind {
        self.descriptor.kind
    }

    /// Copy out the bytes and response metadata.
    pub fn to_content(&self) -> Content {
        Content {
            path: self.descriptor.path.clone(),
            kind: self.descriptor.kind,
            bytes: self.bytes.clone(),
            last_modified: self.descriptor.last_modified,
            cache_info: self.cache_info.clone(),
        }
    }
}

/// Trait for asset storage backends.
///
/// Every committed mutation of an asset is published on the store's
/// [`EventBus`]. Cache bookkeeping (`set_cache_info`) is not a mutation.
#[async_trait]
pub trait Store: Send + Sync {
    /// Repository whose assets this store holds, as stamped on its events
    fn repository_id(&self) -> &str;

    /// Open a transaction whose reads see a snapshot taken now
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>>;

    /// Get an asset by path
    async fn get_asset(&self, path: &str) -> Result<Option<StoredAsset>>;

    /// Create or replace an archive, stamping its last-modified time
    async fn put_archive(
        &self,
        descriptor: ArchiveDescriptor,
        bytes: Vec<u8>,
        cache_info: Option<CacheInfo>,
    ) -> Result<ChangeType>;

    /// Create or replace a metadata asset
    async fn put_metadata(
        &self,
        path: &str,
        kind: AssetKind,
        bytes: Vec<u8>,
        cache_info: Option<CacheInfo>,
    ) -> Result<ChangeType>;

    /// Replace the cache bookkeeping of an existing asset
    async fn set_cache_info(&self, path: &str, cache_info: CacheInfo) -> Result<()>;

    /// Delete an asset. Returns `false` when nothing was stored at `path`.
    async fn delete(&self, path: &str) -> Result<bool>;

    /// Bus carrying this store's mutation events
    fn events(&self) -> EventBus;
}

/// A unit of work against a store.
///
/// Writes are buffered until [`commit`](StoreTransaction::commit). A
/// transaction dropped without committing is rolled back.
#[async_trait]
pub trait StoreTransaction: Send + Sync {
    /// Archives whose directory is exactly `base_path`
    async fn enumerate_archives(&self, base_path: &str) -> Result<Vec<ArchiveDescriptor>>;

    /// Distinct directories holding at least one archive, in path order
    async fn archive_base_paths(&self) -> Result<Vec<String>>;

    /// Stage `{base_path}/PACKAGES.gz`
    async fn write_index_document(&mut self, base_path: &str, bytes: Vec<u8>) -> Result<()>;

    /// Apply staged writes atomically
    async fn commit(self: Box<Self>) -> Result<()>;
}

/// Reads the package name, version and index attributes out of archive bytes.
pub trait DescriptorExtractor: Send + Sync {
    fn extract(&self, path: &str, bytes: &[u8]) -> Result<ArchiveDescriptor>;
}
