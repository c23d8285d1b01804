//! Proxy caching: serve decisions and the fetch-through repository.

use crate::group::RepositoryView;
use crate::origin::{Conditional, Origin, OriginResponse};
use crate::write_policy::select_write_policy;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use rrepo_core::config::RepoConfig;
use rrepo_core::error::{RepoError, Result};
use rrepo_core::path::{classify, normalize};
use rrepo_core::types::{AssetKind, CacheInfo, CacheType, Content, WritePolicy};
use rrepo_storage::{DescriptorExtractor, Store, StoredAsset};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

// ============================================================================
// Cache decisions
// ============================================================================

/// How a proxied read should be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeDecision {
    /// The cached copy is current
    ServeCached,
    /// The cached copy must be confirmed with origin first
    Revalidate,
    /// Nothing usable is cached
    FetchOrigin,
}

/// Cache and overwrite rules for proxied assets.
///
/// Archives are immutable once cached. Metadata is fresh for `metadata_ttl`
/// after origin last confirmed it.
#[derive(Debug, Clone, Copy)]
pub struct ProxyCacheDecider {
    metadata_ttl: Duration,
    write_policy: WritePolicy,
}

impl ProxyCacheDecider {
    pub fn new(metadata_ttl: Duration, write_policy: WritePolicy) -> Self {
        Self {
            metadata_ttl,
            write_policy,
        }
    }

    pub fn from_config(config: &RepoConfig) -> Self {
        Self::new(config.metadata_ttl(), config.storage().write_policy)
    }

    pub fn metadata_ttl(&self) -> Duration {
        self.metadata_ttl
    }

    /// # Errors
    ///
    /// Returns `InvalidPath` when `path` does not classify.
    pub fn decide_serve(&self, path: &str, cached: Option<&CacheInfo>, now: DateTime<Utc>) -> Result<ServeDecision> {
        let kind = classify(path)?;

        let Some(info) = cached else {
            return Ok(ServeDecision::FetchOrigin);
        };

        let decision = match kind.cache_type() {
            CacheType::Content => ServeDecision::ServeCached,
            CacheType::Metadata => {
                let ttl = TimeDelta::from_std(self.metadata_ttl).unwrap_or(TimeDelta::MAX);
                if now - info.last_validated < ttl {
                    ServeDecision::ServeCached
                } else {
                    ServeDecision::Revalidate
                }
            }
        };

        debug!("Serve decision for {}: {:?}", path, decision);
        Ok(decision)
    }

    /// Whether an existing asset of `kind` may be replaced.
    pub fn can_overwrite(&self, kind: AssetKind) -> bool {
        select_write_policy(kind, self.write_policy).permits_overwrite()
    }
}

// ============================================================================
// Proxy repository
// ============================================================================

/// Repository that fetches from an [`Origin`] and caches what it fetched.
pub struct ProxyRepository {
    name: String,
    store: Arc<dyn Store>,
    origin: Arc<dyn Origin>,
    extractor: Arc<dyn DescriptorExtractor>,
    decider: ProxyCacheDecider,
}

impl ProxyRepository {
    pub fn new(
        name: impl Into<String>,
        store: Arc<dyn Store>,
        origin: Arc<dyn Origin>,
        extractor: Arc<dyn DescriptorExtractor>,
        decider: ProxyCacheDecider,
    ) -> Self {
        let name = name.into();
        info!("Proxy repository {} caching {}", name, origin.url());
        Self {
            name,
            store,
            origin,
            extractor,
            decider,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn decider(&self) -> &ProxyCacheDecider {
        &self.decider
    }

    /// Read through the cache at the current time.
    pub async fn get(&self, path: &str) -> Result<Content> {
        self.get_at(path, Utc::now()).await
    }

    /// Read through the cache as of `now`.
    ///
    /// # Errors
    ///
    /// - `UnsupportedMetadataRequested` for `.rds` paths
    /// - `NotFound` when origin has no such asset and nothing is cached
    /// - `OriginUnavailable` when origin fails and nothing is cached
    pub async fn get_at(&self, path: &str, now: DateTime<Utc>) -> Result<Content> {
        let kind = classify(path)?;
        if kind == AssetKind::UnsupportedMetadata {
            return Err(RepoError::unsupported_metadata(path));
        }
        let path = normalize(path);

        let cached = self.store.get_asset(path).await?;
        let decision = self
            .decider
            .decide_serve(path, cached.as_ref().and_then(|asset| asset.cache_info.as_ref()), now)?;

        match (decision, cached) {
            (ServeDecision::ServeCached, Some(asset)) => Ok(asset.to_content()),
            (_, cached) => self.fetch(path, kind, cached, now).await,
        }
    }

    async fn fetch(&self, path: &str, kind: AssetKind, cached: Option<StoredAsset>, now: DateTime<Utc>) -> Result<Content> {
        let cache_info = cached.as_ref().and_then(|asset| asset.cache_info.clone());
        let conditional = cache_info.as_ref().map(|info| Conditional {
            etag: info.etag.clone(),
            if_modified_since: Some(info.last_validated),
        });

        match self.origin.fetch(path, conditional.as_ref()).await {
            Ok(OriginResponse::NotModified) => match (cached, cache_info) {
                (Some(asset), Some(info)) => {
                    let info = info.refreshed(now);
                    self.store.set_cache_info(path, info.clone()).await?;
                    debug!("{} not modified at origin, revalidated", path);

                    let mut content = asset.to_content();
                    content.cache_info = Some(info);
                    Ok(content)
                }
                _ => Err(RepoError::origin_unavailable(
                    path,
                    "origin answered not modified for an uncached asset",
                )),
            },
            Ok(OriginResponse::Content { bytes, etag }) => {
                if cached.is_some() && !self.decider.can_overwrite(kind) {
                    return Err(RepoError::write_rejected(path));
                }
                self.store_fetched(path, kind, bytes, etag, now).await
            }
            Err(e) => match cached {
                Some(asset) => {
                    warn!("Origin failed for {} in {}, serving stale copy: {}", path, self.name, e);
                    Ok(asset.to_content())
                }
                None if e.is_not_found() => Err(e),
                None => Err(RepoError::origin_unavailable(path, e.to_string())),
            },
        }
    }

    async fn store_fetched(
        &self,
        path: &str,
        kind: AssetKind,
        bytes: Vec<u8>,
        etag: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Content> {
        let info = CacheInfo::new(kind.cache_type(), self.origin.url(), now).with_etag(etag);

        match kind {
            AssetKind::Archive => {
                let mut descriptor = self.extractor.extract(path, &bytes)?;
                descriptor.path = path.to_string();
                self.store.put_archive(descriptor, bytes, Some(info)).await?;
            }
            AssetKind::IndexDocument | AssetKind::UnsupportedMetadata => {
                self.store.put_metadata(path, kind, bytes, Some(info)).await?;
            }
        }
        debug!("Cached {} from {}", path, self.origin.url());

        self.store
            .get_asset(path)
            .await?
            .map(|asset| asset.to_content())
            .ok_or_else(|| RepoError::internal(format!("{} vanished after caching", path)))
    }
}

#[async_trait]
impl RepositoryView for ProxyRepository {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, path: &str) -> Result<Content> {
        ProxyRepository::get(self, path).await
    }
}
