//! Hosted repository: archives uploaded directly, indexes generated locally.

use crate::coordinator::{rebuild_index, RebuildCoordinator};
use crate::group::RepositoryView;
use crate::write_policy::select_write_policy;
use async_trait::async_trait;
use rrepo_core::config::RepoConfig;
use rrepo_core::error::{RepoError, Result};
use rrepo_core::path::{classify, normalize, validate_archive_path};
use rrepo_core::types::{ArchiveDescriptor, AssetKind, Content, WritePolicy};
use rrepo_index::IndexDocument;
use rrepo_storage::{DescriptorExtractor, Store};
use std::sync::Arc;
use tracing::info;

/// A repository whose archives are uploaded to it.
///
/// Each hosted repository owns a [`RebuildCoordinator`] attached to its
/// store's events, so uploads and deletes refresh `PACKAGES.gz` after the
/// debounce window. Reads never wait for a rebuild.
pub struct HostedRepository {
    name: String,
    store: Arc<dyn Store>,
    extractor: Arc<dyn DescriptorExtractor>,
    write_policy: WritePolicy,
    coordinator: Option<RebuildCoordinator>,
}

impl HostedRepository {
    /// Create the repository and start index maintenance if enabled.
    ///
    /// Must be called within a tokio runtime.
    pub fn new(
        name: impl Into<String>,
        store: Arc<dyn Store>,
        extractor: Arc<dyn DescriptorExtractor>,
        config: &RepoConfig,
    ) -> Self {
        let name = name.into();

        let coordinator = if config.indexing().enabled {
            // Events carry the store's id, which may differ from the facade name
            let coordinator =
                RebuildCoordinator::spawn(store.repository_id(), Arc::clone(&store), config.debounce());
            coordinator.attach(&store.events());
            Some(coordinator)
        } else {
            info!("Index maintenance disabled for {}", name);
            None
        };

        Self {
            name,
            store,
            extractor,
            write_policy: config.storage().write_policy,
            coordinator,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn write_policy(&self) -> WritePolicy {
        self.write_policy
    }

    pub fn coordinator(&self) -> Option<&RebuildCoordinator> {
        self.coordinator.as_ref()
    }

    /// Store an uploaded archive.
    ///
    /// # Errors
    ///
    /// - `InvalidPath` if `path` is not an archive path or the archive
    ///   carries no package name or version
    /// - `WriteRejected` if the write policy forbids the create or overwrite
    pub async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<ArchiveDescriptor> {
        validate_archive_path(path)?;
        let path = normalize(path);

        let mut descriptor = self.extractor.extract(path, &bytes)?;
        if !descriptor.is_archive() {
            return Err(RepoError::invalid_path(format!(
                "{}: archive declares no package name or version",
                path
            )));
        }
        descriptor.path = path.to_string();

        let policy = select_write_policy(AssetKind::Archive, self.write_policy);
        let exists = self.store.get_asset(path).await?.is_some();
        let permitted = if exists {
            policy.permits_overwrite()
        } else {
            policy.permits_create()
        };
        if !permitted {
            return Err(RepoError::write_rejected(path));
        }

        let change = self.store.put_archive(descriptor.clone(), bytes, None).await?;
        info!("Uploaded {} to {} ({:?})", path, self.name, change);
        Ok(descriptor)
    }

    /// Read an archive or index document as currently stored.
    pub async fn get(&self, path: &str) -> Result<Content> {
        if classify(path)? == AssetKind::UnsupportedMetadata {
            return Err(RepoError::unsupported_metadata(path));
        }

        self.store
            .get_asset(normalize(path))
            .await?
            .map(|asset| asset.to_content())
            .ok_or_else(|| RepoError::not_found(normalize(path)))
    }

    /// Remove an archive or index document.
    pub async fn delete(&self, path: &str) -> Result<()> {
        let kind = classify(path)?;
        if select_write_policy(kind, self.write_policy) == WritePolicy::Deny {
            return Err(RepoError::write_rejected(normalize(path)));
        }

        if !self.store.delete(path).await? {
            return Err(RepoError::not_found(normalize(path)));
        }
        info!("Deleted {} from {}", normalize(path), self.name);
        Ok(())
    }

    /// Rebuild one base path's index now, outside the debounce.
    pub async fn rebuild(&self, base_path: &str) -> Result<IndexDocument> {
        rebuild_index(self.store.as_ref(), base_path).await
    }

    /// Stop index maintenance after queued rebuilds finish.
    pub async fn shutdown(&self) {
        if let Some(coordinator) = &self.coordinator {
            coordinator.shutdown().await;
        }
    }
}

#[async_trait]
impl RepositoryView for HostedRepository {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, path: &str) -> Result<Content> {
        HostedRepository::get(self, path).await
    }
}
