//! Group repositories: one read view over several member repositories.

use async_trait::async_trait;
use futures::future::join_all;
use rrepo_core::error::{RepoError, Result};
use rrepo_core::path::{classify, normalize};
use rrepo_core::types::{AssetKind, Content};
use rrepo_index::merge_packages_documents;
use std::sync::Arc;
use tracing::{debug, warn};

/// Read access to a repository.
#[async_trait]
pub trait RepositoryView: Send + Sync {
    fn name(&self) -> &str;

    async fn get(&self, path: &str) -> Result<Content>;
}

/// Members in priority order, read as one repository.
pub struct GroupRepository {
    name: String,
    members: Vec<Arc<dyn RepositoryView>>,
}

impl GroupRepository {
    pub fn new(name: impl Into<String>, members: Vec<Arc<dyn RepositoryView>>) -> Self {
        Self {
            name: name.into(),
            members,
        }
    }

    pub fn members(&self) -> &[Arc<dyn RepositoryView>] {
        &self.members
    }

    /// Archives come from the first member that has them. Index documents
    /// are fetched from every member and merged.
    pub async fn get(&self, path: &str) -> Result<Content> {
        match classify(path)? {
            AssetKind::Archive => self.first_hit(normalize(path)).await,
            AssetKind::IndexDocument => self.merged_index(normalize(path)).await,
            AssetKind::UnsupportedMetadata => Err(RepoError::unsupported_metadata(path)),
        }
    }

    async fn first_hit(&self, path: &str) -> Result<Content> {
        for member in &self.members {
            match member.get(path).await {
                Ok(content) => {
                    debug!("{} served {} for group {}", member.name(), path, self.name);
                    return Ok(content);
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => warn!("Member {} of {} failed for {}: {}", member.name(), self.name, path, e),
            }
        }
        Err(RepoError::not_found(path))
    }

    async fn merged_index(&self, path: &str) -> Result<Content> {
        let responses = join_all(self.members.iter().map(|member| member.get(path))).await;

        let mut documents = Vec::new();
        let mut last_modified = None;
        for (member, response) in self.members.iter().zip(responses) {
            match response {
                Ok(content) => {
                    last_modified = last_modified.max(Some(content.last_modified));
                    documents.push(content.bytes);
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => warn!("Member {} of {} failed for {}: {}", member.name(), self.name, path, e),
            }
        }

        let Some(last_modified) = last_modified else {
            return Err(RepoError::not_found(path));
        };

        debug!("Merging {} member indexes for {} in {}", documents.len(), path, self.name);
        Ok(Content {
            path: path.to_string(),
            kind: AssetKind::IndexDocument,
            bytes: merge_packages_documents(&documents)?,
            last_modified,
            cache_info: None,
        })
    }
}

#[async_trait]
impl RepositoryView for GroupRepository {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, path: &str) -> Result<Content> {
        GroupRepository::get(self, path).await
    }
}
