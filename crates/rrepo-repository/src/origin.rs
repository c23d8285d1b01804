//! Remote origin port for proxy repositories.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rrepo_core::error::Result;

/// Validators for a conditional fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conditional {
    pub etag: Option<String>,
    pub if_modified_since: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginResponse {
    /// Fresh bytes, with the validator to use next time
    Content { bytes: Vec<u8>, etag: Option<String> },
    /// The cached copy is still current
    NotModified,
}

/// Upstream repository a proxy fetches from.
///
/// A missing remote asset is reported as `NotFound`; any other error means
/// the origin could not answer.
#[async_trait]
pub trait Origin: Send + Sync {
    /// Base URL, recorded in cache bookkeeping
    fn url(&self) -> &str;

    async fn fetch(&self, path: &str, conditional: Option<&Conditional>) -> Result<OriginResponse>;
}
