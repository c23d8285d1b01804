//! Domain types shared by every repository component.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RepoError;

// ============================================================================
// Asset classification
// ============================================================================

/// What a repository path refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// A package archive (`.tar.gz`, `.tgz`, `.zip`)
    Archive,
    /// A generated `PACKAGES` index document
    IndexDocument,
    /// Acknowledged but unserved metadata (`.rds`)
    UnsupportedMetadata,
}

impl AssetKind {
    /// Cache policy family for this kind.
    pub fn cache_type(&self) -> CacheType {
        match self {
            Self::Archive => CacheType::Content,
            Self::IndexDocument | Self::UnsupportedMetadata => CacheType::Metadata,
        }
    }

    pub fn is_metadata(&self) -> bool {
        match self {
            Self::Archive => false,
            Self::IndexDocument | Self::UnsupportedMetadata => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Archive => "archive",
            Self::IndexDocument => "index_document",
            Self::UnsupportedMetadata => "unsupported_metadata",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Cache policy family: immutable content or refreshable metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheType {
    Content,
    Metadata,
}

// ============================================================================
// Archive descriptors
// ============================================================================

/// Package attributes copied into the index document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    pub depends: Option<String>,
    pub imports: Option<String>,
    pub suggests: Option<String>,
    pub license: Option<String>,
    pub needs_compilation: Option<String>,
}

impl Attributes {
    /// Field names in the order they appear in a `PACKAGES` stanza.
    pub const FIELD_NAMES: [&'static str; 5] =
        ["Depends", "Imports", "Suggests", "License", "NeedsCompilation"];

    /// Attribute values paired with their stanza field name, in stanza order.
    pub fn fields(&self) -> [(&'static str, Option<&str>); 5] {
        let values = [
            self.depends.as_deref(),
            self.imports.as_deref(),
            self.suggests.as_deref(),
            self.license.as_deref(),
            self.needs_compilation.as_deref(),
        ];
        std::array::from_fn(|i| (Self::FIELD_NAMES[i], values[i]))
    }

    /// Value slots, positionally matching [`FIELD_NAMES`](Self::FIELD_NAMES).
    fn slots_mut(&mut self) -> [&mut Option<String>; 5] {
        [
            &mut self.depends,
            &mut self.imports,
            &mut self.suggests,
            &mut self.license,
            &mut self.needs_compilation,
        ]
    }

    /// Set a field by its stanza name. Returns `false` for unknown names.
    pub fn set(&mut self, field: &str, value: impl Into<String>) -> bool {
        let Some(index) = Self::FIELD_NAMES.iter().position(|name| *name == field) else {
            return false;
        };
        *self.slots_mut()[index] = Some(value.into());
        true
    }
}

/// One stored asset as seen by the index builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveDescriptor {
    /// Full repository-relative path, unique per asset
    pub path: String,

    /// Declared package name (absent for metadata)
    pub package_name: Option<String>,

    /// Declared package version (absent for metadata)
    pub version: Option<String>,

    /// Index attributes
    pub attributes: Attributes,

    /// Classification of `path`
    pub kind: AssetKind,

    /// Last create/update time, assigned by the store
    pub last_modified: DateTime<Utc>,
}

impl ArchiveDescriptor {
    /// Create a descriptor for a package archive.
    pub fn archive(
        path: impl Into<String>,
        package_name: impl Into<String>,
        version: impl Into<String>,
        attributes: Attributes,
    ) -> Self {
        Self {
            path: path.into(),
            package_name: Some(package_name.into()),
            version: Some(version.into()),
            attributes,
            kind: AssetKind::Archive,
            last_modified: Utc::now(),
        }
    }

    /// Create a descriptor for a metadata asset (no name or version).
    pub fn metadata(path: impl Into<String>, kind: AssetKind) -> Self {
        Self {
            path: path.into(),
            package_name: None,
            version: None,
            attributes: Attributes::default(),
            kind,
            last_modified: Utc::now(),
        }
    }

    pub fn with_last_modified(mut self, last_modified: DateTime<Utc>) -> Self {
        self.last_modified = last_modified;
        self
    }

    /// True when this is an archive carrying a non-empty name and version.
    pub fn is_archive(&self) -> bool {
        self.kind == AssetKind::Archive
            && self.package_name.as_deref().is_some_and(|n| !n.is_empty())
            && self.version.as_deref().is_some_and(|v| !v.is_empty())
    }
}

// ============================================================================
// Proxy cache bookkeeping
// ============================================================================

/// Cache state attached to a proxied asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheInfo {
    pub cache_type: CacheType,
    /// When origin last confirmed this copy
    pub last_validated: DateTime<Utc>,
    /// Origin URL the copy came from
    pub origin: String,
    /// Validator returned by origin, used for conditional requests
    pub etag: Option<String>,
}

impl CacheInfo {
    pub fn new(cache_type: CacheType, origin: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            cache_type,
            last_validated: now,
            origin: origin.into(),
            etag: None,
        }
    }

    pub fn with_etag(mut self, etag: Option<String>) -> Self {
        self.etag = etag;
        self
    }

    /// Same copy, re-confirmed at `now`.
    pub fn refreshed(&self, now: DateTime<Utc>) -> Self {
        Self {
            last_validated: now,
            ..self.clone()
        }
    }
}

// ============================================================================
// Mutation events
// ============================================================================

/// Kind of change recorded by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Created,
    Updated,
    Deleted,
}

/// Emitted by the store after every committed asset mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationEvent {
    /// Repository owning the asset
    pub repository_id: String,

    /// Path of the mutated asset
    pub path: String,

    /// False for events relayed from peer cluster nodes
    pub is_local_origin: bool,

    pub change_type: ChangeType,

    pub occurred_at: DateTime<Utc>,
}

impl MutationEvent {
    /// Event raised on this node.
    pub fn local(repository_id: impl Into<String>, path: impl Into<String>, change_type: ChangeType) -> Self {
        Self {
            repository_id: repository_id.into(),
            path: path.into(),
            is_local_origin: true,
            change_type,
            occurred_at: Utc::now(),
        }
    }

    /// Event relayed from another node.
    pub fn remote(repository_id: impl Into<String>, path: impl Into<String>, change_type: ChangeType) -> Self {
        Self {
            is_local_origin: false,
            ..Self::local(repository_id, path, change_type)
        }
    }
}

// ============================================================================
// Write policy
// ============================================================================

/// Repository-level write policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    /// Create and overwrite
    #[default]
    Allow,
    /// Create only; existing assets are immutable
    AllowOnce,
    /// Read-only
    Deny,
}

impl WritePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::AllowOnce => "allow_once",
            Self::Deny => "deny",
        }
    }

    /// Whether an asset that already exists may be replaced.
    pub fn permits_overwrite(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Whether a new asset may be created.
    pub fn permits_create(&self) -> bool {
        !matches!(self, Self::Deny)
    }
}

impl FromStr for WritePolicy {
    type Err = RepoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "allow" => Ok(Self::Allow),
            "allow_once" => Ok(Self::AllowOnce),
            "deny" => Ok(Self::Deny),
            _ => Err(RepoError::config(format!(
                "Invalid write policy '{}'. Must be one of: allow, allow_once, deny",
                s
            ))),
        }
    }
}

impl fmt::Display for WritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Served content
// ============================================================================

/// Bytes returned to a reader, with the metadata a response needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    pub path: String,
    pub kind: AssetKind,
    pub bytes: Vec<u8>,
    pub last_modified: DateTime<Utc>,
    pub cache_info: Option<CacheInfo>,
}

impl Content {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
