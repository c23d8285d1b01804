//! Index document model.

use rrepo_core::path::packages_path;
use rrepo_core::types::Attributes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One package stanza of a `PACKAGES` document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub package: String,
    pub version: String,
    pub attributes: Attributes,
}

impl IndexEntry {
    pub fn new(package: impl Into<String>, version: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            package: package.into(),
            version: version.into(),
            attributes,
        }
    }
}

/// Generated index for one base path.
///
/// Entries iterate in package-name order; `serialized_bytes` is the gzip
/// document written to `{base_path}/PACKAGES.gz`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDocument {
    pub base_path: String,
    pub entries: BTreeMap<String, IndexEntry>,
    pub serialized_bytes: Vec<u8>,
}

impl IndexDocument {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, package: &str) -> Option<&IndexEntry> {
        self.entries.get(package)
    }

    /// Where this document is stored.
    pub fn packages_path(&self) -> String {
        packages_path(&self.base_path)
    }
}
