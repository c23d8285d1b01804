//! Aggregation of archive descriptors into an index document.
//!
//! The builder is handed descriptors in a single pass and keeps the greatest
//! version seen for each package name. Only archives whose directory equals
//! the target base path are considered; scoping is exact, not recursive.
//!
//! When two archives declare equal versions, the more recently modified one
//! wins, then the one with the greater path. The winner therefore never
//! depends on the order in which descriptors arrive.

use crate::codec::encode_packages;
use crate::document::{IndexDocument, IndexEntry};
use chrono::{DateTime, Utc};
use rrepo_core::error::Result;
use rrepo_core::path::{base_path, normalize};
use rrepo_core::types::ArchiveDescriptor;
use rrepo_core::version::compare;
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Best archive seen so far for one package.
#[derive(Debug, Clone)]
struct Candidate {
    entry: IndexEntry,
    path: String,
    last_modified: DateTime<Utc>,
}

impl Candidate {
    fn is_beaten_by(&self, version: &str, last_modified: DateTime<Utc>, path: &str) -> bool {
        match compare(version, &self.entry.version) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => (last_modified, path) > (self.last_modified, self.path.as_str()),
        }
    }
}

/// Builds the `PACKAGES` document for one base path.
#[derive(Debug)]
pub struct PackageIndexBuilder {
    base_path: String,
    best: BTreeMap<String, Candidate>,
    appended: usize,
    skipped: usize,
}

impl PackageIndexBuilder {
    pub fn new(base_path: impl Into<String>) -> Self {
        let base_path = base_path.into();
        let base_path = normalize(base_path.trim_end_matches('/')).to_string();
        Self {
            base_path,
            best: BTreeMap::new(),
            appended: 0,
            skipped: 0,
        }
    }

    /// Build a document from a complete descriptor set.
    pub fn build<I>(base_path: impl Into<String>, descriptors: I) -> Result<IndexDocument>
    where
        I: IntoIterator,
        I::Item: Borrow<ArchiveDescriptor>,
    {
        let mut builder = Self::new(base_path);
        for descriptor in descriptors {
            builder.append(descriptor.borrow());
        }
        builder.finish()
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Consider one descriptor. Returns true if it is now its package's winner.
    pub fn append(&mut self, descriptor: &ArchiveDescriptor) -> bool {
        self.appended += 1;

        if !descriptor.is_archive() || base_path(normalize(&descriptor.path)) != self.base_path {
            trace!("Skipping {} for index of {}", descriptor.path, self.base_path);
            self.skipped += 1;
            return false;
        }

        let (Some(name), Some(version)) = (&descriptor.package_name, &descriptor.version) else {
            self.skipped += 1;
            return false;
        };

        let replace = self.best.get(name).is_none_or(|current| {
            current.is_beaten_by(version, descriptor.last_modified, &descriptor.path)
        });

        if replace {
            self.best.insert(
                name.clone(),
                Candidate {
                    entry: IndexEntry::new(name.clone(), version.clone(), descriptor.attributes.clone()),
                    path: descriptor.path.clone(),
                    last_modified: descriptor.last_modified,
                },
            );
        }

        replace
    }

    /// Serialize the winners into an index document.
    pub fn finish(self) -> Result<IndexDocument> {
        let entries: BTreeMap<String, IndexEntry> = self
            .best
            .into_iter()
            .map(|(name, candidate)| (name, candidate.entry))
            .collect();

        let serialized_bytes = encode_packages(entries.values())?;

        debug!(
            "Built index for '{}': {} packages from {} descriptors ({} skipped)",
            self.base_path,
            entries.len(),
            self.appended,
            self.skipped
        );

        Ok(IndexDocument {
            base_path: self.base_path,
            entries,
            serialized_bytes,
        })
    }
}
