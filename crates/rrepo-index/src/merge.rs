//! Merging index documents from several repositories.

use crate::codec::{decode_packages, encode_packages};
use crate::document::IndexEntry;
use rrepo_core::error::Result;
use rrepo_core::version::compare;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Merge member indexes, keeping the greatest version of each package.
///
/// Members are given in priority order; on equal versions the earlier member's
/// entry is kept. The result is sorted by package name.
pub fn merge_indexes<I>(members: I) -> Vec<IndexEntry>
where
    I: IntoIterator<Item = Vec<IndexEntry>>,
{
    let mut merged: BTreeMap<String, IndexEntry> = BTreeMap::new();

    for entry in members.into_iter().flatten() {
        match merged.get(&entry.package) {
            Some(current) if compare(&entry.version, &current.version) != Ordering::Greater => {}
            _ => {
                merged.insert(entry.package.clone(), entry);
            }
        }
    }

    merged.into_values().collect()
}

/// Decode, merge and re-encode member `PACKAGES` documents.
pub fn merge_packages_documents<B>(documents: &[B]) -> Result<Vec<u8>>
where
    B: AsRef<[u8]>,
{
    let decoded = documents
        .iter()
        .map(|bytes| decode_packages(bytes.as_ref()))
        .collect::<Result<Vec<_>>>()?;

    let merged = merge_indexes(decoded);
    encode_packages(&merged)
}
