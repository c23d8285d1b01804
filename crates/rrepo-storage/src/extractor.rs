//! Descriptor extraction from archive file names.
//!
//! Archives follow the `{name}_{version}.{ext}` naming convention, so name and
//! version can be recovered without opening the archive. Index attributes are
//! not available this way and are left empty.

use crate::traits::DescriptorExtractor;
use once_cell::sync::Lazy;
use regex::Regex;
use rrepo_core::error::{RepoError, Result};
use rrepo_core::path::{file_name, normalize, validate_archive_path};
use rrepo_core::types::{ArchiveDescriptor, Attributes};

static ARCHIVE_FILE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z][A-Za-z0-9.]*)_([^_/]+?)\.(?:zip|tgz|tar\.gz)$").expect("valid archive file name pattern")
});

/// Extracts descriptors from the archive file name alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileNameExtractor;

impl DescriptorExtractor for FileNameExtractor {
    fn extract(&self, path: &str, _bytes: &[u8]) -> Result<ArchiveDescriptor> {
        validate_archive_path(path)?;

        let path = normalize(path);
        let captures = ARCHIVE_FILE_NAME
            .captures(file_name(path))
            .ok_or_else(|| RepoError::invalid_path(format!("{}: expected {{name}}_{{version}}.{{ext}}", path)))?;

        Ok(ArchiveDescriptor::archive(
            path,
            &captures[1],
            &captures[2],
            Attributes::default(),
        ))
    }
}
