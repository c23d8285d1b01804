//! Repository path classification.
//!
//! Paths are repository-relative. A leading slash is tolerated and ignored;
//! every classifiable path has at least one directory segment, since archives
//! and their `PACKAGES` index always live inside a directory.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{RepoError, Result};
use crate::types::AssetKind;

/// File name of the generated index document.
pub const PACKAGES_GZ_FILENAME: &str = "PACKAGES.gz";

static PATTERN_PACKAGES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[^/]+/)+PACKAGES(?:\.[^/]*)?$").expect("valid PACKAGES pattern"));

static PATTERN_METADATA_RDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[^/]+/)+[^/]+\.rds$").expect("valid rds pattern"));

static PATTERN_ARCHIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[^/]+/)+[^/]+\.(?:zip|tgz|tar\.gz)$").expect("valid archive pattern"));

/// Strip leading slashes.
pub fn normalize(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// Classify a path. First match wins: index document, `.rds` metadata, archive.
///
/// # Errors
///
/// Returns `InvalidPath` for anything that matches none of the three shapes,
/// including paths containing `.` or `..` segments.
pub fn classify(path: &str) -> Result<AssetKind> {
    let path = normalize(path);

    if path.split('/').any(|segment| segment == "." || segment == "..") {
        return Err(RepoError::invalid_path(path));
    }

    if PATTERN_PACKAGES.is_match(path) {
        Ok(AssetKind::IndexDocument)
    } else if PATTERN_METADATA_RDS.is_match(path) {
        Ok(AssetKind::UnsupportedMetadata)
    } else if PATTERN_ARCHIVE.is_match(path) {
        Ok(AssetKind::Archive)
    } else {
        Err(RepoError::invalid_path(path))
    }
}

/// Accept only paths that classify as archives.
pub fn validate_archive_path(path: &str) -> Result<()> {
    match classify(path)? {
        AssetKind::Archive => Ok(()),
        AssetKind::IndexDocument | AssetKind::UnsupportedMetadata => Err(RepoError::invalid_path(
            format!("{}: extension not zip, tar.gz or tgz, or wrong upload path", normalize(path)),
        )),
    }
}

/// Directory portion of a path, without a trailing slash.
///
/// `src/contrib/a_1.0.tar.gz` becomes `src/contrib`; a top-level name yields `""`.
pub fn base_path(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[..idx],
        None => "",
    }
}

/// Final segment of a path.
pub fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Join a directory and a file name with exactly one separator.
pub fn build_path(dir: &str, filename: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        filename.to_string()
    } else {
        format!("{}/{}", dir, filename)
    }
}

/// Location of the index document for a base path.
pub fn packages_path(base_path: &str) -> String {
    build_path(base_path, PACKAGES_GZ_FILENAME)
}
