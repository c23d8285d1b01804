//! `PACKAGES` index generation.
//!
//! This crate turns archive descriptors into the aggregated index document a
//! CRAN-style client downloads from each repository directory:
//! - `PackageIndexBuilder`: single-pass winner selection per package name
//! - `codec`: stanza encoding (gzip, deterministic) and decoding
//! - `merge`: combining member indexes for group repositories
//!
//! The builder performs no I/O; callers hand it descriptors and persist the
//! returned bytes.
//!
//! # Example
//!
//! ```
//! use rrepo_core::types::{ArchiveDescriptor, Attributes};
//! use rrepo_index::PackageIndexBuilder;
//!
//! let archives = vec![
//!     ArchiveDescriptor::archive("src/contrib/agricolae_1.2-1.tar.gz", "agricolae", "1.2-1", Attributes::default()),
//!     ArchiveDescriptor::archive("src/contrib/agricolae_1.3-1.tar.gz", "agricolae", "1.3-1", Attributes::default()),
//! ];
//! let doc = PackageIndexBuilder::build("src/contrib", &archives).unwrap();
//! assert_eq!(doc.get("agricolae").unwrap().version, "1.3-1");
//! ```

pub mod builder;
pub mod codec;
pub mod document;
pub mod merge;

pub use builder::PackageIndexBuilder;
pub use codec::{decode_packages, encode_packages, render_packages};
pub use document::{IndexDocument, IndexEntry};
pub use merge::{merge_indexes, merge_packages_documents};
