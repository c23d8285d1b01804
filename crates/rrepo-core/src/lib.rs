//! Core types for the R package repository engine.
//!
//! This crate provides the error taxonomy, configuration, logging setup,
//! domain types, path classification and version ordering shared by the
//! index builder, storage ports and repository facades.

pub mod error;
pub mod types;
pub mod path;
pub mod version;
pub mod config;
pub mod logging;

pub use error::{RepoError, Result};
pub use types::*;
pub use version::PackageVersion;
pub use config::{RepoConfig, ConfigProfile};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{RepoError, Result};
    pub use crate::types::*;
    pub use crate::path::{base_path, classify, packages_path};
    pub use crate::version::{compare, PackageVersion};
    pub use crate::config::{RepoConfig, ConfigProfile};
}
