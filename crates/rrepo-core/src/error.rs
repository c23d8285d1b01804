//! Error types for the repository engine.

/// Result type alias for repository operations.
pub type Result<T> = std::result::Result<T, RepoError>;

/// Main error type for the repository engine.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// Path fails classification (wrong extension or directory shape)
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// A recognised but unserved metadata type was requested
    #[error("Unsupported metadata requested: {0}")]
    UnsupportedMetadataRequested(String),

    /// Index rebuild failed inside its store transaction
    #[error("Rebuild of {base_path} failed: {reason}")]
    RebuildFailed { base_path: String, reason: String },

    /// Remote origin could not be reached and nothing was cached
    #[error("Origin unavailable for {path}: {reason}")]
    OriginUnavailable { path: String, reason: String },

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Write refused by the repository write policy
    #[error("Write rejected for {0}")]
    WriteRejected(String),

    /// Storage layer errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// Wrapped anyhow errors for compatibility
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RepoError {
    /// Create a new invalid path error
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Create a new unsupported metadata error
    pub fn unsupported_metadata(path: impl Into<String>) -> Self {
        Self::UnsupportedMetadataRequested(path.into())
    }

    /// Create a new rebuild failure
    pub fn rebuild_failed(base_path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RebuildFailed {
            base_path: base_path.into(),
            reason: reason.into(),
        }
    }

    /// Create a new origin unavailable error
    pub fn origin_unavailable(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::OriginUnavailable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a new not found error
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create a new write rejected error
    pub fn write_rejected(path: impl Into<String>) -> Self {
        Self::WriteRejected(path.into())
    }

    /// Create a new storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a new config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a storage error
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Errors caused by the request itself rather than by the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidPath(_)
                | Self::UnsupportedMetadataRequested(_)
                | Self::NotFound(_)
                | Self::WriteRejected(_)
        )
    }
}
