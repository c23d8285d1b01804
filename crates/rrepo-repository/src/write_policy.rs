//! Effective write policy per asset kind.

use rrepo_core::types::{AssetKind, WritePolicy};

/// Policy that applies to a write of `kind` under the repository's `configured` policy.
///
/// Generated metadata must stay writable, so `AllowOnce` becomes `Allow` for
/// index documents and other metadata. Archives keep the configured policy.
pub fn select_write_policy(kind: AssetKind, configured: WritePolicy) -> WritePolicy {
    match (configured, kind.is_metadata()) {
        (WritePolicy::AllowOnce, true) => WritePolicy::Allow,
        (policy, _) => policy,
    }
}
