//! Index maintenance and repository facades.
//!
//! - [`RebuildCoordinator`]: debounced, per-directory `PACKAGES.gz` rebuilds
//! - [`ProxyCacheDecider`]: when a proxied copy may be served or replaced
//! - [`HostedRepository`], [`ProxyRepository`], [`GroupRepository`]: the
//!   three repository flavours over a [`Store`](rrepo_storage::Store)

pub mod coordinator;
pub mod group;
pub mod hosted;
pub mod origin;
pub mod proxy;
pub mod write_policy;

pub use coordinator::{
    rebuild_index, Admission, CoordinatorStats, RebuildCoordinator, RebuildOutcome, RebuildRequest,
    RebuildState, RebuildStatus,
};
pub use group::{GroupRepository, RepositoryView};
pub use hosted::HostedRepository;
pub use origin::{Conditional, Origin, OriginResponse};
pub use proxy::{ProxyCacheDecider, ProxyRepository, ServeDecision};
pub use write_policy::select_write_policy;
