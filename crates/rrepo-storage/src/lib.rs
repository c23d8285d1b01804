//! Storage ports and the in-memory store.
//!
//! The index engine talks to storage only through [`Store`] and
//! [`StoreTransaction`]; mutation events flow out through an [`EventBus`].

pub mod events;
pub mod extractor;
pub mod memory;
pub mod traits;

pub use events::{EventBus, DEFAULT_EVENT_CAPACITY};
pub use extractor::FileNameExtractor;
pub use memory::{MemoryStore, MemoryTransaction};
pub use traits::{DescriptorExtractor, Store, StoreTransaction, StoredAsset};
