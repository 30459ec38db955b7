//! Diff-based persistence: typed keys, storage collaborators, snapshot
//! reconciliation.

pub mod diff;
pub mod key;
pub mod store;

pub use diff::{compute_delta, load_groups, StorageDelta};
pub use key::{KeyError, StorageKey};
pub use store::{JsonFileStore, KvStore, MemoryStore, StoreError};
