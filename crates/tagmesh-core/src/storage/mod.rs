mod filters;
mod redb_storage;
mod traits;

pub use filters::{CanonicalFilter, StoreStats};
pub use redb_storage::{RedbTagStore, CURRENT_SCHEMA_VERSION};
pub use traits::{AliasWrite, SeedWrite, TagStore};
