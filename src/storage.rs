/// Directories of version documents.
pub mod catalog;
pub mod loader;
pub mod snapshot;

pub use catalog::{Catalog, CatalogError};
pub use loader::{Format, LoadError, ParseError, SaveError, load_version, save_version};
pub use snapshot::{Snapshot, SnapshotError, SnapshotStore};
