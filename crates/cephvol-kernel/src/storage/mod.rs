//! Remote storage backends.
//!
//! - [`StorageBackend`] - directory operations against the cluster's base namespace
//! - [`MemoryStorage`] - in-memory namespace (testing, dry runs)
//! - [`LocalStorage`] - namespace reached through a locally mounted admin view

mod local;
mod memory;
mod ops;

pub use local::LocalStorage;
pub use memory::MemoryStorage;
pub use ops::{DEFAULT_DIR_MODE, StorageBackend};
