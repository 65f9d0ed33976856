//! Storage backend trait.

use async_trait::async_trait;

use crate::error::StorageResult;

/// Permission bits for newly created volume directories.
pub const DEFAULT_DIR_MODE: u32 = 0o755;

/// Directory operations against the cluster's base namespace.
///
/// Names are single path components relative to the base namespace. The
/// backend is expected to be connected before the coordinator uses it.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Establish (or verify) the session with the cluster.
    async fn connect(&self) -> StorageResult<()>;

    /// Create the base namespace if it is missing. Idempotent.
    async fn ensure_base_directory(&self) -> StorageResult<()>;

    /// Create a volume directory.
    ///
    /// Fails with `AlreadyExists` if the directory is present.
    async fn create_directory(&self, name: &str, mode: u32) -> StorageResult<()>;

    /// Remove a volume directory.
    ///
    /// Fails with `NotFound` or `NotEmpty`.
    async fn remove_directory(&self, name: &str) -> StorageResult<()>;

    /// Read the entries of the base namespace.
    ///
    /// Like a raw directory read, this may include `.` and `..`.
    async fn list_directory(&self) -> StorageResult<Vec<String>>;

    /// Probe whether navigating into `name` lands in that directory.
    async fn directory_exists(&self, name: &str) -> bool;

    /// The base namespace, e.g. `/docker`.
    fn base_dir(&self) -> &str;
}
