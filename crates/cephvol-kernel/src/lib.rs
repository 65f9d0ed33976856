//! # cephvol-kernel
//!
//! Volume catalog and mount coordination for a CephFS volume driver.
//!
//! Each named volume is a directory under a base namespace in the cluster.
//! The driver binds that directory at a local mountpoint when the first
//! container claims it and unbinds it when the last claim is released:
//!
//! - [`VolumeCatalog`] - in-memory refcounts and assigned mountpoints
//! - [`MountCoordinator`] - the plugin operations, built on the catalog
//! - [`StorageBackend`] - remote directory operations
//! - [`MountPrimitive`] - local bind/unbind
//! - [`plugin`] - typed requests and replies for a plugin transport
//!
//! Catalog state lives only as long as the process. After a restart every
//! refcount is zero and binds left behind by the previous process are not
//! tracked.

pub mod catalog;
pub mod ceph_conf;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod mount;
pub mod paths;
pub mod plugin;
pub mod storage;

pub use catalog::{Conflict, ConflictField, Released, Touched, Volume, VolumeCatalog};
pub use config::{ConfigError, DriverConfig, FileConfig};
pub use coordinator::{Capabilities, MountCoordinator, Scope, VolumeInfo};
pub use error::{
    DriverError, DriverResult, MountError, MountResult, StorageError, StorageResult,
};
pub use mount::{Credentials, KernelMount, MountCall, MountPrimitive, RecordingMount};
pub use plugin::{MountRequest, NameRequest, Reply, Request, dispatch};
pub use storage::{LocalStorage, MemoryStorage, StorageBackend};
