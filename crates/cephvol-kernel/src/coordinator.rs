//! Mount coordination.
//!
//! [`MountCoordinator`] implements the volume plugin operations by combining
//! catalog updates with calls to the storage backend and the mount primitive.
//!
//! ## Locking
//!
//! The catalog lock is only held for the in-memory update. Operations that
//! touch a volume also hold a per-name async lock across their backend and
//! OS calls, so a slow bind on one volume never stalls another volume, while
//! requests for the same name are applied strictly one after another.
//! A name's lock entry is dropped again once nobody holds or waits on it.
//!
//! `List` takes no per-name lock. A mount publishes its local path only
//! after the bind attempt, and `List` reads the catalog before the remote
//! listing, so it reports each volume as it was either before or after any
//! operation still in flight.
//!
//! ## Refcounts
//!
//! A volume is bound on its `0 → 1` transition and unbound on `1 → 0`; every
//! other mount/unmount only moves the counter. Failed binds and unbinds are
//! not rolled back: the counter keeps the value it was given before the OS
//! call was attempted.

use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::catalog::{Volume, VolumeCatalog};
use crate::error::{DriverError, DriverResult, StorageError};
use crate::mount::{Credentials, MountPrimitive};
use crate::paths;
use crate::storage::{DEFAULT_DIR_MODE, StorageBackend};

/// Visibility of the volume namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Shared by every host using the same cluster.
    Global,
    /// Private to this host.
    Local,
}

/// What the driver declares about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub scope: Scope,
}

/// A volume as reported to plugin callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeInfo {
    pub name: String,
    pub mountpoint: Option<PathBuf>,
}

/// Decides when volumes are really bound or unbound.
pub struct MountCoordinator {
    catalog: VolumeCatalog,
    storage: Arc<dyn StorageBackend>,
    mounter: Arc<dyn MountPrimitive>,
    mount_root: PathBuf,
    credentials: Credentials,
    name_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for MountCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountCoordinator")
            .field("base_dir", &self.storage.base_dir())
            .field("mount_root", &self.mount_root)
            .field("volumes", &self.catalog.len())
            .finish()
    }
}

impl MountCoordinator {
    /// Create a coordinator over an already connected backend.
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        mounter: Arc<dyn MountPrimitive>,
        mount_root: impl Into<PathBuf>,
        credentials: Credentials,
    ) -> Self {
        Self {
            catalog: VolumeCatalog::new(),
            storage,
            mounter,
            mount_root: mount_root.into(),
            credentials,
            name_locks: DashMap::new(),
        }
    }

    /// Connect to the cluster, make sure the base namespace exists, and
    /// return a coordinator with an empty catalog.
    ///
    /// Errors here are meant to abort the driver.
    pub async fn start(
        storage: Arc<dyn StorageBackend>,
        mounter: Arc<dyn MountPrimitive>,
        mount_root: impl Into<PathBuf>,
        credentials: Credentials,
    ) -> DriverResult<Self> {
        storage.connect().await.map_err(|e| match e {
            StorageError::Connection(msg) => DriverError::Connection(msg),
            other => DriverError::Connection(other.to_string()),
        })?;
        storage.ensure_base_directory().await?;
        info!(base_dir = %storage.base_dir(), "connected to storage cluster");
        Ok(Self::new(storage, mounter, mount_root, credentials))
    }

    /// Local mount state, for inspection.
    pub fn catalog(&self) -> &VolumeCatalog {
        &self.catalog
    }

    pub fn mount_root(&self) -> &Path {
        &self.mount_root
    }

    async fn lock_name(&self, name: &str) -> NameGuard<'_> {
        let lock = self.name_locks.entry(name.to_string()).or_default().clone();
        NameGuard {
            locks: &self.name_locks,
            name: name.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            scope: Scope::Global,
        }
    }

    /// Create the remote directory for `name` and register it locally with
    /// no mounts.
    pub async fn create(&self, name: &str) -> DriverResult<()> {
        paths::validate_volume_name(name)?;
        let _guard = self.lock_name(name).await;
        debug!(volume = %name, "create");

        self.storage.create_directory(name, DEFAULT_DIR_MODE).await?;
        self.catalog.touch(name, None, None, 0).into_result()?;

        info!(volume = %name, "created");
        Ok(())
    }

    /// All remote volumes, with the local mountpoint where one is known.
    ///
    /// The backend decides which volumes exist; the catalog only adds local
    /// mount state. Sorted by name.
    pub async fn list(&self) -> DriverResult<Vec<VolumeInfo>> {
        debug!("list");
        let known: HashMap<String, Volume> = self
            .catalog
            .list()
            .into_iter()
            .map(|v| (v.name.clone(), v))
            .collect();
        let entries = self.storage.list_directory().await?;

        let mut volumes: Vec<VolumeInfo> = entries
            .into_iter()
            .filter(|name| name != "." && name != "..")
            .map(|name| {
                let mountpoint = known.get(&name).and_then(|v| v.local_path.clone());
                VolumeInfo { name, mountpoint }
            })
            .collect();
        volumes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(volumes)
    }

    /// Look up a remote volume. The mountpoint is the canonical one whether
    /// or not the volume is currently mounted.
    pub async fn get(&self, name: &str) -> DriverResult<VolumeInfo> {
        paths::validate_volume_name(name)?;
        let _guard = self.lock_name(name).await;
        debug!(volume = %name, "get");

        if !self.storage.directory_exists(name).await {
            return Err(DriverError::NotFound(name.to_string()));
        }
        Ok(VolumeInfo {
            name: name.to_string(),
            mountpoint: Some(paths::mountpoint(&self.mount_root, name)),
        })
    }

    /// Remove the remote directory and forget the local record.
    ///
    /// The refcount is not checked: removing a volume that is still mounted
    /// succeeds and leaves its local bind in place.
    pub async fn remove(&self, name: &str) -> DriverResult<()> {
        paths::validate_volume_name(name)?;
        let _guard = self.lock_name(name).await;
        debug!(volume = %name, "remove");

        match self.storage.remove_directory(name).await {
            Ok(()) => {}
            Err(StorageError::NotFound(_)) => {
                return Err(DriverError::NotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        if let Some(volume) = self.catalog.forget(name) {
            if volume.is_bound() {
                warn!(
                    volume = %name,
                    refcount = volume.refcount,
                    "removed while still mounted; local bind is no longer tracked"
                );
            }
        }

        info!(volume = %name, "removed");
        Ok(())
    }

    /// Claim a volume for `client_id` and return its local mountpoint.
    ///
    /// The first claim binds the volume; later claims reuse the bind. Names
    /// never created through this driver are registered on the fly.
    pub async fn mount(&self, name: &str, client_id: &str) -> DriverResult<PathBuf> {
        paths::validate_volume_name(name)?;
        let _guard = self.lock_name(name).await;
        debug!(volume = %name, %client_id, "mount");

        let computed = paths::mountpoint(&self.mount_root, name);
        let client = (!client_id.is_empty()).then_some(client_id);
        let touched = self.catalog.touch(name, client, None, 1);

        if touched.created {
            debug!(volume = %name, "registering volume on first mount");
        }

        // An earlier assignment wins over the freshly computed path.
        let mountpoint = touched
            .volume
            .local_path
            .clone()
            .unwrap_or_else(|| computed.clone());
        let attached = self
            .attach(name, &mountpoint, touched.volume.refcount)
            .await;

        // Published whether or not the bind went through; the claim above
        // already counts.
        let published = self.catalog.touch(name, None, Some(&computed), 0);
        for conflict in touched.conflicts.iter().chain(&published.conflicts) {
            warn!(volume = %name, %conflict, "keeping stored value");
        }

        attached.map(|()| mountpoint)
    }

    async fn attach(&self, name: &str, mountpoint: &Path, refcount: u64) -> DriverResult<()> {
        prepare_mountpoint(mountpoint).await?;
        if refcount > 1 {
            debug!(volume = %name, refcount, "already bound");
            return Ok(());
        }
        let remote = paths::remote_path(self.storage.base_dir(), name);
        self.mounter
            .bind(&remote, mountpoint, &self.credentials)
            .await?;
        Ok(())
    }

    /// Drop one claim on a volume; the last claim unbinds it.
    ///
    /// Fails with `NotFound` for names the catalog has never seen. Releasing
    /// a volume that has no outstanding claims is a no-op.
    pub async fn unmount(&self, name: &str, client_id: &str) -> DriverResult<()> {
        paths::validate_volume_name(name)?;
        let _guard = self.lock_name(name).await;
        debug!(volume = %name, %client_id, "unmount");

        let released = self
            .catalog
            .release(name)
            .ok_or_else(|| DriverError::NotFound(name.to_string()))?;

        if released.already_released {
            warn!(volume = %name, "unmount without an outstanding mount");
            return Ok(());
        }
        if !released.is_last() {
            debug!(volume = %name, refcount = released.volume.refcount, "still in use");
            return Ok(());
        }

        let mountpoint = released
            .volume
            .local_path
            .unwrap_or_else(|| paths::mountpoint(&self.mount_root, name));
        self.mounter.unbind(&mountpoint).await?;
        Ok(())
    }

    /// Canonical local mountpoint for `name`. No side effects.
    pub fn path(&self, name: &str) -> DriverResult<PathBuf> {
        paths::validate_volume_name(name)?;
        Ok(paths::mountpoint(&self.mount_root, name))
    }
}

/// Per-name lock held for the duration of one operation.
struct NameGuard<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    name: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for NameGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map's own reference left: no holder and no waiter.
        self.locks
            .remove_if(&self.name, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Create the mountpoint directory and any missing parents.
async fn prepare_mountpoint(path: &Path) -> DriverResult<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| DriverError::Mountpoint {
            path: path.to_path_buf(),
            source,
        })
}
