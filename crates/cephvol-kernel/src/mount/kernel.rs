//! CephFS kernel client mounts via `mount(2)` / `umount(2)`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{Credentials, MountPrimitive};
use crate::error::{MountError, MountResult};

/// Filesystem type passed to `mount(2)`.
pub const CEPH_FS_TYPE: &str = "ceph";

/// Mounts volumes with the kernel CephFS client.
///
/// The mount source is `<servers>:<remote path>` and the options carry the
/// client name and secret. Syscalls run on the blocking thread pool.
#[derive(Debug, Clone)]
pub struct KernelMount {
    servers: String,
}

impl KernelMount {
    /// `servers` is the monitor address list, e.g. `10.0.0.1,10.0.0.2:6789`.
    pub fn new(servers: impl Into<String>) -> Self {
        Self {
            servers: servers.into(),
        }
    }

    /// Mount source for a remote path.
    pub fn source_spec(&self, remote: &str) -> String {
        format!("{}:{}", self.servers, remote)
    }

    /// Mount data string for the given credentials.
    pub fn mount_options(credentials: &Credentials) -> String {
        format!("name={},secret={}", credentials.name, credentials.secret)
    }
}

#[async_trait]
impl MountPrimitive for KernelMount {
    async fn bind(
        &self,
        remote: &str,
        local: &Path,
        credentials: &Credentials,
    ) -> MountResult<()> {
        let source = self.source_spec(remote);
        let target = local.to_path_buf();
        let options = Self::mount_options(credentials);
        debug!(%source, mountpoint = %target.display(), client = %credentials.name, "mount(2)");

        let (spec, mountpoint) = (source.clone(), target.clone());
        tokio::task::spawn_blocking(move || sys::mount(&spec, &mountpoint, &options))
            .await
            .map_err(|e| MountError::Join(e.to_string()))??;

        info!(%source, mountpoint = %target.display(), "mounted");
        Ok(())
    }

    async fn unbind(&self, local: &Path) -> MountResult<()> {
        let target: PathBuf = local.to_path_buf();
        debug!(mountpoint = %target.display(), "umount(2)");

        let unmounted = target.clone();
        tokio::task::spawn_blocking(move || sys::unmount(&unmounted))
            .await
            .map_err(|e| MountError::Join(e.to_string()))??;

        info!(mountpoint = %target.display(), "unmounted");
        Ok(())
    }
}

#[cfg(target_os = "linux")]
mod sys {
    use rustix::mount::{MountFlags, UnmountFlags};
    use std::io;
    use std::path::Path;

    use super::CEPH_FS_TYPE;
    use crate::error::{MountError, MountResult};

    pub(super) fn mount(source: &str, target: &Path, options: &str) -> MountResult<()> {
        rustix::mount::mount(source, target, CEPH_FS_TYPE, MountFlags::empty(), options).map_err(
            |errno| MountError::Bind {
                source_spec: source.to_string(),
                target: target.to_path_buf(),
                error: io::Error::from(errno),
            },
        )
    }

    pub(super) fn unmount(target: &Path) -> MountResult<()> {
        rustix::mount::unmount(target, UnmountFlags::empty()).map_err(|errno| {
            MountError::Unbind {
                target: target.to_path_buf(),
                error: io::Error::from(errno),
            }
        })
    }
}

#[cfg(not(target_os = "linux"))]
mod sys {
    use std::path::Path;

    use crate::error::{MountError, MountResult};

    pub(super) fn mount(_source: &str, _target: &Path, _options: &str) -> MountResult<()> {
        Err(MountError::Unsupported)
    }

    pub(super) fn unmount(_target: &Path) -> MountResult<()> {
        Err(MountError::Unsupported)
    }
}
