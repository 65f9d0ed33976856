//! Mount primitive that records calls instead of touching the OS.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::{Credentials, MountPrimitive};
use crate::error::{MountError, MountResult};

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountCall {
    Bind {
        remote: String,
        local: PathBuf,
        client: String,
    },
    Unbind {
        local: PathBuf,
    },
}

/// Records binds and unbinds, optionally failing or stalling them.
///
/// Used by tests and by dry runs of the driver.
#[derive(Debug, Default)]
pub struct RecordingMount {
    calls: Mutex<Vec<MountCall>>,
    bound: Mutex<BTreeSet<PathBuf>>,
    fail_next_bind: AtomicBool,
    fail_next_unbind: AtomicBool,
    bind_delay: Mutex<Option<Duration>>,
}

impl RecordingMount {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next bind fail with `EPERM`.
    pub fn fail_next_bind(&self) {
        self.fail_next_bind.store(true, Ordering::SeqCst);
    }

    /// Make the next unbind fail with `EBUSY`.
    pub fn fail_next_unbind(&self) {
        self.fail_next_unbind.store(true, Ordering::SeqCst);
    }

    /// Sleep this long inside every bind.
    pub fn set_bind_delay(&self, delay: Duration) {
        *self.bind_delay.lock() = Some(delay);
    }

    pub fn calls(&self) -> Vec<MountCall> {
        self.calls.lock().clone()
    }

    pub fn bind_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, MountCall::Bind { .. }))
            .count()
    }

    pub fn unbind_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, MountCall::Unbind { .. }))
            .count()
    }

    /// Whether a successful bind at `local` has not been unbound yet.
    pub fn is_bound(&self, local: &Path) -> bool {
        self.bound.lock().contains(local)
    }
}

#[async_trait]
impl MountPrimitive for RecordingMount {
    async fn bind(
        &self,
        remote: &str,
        local: &Path,
        credentials: &Credentials,
    ) -> MountResult<()> {
        let delay = *self.bind_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.calls.lock().push(MountCall::Bind {
            remote: remote.to_string(),
            local: local.to_path_buf(),
            client: credentials.name.clone(),
        });

        if self.fail_next_bind.swap(false, Ordering::SeqCst) {
            return Err(MountError::Bind {
                source_spec: remote.to_string(),
                target: local.to_path_buf(),
                error: io::Error::from(io::ErrorKind::PermissionDenied),
            });
        }
        self.bound.lock().insert(local.to_path_buf());
        Ok(())
    }

    async fn unbind(&self, local: &Path) -> MountResult<()> {
        self.calls.lock().push(MountCall::Unbind {
            local: local.to_path_buf(),
        });

        if self.fail_next_unbind.swap(false, Ordering::SeqCst) {
            return Err(MountError::Unbind {
                target: local.to_path_buf(),
                error: io::Error::from(io::ErrorKind::ResourceBusy),
            });
        }
        self.bound.lock().remove(local);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_calls() {
        let mount = RecordingMount::new();
        let creds = Credentials::new("admin", "s");
        let local = Path::new("/mnt/data");

        mount.bind("/docker/data", local, &creds).await.unwrap();
        assert!(mount.is_bound(local));
        mount.unbind(local).await.unwrap();
        assert!(!mount.is_bound(local));

        assert_eq!(
            mount.calls(),
            vec![
                MountCall::Bind {
                    remote: "/docker/data".to_string(),
                    local: local.to_path_buf(),
                    client: "admin".to_string(),
                },
                MountCall::Unbind {
                    local: local.to_path_buf()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_fail_next_bind_is_one_shot() {
        let mount = RecordingMount::new();
        let creds = Credentials::new("admin", "s");
        mount.fail_next_bind();

        assert!(mount.bind("/docker/a", Path::new("/mnt/a"), &creds).await.is_err());
        assert!(!mount.is_bound(Path::new("/mnt/a")));
        assert!(mount.bind("/docker/a", Path::new("/mnt/a"), &creds).await.is_ok());
        assert_eq!(mount.bind_count(), 2);
    }
}
