//! Local mount primitives.
//!
//! A [`MountPrimitive`] binds a remote path into the local namespace and
//! removes that binding again. Both calls may block for as long as the
//! underlying OS call does; there is no timeout or retry at this layer.

mod kernel;
mod recording;

use async_trait::async_trait;
use std::fmt;
use std::path::Path;

use crate::error::MountResult;

pub use kernel::KernelMount;
pub use recording::{MountCall, RecordingMount};

/// Client identity presented to the cluster when binding.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub name: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(name: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("name", &self.name)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Bind/unbind of a remote path at a local mountpoint.
#[async_trait]
pub trait MountPrimitive: Send + Sync {
    /// Bind `remote` (a path inside the cluster, e.g. `/docker/data`) at `local`.
    async fn bind(&self, remote: &str, local: &Path, credentials: &Credentials)
    -> MountResult<()>;

    /// Remove the binding at `local`.
    async fn unbind(&self, local: &Path) -> MountResult<()>;
}
