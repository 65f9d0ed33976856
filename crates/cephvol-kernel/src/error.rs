//! Driver error types.
//!
//! Storage and mount failures keep their own types so backends can be tested
//! in isolation; [`DriverError`] is what the coordinator hands back to the
//! plugin surface.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::catalog::Conflict;

/// Error from a [`StorageBackend`](crate::storage::StorageBackend).
#[derive(Debug, Error)]
pub enum StorageError {
    /// Remote directory not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Remote directory already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Remote directory is not empty.
    #[error("directory not empty: {0}")]
    NotEmpty(String),

    /// Name would resolve outside the base namespace.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// Cluster is unreachable or refused the session.
    #[error("connection failed: {0}")]
    Connection(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl StorageError {
    /// Create a NotFound error.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(name: impl Into<String>) -> Self {
        Self::AlreadyExists(name.into())
    }

    /// Create a NotEmpty error.
    pub fn not_empty(name: impl Into<String>) -> Self {
        Self::NotEmpty(name.into())
    }

    /// Create a Connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create an Other error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Classify an I/O error raised while operating on `name`.
    pub fn from_io(name: &str, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::not_found(name),
            io::ErrorKind::AlreadyExists => Self::already_exists(name),
            io::ErrorKind::DirectoryNotEmpty => Self::not_empty(name),
            _ => Self::Io(err),
        }
    }
}

/// Storage result type.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error from a [`MountPrimitive`](crate::mount::MountPrimitive).
#[derive(Debug, Error)]
pub enum MountError {
    #[error("bind {source_spec} on {}: {error}", target.display())]
    Bind {
        source_spec: String,
        target: PathBuf,
        error: io::Error,
    },

    #[error("unbind {}: {error}", target.display())]
    Unbind { target: PathBuf, error: io::Error },

    #[error("mounting is not supported on this platform")]
    Unsupported,

    /// The blocking mount task panicked or was cancelled.
    #[error("mount task failed: {0}")]
    Join(String),
}

/// Mount result type.
pub type MountResult<T> = Result<T, MountError>;

/// Error returned by [`MountCoordinator`](crate::MountCoordinator) operations.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Cannot reach or authenticate to the cluster. Fatal at startup.
    #[error("cannot reach storage cluster: {0}")]
    Connection(String),

    #[error("backend: {0}")]
    Backend(#[source] StorageError),

    #[error("mount: {0}")]
    Mount(#[from] MountError),

    /// Stored client ID or local path disagrees with the supplied one.
    #[error(transparent)]
    Conflict(#[from] Conflict),

    #[error("volume not found: {0}")]
    NotFound(String),

    #[error("invalid volume name: {0:?}")]
    InvalidName(String),

    /// The local mountpoint directory could not be prepared.
    #[error("mountpoint {}: {source}", path.display())]
    Mountpoint {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl From<StorageError> for DriverError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Connection(msg) => DriverError::Connection(msg),
            StorageError::InvalidName(name) => DriverError::InvalidName(name),
            other => DriverError::Backend(other),
        }
    }
}

/// Driver result type.
pub type DriverResult<T> = Result<T, DriverError>;
