//! In-memory storage backend.
//!
//! Stands in for the cluster in tests and dry runs. All data is ephemeral.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use super::ops::StorageBackend;
use crate::error::{StorageError, StorageResult};
use crate::paths::normalize_base_dir;

#[derive(Debug, Default)]
struct Namespace {
    base_exists: bool,
    /// Volume directories and their mode bits.
    dirs: BTreeMap<String, u32>,
    /// Directories that hold data and cannot be removed.
    occupied: HashSet<String>,
}

/// In-memory cluster namespace.
///
/// Thread-safe via internal `RwLock`.
#[derive(Debug)]
pub struct MemoryStorage {
    base_dir: String,
    reachable: AtomicBool,
    namespace: RwLock<Namespace>,
}

impl MemoryStorage {
    /// Create an empty namespace. The base directory does not exist until
    /// [`StorageBackend::ensure_base_directory`] is called.
    pub fn new(base_dir: impl AsRef<str>) -> Self {
        Self {
            base_dir: normalize_base_dir(base_dir.as_ref()),
            reachable: AtomicBool::new(true),
            namespace: RwLock::new(Namespace::default()),
        }
    }

    /// Make `connect` fail, simulating an unreachable cluster.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Mark a volume directory as holding data, so removing it fails.
    pub fn set_occupied(&self, name: &str, occupied: bool) {
        if let Ok(mut ns) = self.namespace.write() {
            if occupied {
                ns.occupied.insert(name.to_string());
            } else {
                ns.occupied.remove(name);
            }
        }
    }

    /// Mode bits a directory was created with.
    pub fn mode_of(&self, name: &str) -> Option<u32> {
        self.namespace.read().ok()?.dirs.get(name).copied()
    }

    fn poisoned() -> StorageError {
        StorageError::other("lock poisoned")
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn connect(&self) -> StorageResult<()> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::connection("cluster unreachable"))
        }
    }

    async fn ensure_base_directory(&self) -> StorageResult<()> {
        let mut ns = self.namespace.write().map_err(|_| Self::poisoned())?;
        ns.base_exists = true;
        Ok(())
    }

    async fn create_directory(&self, name: &str, mode: u32) -> StorageResult<()> {
        let mut ns = self.namespace.write().map_err(|_| Self::poisoned())?;
        if !ns.base_exists {
            return Err(StorageError::not_found(self.base_dir.clone()));
        }
        if ns.dirs.contains_key(name) {
            return Err(StorageError::already_exists(name));
        }
        ns.dirs.insert(name.to_string(), mode);
        Ok(())
    }

    async fn remove_directory(&self, name: &str) -> StorageResult<()> {
        let mut ns = self.namespace.write().map_err(|_| Self::poisoned())?;
        if !ns.dirs.contains_key(name) {
            return Err(StorageError::not_found(name));
        }
        if ns.occupied.contains(name) {
            return Err(StorageError::not_empty(name));
        }
        ns.dirs.remove(name);
        Ok(())
    }

    async fn list_directory(&self) -> StorageResult<Vec<String>> {
        let ns = self.namespace.read().map_err(|_| Self::poisoned())?;
        if !ns.base_exists {
            return Err(StorageError::not_found(self.base_dir.clone()));
        }
        let mut entries = vec![".".to_string(), "..".to_string()];
        entries.extend(ns.dirs.keys().cloned());
        Ok(entries)
    }

    async fn directory_exists(&self, name: &str) -> bool {
        self.namespace
            .read()
            .map(|ns| ns.dirs.contains_key(name))
            .unwrap_or(false)
    }

    fn base_dir(&self) -> &str {
        &self.base_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DEFAULT_DIR_MODE;

    async fn ready() -> MemoryStorage {
        let storage = MemoryStorage::new("/docker");
        storage.ensure_base_directory().await.unwrap();
        storage
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let storage = ready().await;
        storage.create_directory("b", DEFAULT_DIR_MODE).await.unwrap();
        storage.create_directory("a", 0o700).await.unwrap();

        let entries = storage.list_directory().await.unwrap();
        assert_eq!(entries, vec![".", "..", "a", "b"]);
        assert_eq!(storage.mode_of("a"), Some(0o700));
    }

    #[tokio::test]
    async fn test_create_requires_base() {
        let storage = MemoryStorage::new("docker/");
        assert_eq!(storage.base_dir(), "/docker");
        let result = storage.create_directory("a", DEFAULT_DIR_MODE).await;
        assert!(matches!(result, Err(StorageError::NotFound(ref p)) if p == "/docker"));
    }

    #[tokio::test]
    async fn test_create_existing_fails() {
        let storage = ready().await;
        storage.create_directory("a", DEFAULT_DIR_MODE).await.unwrap();
        let result = storage.create_directory("a", DEFAULT_DIR_MODE).await;
        assert!(matches!(result, Err(StorageError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_remove() {
        let storage = ready().await;
        storage.create_directory("a", DEFAULT_DIR_MODE).await.unwrap();

        storage.set_occupied("a", true);
        let result = storage.remove_directory("a").await;
        assert!(matches!(result, Err(StorageError::NotEmpty(_))));

        storage.set_occupied("a", false);
        storage.remove_directory("a").await.unwrap();
        assert!(!storage.directory_exists("a").await);

        let result = storage.remove_directory("a").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_unreachable() {
        let storage = MemoryStorage::new("/docker");
        storage.set_reachable(false);
        assert!(matches!(
            storage.connect().await,
            Err(StorageError::Connection(_))
        ));
    }
}
