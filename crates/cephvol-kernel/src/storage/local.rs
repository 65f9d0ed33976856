//! Storage backend over a locally mounted view of the cluster.
//!
//! The driver host keeps an administrative mount of the cluster's root (for
//! CephFS, a kernel mount of `/`). Volume directories are created and removed
//! under `<admin_root>/<base_dir>`, which is the same tree clients later bind.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::ops::StorageBackend;
use crate::error::{StorageError, StorageResult};
use crate::paths::normalize_base_dir;

/// Cluster namespace reached through a local admin mount.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    admin_root: PathBuf,
    base_dir: String,
}

impl LocalStorage {
    /// Create a backend rooted at `admin_root`, managing `base_dir` inside it.
    pub fn new(admin_root: impl Into<PathBuf>, base_dir: impl AsRef<str>) -> Self {
        Self {
            admin_root: admin_root.into(),
            base_dir: normalize_base_dir(base_dir.as_ref()),
        }
    }

    /// Local path of the base namespace.
    pub fn base_path(&self) -> PathBuf {
        self.admin_root.join(self.base_dir.trim_start_matches('/'))
    }

    /// Resolve a volume name to its directory, refusing anything that is not
    /// a single plain component.
    fn resolve(&self, name: &str) -> StorageResult<PathBuf> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(std::path::Component::Normal(_)), None) => Ok(self.base_path().join(name)),
            _ => Err(StorageError::InvalidName(name.to_string())),
        }
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn connect(&self) -> StorageResult<()> {
        match fs::metadata(&self.admin_root).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(StorageError::connection(format!(
                "{} is not a directory",
                self.admin_root.display()
            ))),
            Err(e) => Err(StorageError::connection(format!(
                "{}: {}",
                self.admin_root.display(),
                e
            ))),
        }
    }

    async fn ensure_base_directory(&self) -> StorageResult<()> {
        let base = self.base_path();
        fs::create_dir_all(&base)
            .await
            .map_err(|e| StorageError::from_io(&self.base_dir, e))
    }

    async fn create_directory(&self, name: &str, mode: u32) -> StorageResult<()> {
        let path = self.resolve(name)?;
        fs::DirBuilder::new()
            .mode(mode)
            .create(&path)
            .await
            .map_err(|e| StorageError::from_io(name, e))
    }

    async fn remove_directory(&self, name: &str) -> StorageResult<()> {
        let path = self.resolve(name)?;
        fs::remove_dir(&path)
            .await
            .map_err(|e| StorageError::from_io(name, e))
    }

    async fn list_directory(&self) -> StorageResult<Vec<String>> {
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(self.base_path())
            .await
            .map_err(|e| StorageError::from_io(&self.base_dir, e))?;

        while let Some(entry) = dir.next_entry().await.map_err(StorageError::from)? {
            entries.push(entry.file_name().to_string_lossy().into_owned());
        }

        entries.sort();
        Ok(entries)
    }

    async fn directory_exists(&self, name: &str) -> bool {
        let Ok(path) = self.resolve(name) else {
            return false;
        };
        // Navigate in and check where we landed: a symlink pointing elsewhere
        // does not count as the volume directory.
        let (Ok(landed), Ok(base)) = (
            fs::canonicalize(&path).await,
            fs::canonicalize(self.base_path()).await,
        ) else {
            return false;
        };
        landed == base.join(name) && fs::metadata(&landed).await.is_ok_and(|m| m.is_dir())
    }

    fn base_dir(&self) -> &str {
        &self.base_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::DEFAULT_DIR_MODE;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, LocalStorage) {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path(), "/docker");
        storage.connect().await.unwrap();
        storage.ensure_base_directory().await.unwrap();
        (dir, storage)
    }

    #[tokio::test]
    async fn test_ensure_base_is_idempotent() {
        let (dir, storage) = setup().await;
        storage.ensure_base_directory().await.unwrap();
        assert!(dir.path().join("docker").is_dir());
    }

    #[tokio::test]
    async fn test_create_list_remove() {
        let (dir, storage) = setup().await;
        storage.create_directory("beta", DEFAULT_DIR_MODE).await.unwrap();
        storage.create_directory("alpha", 0o700).await.unwrap();

        let entries = storage.list_directory().await.unwrap();
        assert_eq!(entries, vec!["alpha", "beta"]);

        let mode = std::fs::metadata(dir.path().join("docker/alpha"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o700);

        storage.remove_directory("alpha").await.unwrap();
        assert!(!storage.directory_exists("alpha").await);
        assert!(storage.directory_exists("beta").await);
    }

    #[tokio::test]
    async fn test_error_kinds() {
        let (dir, storage) = setup().await;
        storage.create_directory("a", DEFAULT_DIR_MODE).await.unwrap();

        let result = storage.create_directory("a", DEFAULT_DIR_MODE).await;
        assert!(matches!(result, Err(StorageError::AlreadyExists(_))));

        std::fs::write(dir.path().join("docker/a/file"), b"x").unwrap();
        let result = storage.remove_directory("a").await;
        assert!(matches!(result, Err(StorageError::NotEmpty(_))));

        let result = storage.remove_directory("missing").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_rejects_traversal() {
        let (_dir, storage) = setup().await;
        let result = storage.create_directory("../escape", DEFAULT_DIR_MODE).await;
        assert!(matches!(result, Err(StorageError::InvalidName(_))));
        assert!(!storage.directory_exists("..").await);
        assert!(!storage.directory_exists("").await);
    }

    #[tokio::test]
    async fn test_failed_create_leaves_nothing_behind() {
        let (dir, storage) = setup().await;
        std::fs::write(dir.path().join("docker/taken"), b"").unwrap();

        let result = storage.create_directory("taken", DEFAULT_DIR_MODE).await;
        assert!(matches!(result, Err(StorageError::AlreadyExists(_))));
        assert!(dir.path().join("docker/taken").is_file());
        assert!(!storage.directory_exists("taken").await);
    }

    #[tokio::test]
    async fn test_file_is_not_a_volume() {
        let (dir, storage) = setup().await;
        std::fs::write(dir.path().join("docker/plain"), b"x").unwrap();
        assert!(!storage.directory_exists("plain").await);
    }

    #[tokio::test]
    async fn test_symlink_is_not_a_volume() {
        let (dir, storage) = setup().await;
        let outside = dir.path().join("outside");
        std::fs::create_dir(&outside).unwrap();
        std::os::unix::fs::symlink(&outside, dir.path().join("docker/link")).unwrap();

        assert!(!storage.directory_exists("link").await);
    }

    #[tokio::test]
    async fn test_connect_missing_root() {
        let storage = LocalStorage::new("/nonexistent/cephvol-admin", "/docker");
        assert!(matches!(
            storage.connect().await,
            Err(StorageError::Connection(_))
        ));
    }
}
