//! In-memory volume catalog.
//!
//! The catalog is the single source of truth for local mount state: how many
//! outstanding mount claims each volume has, and where it is bound. It is not
//! persisted, so every refcount starts at zero when the driver restarts and a
//! bind left over from a previous process is no longer tracked.
//!
//! All access goes through [`VolumeCatalog`] methods. The lock is held only
//! for the in-memory update; callers receive owned snapshots.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Local record for one named volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    pub name: String,
    /// Mount session that most recently claimed the volume.
    pub client_id: Option<String>,
    /// Where the volume is bound locally.
    pub local_path: Option<PathBuf>,
    /// Outstanding mount claims.
    pub refcount: u64,
}

impl Volume {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            client_id: None,
            local_path: None,
            refcount: 0,
        }
    }

    /// Whether an OS-level bind is expected to exist for this volume.
    pub fn is_bound(&self) -> bool {
        self.refcount > 0
    }
}

/// Which stored field disagreed with an incoming value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictField {
    ClientId,
    LocalPath,
}

impl fmt::Display for ConflictField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictField::ClientId => f.write_str("client ID"),
            ConflictField::LocalPath => f.write_str("local path"),
        }
    }
}

/// A stored value that was kept because a different one was supplied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("volume {name} {field} mismatch: stored({stored}), given({given})")]
pub struct Conflict {
    pub name: String,
    pub field: ConflictField,
    pub stored: String,
    pub given: String,
}

/// Result of [`VolumeCatalog::touch`].
///
/// The refcount change is always applied. Conflicts are reported alongside
/// the updated record rather than rolling anything back.
#[derive(Debug, Clone)]
pub struct Touched {
    /// Record after the update.
    pub volume: Volume,
    /// True if the record did not exist before this call.
    pub created: bool,
    pub conflicts: Vec<Conflict>,
}

impl Touched {
    /// First conflict as an error, if any.
    pub fn into_result(self) -> Result<Volume, Conflict> {
        match self.conflicts.into_iter().next() {
            Some(conflict) => Err(conflict),
            None => Ok(self.volume),
        }
    }
}

/// Result of [`VolumeCatalog::release`].
#[derive(Debug, Clone)]
pub struct Released {
    /// Record after the decrement.
    pub volume: Volume,
    /// The refcount was already zero, so nothing was decremented.
    pub already_released: bool,
}

impl Released {
    /// True when this release dropped the last claim.
    pub fn is_last(&self) -> bool {
        !self.already_released && self.volume.refcount == 0
    }
}

/// Name → volume map behind a single reader/writer lock.
#[derive(Debug, Default)]
pub struct VolumeCatalog {
    volumes: RwLock<HashMap<String, Volume>>,
}

impl VolumeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or claim a volume.
    ///
    /// Unknown names are inserted with `refcount = delta`. Known names get
    /// `refcount += delta`, and `client_id` / `local_path` are reconciled:
    /// `None` is ignored, an unset stored field takes the given value, and a
    /// differing value is reported as a [`Conflict`] while the stored value
    /// is kept.
    pub fn touch(
        &self,
        name: &str,
        client_id: Option<&str>,
        local_path: Option<&Path>,
        delta: u64,
    ) -> Touched {
        let mut volumes = self.volumes.write();
        let created = !volumes.contains_key(name);
        let volume = volumes
            .entry(name.to_string())
            .or_insert_with(|| Volume::new(name));

        volume.refcount += delta;

        let mut conflicts = Vec::new();
        if let Some(given) = client_id {
            match &volume.client_id {
                None => volume.client_id = Some(given.to_string()),
                Some(stored) if stored != given => conflicts.push(Conflict {
                    name: name.to_string(),
                    field: ConflictField::ClientId,
                    stored: stored.clone(),
                    given: given.to_string(),
                }),
                Some(_) => {}
            }
        }
        if let Some(given) = local_path {
            match &volume.local_path {
                None => volume.local_path = Some(given.to_path_buf()),
                Some(stored) if stored != given => conflicts.push(Conflict {
                    name: name.to_string(),
                    field: ConflictField::LocalPath,
                    stored: stored.display().to_string(),
                    given: given.display().to_string(),
                }),
                Some(_) => {}
            }
        }

        Touched {
            volume: volume.clone(),
            created,
            conflicts,
        }
    }

    /// Drop one mount claim. Never takes the refcount below zero.
    ///
    /// Returns `None` if the name is unknown.
    pub fn release(&self, name: &str) -> Option<Released> {
        let mut volumes = self.volumes.write();
        let volume = volumes.get_mut(name)?;
        let already_released = volume.refcount == 0;
        volume.refcount = volume.refcount.saturating_sub(1);
        Some(Released {
            volume: volume.clone(),
            already_released,
        })
    }

    pub fn get(&self, name: &str) -> Option<Volume> {
        self.volumes.read().get(name).cloned()
    }

    /// Delete a record regardless of its refcount.
    pub fn forget(&self, name: &str) -> Option<Volume> {
        self.volumes.write().remove(name)
    }

    /// Snapshot of all records, in no particular order.
    pub fn list(&self) -> Vec<Volume> {
        self.volumes.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.volumes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touch_inserts_with_delta() {
        let catalog = VolumeCatalog::new();
        let touched = catalog.touch("data", None, None, 0);
        assert!(touched.created);
        assert_eq!(touched.volume.refcount, 0);
        assert!(touched.conflicts.is_empty());

        let touched = catalog.touch("other", Some("c1"), Some(Path::new("/mnt/other")), 1);
        assert_eq!(touched.volume.refcount, 1);
        assert_eq!(touched.volume.client_id.as_deref(), Some("c1"));
        assert_eq!(touched.volume.local_path, Some(PathBuf::from("/mnt/other")));
    }

    #[test]
    fn test_touch_fills_unset_fields() {
        let catalog = VolumeCatalog::new();
        catalog.touch("data", None, None, 0);

        let touched = catalog.touch("data", Some("c1"), Some(Path::new("/mnt/data")), 1);
        assert!(!touched.created);
        assert!(touched.conflicts.is_empty());
        assert_eq!(touched.volume.client_id.as_deref(), Some("c1"));
        assert_eq!(touched.volume.refcount, 1);
    }

    #[test]
    fn test_touch_reports_conflict_but_still_counts() {
        let catalog = VolumeCatalog::new();
        catalog.touch("data", Some("c1"), Some(Path::new("/mnt/data")), 1);

        let touched = catalog.touch("data", Some("c2"), Some(Path::new("/elsewhere/data")), 1);
        assert_eq!(touched.volume.refcount, 2);
        assert_eq!(touched.conflicts.len(), 2);
        assert_eq!(touched.conflicts[0].field, ConflictField::ClientId);
        assert_eq!(touched.conflicts[1].field, ConflictField::LocalPath);

        // Stored values win.
        assert_eq!(touched.volume.client_id.as_deref(), Some("c1"));
        assert_eq!(touched.volume.local_path, Some(PathBuf::from("/mnt/data")));

        let err = touched.into_result().unwrap_err();
        assert_eq!(err.to_string(), "volume data client ID mismatch: stored(c1), given(c2)");
    }

    #[test]
    fn test_touch_partial_conflict_keeps_compatible_update() {
        let catalog = VolumeCatalog::new();
        catalog.touch("data", None, Some(Path::new("/mnt/data")), 1);

        let touched = catalog.touch("data", Some("c9"), Some(Path::new("/other")), 1);
        assert_eq!(touched.conflicts.len(), 1);
        assert_eq!(touched.conflicts[0].field, ConflictField::LocalPath);
        assert_eq!(touched.volume.client_id.as_deref(), Some("c9"));
    }

    #[test]
    fn test_release_saturates_at_zero() {
        let catalog = VolumeCatalog::new();
        catalog.touch("data", None, None, 1);

        let released = catalog.release("data").unwrap();
        assert!(released.is_last());
        assert_eq!(released.volume.refcount, 0);

        let released = catalog.release("data").unwrap();
        assert!(released.already_released);
        assert!(!released.is_last());
        assert_eq!(released.volume.refcount, 0);

        assert!(catalog.release("ghost").is_none());
    }

    #[test]
    fn test_forget_ignores_refcount() {
        let catalog = VolumeCatalog::new();
        catalog.touch("data", None, None, 3);
        let removed = catalog.forget("data").unwrap();
        assert_eq!(removed.refcount, 3);
        assert!(catalog.get("data").is_none());
        assert!(catalog.forget("data").is_none());
    }

    #[test]
    fn test_list_returns_all_records() {
        let catalog = VolumeCatalog::new();
        catalog.touch("a", None, None, 0);
        catalog.touch("b", None, None, 2);
        assert_eq!(catalog.len(), 2);

        let mut names: Vec<_> = catalog.list().into_iter().map(|v| v.name).collect();
        names.sort();
        assert_eq!(names, vec!["a", "b"]);
    }
}
