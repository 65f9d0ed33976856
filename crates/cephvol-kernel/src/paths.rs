//! Volume name validation and path computation.

use std::path::{Path, PathBuf};

use crate::error::{DriverError, DriverResult};

/// Longest accepted volume name (a single path component).
pub const MAX_NAME_LEN: usize = 255;

/// Validate a volume name for use as a single remote and local path component.
///
/// Constraints:
/// - 1-255 characters
/// - First character is ASCII alphanumeric
/// - Remaining characters are ASCII alphanumeric, `_`, `.`, or `-`
///
/// This rejects `.`/`..`, separators and NUL bytes, so a name can never
/// address anything outside the base namespace or the mount root.
pub fn validate_volume_name(name: &str) -> DriverResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            first.is_ascii_alphanumeric()
                && name.len() <= MAX_NAME_LEN
                && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(DriverError::InvalidName(name.to_string()))
    }
}

/// Canonical local mountpoint for `name` under `mount_root`.
pub fn mountpoint(mount_root: &Path, name: &str) -> PathBuf {
    mount_root.join(name)
}

/// Remote path of a volume inside the base namespace, e.g. `/docker/data`.
pub fn remote_path(base_dir: &str, name: &str) -> String {
    let base = normalize_base_dir(base_dir);
    if base == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", base, name)
    }
}

/// Normalize a base namespace: leading `/`, no trailing slash.
pub fn normalize_base_dir(base_dir: &str) -> String {
    let trimmed = base_dir.trim_matches('/');
    format!("/{}", trimmed)
}
