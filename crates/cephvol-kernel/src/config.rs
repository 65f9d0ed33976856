//! Driver configuration.
//!
//! Settings come from, in order of precedence:
//!
//! 1. Environment variables (`CLIENT_NAME`, `SECRET`, `SERVERS`, `DEBUG`,
//!    `CEPHVOL_BASE_DIR`, `CEPHVOL_MOUNT_ROOT`, `CEPHVOL_ADMIN_ROOT`)
//! 2. An optional TOML file named by `CEPHVOL_CONFIG`
//! 3. The Ceph keyring (`<ceph_dir>/ceph.client.<name>.keyring`) for the
//!    secret and `<ceph_dir>/ceph.conf` (`[global] mon host`) for servers
//! 4. Built-in defaults
//!
//! Empty environment values count as unset.

use serde::Deserialize;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::ceph_conf::CephConf;
use crate::mount::Credentials;

pub const DEFAULT_CLIENT_NAME: &str = "admin";
pub const DEFAULT_SERVERS: &str = "192.168.1.1";
pub const DEFAULT_BASE_DIR: &str = "/docker";
pub const DEFAULT_MOUNT_ROOT: &str = "/var/lib/docker/volumes";
pub const DEFAULT_ADMIN_ROOT: &str = "/mnt/cephfs";
pub const DEFAULT_CEPH_DIR: &str = "/etc/ceph";

pub const ENV_CLIENT_NAME: &str = "CLIENT_NAME";
pub const ENV_SECRET: &str = "SECRET";
pub const ENV_SERVERS: &str = "SERVERS";
pub const ENV_DEBUG: &str = "DEBUG";
pub const ENV_BASE_DIR: &str = "CEPHVOL_BASE_DIR";
pub const ENV_MOUNT_ROOT: &str = "CEPHVOL_MOUNT_ROOT";
pub const ENV_ADMIN_ROOT: &str = "CEPHVOL_ADMIN_ROOT";
pub const ENV_CONFIG: &str = "CEPHVOL_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no secret for client {client}: set SECRET or provide {}", keyring.display())]
    MissingSecret { client: String, keyring: PathBuf },

    #[error("reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("parsing {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Contents of the optional TOML config file. Every field may be omitted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub client_name: Option<String>,
    pub servers: Option<String>,
    pub base_dir: Option<String>,
    pub mount_root: Option<PathBuf>,
    pub admin_root: Option<PathBuf>,
}

impl FileConfig {
    pub fn from_toml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text, path)
    }
}

/// Resolved connection and layout parameters for the driver.
#[derive(Clone)]
pub struct DriverConfig {
    pub client_name: String,
    pub secret: String,
    /// Monitor address list used as the mount source prefix.
    pub servers: String,
    pub debug: bool,
    /// Base namespace inside the cluster holding one directory per volume.
    pub base_dir: String,
    /// Local directory under which volumes are mounted.
    pub mount_root: PathBuf,
    /// Local admin mount of the cluster root.
    pub admin_root: PathBuf,
}

impl fmt::Debug for DriverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverConfig")
            .field("client_name", &self.client_name)
            .field("secret", &"<redacted>")
            .field("servers", &self.servers)
            .field("debug", &self.debug)
            .field("base_dir", &self.base_dir)
            .field("mount_root", &self.mount_root)
            .field("admin_root", &self.admin_root)
            .finish()
    }
}

impl DriverConfig {
    /// Load from the process environment and `/etc/ceph`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(|key| std::env::var(key).ok(), Path::new(DEFAULT_CEPH_DIR))
    }

    /// Load with an injectable environment lookup and Ceph config directory.
    pub fn load(
        env: impl Fn(&str) -> Option<String>,
        ceph_dir: &Path,
    ) -> Result<Self, ConfigError> {
        let env = |key: &str| env(key).filter(|v| !v.is_empty());

        let file = match env(ENV_CONFIG) {
            Some(path) => FileConfig::read(Path::new(&path))?,
            None => FileConfig::default(),
        };

        let client_name = env(ENV_CLIENT_NAME)
            .or(file.client_name)
            .unwrap_or_else(|| DEFAULT_CLIENT_NAME.to_string());

        let secret = match env(ENV_SECRET) {
            Some(secret) => secret,
            None => read_keyring_secret(ceph_dir, &client_name)?,
        };

        let servers = env(ENV_SERVERS)
            .or(file.servers)
            .or_else(|| read_mon_host(ceph_dir))
            .unwrap_or_else(|| DEFAULT_SERVERS.to_string());

        let debug = env(ENV_DEBUG).as_deref() == Some("1");

        let base_dir = env(ENV_BASE_DIR)
            .or(file.base_dir)
            .unwrap_or_else(|| DEFAULT_BASE_DIR.to_string());

        let mount_root = env(ENV_MOUNT_ROOT)
            .map(PathBuf::from)
            .or(file.mount_root)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MOUNT_ROOT));

        let admin_root = env(ENV_ADMIN_ROOT)
            .map(PathBuf::from)
            .or(file.admin_root)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ADMIN_ROOT));

        Ok(Self {
            client_name,
            secret,
            servers,
            debug,
            base_dir,
            mount_root,
            admin_root,
        })
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.client_name, &self.secret)
    }
}

/// Path of the keyring for `client`.
pub fn keyring_path(ceph_dir: &Path, client: &str) -> PathBuf {
    ceph_dir.join(format!("ceph.client.{}.keyring", client))
}

fn read_keyring_secret(ceph_dir: &Path, client: &str) -> Result<String, ConfigError> {
    let keyring = keyring_path(ceph_dir, client);
    std::fs::read_to_string(&keyring)
        .ok()
        .and_then(|text| {
            CephConf::parse(&text)
                .get(&format!("client.{}", client), "key")
                .map(str::to_string)
        })
        .ok_or_else(|| ConfigError::MissingSecret {
            client: client.to_string(),
            keyring,
        })
}

fn read_mon_host(ceph_dir: &Path) -> Option<String> {
    let text = std::fs::read_to_string(ceph_dir.join("ceph.conf")).ok()?;
    CephConf::parse(&text)
        .get("global", "mon host")
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_only() {
        let ceph = TempDir::new().unwrap();
        let config = DriverConfig::load(
            env_of(&[
                ("CLIENT_NAME", "docker"),
                ("SECRET", "AQBenv=="),
                ("SERVERS", "10.1.1.1"),
                ("DEBUG", "1"),
            ]),
            ceph.path(),
        )
        .unwrap();

        assert_eq!(config.client_name, "docker");
        assert_eq!(config.secret, "AQBenv==");
        assert_eq!(config.servers, "10.1.1.1");
        assert!(config.debug);
        assert_eq!(config.base_dir, DEFAULT_BASE_DIR);
        assert_eq!(config.mount_root, PathBuf::from(DEFAULT_MOUNT_ROOT));
    }

    #[test]
    fn test_ceph_files_fallback() {
        let ceph = TempDir::new().unwrap();
        std::fs::write(
            ceph.path().join("ceph.client.admin.keyring"),
            "[client.admin]\n\tkey = AQBring==\n",
        )
        .unwrap();
        std::fs::write(
            ceph.path().join("ceph.conf"),
            "[global]\nmon host = 10.0.0.1,10.0.0.2\n",
        )
        .unwrap();

        let config = DriverConfig::load(env_of(&[("SECRET", "")]), ceph.path()).unwrap();
        assert_eq!(config.client_name, "admin");
        assert_eq!(config.secret, "AQBring==");
        assert_eq!(config.servers, "10.0.0.1,10.0.0.2");
        assert!(!config.debug);
    }

    #[test]
    fn test_missing_secret() {
        let ceph = TempDir::new().unwrap();
        let err = DriverConfig::load(env_of(&[("CLIENT_NAME", "ghost")]), ceph.path())
            .unwrap_err();
        match err {
            ConfigError::MissingSecret { client, keyring } => {
                assert_eq!(client, "ghost");
                assert!(keyring.ends_with("ceph.client.ghost.keyring"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_default_servers() {
        let ceph = TempDir::new().unwrap();
        let config = DriverConfig::load(env_of(&[("SECRET", "s")]), ceph.path()).unwrap();
        assert_eq!(config.servers, DEFAULT_SERVERS);
    }

    #[test]
    fn test_file_config_below_env() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cephvol.toml");
        std::fs::write(
            &path,
            "base_dir = \"/volumes\"\nmount_root = \"/srv/vols\"\nservers = \"10.9.9.9\"\n",
        )
        .unwrap();

        let config = DriverConfig::load(
            env_of(&[
                ("CEPHVOL_CONFIG", path.to_str().unwrap()),
                ("SECRET", "s"),
                ("CEPHVOL_MOUNT_ROOT", "/override"),
            ]),
            dir.path(),
        )
        .unwrap();

        assert_eq!(config.base_dir, "/volumes");
        assert_eq!(config.servers, "10.9.9.9");
        assert_eq!(config.mount_root, PathBuf::from("/override"));
    }

    #[test]
    fn test_file_config_rejects_unknown_keys() {
        let err = FileConfig::from_toml("mountroot = \"/x\"\n", Path::new("c.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let ceph = TempDir::new().unwrap();
        let config = DriverConfig::load(env_of(&[("SECRET", "AQBhidden==")]), ceph.path()).unwrap();
        assert!(!format!("{:?}", config).contains("AQBhidden"));
        assert_eq!(config.credentials().secret, "AQBhidden==");
    }
}
