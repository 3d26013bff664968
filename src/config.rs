//! Optional TOML configuration file.
//!
//! Every key is optional; anything left out falls back to the built-in
//! default, and command line flags win over the file.
//!
//! ```toml
//! ignore_dirs = true
//! ignore_root_folder_timestamp = true
//! acls = false
//! xattrs = true
//! stats = false
//! dry_run = false
//! ssh_identity = "/etc/snapcheck/id_ed25519"
//! rsync = "/usr/bin/rsync"
//! rsync_args = ["--exclude=/.snapshots"]
//! lister = "btrbk --format=raw list"
//! transaction_log = "/var/log/snapcheck.log"
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("TOML parse error in {path}: {source}")]
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub ignore_dirs: Option<bool>,
    pub ignore_root_folder_timestamp: Option<bool>,
    pub acls: Option<bool>,
    pub xattrs: Option<bool>,
    pub stats: Option<bool>,
    pub dry_run: Option<bool>,
    pub ssh_identity: Option<PathBuf>,
    pub rsync: Option<PathBuf>,
    #[serde(default)]
    pub rsync_args: Vec<String>,
    pub lister: Option<String>,
    pub transaction_log: Option<PathBuf>,
}

impl ConfigFile {
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml(&content).map_err(|source| ConfigError::TomlParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_file_is_all_defaults() {
        assert_eq!(ConfigFile::from_toml("").unwrap(), ConfigFile::default());
    }

    #[test]
    fn parses_every_key() {
        let config = ConfigFile::from_toml(
            r#"
ignore_dirs = false
ignore_root_folder_timestamp = true
acls = false
xattrs = false
stats = true
dry_run = true
ssh_identity = "/etc/snapcheck/id"
rsync = "/opt/bin/rsync"
rsync_args = ["--exclude=/.snapshots"]
lister = "btrbk --format=raw list"
transaction_log = "/var/log/snapcheck.log"
"#,
        )
        .unwrap();

        assert_eq!(config.ignore_dirs, Some(false));
        assert_eq!(config.ignore_root_folder_timestamp, Some(true));
        assert_eq!(config.acls, Some(false));
        assert_eq!(config.stats, Some(true));
        assert_eq!(config.dry_run, Some(true));
        assert_eq!(config.ssh_identity, Some(PathBuf::from("/etc/snapcheck/id")));
        assert_eq!(config.rsync_args, vec!["--exclude=/.snapshots"]);
        assert_eq!(config.lister.as_deref(), Some("btrbk --format=raw list"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(ConfigFile::from_toml("ignore_everything = true").is_err());
    }

    #[test]
    fn wrong_types_are_rejected() {
        assert!(ConfigFile::from_toml("ignore_dirs = \"yes\"").is_err());
    }

    #[test]
    fn load_reports_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing.toml");

        let err = ConfigFile::load(&path).unwrap_err();
        assert!(err.to_string().contains("missing.toml"));

        std::fs::write(&path, "acls = false\n").unwrap();
        assert_eq!(ConfigFile::load(&path).unwrap().acls, Some(false));
    }
}
