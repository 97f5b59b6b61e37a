//! Configuration management
//!
//! Resolution order for every setting: CLI flag, then environment, then
//! `~/.drivegate/config.json`, then the built-in default.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn drivegate_dir() -> PathBuf {
    dirs::home_dir()
        .expect("Could not find home directory")
        .join(".drivegate")
}

pub fn default_socket_path() -> PathBuf {
    drivegate_dir().join("drivegate.sock")
}

fn config_path() -> PathBuf {
    drivegate_dir().join("config.json")
}

/// On-disk configuration file. All fields optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<PathBuf>,
}

impl ConfigFile {
    fn load() -> Self {
        let path = config_path();
        match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!("Ignoring malformed config at {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub credentials_path: PathBuf,
    pub socket_path: PathBuf,
}

impl Settings {
    pub fn resolve(
        credentials_flag: Option<PathBuf>,
        socket_flag: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        let file = ConfigFile::load();

        let credentials_path = credentials_flag
            .or_else(|| std::env::var_os("DRIVEGATE_CREDENTIALS").map(PathBuf::from))
            .or(file.credentials_path)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "no service-account credentials configured; pass --credentials, \
                     set DRIVEGATE_CREDENTIALS, or add credentials_path to {}",
                    config_path().display()
                )
            })?;

        let socket_path = socket_flag
            .or(file.socket_path)
            .unwrap_or_else(default_socket_path);

        Ok(Self {
            credentials_path,
            socket_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_socket_path_is_under_drivegate_dir() {
        let path = default_socket_path();
        assert!(path.ends_with("drivegate.sock"));
        assert!(path.to_string_lossy().contains(".drivegate"));
    }

    #[test]
    fn config_file_tolerates_missing_fields() {
        let cfg: ConfigFile = serde_json::from_str("{}").unwrap();
        assert!(cfg.credentials_path.is_none());
        assert!(cfg.socket_path.is_none());
    }

    #[test]
    fn explicit_flags_win() {
        let settings = Settings::resolve(
            Some(PathBuf::from("/tmp/creds.json")),
            Some(PathBuf::from("/tmp/test.sock")),
        )
        .unwrap();
        assert_eq!(settings.credentials_path, PathBuf::from("/tmp/creds.json"));
        assert_eq!(settings.socket_path, PathBuf::from("/tmp/test.sock"));
    }
}
