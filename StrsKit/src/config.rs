//! User configuration

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::migrate::LEGACY_EXTENSION;

/// Directory name under the platform config and data directories
const APP_DIR: &str = "StrsKit";

fn default_legacy_extension() -> String {
    LEGACY_EXTENSION.to_string()
}

/// Settings persisted in `<config dir>/StrsKit/config.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Store root; `~` is expanded. Unset means the platform data directory.
    #[serde(default)]
    pub root: Option<String>,
    /// Import worker threads; 0 means one per CPU
    #[serde(default)]
    pub threads: usize,
    /// Extension of legacy table files picked up by migration
    #[serde(default = "default_legacy_extension")]
    pub legacy_extension: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: None,
            threads: 0,
            legacy_extension: default_legacy_extension(),
        }
    }
}

impl Config {
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_DIR).join("config.json"))
    }

    /// Load config from disk, or return default
    #[must_use]
    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Load config from a specific file
    ///
    /// A missing file yields the defaults silently; an unreadable or invalid
    /// one yields the defaults with a warning.
    #[must_use]
    pub fn load_from(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                tracing::warn!("Cannot read config {}: {e}", path.display());
                return Self::default();
            }
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("Ignoring invalid config {}: {e}", path.display());
            Self::default()
        })
    }

    /// Save config to the platform config directory
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save(&self) -> Result<()> {
        match Self::config_path() {
            Some(path) => self.save_to(&path),
            None => Ok(()),
        }
    }

    /// Save config to a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// The store root with `~` and environment variables expanded
    ///
    /// Falls back to `<local data dir>/StrsKit`, then to the working directory.
    #[must_use]
    pub fn resolved_root(&self) -> PathBuf {
        match &self.root {
            Some(root) => expand_path(root),
            None => dirs::data_local_dir()
                .map(|p| p.join(APP_DIR))
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}

/// Expand `~` and `$VARS` in a user-supplied path, leaving it as-is if expansion fails
#[must_use]
pub fn expand_path(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(e) => {
            tracing::debug!("Not expanding {path}: {e}");
            PathBuf::from(shellexpand::tilde(path).as_ref())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_config_is_default() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Config::load_from(&dir.path().join("config.json")), Config::default());
    }

    #[test]
    fn test_invalid_config_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(Config::load_from(&path), Config::default());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"threads": 3}"#).unwrap();

        let config = Config::load_from(&path);
        assert_eq!(config.threads, 3);
        assert_eq!(config.legacy_extension, "gw2");
        assert_eq!(config.root, None);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            root: Some("/data/strings".into()),
            threads: 2,
            legacy_extension: "old".into(),
        };

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path), config);
        assert_eq!(config.resolved_root(), PathBuf::from("/data/strings"));
    }

    #[test]
    fn test_tilde_expansion() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        assert_eq!(expand_path("~/strs"), home.join("strs"));
    }
}
