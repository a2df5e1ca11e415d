//! Command execution implementations

use std::path::{Path, PathBuf};

use super::Commands;
use super::{import, inspect, list, migrate};
use crate::config::{Config, expand_path};

impl Commands {
    /// Execute the selected command.
    ///
    /// # Errors
    /// Returns an error if the underlying command fails.
    pub fn execute(&self) -> anyhow::Result<()> {
        let config = Config::load();
        match self {
            Commands::Import {
                files,
                root,
                threads,
                quiet,
            } => import::execute(
                files,
                &store_root(root.as_deref(), &config),
                threads.unwrap_or(config.threads),
                &config.legacy_extension,
                *quiet,
            ),
            Commands::Migrate { root } => migrate::execute(
                &store_root(root.as_deref(), &config),
                &config.legacy_extension,
            ),
            Commands::List {
                language,
                filter,
                limit,
                root,
            } => list::execute(
                &store_root(root.as_deref(), &config),
                *language,
                filter.as_deref(),
                *limit,
            ),
            Commands::Inspect { file } => inspect::execute(file),
        }
    }
}

/// `--root` if given, otherwise the configured root
fn store_root(root: Option<&Path>, config: &Config) -> PathBuf {
    match root {
        Some(root) => expand_path(&root.to_string_lossy()),
        None => config.resolved_root(),
    }
}
