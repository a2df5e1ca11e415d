//! On-disk store of merged string tables
//!
//! ```text
//! <root>/
//!   data/<Language>/<stem>.json     current tables
//!   backup/<Language>/<stem>.gw2    legacy files moved aside by migration
//! ```

mod locks;
mod persist;

pub use locks::{TableKey, TableLocks};
pub use persist::{
    RowPolicy, STORE_EXTENSION, STORE_FORMAT_VERSION, load_existing, load_table, load_table_with,
    save_table,
};
pub(crate) use persist::enforce_unique_rows;

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::formats::strs::Language;

/// Directory holding current tables
pub const DATA_DIR: &str = "data";

/// Directory holding migrated legacy files
pub const BACKUP_DIR: &str = "backup";

/// Paths of the store under one root directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `data/<Language>`
    #[must_use]
    pub fn data_dir(&self, language: Language) -> PathBuf {
        self.root.join(DATA_DIR).join(language.name())
    }

    /// `backup/<Language>`
    #[must_use]
    pub fn backup_dir(&self, language: Language) -> PathBuf {
        self.root.join(BACKUP_DIR).join(language.name())
    }

    /// Where the table decoded from `source_name` is persisted
    ///
    /// # Errors
    /// Returns [`Error::InvalidPath`] if `source_name` has no usable file stem.
    pub fn table_path(&self, language: Language, source_name: &str) -> Result<PathBuf> {
        let stem = table_stem(source_name)?;
        Ok(self
            .data_dir(language)
            .join(format!("{stem}.{STORE_EXTENSION}")))
    }

    /// Create `data/<Language>` for every language
    ///
    /// # Errors
    /// Returns an error if a directory cannot be created.
    pub fn ensure_data_dirs(&self) -> Result<()> {
        for language in Language::ALL {
            fs::create_dir_all(self.data_dir(language))?;
        }
        Ok(())
    }

    /// Persisted tables of one language, sorted by path
    ///
    /// A missing language directory yields an empty list.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be enumerated.
    pub fn list_tables(&self, language: Language) -> Result<Vec<PathBuf>> {
        let dir = self.data_dir(language);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut tables = Vec::new();
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type().is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(STORE_EXTENSION))
            {
                tables.push(path.to_path_buf());
            }
        }
        tables.sort();
        Ok(tables)
    }
}

/// File stem of a source name, rejecting names that would escape the bucket
pub(crate) fn table_stem(source_name: &str) -> Result<&str> {
    let path = Path::new(source_name);
    match (path.file_name(), path.file_stem().and_then(|s| s.to_str())) {
        (Some(name), Some(stem)) if name == path.as_os_str() && !stem.is_empty() => Ok(stem),
        _ => Err(Error::InvalidPath(format!(
            "'{source_name}' is not a plain file name"
        ))),
    }
}
