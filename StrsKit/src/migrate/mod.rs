//! One-shot migration of legacy `.gw2` tables to the current store format
//!
//! For every `data/<Language>` bucket, each legacy file is decoded, written
//! next to it as `<stem>.json`, and then moved to `backup/<Language>/`. A file
//! is only moved once its replacement has been written, so a failed file stays
//! where it was and the sweep can simply be run again.

mod legacy;

pub use legacy::{parse_legacy_bytes, read_legacy_table};

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::formats::strs::Language;
use crate::store::{RowPolicy, STORE_EXTENSION, StoreLayout, enforce_unique_rows, save_table};

/// Extension of legacy table files
pub const LEGACY_EXTENSION: &str = "gw2";

/// Outcome of a migration sweep
#[derive(Debug, Clone, Default)]
pub struct MigrationReport {
    /// Files fully converted and backed up
    pub converted: usize,
    /// Files left in place, with the reason
    pub failures: Vec<(PathBuf, String)>,
}

/// Migrate every legacy file under `root`
///
/// Returns the number of files converted. Files that fail are logged and left
/// untouched; use [`migrate_legacy_with`] to inspect them.
///
/// # Errors
/// Returns an error only if a language directory cannot be enumerated.
pub fn migrate_legacy<P: AsRef<Path>>(root: P) -> Result<usize> {
    let report = migrate_legacy_with(&StoreLayout::new(root.as_ref()), LEGACY_EXTENSION)?;
    Ok(report.converted)
}

/// Migrate legacy files with the given extension
///
/// # Errors
/// Returns an error only if a language directory cannot be enumerated.
pub fn migrate_legacy_with(layout: &StoreLayout, extension: &str) -> Result<MigrationReport> {
    let mut report = MigrationReport::default();

    for language in Language::ALL {
        let data_dir = layout.data_dir(language);
        if !data_dir.is_dir() {
            continue;
        }

        for legacy_path in find_legacy_files(&data_dir, extension)? {
            match migrate_file(layout, language, &legacy_path) {
                Ok(target) => {
                    tracing::info!(
                        "Migrated {} -> {}",
                        legacy_path.display(),
                        target.display()
                    );
                    report.converted += 1;
                }
                Err(e) => {
                    tracing::warn!("Failed to migrate {}: {e}", legacy_path.display());
                    report.failures.push((legacy_path, e.to_string()));
                }
            }
        }
    }

    if report.converted > 0 || !report.failures.is_empty() {
        tracing::info!(
            "Migration finished: {} converted, {} failed",
            report.converted,
            report.failures.len()
        );
    }
    Ok(report)
}

/// Legacy files directly inside `dir`, sorted
fn find_legacy_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry?;
        if entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
        {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Convert one file; returns the path of the written table
fn migrate_file(layout: &StoreLayout, language: Language, legacy_path: &Path) -> Result<PathBuf> {
    let file_name = legacy_path
        .file_name()
        .ok_or_else(|| Error::InvalidPath(legacy_path.display().to_string()))?;

    let table = read_legacy_table(legacy_path)?;
    let table = enforce_unique_rows(table, RowPolicy::KeepFirst, legacy_path)?;
    if table.language != language {
        tracing::debug!(
            "{} is filed under {language} but records {}",
            legacy_path.display(),
            table.language
        );
    }

    let target = legacy_path.with_extension(STORE_EXTENSION);
    save_table(&table, &target)?;

    let backup_dir = layout.backup_dir(language);
    fs::create_dir_all(&backup_dir)?;
    fs::rename(legacy_path, backup_dir.join(file_name))?;

    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::nrbf::testing::{fixture_stamp, legacy_table_bytes};
    use crate::formats::strs::Entry;
    use crate::store::load_table;
    use pretty_assertions::assert_eq;

    fn layout_with(languages: &[Language]) -> (tempfile::TempDir, StoreLayout) {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        for &language in languages {
            fs::create_dir_all(layout.data_dir(language)).unwrap();
        }
        (dir, layout)
    }

    #[test]
    fn test_migrates_french_table() {
        let (_dir, layout) = layout_with(&[Language::French]);
        let bytes = legacy_table_bytes(2, "102385.raw", &[(0, "Bonjour", 1), (2, "Salut", 1)]);
        let legacy = layout.data_dir(Language::French).join("102385.gw2");
        fs::write(&legacy, &bytes).unwrap();

        assert_eq!(migrate_legacy(layout.root()).unwrap(), 1);

        let current = layout.data_dir(Language::French).join("102385.json");
        let table = load_table(&current).unwrap();
        assert_eq!(table.language, Language::French);
        assert_eq!(table.source_name, "102385.raw");
        assert_eq!(
            table.items,
            vec![
                Entry::text(0, "Bonjour", fixture_stamp()),
                Entry::text(2, "Salut", fixture_stamp()),
            ]
        );

        assert!(!legacy.exists());
        let backup = layout.backup_dir(Language::French).join("102385.gw2");
        assert_eq!(fs::read(backup).unwrap(), bytes);
    }

    #[test]
    fn test_failure_is_isolated() {
        let (_dir, layout) = layout_with(&[Language::English, Language::German]);
        let english = layout.data_dir(Language::English);
        fs::write(english.join("1.gw2"), b"not a legacy table").unwrap();
        fs::write(
            english.join("2.gw2"),
            legacy_table_bytes(0, "2.raw", &[(0, "two", 1)]),
        )
        .unwrap();
        fs::write(
            layout.data_dir(Language::German).join("3.gw2"),
            legacy_table_bytes(3, "3.raw", &[(1, "drei", 1)]),
        )
        .unwrap();

        let report = migrate_legacy_with(&layout, LEGACY_EXTENSION).unwrap();

        assert_eq!(report.converted, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, english.join("1.gw2"));
        // The broken file is left where it was, with nothing written for it
        assert!(english.join("1.gw2").exists());
        assert!(!english.join("1.json").exists());
        assert!(english.join("2.json").exists());
        assert!(layout.data_dir(Language::German).join("3.json").exists());
    }

    #[test]
    fn test_library_flood_does_not_stop_sweep() {
        use crate::formats::nrbf::testing::NrbfWriter;

        let (_dir, layout) = layout_with(&[Language::English]);
        let english = layout.data_dir(Language::English);
        let mut w = NrbfWriter::new(1);
        for id in 0..300_000 {
            w.library(id + 2, "");
        }
        fs::write(english.join("bad.gw2"), w.buf).unwrap();
        fs::write(
            english.join("good.gw2"),
            legacy_table_bytes(0, "good.raw", &[(0, "fine", 1)]),
        )
        .unwrap();

        let report = migrate_legacy_with(&layout, LEGACY_EXTENSION).unwrap();

        assert_eq!(report.converted, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, english.join("bad.gw2"));
        assert!(english.join("good.json").exists());
    }

    #[test]
    fn test_backup_dirs_are_created_lazily() {
        let (_dir, layout) = layout_with(&Language::ALL);
        fs::write(
            layout.data_dir(Language::Korean).join("9.gw2"),
            legacy_table_bytes(1, "9.raw", &[]),
        )
        .unwrap();

        assert_eq!(migrate_legacy(layout.root()).unwrap(), 1);

        assert!(layout.backup_dir(Language::Korean).is_dir());
        for language in Language::ALL {
            if language != Language::Korean {
                assert!(!layout.backup_dir(language).exists());
            }
        }
    }

    #[test]
    fn test_rerun_is_a_no_op() {
        let (_dir, layout) = layout_with(&[Language::Spanish]);
        let spanish = layout.data_dir(Language::Spanish);
        fs::write(
            spanish.join("4.gw2"),
            legacy_table_bytes(4, "4.raw", &[(0, "hola", 1)]),
        )
        .unwrap();

        assert_eq!(migrate_legacy(layout.root()).unwrap(), 1);
        let written = fs::read(spanish.join("4.json")).unwrap();

        assert_eq!(migrate_legacy(layout.root()).unwrap(), 0);
        assert_eq!(fs::read(spanish.join("4.json")).unwrap(), written);
    }

    #[test]
    fn test_missing_buckets_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(migrate_legacy(dir.path()).unwrap(), 0);
        assert!(!dir.path().join("backup").exists());
    }

    #[test]
    fn test_other_extensions_are_ignored() {
        let (_dir, layout) = layout_with(&[Language::English]);
        let english = layout.data_dir(Language::English);
        fs::write(english.join("5.json"), "{}").unwrap();
        fs::write(
            english.join("6.old"),
            legacy_table_bytes(0, "6.raw", &[(0, "six", 1)]),
        )
        .unwrap();

        assert_eq!(migrate_legacy(layout.root()).unwrap(), 0);

        let report = migrate_legacy_with(&layout, "old").unwrap();
        assert_eq!(report.converted, 1);
        assert!(english.join("6.json").exists());
    }
}
