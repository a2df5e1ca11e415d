//! Importing raw string tables into the store
//!
//! One import is a read-modify-write cycle on a single persisted table:
//! decode the raw file, load the table's history, merge, and save. The cycle
//! runs under that table's lock, so imports of different tables run in
//! parallel and imports of the same table never interleave.

mod batch;

pub use batch::{BatchImportResult, ImportOptions, ImportProgress, import_batch};

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::formats::strs::{StringTable, read_strs};
use crate::merge::{MergeStats, merge_into};
use crate::store::{StoreLayout, TableKey, TableLocks, load_existing, save_table};

/// Result of importing one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// The file decoded to no text rows; nothing was written
    Skipped,
    /// The file was merged into its persisted table
    Merged {
        /// The persisted table
        table: PathBuf,
        /// Whether this was the table's first import
        created: bool,
        stats: MergeStats,
    },
}

/// Decode a raw table file and merge it into the store
///
/// # Errors
/// Returns an error if the file cannot be read, if the existing persisted
/// table cannot be parsed, or if the merged table cannot be saved. A damaged
/// persisted table is never overwritten.
pub fn import_file<P: AsRef<Path>>(
    layout: &StoreLayout,
    locks: &TableLocks,
    path: P,
    timestamp: DateTime<Utc>,
) -> Result<ImportOutcome> {
    let incoming = read_strs(path.as_ref(), timestamp)?;
    import_table(layout, locks, &incoming, timestamp)
}

/// Merge an already decoded table into the store
///
/// # Errors
/// See [`import_file`].
pub fn import_table(
    layout: &StoreLayout,
    locks: &TableLocks,
    incoming: &StringTable,
    timestamp: DateTime<Utc>,
) -> Result<ImportOutcome> {
    if incoming.is_empty() {
        tracing::debug!("Skipping {}: no text rows", incoming.source_name);
        return Ok(ImportOutcome::Skipped);
    }

    let target = layout.table_path(incoming.language, &incoming.source_name)?;
    let key = TableKey::new(incoming.language, &incoming.source_name);

    locks.with_table(&key, move || -> Result<ImportOutcome> {
        let (table, created, stats, dirty) = match load_existing(&target)? {
            Some(mut table) => {
                let metadata_changed = table.source_name != incoming.source_name
                    || table.language != incoming.language;
                let stats = merge_into(&mut table, incoming, timestamp);
                let dirty = stats.changed() || metadata_changed;
                (table, false, stats, dirty)
            }
            None => {
                let mut table = StringTable::new(incoming.language, incoming.source_name.clone());
                let stats = merge_into(&mut table, incoming, timestamp);
                (table, true, stats, true)
            }
        };

        if dirty {
            save_table(&table, &target)?;
        }

        tracing::info!(
            "Imported {} ({}): {} added, {} updated, {} unchanged",
            incoming.source_name,
            incoming.language,
            stats.added,
            stats.updated,
            stats.unchanged
        );

        Ok(ImportOutcome::Merged {
            table: target,
            created,
            stats,
        })
    })
}
