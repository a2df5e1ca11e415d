//! Merging a freshly decoded table into its persisted history
//!
//! Rows are matched by number. A row whose text changed gets the new text and
//! the import time; a row whose text is unchanged keeps its old stamp, so
//! `stamp` always means "last actually changed". Rows are never removed.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::formats::strs::{Entry, StringTable};

/// What a merge did to the persisted table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeStats {
    /// Rows not present before
    pub added: usize,
    /// Rows whose value changed
    pub updated: usize,
    /// Rows present with the same value
    pub unchanged: usize,
}

impl MergeStats {
    /// True if the merge altered any entry
    #[must_use]
    pub fn changed(&self) -> bool {
        self.added > 0 || self.updated > 0
    }
}

/// Merge `incoming` into `existing` in place
///
/// `existing` takes `incoming`'s language and source name unconditionally.
/// Entries are visited in `incoming` order; new rows are appended with
/// `timestamp`.
pub fn merge_into(
    existing: &mut StringTable,
    incoming: &StringTable,
    timestamp: DateTime<Utc>,
) -> MergeStats {
    existing.language = incoming.language;
    existing.source_name.clone_from(&incoming.source_name);

    // First occurrence wins if the store somehow holds a row twice
    let mut index: HashMap<u32, usize> = HashMap::with_capacity(existing.items.len());
    for (i, entry) in existing.items.iter().enumerate() {
        index.entry(entry.row).or_insert(i);
    }

    let mut stats = MergeStats::default();
    for entry in &incoming.items {
        match index.get(&entry.row) {
            Some(&i) => {
                let current = &mut existing.items[i];
                if current.value == entry.value {
                    stats.unchanged += 1;
                } else {
                    current.value.clone_from(&entry.value);
                    current.stamp = timestamp;
                    stats.updated += 1;
                }
            }
            None => {
                index.insert(entry.row, existing.items.len());
                existing
                    .items
                    .push(Entry::text(entry.row, entry.value.clone(), timestamp));
                stats.added += 1;
            }
        }
    }

    tracing::debug!(
        "Merged {}: {} added, {} updated, {} unchanged",
        incoming.source_name,
        stats.added,
        stats.updated,
        stats.unchanged
    );
    stats
}

/// Merge `incoming` into an optional persisted table and return the result
///
/// Without an existing table this is a first import: a copy of `incoming`
/// with every entry stamped `timestamp`.
#[must_use]
pub fn merge(
    existing: Option<StringTable>,
    incoming: &StringTable,
    timestamp: DateTime<Utc>,
) -> StringTable {
    match existing {
        Some(mut table) => {
            merge_into(&mut table, incoming, timestamp);
            table
        }
        None => first_import(incoming, timestamp),
    }
}

fn first_import(incoming: &StringTable, timestamp: DateTime<Utc>) -> StringTable {
    let mut table = incoming.clone();
    for entry in &mut table.items {
        entry.stamp = timestamp;
    }
    table
}
