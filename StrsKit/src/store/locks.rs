//! Per-table mutual exclusion

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use crate::formats::strs::Language;

/// Identity of a persisted table
///
/// Source names that share a stem map to the same file, so the key holds the
/// stem rather than the full name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableKey {
    pub language: Language,
    pub stem: String,
}

impl TableKey {
    pub fn new(language: Language, source_name: &str) -> Self {
        let stem = Path::new(source_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(source_name);
        Self {
            language,
            stem: stem.to_string(),
        }
    }
}

/// Lock table owned by the caller of an import
///
/// Holds one mutex per table key. Work on different tables proceeds in
/// parallel; work on the same table is serialized. A key's mutex is dropped
/// once no caller holds or waits for it.
#[derive(Debug, Default)]
pub struct TableLocks {
    slots: Mutex<HashMap<TableKey, Arc<Mutex<()>>>>,
}

impl TableLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `key`
    pub fn with_table<R>(&self, key: &TableKey, f: impl FnOnce() -> R) -> R {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(key.clone()).or_default())
        };
        let result = {
            let _guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };

        // Clones are only taken under `slots`, so the count is stable here
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if Arc::strong_count(&slot) == 2 {
            slots.remove(key);
        }
        result
    }

    /// Number of tables currently locked or waited on
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
