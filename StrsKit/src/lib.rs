//! # StrsKit
//!
//! A pure-Rust library for tracking the history of Guild Wars 2 string tables.
//!
//! Raw `strs` tables extracted from the game archives are decoded, merged
//! into a per-table history on disk, and stamped with the time each row last
//! changed. Re-importing the same table is a no-op; rows that disappear
//! upstream are kept.
//!
//! ## Quick Start
//!
//! ### Importing a table
//!
//! ```no_run
//! use chrono::Utc;
//! use strskit::import::import_file;
//! use strskit::store::{StoreLayout, TableLocks};
//!
//! let layout = StoreLayout::new("strings/");
//! let locks = TableLocks::new();
//! let outcome = import_file(&layout, &locks, "102385.strs", Utc::now())?;
//! println!("{outcome:?}");
//! # Ok::<(), strskit::Error>(())
//! ```
//!
//! ### Decoding and merging by hand
//!
//! ```
//! use chrono::Utc;
//! use strskit::prelude::*;
//!
//! let mut data = b"strs".to_vec();
//! data.extend_from_slice(&[0x0A, 0x00, 0x00, 0x00, 0x10, 0x00]);
//! data.extend_from_slice(&[b'H', 0, b'i', 0]);
//! data.extend_from_slice(&[0x00, 0x00]);
//!
//! let incoming = decode(&data);
//! assert_eq!(incoming.items[0].value, "Hi");
//!
//! let merged = merge(None, &incoming, Utc::now());
//! assert_eq!(merged.language, Language::English);
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` - Enables the `strskit` command-line binary

pub mod config;
pub mod error;
pub mod formats;
pub mod import;
pub mod merge;
pub mod migrate;
pub mod store;

// Re-exports for convenience
pub use error::{Error, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::formats::strs::{
        Entry, EntryKind, Language, StringTable, decode, parse_strs_bytes, read_strs,
        to_strs_bytes, write_strs,
    };
    pub use crate::import::{
        BatchImportResult, ImportOptions, ImportOutcome, ImportProgress, import_batch,
        import_file, import_table,
    };
    pub use crate::merge::{MergeStats, merge, merge_into};
    pub use crate::migrate::{MigrationReport, migrate_legacy, migrate_legacy_with};
    pub use crate::store::{
        RowPolicy, StoreLayout, TableKey, TableLocks, load_existing, load_table, load_table_with,
        save_table,
    };
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// CLI module (feature-gated)
#[cfg(feature = "cli")]
pub mod cli;
