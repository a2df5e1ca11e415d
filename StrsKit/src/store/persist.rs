//! Persisted string table representation
//!
//! Tables are stored as pretty-printed JSON. The current schema carries an
//! explicit `format_version`:
//!
//! ```json
//! {
//!   "format_version": 1,
//!   "language": "French",
//!   "source_name": "102385.strs",
//!   "items": [
//!     { "row": 3, "value": "Bonjour", "stamp": "2021-03-01T11:00:00Z" }
//!   ]
//! }
//! ```
//!
//! Files without `format_version` are read as the unversioned layout written
//! by earlier releases (`Items` / `Language` / `Filename`, entries with
//! `value` / `row` / `type` / `stamp`). They are always written back in the
//! current schema.

use std::collections::HashSet;
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::error::{Error, Result};
use crate::formats::strs::{Entry, Language, StringTable};

/// Schema version written by [`save_table`]
pub const STORE_FORMAT_VERSION: u64 = 1;

/// Extension of persisted tables
pub const STORE_EXTENSION: &str = "json";

/// Entry type code for text in the unversioned layout
const UNVERSIONED_TEXT_TYPE: i64 = 1;

/// What to do when a persisted table repeats a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowPolicy {
    /// Refuse to load the table
    #[default]
    Reject,
    /// Keep the first occurrence of each row and drop the rest
    KeepFirst,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredTable {
    format_version: u64,
    language: Language,
    source_name: String,
    items: Vec<StoredEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    row: u32,
    value: String,
    stamp: DateTime<Utc>,
}

impl From<&StringTable> for StoredTable {
    fn from(table: &StringTable) -> Self {
        Self {
            format_version: STORE_FORMAT_VERSION,
            language: table.language,
            source_name: table.source_name.clone(),
            items: table
                .items
                .iter()
                .map(|e| StoredEntry {
                    row: e.row,
                    value: e.value.clone(),
                    stamp: e.stamp,
                })
                .collect(),
        }
    }
}

impl From<StoredTable> for StringTable {
    fn from(stored: StoredTable) -> Self {
        Self {
            language: stored.language,
            source_name: stored.source_name,
            items: stored
                .items
                .into_iter()
                .map(|e| Entry::text(e.row, e.value, e.stamp))
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UnversionedTable {
    #[serde(rename = "Items", default)]
    items: Vec<UnversionedEntry>,
    #[serde(rename = "Language", default)]
    language: Value,
    #[serde(rename = "Filename", default)]
    filename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UnversionedEntry {
    #[serde(default)]
    value: Option<String>,
    row: i64,
    #[serde(rename = "type", default = "unversioned_text_type")]
    kind: i64,
    #[serde(deserialize_with = "loose_stamp")]
    stamp: DateTime<Utc>,
}

fn unversioned_text_type() -> i64 {
    UNVERSIONED_TEXT_TYPE
}

/// RFC 3339, or a bare local-less timestamp which is taken as UTC
fn loose_stamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|stamp| stamp.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f").map(|naive| naive.and_utc())
        })
        .map_err(|_| serde::de::Error::custom(format!("invalid timestamp '{raw}'")))
}

impl UnversionedTable {
    fn into_table(self) -> Result<StringTable> {
        let language = match &self.language {
            Value::Null => Language::default(),
            Value::Number(n) => Language::try_from(n.as_i64().unwrap_or(-1))?,
            Value::String(s) => s
                .parse()
                .map_err(|_| Error::InvalidFormat(format!("unknown language '{s}'")))?,
            other => return Err(Error::InvalidFormat(format!("unknown language {other}"))),
        };

        let mut table = StringTable::new(language, self.filename.unwrap_or_default());
        for entry in self.items {
            if entry.kind != UNVERSIONED_TEXT_TYPE {
                continue;
            }
            let row = u32::try_from(entry.row)
                .map_err(|_| Error::InvalidFormat(format!("invalid row {}", entry.row)))?;
            table
                .items
                .push(Entry::text(row, entry.value.unwrap_or_default(), entry.stamp));
        }
        Ok(table)
    }
}

/// Load a persisted table, rejecting duplicate rows
///
/// # Errors
/// Returns [`Error::Io`] if the file cannot be read (including when it does not
/// exist), a JSON or format error if it cannot be parsed, and
/// [`Error::DuplicateRow`] if a row appears twice.
///
/// [`Error::Io`]: crate::Error::Io
pub fn load_table<P: AsRef<Path>>(path: P) -> Result<StringTable> {
    load_table_with(path, RowPolicy::Reject)
}

/// Load a persisted table with an explicit duplicate-row policy
///
/// # Errors
/// See [`load_table`]. With [`RowPolicy::KeepFirst`] duplicates are dropped
/// instead of reported.
pub fn load_table_with<P: AsRef<Path>>(path: P, policy: RowPolicy) -> Result<StringTable> {
    let path = path.as_ref();
    let json = fs::read_to_string(path)?;
    parse_table_json(&json, policy, path)
}

/// Load a persisted table if it exists
///
/// A missing file means the table has never been imported and yields `None`;
/// any other failure is an error, so a damaged store is never mistaken for an
/// absent one.
///
/// # Errors
/// See [`load_table`].
pub fn load_existing<P: AsRef<Path>>(path: P) -> Result<Option<StringTable>> {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(json) => parse_table_json(&json, RowPolicy::Reject, path).map(Some),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Save a table in the current schema
///
/// The file is written to a temporary sibling and renamed over `path`, so
/// readers see either the old or the new content. Parent directories are
/// created as needed.
///
/// # Errors
/// Returns an error if serialization or any file operation fails.
pub fn save_table<P: AsRef<Path>>(table: &StringTable, path: P) -> Result<()> {
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut temp = NamedTempFile::new_in(parent)?;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, &StoredTable::from(table))?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    temp.as_file().sync_all()?;
    temp.persist(path)?;

    tracing::debug!("Saved {} rows to {}", table.len(), path.display());
    Ok(())
}

fn parse_table_json(json: &str, policy: RowPolicy, path: &Path) -> Result<StringTable> {
    let value: Value = serde_json::from_str(json)?;

    let version = value
        .get("format_version")
        .map(|version| {
            version.as_u64().ok_or_else(|| {
                Error::InvalidFormat(format!("format_version {version} is not a number"))
            })
        })
        .transpose()?;
    let unversioned = value.get("Items").is_some();

    let table: StringTable = match version {
        Some(STORE_FORMAT_VERSION) => serde_json::from_value::<StoredTable>(value)?.into(),
        Some(version) => return Err(Error::UnsupportedStoreVersion { version }),
        None if unversioned => {
            tracing::debug!("Reading unversioned store {}", path.display());
            serde_json::from_value::<UnversionedTable>(value)?.into_table()?
        }
        None => {
            return Err(Error::InvalidFormat(format!(
                "{} is not a string table store",
                path.display()
            )));
        }
    };

    enforce_unique_rows(table, policy, path)
}

pub(crate) fn enforce_unique_rows(
    mut table: StringTable,
    policy: RowPolicy,
    path: &Path,
) -> Result<StringTable> {
    let mut seen = HashSet::with_capacity(table.items.len());
    match policy {
        RowPolicy::Reject => {
            if let Some(dup) = table.items.iter().find(|e| !seen.insert(e.row)) {
                return Err(Error::DuplicateRow {
                    row: dup.row,
                    path: path.to_path_buf(),
                });
            }
        }
        RowPolicy::KeepFirst => {
            let before = table.items.len();
            table.items.retain(|e| seen.insert(e.row));
            let dropped = before - table.items.len();
            if dropped > 0 {
                tracing::warn!(
                    "Dropped {dropped} duplicate rows from {}",
                    path.display()
                );
            }
        }
    }
    Ok(table)
}
