//! `strs` string table format
//!
//! Binary localization tables extracted from the Guild Wars 2 archives
//! (`Gw2.dat` / `Local.dat`). A table is a `strs` signature, a run of
//! variable-length blocks, and a two-byte trailer whose first byte is the
//! language code.
//!
//! Only UTF-16 text blocks are kept when decoding. Every block, kept or not,
//! advances the row counter, so the rows of a decoded table have gaps.

mod reader;
mod writer;

pub use reader::{decode, parse_strs_bytes, read_strs};
pub use writer::{to_strs_bytes, write_strs};

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// "strs" magic signature
pub const STRS_SIGNATURE: [u8; 4] = *b"strs";

/// Size of each block header (length u16, two unused bytes, type code, one unused byte)
pub const BLOCK_HEADER_SIZE: usize = 6;

/// Block type code for UTF-16 text payloads
pub const TEXT_BLOCK_TYPE: u8 = 16;

/// Size of the trailer (language code + one unused byte)
pub const TRAILER_SIZE: usize = 2;

/// Game client language of a string table
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum Language {
    #[default]
    English = 0,
    Korean = 1,
    French = 2,
    German = 3,
    Spanish = 4,
    Chinese = 5,
}

impl Language {
    /// All languages in code order
    pub const ALL: [Language; 6] = [
        Language::English,
        Language::Korean,
        Language::French,
        Language::German,
        Language::Spanish,
        Language::Chinese,
    ];

    /// Map a raw language code to a language, if it is one of the six known codes
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    #[must_use]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Name used for directory buckets and the persisted store
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Korean => "Korean",
            Language::French => "French",
            Language::German => "German",
            Language::Spanish => "Spanish",
            Language::Chinese => "Chinese",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<i64> for Language {
    type Error = Error;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        u8::try_from(code)
            .ok()
            .and_then(Language::from_code)
            .ok_or(Error::InvalidLanguage(code))
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(code) = s.parse::<i64>() {
            return Language::try_from(code).map_err(|e| e.to_string());
        }
        Language::ALL
            .into_iter()
            .find(|lang| lang.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                format!(
                    "Invalid language '{s}'. Valid values: English, Korean, French, German, Spanish, Chinese (or 0-5)"
                )
            })
    }
}

/// Kind of block an entry was decoded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryKind {
    /// Zero or negative payload size
    #[default]
    Empty,
    /// UTF-16 text payload
    Text,
    /// Any other payload, left uninterpreted
    Opaque,
}

/// A single row of a string table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Zero-based block position in the source table; the merge key
    pub row: u32,
    /// The text content
    pub value: String,
    pub kind: EntryKind,
    /// When this row's value last changed
    pub stamp: DateTime<Utc>,
}

impl Entry {
    /// Create a text entry
    pub fn text(row: u32, value: impl Into<String>, stamp: DateTime<Utc>) -> Self {
        Self {
            row,
            value: value.into(),
            kind: EntryKind::Text,
            stamp,
        }
    }
}

/// A decoded or persisted string table
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StringTable {
    pub language: Language,
    /// File name of the table this was decoded from; joins imports across runs
    pub source_name: String,
    pub items: Vec<Entry>,
}

impl StringTable {
    pub fn new(language: Language, source_name: impl Into<String>) -> Self {
        Self {
            language,
            source_name: source_name.into(),
            items: Vec::new(),
        }
    }

    /// Get the number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get an entry by row
    #[must_use]
    pub fn get(&self, row: u32) -> Option<&Entry> {
        self.items.iter().find(|e| e.row == row)
    }

    /// Source name without its extension, used for file names and display keys
    #[must_use]
    pub fn stem(&self) -> &str {
        Path::new(&self.source_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.source_name)
    }

    /// Display key of a row: `<stem>_<row>`, row zero-padded to four digits
    #[must_use]
    pub fn row_key(&self, row: u32) -> String {
        format!("{}_{row:04}", self.stem())
    }
}
