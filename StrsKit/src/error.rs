//! Error types for `StrsKit`

use std::path::PathBuf;

use thiserror::Error;

/// The error type for `StrsKit` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ==================== String Table Errors ====================
    /// A language code outside the six known languages.
    #[error("invalid language code: {0}")]
    InvalidLanguage(i64),

    /// An entry's text does not fit the 16-bit block length of a strs table.
    #[error("row {row} is too long to encode ({bytes} payload bytes)")]
    EntryTooLong {
        /// The row that could not be encoded.
        row: u32,
        /// Size of the UTF-16 payload in bytes.
        bytes: usize,
    },

    // ==================== Store Errors ====================
    /// The persisted table declares a schema version this build cannot read.
    #[error("unsupported store format version {version}")]
    UnsupportedStoreVersion {
        /// The declared `format_version`.
        version: u64,
    },

    /// The persisted table contains the same row more than once.
    #[error("duplicate row {row} in {path}")]
    DuplicateRow {
        /// The repeated row.
        row: u32,
        /// File the table was loaded from.
        path: PathBuf,
    },

    // ==================== Import Errors ====================
    /// The worker pool for a batch import could not be started.
    #[error("failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    // ==================== Legacy (NRBF) Errors ====================
    /// The stream does not start with an NRBF serialization header.
    #[error("invalid NRBF header: {0}")]
    InvalidNrbfHeader(String),

    /// A record type this reader does not understand.
    #[error("unsupported NRBF record type {0}")]
    UnsupportedNrbfRecord(u8),

    /// A primitive type code this reader does not understand.
    #[error("unsupported NRBF primitive type {0}")]
    UnsupportedNrbfPrimitive(u8),

    /// A `ClassWithId` record points at metadata that was never defined.
    #[error("NRBF metadata {0} referenced before definition")]
    MissingNrbfMetadata(i32),

    /// Nested records exceed the supported depth.
    #[error("NRBF object graph nested too deeply")]
    NrbfTooDeep,

    /// The object graph parsed, but does not have the shape of a legacy table.
    #[error("legacy table field `{field}`: {message}")]
    LegacyField {
        /// The field that was missing or malformed.
        field: &'static str,
        /// What was wrong with it.
        message: String,
    },

    // ==================== Parsing Errors ====================
    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// UTF-8 conversion error.
    #[error("UTF-8 conversion error: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),

    // ==================== File System Errors ====================
    /// Invalid file path.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Directory traversal error.
    #[error("directory walk error: {0}")]
    WalkDirError(String),

    /// Unexpected end of file.
    #[error("unexpected end of file")]
    UnexpectedEof,

    /// Invalid format error (use specific variants when possible).
    #[error("invalid format: {0}")]
    InvalidFormat(String),
}

// Add conversion from walkdir::Error
impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        Error::WalkDirError(err.to_string())
    }
}

// A failed atomic rename hands the temp file back; only the IO cause matters here
impl From<tempfile::PersistError> for Error {
    fn from(err: tempfile::PersistError) -> Self {
        Error::Io(err.error)
    }
}

/// A specialized Result type for `StrsKit` operations.
pub type Result<T> = std::result::Result<T, Error>;
