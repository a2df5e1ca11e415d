//! File format handlers
//!
//! - [`strs`]: the binary string tables found in the game archives
//! - [`nrbf`]: the .NET binary serialization used by the legacy store

pub mod nrbf;
pub mod strs;

// Re-export main types
pub use nrbf::{ObjectGraph, parse_nrbf_bytes, read_nrbf};
pub use strs::{
    Entry, EntryKind, Language, StringTable, decode, parse_strs_bytes, read_strs, to_strs_bytes,
    write_strs,
};
