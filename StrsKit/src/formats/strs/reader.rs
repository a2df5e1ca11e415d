//! `strs` table decoding
//!
//! The reader is permissive: anything that does not look like a string table
//! (wrong signature, unknown language code, too short) decodes to an empty
//! table rather than an error, and a block running past the end of the data
//! stops decoding with whatever was read so far.

use std::fs;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};
use chrono::{DateTime, Utc};

use super::{
    BLOCK_HEADER_SIZE, Entry, Language, STRS_SIGNATURE, StringTable, TEXT_BLOCK_TYPE, TRAILER_SIZE,
};
use crate::error::Result;

/// Read a raw string table from disk
///
/// `source_name` is set to the file name, and every decoded entry is stamped
/// with `stamp`.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be read. Malformed content is not
/// an error and yields an empty table.
///
/// [`Error::Io`]: crate::Error::Io
pub fn read_strs<P: AsRef<Path>>(path: P, stamp: DateTime<Utc>) -> Result<StringTable> {
    let path = path.as_ref();
    let buffer = fs::read(path)?;
    let mut table = parse_strs_bytes(&buffer, stamp);
    table.source_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(table)
}

/// Decode a string table, stamping entries with the current time
pub fn decode(data: &[u8]) -> StringTable {
    parse_strs_bytes(data, Utc::now())
}

/// Decode a string table from bytes
///
/// Only text blocks are kept; their `row` is the index of the block among all
/// blocks scanned.
pub fn parse_strs_bytes(data: &[u8], stamp: DateTime<Utc>) -> StringTable {
    let mut table = StringTable::default();

    if data.len() < STRS_SIGNATURE.len() + TRAILER_SIZE || data[..4] != STRS_SIGNATURE {
        tracing::debug!("Not a strs table ({} bytes)", data.len());
        return table;
    }

    // Language code sits in the first trailer byte
    let end = data.len() - TRAILER_SIZE;
    let Some(language) = Language::from_code(data[end]) else {
        tracing::debug!("Not a strs table: language code {}", data[end]);
        return table;
    };
    table.language = language;

    let mut position = STRS_SIGNATURE.len();
    let mut row: u32 = 0;

    while position < end {
        if end - position < BLOCK_HEADER_SIZE {
            tracing::debug!("Truncated block header at offset {position}");
            break;
        }

        // Bytes 0-1: block length including header, byte 4: type code
        let header = &data[position..position + BLOCK_HEADER_SIZE];
        position += BLOCK_HEADER_SIZE;
        let block_len = LittleEndian::read_u16(&header[0..2]) as usize;

        if block_len > BLOCK_HEADER_SIZE {
            let payload_size = block_len - BLOCK_HEADER_SIZE;
            if end - position < payload_size {
                tracing::debug!(
                    "Block {row} claims {payload_size} bytes at offset {position}, past end of table"
                );
                break;
            }

            if header[4] == TEXT_BLOCK_TYPE {
                let text = decode_utf16(&data[position..position + payload_size]);
                table.items.push(Entry::text(row, text, stamp));
            }
            position += payload_size;
        }

        row += 1;
    }

    tracing::debug!(
        "Decoded {} text rows of {row} blocks ({})",
        table.items.len(),
        table.language
    );
    table
}

/// Decode little-endian UTF-16; bad surrogates and an odd trailing byte become U+FFFD
fn decode_utf16(payload: &[u8]) -> String {
    let units = payload.chunks_exact(2).map(LittleEndian::read_u16);
    let mut text: String = char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect();
    if payload.len() % 2 == 1 {
        text.push(char::REPLACEMENT_CHARACTER);
    }
    text
}
