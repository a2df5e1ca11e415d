//! `strs` table writing
//!
//! Rows missing from the table are written as empty blocks so that every
//! entry decodes back to its original row.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};

use super::{BLOCK_HEADER_SIZE, STRS_SIGNATURE, StringTable, TEXT_BLOCK_TYPE};
use crate::error::{Error, Result};

/// Write a string table to disk in `strs` layout
///
/// # Errors
/// Returns an error if an entry is too long to encode or file writing fails.
pub fn write_strs<P: AsRef<Path>>(path: P, table: &StringTable) -> Result<()> {
    let bytes = to_strs_bytes(table)?;
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Encode a string table in `strs` layout
///
/// An empty value has no payload, so it encodes as an empty block and does
/// not survive decoding.
///
/// # Errors
/// Returns [`Error::EntryTooLong`] if a value's UTF-16 payload does not fit a
/// 16-bit block length.
pub fn to_strs_bytes(table: &StringTable) -> Result<Vec<u8>> {
    let mut rows: Vec<_> = table.items.iter().collect();
    rows.sort_by_key(|e| e.row);

    let mut out = Vec::with_capacity(16 + rows.iter().map(|e| e.value.len() * 2 + 6).sum::<usize>());
    out.extend_from_slice(&STRS_SIGNATURE);

    let mut next_row = 0u32;
    for entry in rows {
        if entry.row < next_row {
            // Duplicate row; the first one already owns this block
            continue;
        }
        while next_row < entry.row {
            write_block_header(&mut out, BLOCK_HEADER_SIZE as u16, 0)?;
            next_row += 1;
        }

        let payload: Vec<u8> = entry
            .value
            .encode_utf16()
            .flat_map(u16::to_le_bytes)
            .collect();
        let block_len = u16::try_from(payload.len() + BLOCK_HEADER_SIZE).map_err(|_| {
            Error::EntryTooLong {
                row: entry.row,
                bytes: payload.len(),
            }
        })?;
        write_block_header(&mut out, block_len, TEXT_BLOCK_TYPE)?;
        out.extend_from_slice(&payload);
        next_row += 1;
    }

    // Trailer: language code + unused byte
    out.write_u8(table.language.code())?;
    out.write_u8(0)?;
    Ok(out)
}

fn write_block_header(out: &mut Vec<u8>, block_len: u16, type_code: u8) -> Result<()> {
    out.write_u16::<LittleEndian>(block_len)?;
    out.write_u16::<LittleEndian>(0)?;
    out.write_u8(type_code)?;
    out.write_u8(0)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::strs::{Entry, Language, parse_strs_bytes};
    use chrono::{DateTime, Utc};

    fn stamp() -> DateTime<Utc> {
        DateTime::from_timestamp(1_600_000_000, 0).unwrap()
    }

    #[test]
    fn test_gaps_become_empty_blocks() {
        let mut table = StringTable::new(Language::German, "1.strs");
        table.items.push(Entry::text(2, "Hallo", stamp()));
        table.items.push(Entry::text(0, "Welt", stamp()));

        let bytes = to_strs_bytes(&table).unwrap();
        assert_eq!(&bytes[..4], b"strs");
        // Row 1 is an empty header
        let row1 = 4 + BLOCK_HEADER_SIZE + 8;
        assert_eq!(&bytes[row1..row1 + 6], &[6, 0, 0, 0, 0, 0]);
        assert_eq!(&bytes[bytes.len() - 2..], &[3, 0]);

        let decoded = parse_strs_bytes(&bytes, stamp());
        assert_eq!(decoded.language, Language::German);
        assert_eq!(decoded.get(0).unwrap().value, "Welt");
        assert_eq!(decoded.get(2).unwrap().value, "Hallo");
        assert!(decoded.get(1).is_none());
    }

    #[test]
    fn test_entry_too_long() {
        let mut table = StringTable::new(Language::English, "big.strs");
        table.items.push(Entry::text(0, "x".repeat(40_000), stamp()));

        assert!(matches!(
            to_strs_bytes(&table),
            Err(Error::EntryTooLong { row: 0, bytes: 80_000 })
        ));
    }
}
