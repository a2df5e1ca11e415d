//! Legacy `.gw2` tables
//!
//! A legacy table is a `BinaryFormatter` graph rooted at a class with three
//! fields: `Items` (a generic list of entries), `Language` (a boxed enum) and
//! `Filename`. Each entry has `value`, `row`, `type` and `stamp`. Only the
//! field names matter here; type and assembly names are ignored.

use std::path::Path;

use crate::error::{Error, Result};
use crate::formats::nrbf::{ClassObject, NrbfObject, NrbfValue, ObjectGraph, parse_nrbf_bytes, read_nrbf};
use crate::formats::strs::{Entry, Language, StringTable};

/// Entry type code of text rows
const LEGACY_TEXT_TYPE: i64 = 1;

/// Read a legacy table file
///
/// # Errors
/// Returns an error if the file cannot be read, is not a valid NRBF stream,
/// or does not have the expected fields.
pub fn read_legacy_table<P: AsRef<Path>>(path: P) -> Result<StringTable> {
    table_from_graph(&read_nrbf(path)?)
}

/// Parse a legacy table from bytes
///
/// # Errors
/// See [`read_legacy_table`].
pub fn parse_legacy_bytes(data: &[u8]) -> Result<StringTable> {
    table_from_graph(&parse_nrbf_bytes(data)?)
}

fn table_from_graph(graph: &ObjectGraph) -> Result<StringTable> {
    let root = match graph.root() {
        Some(NrbfObject::Class(class)) => class,
        _ => return Err(field_error("root", "not a class instance")),
    };

    let language_code = graph
        .as_int(member(root, "Language")?)
        .ok_or_else(|| field_error("Language", "not an integer"))?;
    let language = Language::try_from(language_code)?;

    let source_name = match member(root, "Filename")? {
        NrbfValue::Null => String::new(),
        value => graph
            .as_str(value)
            .ok_or_else(|| field_error("Filename", "not a string"))?
            .to_string(),
    };

    let mut table = StringTable::new(language, source_name);
    for value in list_items(graph, member(root, "Items")?)? {
        let Some(entry) = graph.as_class(value) else {
            if *value == NrbfValue::Null {
                continue;
            }
            return Err(field_error("Items", "element is not an entry"));
        };
        if let Some(entry) = read_entry(graph, entry)? {
            table.items.push(entry);
        }
    }
    Ok(table)
}

/// Elements of `Items`, which is a `List<T>` (backing array plus size) or a bare array
fn list_items<'a>(graph: &'a ObjectGraph, items: &'a NrbfValue) -> Result<&'a [NrbfValue]> {
    if *items == NrbfValue::Null {
        return Ok(&[]);
    }
    if let Some(array) = graph.as_array(items) {
        return Ok(array);
    }

    let list = graph
        .as_class(items)
        .ok_or_else(|| field_error("Items", "not a list"))?;
    let array = graph
        .as_array(member(list, "_items")?)
        .ok_or_else(|| field_error("Items", "list has no backing array"))?;
    let size = graph
        .as_int(member(list, "_size")?)
        .and_then(|size| usize::try_from(size).ok())
        .ok_or_else(|| field_error("Items", "list size is not a count"))?;
    if size > array.len() {
        return Err(field_error(
            "Items",
            format!("list size {size} exceeds capacity {}", array.len()),
        ));
    }
    Ok(&array[..size])
}

fn read_entry(graph: &ObjectGraph, entry: &ClassObject) -> Result<Option<Entry>> {
    let kind = graph
        .as_int(member(entry, "type")?)
        .ok_or_else(|| field_error("type", "not an integer"))?;
    if kind != LEGACY_TEXT_TYPE {
        return Ok(None);
    }

    let row = graph
        .as_int(member(entry, "row")?)
        .and_then(|row| u32::try_from(row).ok())
        .ok_or_else(|| field_error("row", "not a row number"))?;
    let value = match member(entry, "value")? {
        NrbfValue::Null => String::new(),
        value => graph
            .as_str(value)
            .ok_or_else(|| field_error("value", "not a string"))?
            .to_string(),
    };
    let stamp = graph
        .as_datetime(member(entry, "stamp")?)
        .ok_or_else(|| field_error("stamp", "not a date"))?;

    Ok(Some(Entry::text(row, value, stamp)))
}

fn member<'a>(class: &'a ClassObject, field: &'static str) -> Result<&'a NrbfValue> {
    class
        .field(field)
        .ok_or_else(|| field_error(field, format!("missing from {}", class.name)))
}

fn field_error(field: &'static str, message: impl Into<String>) -> Error {
    Error::LegacyField {
        field,
        message: message.into(),
    }
}
