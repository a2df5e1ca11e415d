//! NRBF stream builder for tests

use chrono::{DateTime, Utc};

use super::graph::datetime_to_raw;
use super::record;

/// Library id used for the legacy table types
const LIBRARY_ID: i32 = 2;

/// Stamp written on every entry of [`legacy_table_bytes`]
pub(crate) fn fixture_stamp() -> DateTime<Utc> {
    DateTime::from_timestamp(1_398_938_400, 0).unwrap()
}

/// Member type for [`NrbfWriter::class_with_types`]
pub(crate) enum Kind<'a> {
    Prim(u8),
    Str,
    Object,
    SystemClass(&'a str),
    Class(&'a str, i32),
}

pub(crate) struct NrbfWriter {
    pub buf: Vec<u8>,
}

impl NrbfWriter {
    /// Start a stream with a version 1.0 header
    pub fn new(root_id: i32) -> Self {
        let mut w = Self { buf: Vec::new() };
        w.u8(record::SERIALIZED_STREAM_HEADER);
        w.i32(root_id);
        w.i32(-1);
        w.i32(1);
        w.i32(0);
        w
    }

    pub fn u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// `LengthPrefixedString`
    pub fn string(&mut self, value: &str) {
        let mut len = value.len();
        loop {
            let byte = (len & 0x7F) as u8;
            len >>= 7;
            if len == 0 {
                self.u8(byte);
                break;
            }
            self.u8(byte | 0x80);
        }
        self.raw(value.as_bytes());
    }

    pub fn library(&mut self, id: i32, name: &str) {
        self.u8(record::BINARY_LIBRARY);
        self.i32(id);
        self.string(name);
    }

    /// Class record with member type info; `library` selects the user-class variant.
    /// Member values follow.
    pub fn class_with_types(
        &mut self,
        id: i32,
        name: &str,
        members: &[(&str, Kind)],
        library: Option<i32>,
    ) {
        self.u8(if library.is_some() {
            record::CLASS_WITH_MEMBERS_AND_TYPES
        } else {
            record::SYSTEM_CLASS_WITH_MEMBERS_AND_TYPES
        });
        self.i32(id);
        self.string(name);
        self.i32(members.len() as i32);
        for (member, _) in members {
            self.string(member);
        }
        for (_, kind) in members {
            self.u8(match kind {
                Kind::Prim(_) => 0,
                Kind::Str => 1,
                Kind::Object => 2,
                Kind::SystemClass(_) => 3,
                Kind::Class(..) => 4,
            });
        }
        for (_, kind) in members {
            match kind {
                Kind::Prim(code) => self.u8(*code),
                Kind::SystemClass(type_name) => self.string(type_name),
                Kind::Class(type_name, lib) => {
                    self.string(type_name);
                    self.i32(*lib);
                }
                Kind::Str | Kind::Object => {}
            }
        }
        if let Some(lib) = library {
            self.i32(lib);
        }
    }

    pub fn class_with_id(&mut self, id: i32, metadata_id: i32) {
        self.u8(record::CLASS_WITH_ID);
        self.i32(id);
        self.i32(metadata_id);
    }

    pub fn object_string(&mut self, id: i32, value: &str) {
        self.u8(record::BINARY_OBJECT_STRING);
        self.i32(id);
        self.string(value);
    }

    pub fn reference(&mut self, id: i32) {
        self.u8(record::MEMBER_REFERENCE);
        self.i32(id);
    }

    pub fn nulls(&mut self, count: u8) {
        self.u8(record::OBJECT_NULL_MULTIPLE_256);
        self.u8(count);
    }

    pub fn array_single_primitive(&mut self, id: i32, primitive: u8, len: i32, raw: &[u8]) {
        self.u8(record::ARRAY_SINGLE_PRIMITIVE);
        self.i32(id);
        self.i32(len);
        self.u8(primitive);
        self.raw(raw);
    }

    /// Single-dimension `BinaryArray` of a user class
    pub fn class_array(&mut self, id: i32, len: i32, element_type: &str, library: i32) {
        self.u8(record::BINARY_ARRAY);
        self.i32(id);
        self.u8(0);
        self.i32(1);
        self.i32(len);
        self.u8(4);
        self.string(element_type);
        self.i32(library);
    }

    /// Append `MessageEnd` and return the stream
    pub fn finish(mut self) -> Vec<u8> {
        self.u8(record::MESSAGE_END);
        self.buf
    }
}

/// A `BinaryFormatter` stream of a legacy string-history file
///
/// Laid out the way the formatter writes it: the root table, its boxed
/// language enum inline, the generic list and its backing array, then each
/// entry as a top-level record (the first with full metadata, the rest
/// `ClassWithId`). Entries are `(row, value, type)`.
pub(crate) fn legacy_table_bytes(language: i32, filename: &str, entries: &[(i32, &str, i32)]) -> Vec<u8> {
    let list_type = "System.Collections.Generic.List`1[[StringHistory.Entry, StringHistory]]";
    let capacity = entries.len().max(4).next_power_of_two() as i32;
    let stamp = datetime_to_raw(fixture_stamp());

    let mut w = NrbfWriter::new(1);
    w.library(LIBRARY_ID, "StringHistory, Version=1.0.0.0, Culture=neutral, PublicKeyToken=null");

    w.class_with_types(
        1,
        "StringHistory.StringFile",
        &[
            ("Items", Kind::SystemClass(list_type)),
            ("Language", Kind::Class("StringHistory.Language", LIBRARY_ID)),
            ("Filename", Kind::Str),
        ],
        Some(LIBRARY_ID),
    );
    w.reference(3);
    w.class_with_types(
        -4,
        "StringHistory.Language",
        &[("value__", Kind::Prim(8))],
        Some(LIBRARY_ID),
    );
    w.i32(language);
    w.object_string(5, filename);

    w.class_with_types(
        3,
        list_type,
        &[
            ("_items", Kind::Class("StringHistory.Entry[]", LIBRARY_ID)),
            ("_size", Kind::Prim(8)),
            ("_version", Kind::Prim(8)),
        ],
        None,
    );
    w.reference(6);
    w.i32(entries.len() as i32);
    w.i32(entries.len() as i32);

    let first_entry = 7;
    w.class_array(6, capacity, "StringHistory.Entry", LIBRARY_ID);
    for i in 0..entries.len() {
        w.reference(first_entry + i as i32);
    }
    let padding = capacity as usize - entries.len();
    if padding > 0 {
        w.nulls(padding as u8);
    }

    let mut next_id = first_entry + entries.len() as i32;
    let mut first_kind = None;
    for (i, (row, value, kind)) in entries.iter().enumerate() {
        let entry_id = first_entry + i as i32;
        if i == 0 {
            w.class_with_types(
                entry_id,
                "StringHistory.Entry",
                &[
                    ("value", Kind::Str),
                    ("row", Kind::Prim(8)),
                    ("type", Kind::Class("StringHistory.EntryType", LIBRARY_ID)),
                    ("stamp", Kind::Prim(13)),
                ],
                Some(LIBRARY_ID),
            );
        } else {
            w.class_with_id(entry_id, first_entry);
        }

        w.object_string(next_id, value);
        next_id += 1;
        w.i32(*row);

        let kind_id = -next_id;
        next_id += 1;
        match first_kind {
            None => {
                w.class_with_types(
                    kind_id,
                    "StringHistory.EntryType",
                    &[("value__", Kind::Prim(8))],
                    Some(LIBRARY_ID),
                );
                first_kind = Some(kind_id);
            }
            Some(metadata_id) => w.class_with_id(kind_id, metadata_id),
        }
        w.i32(*kind);
        w.i64(stamp);
    }

    w.finish()
}
