//! NRBF stream parsing

use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;
use std::rc::Rc;

use byteorder::{LittleEndian, ReadBytesExt};

use super::graph::{ClassObject, NrbfObject, NrbfValue, ObjectGraph};
use super::{MemberKind, PrimitiveType, record};
use crate::error::{Error, Result};

/// Deepest nesting of inline objects and arrays accepted
const MAX_DEPTH: usize = 64;

/// Largest element count accepted for a single array
const MAX_ARRAY_LEN: usize = 1 << 24;

/// Largest number of array elements accepted across one stream
const MAX_TOTAL_ELEMENTS: usize = 1 << 24;

/// Largest rank accepted for a multi-dimensional array
const MAX_RANK: usize = 32;

/// Read an NRBF stream from disk
///
/// # Errors
/// Returns [`Error::Io`] if the file cannot be read, or any error of
/// [`parse_nrbf_bytes`].
///
/// [`Error::Io`]: crate::Error::Io
pub fn read_nrbf<P: AsRef<Path>>(path: P) -> Result<ObjectGraph> {
    let data = fs::read(path)?;
    parse_nrbf_bytes(&data)
}

/// Parse an NRBF stream into its object graph
///
/// # Errors
///
/// Returns [`Error::InvalidNrbfHeader`] if the stream does not start with a
/// version 1.0 serialization header, [`Error::UnexpectedEof`] if it ends before
/// the `MessageEnd` record, and the `Nrbf*` variants for records this reader
/// cannot interpret.
pub fn parse_nrbf_bytes(data: &[u8]) -> Result<ObjectGraph> {
    NrbfReader::new(data).read_stream().map_err(|err| match err {
        Error::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => Error::UnexpectedEof,
        other => other,
    })
}

/// Member layout shared by every instance of one class
#[derive(Debug)]
struct ClassMetadata {
    name: String,
    members: Vec<(String, MemberKind)>,
}

/// Outcome of reading one record
enum Slot {
    Value(NrbfValue),
    /// One or more null elements
    Nulls(usize),
    End,
}

struct NrbfReader<'a> {
    cursor: Cursor<&'a [u8]>,
    metadata: HashMap<i32, Rc<ClassMetadata>>,
    objects: HashMap<i32, NrbfObject>,
    depth: usize,
    elements: usize,
}

impl<'a> NrbfReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
            metadata: HashMap::new(),
            objects: HashMap::new(),
            depth: 0,
            elements: 0,
        }
    }

    fn read_stream(mut self) -> Result<ObjectGraph> {
        let tag = self.cursor.read_u8()?;
        if tag != record::SERIALIZED_STREAM_HEADER {
            return Err(Error::InvalidNrbfHeader(format!(
                "expected header record, found record type {tag}"
            )));
        }
        let root_id = self.read_i32()?;
        let _header_id = self.read_i32()?;
        let major = self.read_i32()?;
        let minor = self.read_i32()?;
        if (major, minor) != (1, 0) {
            return Err(Error::InvalidNrbfHeader(format!(
                "unsupported version {major}.{minor}"
            )));
        }

        loop {
            let tag = self.cursor.read_u8()?;
            if let Slot::End = self.read_record(tag)? {
                break;
            }
        }

        tracing::debug!(
            "Parsed NRBF stream: {} objects, root {root_id}",
            self.objects.len()
        );
        Ok(ObjectGraph {
            root_id,
            objects: self.objects,
        })
    }

    fn read_record(&mut self, mut tag: u8) -> Result<Slot> {
        // Libraries only qualify type names; the record that follows is the real one
        while tag == record::BINARY_LIBRARY {
            let _library_id = self.read_i32()?;
            let _library_name = self.read_string()?;
            tag = self.cursor.read_u8()?;
        }

        match tag {
            record::CLASS_WITH_ID => {
                let object_id = self.read_i32()?;
                let metadata_id = self.read_i32()?;
                let metadata = self
                    .metadata
                    .get(&metadata_id)
                    .cloned()
                    .ok_or(Error::MissingNrbfMetadata(metadata_id))?;
                self.read_class(object_id, &metadata)
            }
            record::SYSTEM_CLASS_WITH_MEMBERS_AND_TYPES | record::CLASS_WITH_MEMBERS_AND_TYPES => {
                let object_id = self.read_i32()?;
                let name = self.read_string()?;
                let count = self.read_count()?;
                let mut names = Vec::with_capacity(count.min(self.remaining()));
                for _ in 0..count {
                    names.push(self.read_string()?);
                }
                let codes = (0..count)
                    .map(|_| self.cursor.read_u8())
                    .collect::<std::io::Result<Vec<u8>>>()?;
                let kinds = codes
                    .into_iter()
                    .map(|code| self.read_additional_info(code))
                    .collect::<Result<Vec<_>>>()?;
                if tag == record::CLASS_WITH_MEMBERS_AND_TYPES {
                    let _library_id = self.read_i32()?;
                }

                let metadata = Rc::new(ClassMetadata {
                    name,
                    members: names.into_iter().zip(kinds).collect(),
                });
                self.metadata.insert(object_id, Rc::clone(&metadata));
                self.read_class(object_id, &metadata)
            }
            record::BINARY_OBJECT_STRING => {
                let object_id = self.read_i32()?;
                let value = self.read_string()?;
                self.objects.insert(object_id, NrbfObject::String(value));
                Ok(Slot::Value(NrbfValue::Object(object_id)))
            }
            record::BINARY_ARRAY => self.read_binary_array(),
            record::MEMBER_PRIMITIVE_TYPED => {
                let primitive = self.read_primitive_type()?;
                Ok(Slot::Value(self.read_primitive(primitive)?))
            }
            record::MEMBER_REFERENCE => Ok(Slot::Value(NrbfValue::Object(self.read_i32()?))),
            record::OBJECT_NULL => Ok(Slot::Nulls(1)),
            record::MESSAGE_END => Ok(Slot::End),
            record::OBJECT_NULL_MULTIPLE_256 => Ok(Slot::Nulls(self.cursor.read_u8()? as usize)),
            record::OBJECT_NULL_MULTIPLE => Ok(Slot::Nulls(self.read_count()?)),
            record::ARRAY_SINGLE_PRIMITIVE => {
                let object_id = self.read_i32()?;
                let len = self.read_array_len()?;
                let primitive = self.read_primitive_type()?;
                let items = self.read_elements(len, &MemberKind::Primitive(primitive))?;
                Ok(self.store_array(object_id, items))
            }
            record::ARRAY_SINGLE_OBJECT | record::ARRAY_SINGLE_STRING => {
                let object_id = self.read_i32()?;
                let len = self.read_array_len()?;
                let items = self.read_elements(len, &MemberKind::Object)?;
                Ok(self.store_array(object_id, items))
            }
            record::SYSTEM_CLASS_WITH_MEMBERS | record::CLASS_WITH_MEMBERS => {
                // Member values without type info cannot be decoded
                Err(Error::UnsupportedNrbfRecord(tag))
            }
            record::SERIALIZED_STREAM_HEADER => Err(Error::InvalidNrbfHeader(
                "header record inside stream".to_string(),
            )),
            other => Err(Error::UnsupportedNrbfRecord(other)),
        }
    }

    fn read_class(&mut self, object_id: i32, metadata: &ClassMetadata) -> Result<Slot> {
        self.descend()?;
        let mut members = Vec::with_capacity(metadata.members.len());
        for (name, kind) in &metadata.members {
            let value = self.read_member(kind)?;
            members.push((name.clone(), value));
        }
        self.depth -= 1;

        self.objects.insert(
            object_id,
            NrbfObject::Class(ClassObject {
                name: metadata.name.clone(),
                members,
            }),
        );
        Ok(Slot::Value(NrbfValue::Object(object_id)))
    }

    fn read_member(&mut self, kind: &MemberKind) -> Result<NrbfValue> {
        if let MemberKind::Primitive(primitive) = kind {
            return self.read_primitive(*primitive);
        }
        let tag = self.cursor.read_u8()?;
        match self.read_record(tag)? {
            Slot::Value(value) => Ok(value),
            Slot::Nulls(_) => Ok(NrbfValue::Null),
            Slot::End => Err(Error::InvalidFormat(
                "NRBF message ended inside an object".to_string(),
            )),
        }
    }

    fn read_binary_array(&mut self) -> Result<Slot> {
        let object_id = self.read_i32()?;
        let array_type = self.cursor.read_u8()?;
        let rank = self.read_count()?;
        if rank == 0 || rank > MAX_RANK {
            return Err(Error::InvalidFormat(format!("NRBF array rank {rank}")));
        }

        // Rectangular arrays are flattened
        let mut len: usize = 1;
        for _ in 0..rank {
            len = len
                .checked_mul(self.read_count()?)
                .filter(|&n| n <= MAX_ARRAY_LEN)
                .ok_or_else(|| Error::InvalidFormat("NRBF array too large".to_string()))?;
        }
        // SingleOffset, JaggedOffset and RectangularOffset carry lower bounds
        if matches!(array_type, 3..=5) {
            for _ in 0..rank {
                let _lower_bound = self.read_i32()?;
            }
        }

        let code = self.cursor.read_u8()?;
        let kind = self.read_additional_info(code)?;
        let items = self.read_elements(len, &kind)?;
        Ok(self.store_array(object_id, items))
    }

    fn read_elements(&mut self, len: usize, kind: &MemberKind) -> Result<Vec<NrbfValue>> {
        // Null elements occupy no bytes, so the length would be unchecked
        if *kind == MemberKind::Primitive(PrimitiveType::Null) {
            return Err(Error::InvalidFormat(
                "NRBF array of Null primitives".to_string(),
            ));
        }
        self.elements = self.elements.saturating_add(len);
        if self.elements > MAX_TOTAL_ELEMENTS {
            return Err(Error::InvalidFormat("NRBF arrays too large".to_string()));
        }

        self.descend()?;
        let mut items = Vec::with_capacity(len.min(self.remaining()));
        while items.len() < len {
            if let MemberKind::Primitive(primitive) = kind {
                items.push(self.read_primitive(*primitive)?);
                continue;
            }
            let tag = self.cursor.read_u8()?;
            match self.read_record(tag)? {
                Slot::Value(value) => items.push(value),
                Slot::Nulls(count) => {
                    if count > len - items.len() {
                        return Err(Error::InvalidFormat(
                            "NRBF null run overflows its array".to_string(),
                        ));
                    }
                    items.resize(items.len() + count, NrbfValue::Null);
                }
                Slot::End => {
                    return Err(Error::InvalidFormat(
                        "NRBF message ended inside an array".to_string(),
                    ));
                }
            }
        }
        self.depth -= 1;
        Ok(items)
    }

    fn store_array(&mut self, object_id: i32, items: Vec<NrbfValue>) -> Slot {
        self.objects.insert(object_id, NrbfObject::Array(items));
        Slot::Value(NrbfValue::Object(object_id))
    }

    /// Additional type info for a `BinaryTypeEnumeration` code
    fn read_additional_info(&mut self, code: u8) -> Result<MemberKind> {
        Ok(match code {
            0 => MemberKind::Primitive(self.read_primitive_type()?),
            1 => MemberKind::String,
            2 => MemberKind::Object,
            3 => MemberKind::SystemClass(self.read_string()?),
            4 => {
                let name = self.read_string()?;
                let library_id = self.read_i32()?;
                MemberKind::Class(name, library_id)
            }
            5 => MemberKind::ObjectArray,
            6 => MemberKind::StringArray,
            7 => MemberKind::PrimitiveArray(self.read_primitive_type()?),
            other => {
                return Err(Error::InvalidFormat(format!("NRBF binary type {other}")));
            }
        })
    }

    fn read_primitive_type(&mut self) -> Result<PrimitiveType> {
        let code = self.cursor.read_u8()?;
        PrimitiveType::from_code(code).ok_or(Error::UnsupportedNrbfPrimitive(code))
    }

    fn read_primitive(&mut self, primitive: PrimitiveType) -> Result<NrbfValue> {
        match primitive {
            PrimitiveType::Char => return Ok(NrbfValue::Char(self.read_char()?)),
            PrimitiveType::Decimal => return Ok(NrbfValue::Decimal(self.read_string()?)),
            PrimitiveType::String => return Ok(NrbfValue::String(self.read_string()?)),
            _ => {}
        }

        let c = &mut self.cursor;
        Ok(match primitive {
            PrimitiveType::Boolean => NrbfValue::Bool(c.read_u8()? != 0),
            PrimitiveType::Byte => NrbfValue::UInt(u64::from(c.read_u8()?)),
            PrimitiveType::SByte => NrbfValue::Int(i64::from(c.read_i8()?)),
            PrimitiveType::Int16 => NrbfValue::Int(i64::from(c.read_i16::<LittleEndian>()?)),
            PrimitiveType::Int32 => NrbfValue::Int(i64::from(c.read_i32::<LittleEndian>()?)),
            PrimitiveType::Int64 => NrbfValue::Int(c.read_i64::<LittleEndian>()?),
            PrimitiveType::UInt16 => NrbfValue::UInt(u64::from(c.read_u16::<LittleEndian>()?)),
            PrimitiveType::UInt32 => NrbfValue::UInt(u64::from(c.read_u32::<LittleEndian>()?)),
            PrimitiveType::UInt64 => NrbfValue::UInt(c.read_u64::<LittleEndian>()?),
            PrimitiveType::Single => NrbfValue::Float(f64::from(c.read_f32::<LittleEndian>()?)),
            PrimitiveType::Double => NrbfValue::Float(c.read_f64::<LittleEndian>()?),
            PrimitiveType::TimeSpan => NrbfValue::TimeSpan(c.read_i64::<LittleEndian>()?),
            PrimitiveType::DateTime => NrbfValue::DateTime(c.read_i64::<LittleEndian>()?),
            PrimitiveType::Null
            | PrimitiveType::Char
            | PrimitiveType::Decimal
            | PrimitiveType::String => NrbfValue::Null,
        })
    }

    /// A single UTF-8 encoded character
    fn read_char(&mut self) -> Result<char> {
        let first = self.cursor.read_u8()?;
        let width = match first {
            0x00..=0x7F => 1,
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => return Err(Error::InvalidFormat(format!("NRBF char lead byte {first:#04x}"))),
        };
        let mut bytes = vec![first; width];
        self.cursor.read_exact(&mut bytes[1..])?;
        String::from_utf8(bytes)?
            .chars()
            .next()
            .ok_or_else(|| Error::InvalidFormat("empty NRBF char".to_string()))
    }

    /// `LengthPrefixedString`: 7-bit encoded length, then UTF-8 bytes
    fn read_string(&mut self) -> Result<String> {
        let mut len: u32 = 0;
        let mut terminated = false;
        for shift in [0, 7, 14, 21, 28] {
            let byte = self.cursor.read_u8()?;
            len |= u32::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                terminated = true;
                break;
            }
        }
        if !terminated {
            return Err(Error::InvalidFormat(
                "NRBF string length prefix longer than 5 bytes".to_string(),
            ));
        }

        let len = len as usize;
        if len > self.remaining() {
            return Err(Error::UnexpectedEof);
        }
        let mut bytes = vec![0u8; len];
        self.cursor.read_exact(&mut bytes)?;
        Ok(String::from_utf8(bytes)?)
    }

    fn read_i32(&mut self) -> Result<i32> {
        Ok(self.cursor.read_i32::<LittleEndian>()?)
    }

    /// A non-negative 32-bit count
    fn read_count(&mut self) -> Result<usize> {
        let value = self.read_i32()?;
        usize::try_from(value)
            .map_err(|_| Error::InvalidFormat(format!("negative NRBF count {value}")))
    }

    fn read_array_len(&mut self) -> Result<usize> {
        let len = self.read_count()?;
        if len > MAX_ARRAY_LEN {
            return Err(Error::InvalidFormat("NRBF array too large".to_string()));
        }
        Ok(len)
    }

    fn remaining(&self) -> usize {
        let len = self.cursor.get_ref().len() as u64;
        len.saturating_sub(self.cursor.position()) as usize
    }

    fn descend(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(Error::NrbfTooDeep);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::nrbf::testing::{Kind, NrbfWriter, legacy_table_bytes};

    #[test]
    fn test_legacy_table_graph() {
        let data = legacy_table_bytes(2, "12345.raw", &[(0, "Bonjour", 1), (4, "Salut", 1)]);
        let graph = parse_nrbf_bytes(&data).unwrap();

        let Some(NrbfObject::Class(root)) = graph.root() else {
            panic!("root is not a class");
        };
        assert!(root.name.ends_with("StringFile"));
        assert_eq!(graph.as_int(root.field("Language").unwrap()), Some(2));
        assert_eq!(
            graph.as_str(root.field("Filename").unwrap()),
            Some("12345.raw")
        );

        let list = graph.as_class(root.field("Items").unwrap()).unwrap();
        assert_eq!(graph.as_int(list.field("_size").unwrap()), Some(2));
        let items = graph.as_array(list.field("_items").unwrap()).unwrap();
        assert_eq!(items.len(), 4);
        assert_eq!(items[2], NrbfValue::Null);
        assert_eq!(items[3], NrbfValue::Null);

        let second = graph.as_class(&items[1]).unwrap();
        assert_eq!(graph.as_str(second.field("value").unwrap()), Some("Salut"));
        assert_eq!(graph.as_int(second.field("row").unwrap()), Some(4));
        assert_eq!(graph.as_int(second.field("type").unwrap()), Some(1));
    }

    #[test]
    fn test_primitive_records() {
        let mut w = NrbfWriter::new(1);
        w.array_single_primitive(1, 8, 2, &[7, 0, 0, 0, 0xFE, 0xFF, 0xFF, 0xFF]);
        w.u8(record::MEMBER_PRIMITIVE_TYPED);
        w.u8(1);
        w.u8(1);
        let graph = parse_nrbf_bytes(&w.finish()).unwrap();

        let Some(NrbfObject::Array(items)) = graph.root() else {
            panic!("root is not an array");
        };
        assert_eq!(items, &vec![NrbfValue::Int(7), NrbfValue::Int(-2)]);
    }

    #[test]
    fn test_char_and_inline_string_members() {
        let mut w = NrbfWriter::new(1);
        w.class_with_types(
            1,
            "Sample",
            &[("letter", Kind::Prim(3)), ("label", Kind::Prim(18))],
            None,
        );
        w.raw(&"é".to_string().into_bytes());
        w.string("inline");
        let graph = parse_nrbf_bytes(&w.finish()).unwrap();

        let Some(NrbfObject::Class(class)) = graph.root() else {
            panic!("root is not a class");
        };
        assert_eq!(class.field("letter"), Some(&NrbfValue::Char('é')));
        assert_eq!(
            graph.as_str(class.field("label").unwrap()),
            Some("inline")
        );
    }

    #[test]
    fn test_rejects_bad_header() {
        assert!(matches!(
            parse_nrbf_bytes(&[0x05, 0, 0, 0]),
            Err(Error::InvalidNrbfHeader(_))
        ));

        let mut w = NrbfWriter::new(1);
        w.buf[9] = 2; // major version
        assert!(matches!(
            parse_nrbf_bytes(&w.finish()),
            Err(Error::InvalidNrbfHeader(_))
        ));
    }

    #[test]
    fn test_truncated_stream() {
        let data = legacy_table_bytes(0, "1.raw", &[(0, "Hello", 1)]);
        assert!(matches!(
            parse_nrbf_bytes(&data[..data.len() - 1]),
            Err(Error::UnexpectedEof)
        ));
        assert!(matches!(
            parse_nrbf_bytes(&data[..40]),
            Err(Error::UnexpectedEof)
        ));
    }

    #[test]
    fn test_unknown_record_and_missing_metadata() {
        let mut w = NrbfWriter::new(1);
        w.u8(21); // MethodCall
        assert!(matches!(
            parse_nrbf_bytes(&w.finish()),
            Err(Error::UnsupportedNrbfRecord(21))
        ));

        let mut w = NrbfWriter::new(1);
        w.class_with_id(2, 99);
        assert!(matches!(
            parse_nrbf_bytes(&w.finish()),
            Err(Error::MissingNrbfMetadata(99))
        ));
    }

    #[test]
    fn test_nesting_limit() {
        let mut w = NrbfWriter::new(1);
        for id in 1..=(MAX_DEPTH as i32 + 1) {
            w.class_with_types(id, "Node", &[("next", Kind::Object)], None);
        }
        w.u8(record::OBJECT_NULL);
        assert!(matches!(
            parse_nrbf_bytes(&w.finish()),
            Err(Error::NrbfTooDeep)
        ));
    }

    #[test]
    fn test_long_library_run() {
        let mut w = NrbfWriter::new(1);
        for id in 0..300_000 {
            w.library(id + 2, "");
        }
        w.object_string(1, "after libraries");
        let graph = parse_nrbf_bytes(&w.finish()).unwrap();
        assert_eq!(graph.as_str(&NrbfValue::Object(1)), Some("after libraries"));
    }

    #[test]
    fn test_null_primitive_array_rejected() {
        let mut w = NrbfWriter::new(1);
        w.array_single_primitive(1, 17, MAX_ARRAY_LEN as i32, &[]);
        assert!(matches!(
            parse_nrbf_bytes(&w.finish()),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_total_element_budget() {
        // Each array is within its own limit; together they are not
        let mut w = NrbfWriter::new(1);
        w.u8(record::ARRAY_SINGLE_OBJECT);
        w.i32(1);
        w.i32(4);
        w.nulls(4);
        w.u8(record::ARRAY_SINGLE_OBJECT);
        w.i32(2);
        w.i32(MAX_ARRAY_LEN as i32);
        assert!(matches!(
            parse_nrbf_bytes(&w.finish()),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_null_run_overflow() {
        let mut w = NrbfWriter::new(1);
        w.u8(record::ARRAY_SINGLE_OBJECT);
        w.i32(1);
        w.i32(2);
        w.nulls(3);
        assert!(matches!(
            parse_nrbf_bytes(&w.finish()),
            Err(Error::InvalidFormat(_))
        ));
    }
}
