//! .NET Remoting Binary Format (MS-NRBF) reader
//!
//! Earlier versions of the string-history store were written with the .NET
//! `BinaryFormatter`, which emits an NRBF record stream. This module parses
//! that stream into a flat [`ObjectGraph`] of classes, arrays and strings keyed
//! by object id, without knowing anything about the serialized types. Callers
//! then pick the fields they need by name.
//!
//! Supported: every record type that can appear in a `BinaryFormatter`
//! object graph except the method call/return records and the untyped
//! `ClassWithMembers` variants, which `BinaryFormatter` never writes.

mod graph;
mod reader;
#[cfg(test)]
pub(crate) mod testing;

pub use graph::{ClassObject, NrbfObject, NrbfValue, ObjectGraph, datetime_from_raw};
pub use reader::{parse_nrbf_bytes, read_nrbf};

/// NRBF record type tags
pub(crate) mod record {
    pub const SERIALIZED_STREAM_HEADER: u8 = 0;
    pub const CLASS_WITH_ID: u8 = 1;
    pub const SYSTEM_CLASS_WITH_MEMBERS: u8 = 2;
    pub const CLASS_WITH_MEMBERS: u8 = 3;
    pub const SYSTEM_CLASS_WITH_MEMBERS_AND_TYPES: u8 = 4;
    pub const CLASS_WITH_MEMBERS_AND_TYPES: u8 = 5;
    pub const BINARY_OBJECT_STRING: u8 = 6;
    pub const BINARY_ARRAY: u8 = 7;
    pub const MEMBER_PRIMITIVE_TYPED: u8 = 8;
    pub const MEMBER_REFERENCE: u8 = 9;
    pub const OBJECT_NULL: u8 = 10;
    pub const MESSAGE_END: u8 = 11;
    pub const BINARY_LIBRARY: u8 = 12;
    pub const OBJECT_NULL_MULTIPLE_256: u8 = 13;
    pub const OBJECT_NULL_MULTIPLE: u8 = 14;
    pub const ARRAY_SINGLE_PRIMITIVE: u8 = 15;
    pub const ARRAY_SINGLE_OBJECT: u8 = 16;
    pub const ARRAY_SINGLE_STRING: u8 = 17;
}

/// Primitive type codes (`PrimitiveTypeEnumeration`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    Boolean,
    Byte,
    Char,
    Decimal,
    Double,
    Int16,
    Int32,
    Int64,
    SByte,
    Single,
    TimeSpan,
    DateTime,
    UInt16,
    UInt32,
    UInt64,
    Null,
    String,
}

impl PrimitiveType {
    /// Parse a primitive type code; `None` for unused or unknown codes
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => Self::Boolean,
            2 => Self::Byte,
            3 => Self::Char,
            5 => Self::Decimal,
            6 => Self::Double,
            7 => Self::Int16,
            8 => Self::Int32,
            9 => Self::Int64,
            10 => Self::SByte,
            11 => Self::Single,
            12 => Self::TimeSpan,
            13 => Self::DateTime,
            14 => Self::UInt16,
            15 => Self::UInt32,
            16 => Self::UInt64,
            17 => Self::Null,
            18 => Self::String,
            _ => return None,
        })
    }
}

/// How a class member or array element is encoded (`BinaryTypeEnumeration`
/// together with its additional type info)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberKind {
    /// Raw primitive value, no record header
    Primitive(PrimitiveType),
    String,
    Object,
    /// A system library class, by type name
    SystemClass(String),
    /// A user class, by type name and library id
    Class(String, i32),
    ObjectArray,
    StringArray,
    PrimitiveArray(PrimitiveType),
}
