//! Parsed NRBF object graph

use std::collections::HashMap;

use chrono::{DateTime, Local, TimeZone, Utc};

/// .NET ticks (100ns) per second
const TICKS_PER_SECOND: i64 = 10_000_000;

/// Ticks between 0001-01-01 and the Unix epoch
const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

/// Low 62 bits of a serialized `DateTime` hold the ticks, the top two the kind
const TICKS_MASK: i64 = 0x3FFF_FFFF_FFFF_FFFF;

/// A member value or array element
#[derive(Debug, Clone, PartialEq)]
pub enum NrbfValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Char(char),
    /// A string written inline as a primitive (not a `BinaryObjectString` record)
    String(String),
    /// `System.Decimal`, kept in its serialized text form
    Decimal(String),
    /// `System.TimeSpan` ticks
    TimeSpan(i64),
    /// Raw `System.DateTime` (ticks plus kind bits)
    DateTime(i64),
    /// Reference to an object in the graph, by id
    Object(i32),
}

/// A deserialized class instance
#[derive(Debug, Clone, PartialEq)]
pub struct ClassObject {
    /// Fully qualified type name
    pub name: String,
    pub members: Vec<(String, NrbfValue)>,
}

impl ClassObject {
    /// Look up a member by field name
    ///
    /// Auto-property backing fields (`<Name>k__BackingField`) match their
    /// property name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&NrbfValue> {
        self.members
            .iter()
            .find(|(member, _)| {
                member == name
                    || member
                        .strip_prefix('<')
                        .and_then(|m| m.strip_suffix(">k__BackingField"))
                        .is_some_and(|m| m == name)
            })
            .map(|(_, value)| value)
    }
}

/// Any object that owns an id in the stream
#[derive(Debug, Clone, PartialEq)]
pub enum NrbfObject {
    Class(ClassObject),
    Array(Vec<NrbfValue>),
    String(String),
}

/// All objects of one serialized stream, keyed by object id
#[derive(Debug, Clone, Default)]
pub struct ObjectGraph {
    /// Id of the root object named by the stream header
    pub root_id: i32,
    pub objects: HashMap<i32, NrbfObject>,
}

impl ObjectGraph {
    #[must_use]
    pub fn root(&self) -> Option<&NrbfObject> {
        self.objects.get(&self.root_id)
    }

    #[must_use]
    pub fn get(&self, id: i32) -> Option<&NrbfObject> {
        self.objects.get(&id)
    }

    /// Follow an object reference
    #[must_use]
    pub fn resolve(&self, value: &NrbfValue) -> Option<&NrbfObject> {
        match value {
            NrbfValue::Object(id) => self.objects.get(id),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_class(&self, value: &NrbfValue) -> Option<&ClassObject> {
        match self.resolve(value)? {
            NrbfObject::Class(class) => Some(class),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self, value: &NrbfValue) -> Option<&[NrbfValue]> {
        match self.resolve(value)? {
            NrbfObject::Array(items) => Some(items),
            _ => None,
        }
    }

    /// A string value, whether inline or a string object
    #[must_use]
    pub fn as_str<'a>(&'a self, value: &'a NrbfValue) -> Option<&'a str> {
        match value {
            NrbfValue::String(s) => Some(s),
            NrbfValue::Object(_) => match self.resolve(value)? {
                NrbfObject::String(s) => Some(s),
                _ => None,
            },
            _ => None,
        }
    }

    /// An integer value
    ///
    /// Boxed enums serialize as a class with a single `value__` member; those
    /// resolve to the underlying integer.
    #[must_use]
    pub fn as_int(&self, value: &NrbfValue) -> Option<i64> {
        match value {
            NrbfValue::Int(i) => Some(*i),
            NrbfValue::UInt(u) => i64::try_from(*u).ok(),
            NrbfValue::Object(_) => match self.as_class(value)?.field("value__")? {
                NrbfValue::Int(i) => Some(*i),
                NrbfValue::UInt(u) => i64::try_from(*u).ok(),
                _ => None,
            },
            _ => None,
        }
    }

    #[must_use]
    pub fn as_datetime(&self, value: &NrbfValue) -> Option<DateTime<Utc>> {
        match value {
            NrbfValue::DateTime(raw) => datetime_from_raw(*raw),
            _ => None,
        }
    }
}

/// Convert a serialized `System.DateTime` to UTC
///
/// Local-kind values carry wall-clock ticks of the machine that wrote them;
/// they are read in this machine's zone. Unspecified-kind values are read as UTC.
#[must_use]
pub fn datetime_from_raw(raw: i64) -> Option<DateTime<Utc>> {
    let ticks = raw & TICKS_MASK;
    let kind = (raw as u64) >> 62;

    let since_epoch = ticks - UNIX_EPOCH_TICKS;
    let secs = since_epoch.div_euclid(TICKS_PER_SECOND);
    let nanos = (since_epoch.rem_euclid(TICKS_PER_SECOND) * 100) as u32;
    let naive = DateTime::from_timestamp(secs, nanos)?.naive_utc();

    match kind {
        2 | 3 => Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|local| local.with_timezone(&Utc)),
        _ => Some(naive.and_utc()),
    }
}

/// Encode a UTC time as a UTC-kind serialized `System.DateTime`
#[cfg(test)]
pub(crate) fn datetime_to_raw(stamp: DateTime<Utc>) -> i64 {
    let ticks = stamp.timestamp() * TICKS_PER_SECOND
        + i64::from(stamp.timestamp_subsec_nanos() / 100)
        + UNIX_EPOCH_TICKS;
    ticks | (1 << 62)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datetime_ticks() {
        // UTC kind
        let stamp = DateTime::parse_from_rfc3339("2013-08-28T12:00:00.1234567Z")
            .unwrap()
            .with_timezone(&Utc);
        let raw = datetime_to_raw(stamp);
        assert_eq!(raw >> 62, 1);
        assert_eq!(datetime_from_raw(raw), Some(stamp));

        // Unspecified kind reads as UTC
        assert_eq!(datetime_from_raw(raw & TICKS_MASK), Some(stamp));
        assert_eq!(
            datetime_from_raw(UNIX_EPOCH_TICKS),
            DateTime::from_timestamp(0, 0)
        );
    }

    #[test]
    fn test_backing_field_lookup() {
        let class = ClassObject {
            name: "Sample".into(),
            members: vec![
                ("<Items>k__BackingField".into(), NrbfValue::Int(1)),
                ("row".into(), NrbfValue::Int(2)),
            ],
        };
        assert_eq!(class.field("Items"), Some(&NrbfValue::Int(1)));
        assert_eq!(class.field("row"), Some(&NrbfValue::Int(2)));
        assert_eq!(class.field("missing"), None);
    }

    #[test]
    fn test_boxed_enum_as_int() {
        let mut graph = ObjectGraph::default();
        graph.objects.insert(
            -3,
            NrbfObject::Class(ClassObject {
                name: "Gw2Language".into(),
                members: vec![("value__".into(), NrbfValue::Int(2))],
            }),
        );
        assert_eq!(graph.as_int(&NrbfValue::Object(-3)), Some(2));
        assert_eq!(graph.as_int(&NrbfValue::Int(4)), Some(4));
        assert_eq!(graph.as_int(&NrbfValue::Null), None);
    }
}
