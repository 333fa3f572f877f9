//! Decoded record model.
//!
//! Every record kind the decoder understands is a variant of [`Record`].
//! Values read off the wire keep the byte offset they came from (see
//! [`Located`]), which is what lets the patch engine rewrite them in place
//! without decoding the stream a second time.

use crate::cursor::ByteCursor;
use crate::error::{Error, Result};
use crate::wire::{ArrayShape, BinaryType, PrimitiveType, VarString};
use byteorder::{ByteOrder, LittleEndian};
use serde_json::Value;

/// A value paired with the stream offset it was decoded from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Located<T> {
    /// Byte offset of the first byte of the value
    pub offset: usize,
    /// The decoded value
    pub value: T,
}

impl<T> Located<T> {
    /// Creates a new located value
    pub fn new(offset: usize, value: T) -> Self {
        Self { offset, value }
    }
}

/// A fixed-width primitive value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    /// `Boolean`
    Boolean(bool),
    /// `Byte`
    Byte(u8),
    /// `Char`, stored as a single byte
    Char(u8),
    /// `Int16`
    Int16(i16),
    /// `Int32`
    Int32(i32),
    /// `Int64`
    Int64(i64),
    /// `UInt16`
    UInt16(u16),
    /// `UInt32`
    UInt32(u32),
    /// `UInt64`
    UInt64(u64),
    /// `Single`
    Single(f32),
    /// `Double`
    Double(f64),
    /// `TimeSpan` ticks
    TimeSpan(i64),
    /// `DateTime` ticks
    DateTime(i64),
}

impl Scalar {
    /// Reads one value of the given kind.
    ///
    /// Kinds without a modeled width fail with
    /// [`Error::UnsupportedPrimitive`] before anything is consumed.
    pub fn decode<B: AsRef<[u8]>>(
        kind: PrimitiveType,
        cursor: &mut ByteCursor<B>,
    ) -> Result<Located<Self>> {
        let offset = cursor.position();
        let value = match kind {
            PrimitiveType::Boolean => Self::Boolean(cursor.read_u8()? != 0),
            PrimitiveType::Byte => Self::Byte(cursor.read_u8()?),
            PrimitiveType::Char => Self::Char(cursor.read_u8()?),
            PrimitiveType::Int16 => Self::Int16(cursor.read_i16()?),
            PrimitiveType::Int32 => Self::Int32(cursor.read_i32()?),
            PrimitiveType::Int64 => Self::Int64(cursor.read_i64()?),
            PrimitiveType::UInt16 => Self::UInt16(cursor.read_u16()?),
            PrimitiveType::UInt32 => Self::UInt32(cursor.read_u32()?),
            PrimitiveType::UInt64 => Self::UInt64(cursor.read_u64()?),
            PrimitiveType::Single => Self::Single(cursor.read_f32()?),
            PrimitiveType::Double => Self::Double(cursor.read_f64()?),
            PrimitiveType::TimeSpan => Self::TimeSpan(cursor.read_i64()?),
            PrimitiveType::DateTime => Self::DateTime(cursor.read_i64()?),
            PrimitiveType::Decimal
            | PrimitiveType::SByte
            | PrimitiveType::Null
            | PrimitiveType::String => {
                return Err(Error::UnsupportedPrimitive { offset, kind });
            }
        };
        Ok(Located::new(offset, value))
    }

    /// The primitive tag this value was decoded as
    pub fn kind(&self) -> PrimitiveType {
        match self {
            Self::Boolean(_) => PrimitiveType::Boolean,
            Self::Byte(_) => PrimitiveType::Byte,
            Self::Char(_) => PrimitiveType::Char,
            Self::Int16(_) => PrimitiveType::Int16,
            Self::Int32(_) => PrimitiveType::Int32,
            Self::Int64(_) => PrimitiveType::Int64,
            Self::UInt16(_) => PrimitiveType::UInt16,
            Self::UInt32(_) => PrimitiveType::UInt32,
            Self::UInt64(_) => PrimitiveType::UInt64,
            Self::Single(_) => PrimitiveType::Single,
            Self::Double(_) => PrimitiveType::Double,
            Self::TimeSpan(_) => PrimitiveType::TimeSpan,
            Self::DateTime(_) => PrimitiveType::DateTime,
        }
    }

    /// Little-endian wire encoding
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.kind().width().unwrap_or(0)];
        match *self {
            Self::Boolean(v) => buf[0] = u8::from(v),
            Self::Byte(v) | Self::Char(v) => buf[0] = v,
            Self::Int16(v) => LittleEndian::write_i16(&mut buf, v),
            Self::UInt16(v) => LittleEndian::write_u16(&mut buf, v),
            Self::Int32(v) => LittleEndian::write_i32(&mut buf, v),
            Self::UInt32(v) => LittleEndian::write_u32(&mut buf, v),
            Self::Int64(v) | Self::TimeSpan(v) | Self::DateTime(v) => {
                LittleEndian::write_i64(&mut buf, v)
            }
            Self::UInt64(v) => LittleEndian::write_u64(&mut buf, v),
            Self::Single(v) => LittleEndian::write_f32(&mut buf, v),
            Self::Double(v) => LittleEndian::write_f64(&mut buf, v),
        }
        buf
    }

    /// Export form of this value.
    ///
    /// A `Single` goes through its shortest round-trip decimal text before
    /// becoming a double, so `0.1f32` exports as `0.1`. Non-finite floats
    /// export as `null`.
    pub fn to_json(&self) -> Value {
        match *self {
            Self::Boolean(v) => Value::from(v),
            Self::Byte(v) | Self::Char(v) => Value::from(v),
            Self::Int16(v) => Value::from(v),
            Self::Int32(v) => Value::from(v),
            Self::Int64(v) | Self::TimeSpan(v) | Self::DateTime(v) => Value::from(v),
            Self::UInt16(v) => Value::from(v),
            Self::UInt32(v) => Value::from(v),
            Self::UInt64(v) => Value::from(v),
            Self::Single(v) => v
                .to_string()
                .parse::<f64>()
                .map(Value::from)
                .unwrap_or(Value::Null),
            Self::Double(v) => Value::from(v),
        }
    }

    /// Converts an export value back into a scalar of `kind`.
    ///
    /// Returns `None` when the JSON type does not fit or the number is out
    /// of range for the field.
    pub fn from_json(kind: PrimitiveType, value: &Value) -> Option<Self> {
        Some(match kind {
            PrimitiveType::Boolean => Self::Boolean(value.as_bool()?),
            PrimitiveType::Byte => Self::Byte(u8::try_from(value.as_u64()?).ok()?),
            PrimitiveType::Char => Self::Char(u8::try_from(value.as_u64()?).ok()?),
            PrimitiveType::Int16 => Self::Int16(i16::try_from(value.as_i64()?).ok()?),
            PrimitiveType::Int32 => Self::Int32(i32::try_from(value.as_i64()?).ok()?),
            PrimitiveType::Int64 => Self::Int64(value.as_i64()?),
            PrimitiveType::UInt16 => Self::UInt16(u16::try_from(value.as_u64()?).ok()?),
            PrimitiveType::UInt32 => Self::UInt32(u32::try_from(value.as_u64()?).ok()?),
            PrimitiveType::UInt64 => Self::UInt64(value.as_u64()?),
            PrimitiveType::Single => {
                let v = value.as_f64()?;
                if v.is_finite() && v.abs() > f64::from(f32::MAX) {
                    return None;
                }
                Self::Single(v as f32)
            }
            PrimitiveType::Double => Self::Double(value.as_f64()?),
            PrimitiveType::TimeSpan => Self::TimeSpan(value.as_i64()?),
            PrimitiveType::DateTime => Self::DateTime(value.as_i64()?),
            PrimitiveType::Decimal
            | PrimitiveType::SByte
            | PrimitiveType::Null
            | PrimitiveType::String => return None,
        })
    }
}

/// The fixed payload of the stream header record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHeader {
    /// Id of the root object
    pub root_id: i32,
    /// Id of the header itself
    pub header_id: i32,
    /// Major format version
    pub major_version: i32,
    /// Minor format version
    pub minor_version: i32,
}

impl StreamHeader {
    /// The only header this codec accepts
    pub const EXPECTED: Self = Self {
        root_id: 1,
        header_id: -1,
        major_version: 1,
        minor_version: 0,
    };
}

/// Class identity and member names
#[derive(Debug, Clone, PartialEq)]
pub struct ClassInfo {
    /// Object id of the instance
    pub object_id: Located<i32>,
    /// Class name
    pub name: VarString,
    /// Declared member count
    pub member_count: i32,
    /// Member names in declaration order
    pub member_names: Vec<VarString>,
}

/// Declared type of a `Class` member: type name plus owning library
#[derive(Debug, Clone, PartialEq)]
pub struct ClassTypeInfo {
    /// Fully qualified type name
    pub type_name: VarString,
    /// Library the type comes from
    pub library_id: i32,
}

/// Extra type information that follows some [`BinaryType`] tags
#[derive(Debug, Clone, PartialEq)]
pub enum AdditionalInfo {
    /// For `Primitive` and `PrimitiveArray`
    Primitive(PrimitiveType),
    /// For `SystemClass`: the type name
    SystemClass(VarString),
    /// For `Class`
    Class(ClassTypeInfo),
}

/// Member type tags and their positional additional infos.
///
/// `additional_infos` holds one entry per tag for which
/// [`BinaryType::has_additional_info`] is true, in tag order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MemberTypeInfo {
    /// One tag per member
    pub binary_types: Vec<BinaryType>,
    /// Additional infos, consumed positionally
    pub additional_infos: Vec<AdditionalInfo>,
}

/// One member's declaration, as yielded by [`ClassShape::members`]
#[derive(Debug, Clone, Copy)]
pub struct MemberSlot<'a> {
    /// Member name
    pub name: &'a VarString,
    /// Declared tag
    pub binary_type: BinaryType,
    /// Paired additional info, if the tag carries one
    pub info: Option<&'a AdditionalInfo>,
}

/// Everything a class definition declares, minus member values.
///
/// This is the part a `ClassRef` borrows from its metadata class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassShape {
    /// Identity and member names
    pub info: ClassInfo,
    /// Member type tags
    pub member_types: MemberTypeInfo,
    /// Owning library; absent for system classes
    pub library_id: Option<i32>,
}

impl ClassShape {
    /// Class name as text
    pub fn name(&self) -> std::borrow::Cow<'_, str> {
        self.info.name.text()
    }

    /// Object id of the instance
    pub fn object_id(&self) -> i32 {
        self.info.object_id.value
    }

    /// Walks member declarations, pairing each tag with its additional info
    pub fn members(&self) -> impl Iterator<Item = MemberSlot<'_>> + '_ {
        let mut infos = self.member_types.additional_infos.iter();
        self.info
            .member_names
            .iter()
            .zip(self.member_types.binary_types.iter().copied())
            .map(move |(name, binary_type)| MemberSlot {
                name,
                binary_type,
                info: if binary_type.has_additional_info() {
                    infos.next()
                } else {
                    None
                },
            })
    }
}

/// A class instance: its shape plus decoded member values
#[derive(Debug, Clone, PartialEq)]
pub struct ClassObject {
    /// Declared shape
    pub shape: ClassShape,
    /// One value per member, in declaration order
    pub members: Vec<MemberValue>,
}

/// A class instance that reuses the shape of an earlier definition
#[derive(Debug, Clone, PartialEq)]
pub struct ClassRef {
    /// Object id of the class definition whose shape is reused
    pub metadata_id: Located<i32>,
    /// The instance, with the borrowed shape and its own object id
    pub object: ClassObject,
}

/// A string object
#[derive(Debug, Clone, PartialEq)]
pub struct StringObject {
    /// Object id
    pub object_id: i32,
    /// The string
    pub value: VarString,
}

/// A library name registration
#[derive(Debug, Clone, PartialEq)]
pub struct Library {
    /// Library id
    pub library_id: i32,
    /// Library name
    pub name: VarString,
}

/// Which array record an [`ArrayRecord`] came from
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayKind {
    /// General array record
    Binary {
        /// Declared shape
        shape: ArrayShape,
        /// Rank (always 1 once decoded)
        rank: i32,
        /// Length per dimension
        lengths: Vec<i32>,
        /// Lower bound per dimension, for offset shapes
        lower_bounds: Vec<i32>,
        /// Element type tag
        element: BinaryType,
        /// Element additional info
        info: Option<AdditionalInfo>,
    },
    /// Single-dimension primitive array
    SinglePrimitive(PrimitiveType),
    /// Single-dimension string array
    SingleString,
    /// Single-dimension object array
    SingleObject,
}

/// A decoded array
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayRecord {
    /// Object id
    pub object_id: i32,
    /// Source record kind and element typing
    pub kind: ArrayKind,
    /// Declared slot count
    pub length: i32,
    /// Decoded elements. A null run is one element covering several slots.
    pub elements: Vec<MemberValue>,
}

/// A class member or array element
#[derive(Debug, Clone, PartialEq)]
pub enum MemberValue {
    /// Inline fixed-width value
    Scalar(Located<Scalar>),
    /// Nested record
    Record(Record),
}

/// One decoded record
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// Stream header
    Header(StreamHeader),
    /// Library registration
    Library(Library),
    /// Class definition with member types
    ClassDef(ClassObject),
    /// Class instance reusing earlier metadata
    ClassRef(ClassRef),
    /// String object
    String(StringObject),
    /// Any array record
    Array(ArrayRecord),
    /// Standalone typed primitive
    Primitive(Located<Scalar>),
    /// Reference to an object id
    Reference(i32),
    /// Single null
    Null,
    /// Run of nulls
    NullRun {
        /// Null count from the record
        count: u32,
        /// Whether the count was four bytes wide
        wide: bool,
    },
    /// Class reference whose metadata could not be resolved
    Unresolved {
        /// Object id of the reference
        object_id: i32,
        /// Metadata id that was not found
        metadata_id: i32,
    },
    /// Stream terminator
    Terminator,
}

impl Record {
    /// Short lowercase label for log output
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Header(_) => "header",
            Self::Library(_) => "library",
            Self::ClassDef(_) => "class",
            Self::ClassRef(_) => "class-ref",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Primitive(_) => "primitive",
            Self::Reference(_) => "reference",
            Self::Null => "null",
            Self::NullRun { .. } => "null-run",
            Self::Unresolved { .. } => "unresolved",
            Self::Terminator => "terminator",
        }
    }

    /// Object id of records that introduce an addressable object
    pub fn object_id(&self) -> Option<i32> {
        match self {
            Self::ClassDef(obj) => Some(obj.shape.object_id()),
            Self::ClassRef(r) => Some(r.object.shape.object_id()),
            Self::String(s) => Some(s.object_id),
            Self::Array(a) => Some(a.object_id),
            Self::Library(l) => Some(l.library_id),
            Self::Unresolved { object_id, .. } => Some(*object_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_single_projects_shortest_text() {
        assert_eq!(Scalar::Single(0.1).to_json(), json!(0.1));
        assert_eq!(Scalar::Single(1.5).to_json(), json!(1.5));
        assert_eq!(Scalar::Single(f32::NAN).to_json(), Value::Null);
        // a plain widening cast would expose the binary expansion
        assert_ne!(f64::from(0.1f32), 0.1);
    }

    #[test]
    fn test_scalar_decode_tracks_offset() {
        let data = [0xAA, 0x39, 0x05, 0x00, 0x00];
        let mut cursor = ByteCursor::new(&data[..]);
        cursor.set_position(1);
        let v = Scalar::decode(PrimitiveType::Int32, &mut cursor).unwrap();
        assert_eq!(v, Located::new(1, Scalar::Int32(1337)));
    }

    #[test]
    fn test_unsupported_primitive_consumes_nothing() {
        let data = [0u8; 16];
        let mut cursor = ByteCursor::new(&data[..]);
        let err = Scalar::decode(PrimitiveType::Decimal, &mut cursor).unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedPrimitive {
                offset: 0,
                kind: PrimitiveType::Decimal
            }
        ));
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_le_bytes_width() {
        assert_eq!(Scalar::Int16(-2).to_le_bytes(), vec![0xFE, 0xFF]);
        assert_eq!(Scalar::Boolean(true).to_le_bytes(), vec![1]);
        assert_eq!(Scalar::Single(1.0).to_le_bytes(), 1.0f32.to_le_bytes().to_vec());
        assert_eq!(Scalar::DateTime(1).to_le_bytes().len(), 8);
    }

    #[test]
    fn test_from_json_range_checks() {
        assert_eq!(
            Scalar::from_json(PrimitiveType::Int16, &json!(-300)),
            Some(Scalar::Int16(-300))
        );
        assert_eq!(Scalar::from_json(PrimitiveType::Byte, &json!(256)), None);
        assert_eq!(Scalar::from_json(PrimitiveType::UInt32, &json!(-1)), None);
        assert_eq!(Scalar::from_json(PrimitiveType::Boolean, &json!(1)), None);
        assert_eq!(Scalar::from_json(PrimitiveType::Single, &json!(1e300)), None);
        assert_eq!(
            Scalar::from_json(PrimitiveType::Single, &json!(0.1)),
            Some(Scalar::Single(0.1))
        );
    }

    #[test]
    fn test_member_slots_pair_infos_positionally() {
        let name = |s: &str| VarString {
            offset: 0,
            bytes: s.as_bytes().to_vec(),
            decoded_len: s.len() as u32,
            original_encoded: s.len() as u64,
            prefix_len: 1,
        };
        let shape = ClassShape {
            info: ClassInfo {
                object_id: Located::new(0, 1),
                name: name("Item"),
                member_count: 3,
                member_names: vec![name("label"), name("hp"), name("speed")],
            },
            member_types: MemberTypeInfo {
                binary_types: vec![BinaryType::String, BinaryType::Primitive, BinaryType::Primitive],
                additional_infos: vec![
                    AdditionalInfo::Primitive(PrimitiveType::Int32),
                    AdditionalInfo::Primitive(PrimitiveType::Single),
                ],
            },
            library_id: Some(2),
        };
        let slots: Vec<_> = shape.members().collect();
        assert_eq!(slots.len(), 3);
        assert!(slots[0].info.is_none());
        assert_eq!(
            slots[1].info,
            Some(&AdditionalInfo::Primitive(PrimitiveType::Int32))
        );
        assert_eq!(
            slots[2].info,
            Some(&AdditionalInfo::Primitive(PrimitiveType::Single))
        );
    }
}
