//! Low-level wire format definitions.
//!
//! This module names the tag enumerations of the record stream and provides
//! the length-prefixed string codec.
//!
//! ## Wire Format Overview
//!
//! A file is a flat sequence of records. Every record starts with a one-byte
//! [`RecordType`] tag followed by a kind-specific body. Multi-byte integers are
//! little-endian. Strings are written as a base-128 length prefix followed by
//! the raw payload bytes (see [`VarString`]).
//!
//! Class records describe their members with one [`BinaryType`] tag per member;
//! some of those tags are followed by additional type information such as a
//! [`PrimitiveType`] tag.

mod varstring;

pub use varstring::{encode_prefix, encode_string, prefix_len_for, VarString, MAX_PREFIX_LEN};

/// Record tags (first byte of every record)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RecordType {
    /// Stream header, always first
    SerializedStreamHeader = 0,
    /// Class instance reusing earlier metadata
    ClassWithId = 1,
    /// System class without member types
    SystemClassWithMembers = 2,
    /// Class without member types
    ClassWithMembers = 3,
    /// System class with member types (no library id)
    SystemClassWithMembersAndTypes = 4,
    /// Class with member types
    ClassWithMembersAndTypes = 5,
    /// String object
    BinaryObjectString = 6,
    /// General array
    BinaryArray = 7,
    /// Standalone typed primitive
    MemberPrimitiveTyped = 8,
    /// Reference to an object id
    MemberReference = 9,
    /// Single null
    ObjectNull = 10,
    /// Stream terminator
    MessageEnd = 11,
    /// Library name registration
    BinaryLibrary = 12,
    /// Run of nulls, one-byte count
    ObjectNullMultiple256 = 13,
    /// Run of nulls, four-byte count
    ObjectNullMultiple = 14,
    /// Single-dimension array of primitives
    ArraySinglePrimitive = 15,
    /// Single-dimension array of objects
    ArraySingleObject = 16,
    /// Single-dimension array of strings
    ArraySingleString = 17,
    /// Remote method call
    MethodCall = 21,
    /// Remote method return
    MethodReturn = 22,
}

impl TryFrom<u8> for RecordType {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, u8> {
        Ok(match value {
            0 => Self::SerializedStreamHeader,
            1 => Self::ClassWithId,
            2 => Self::SystemClassWithMembers,
            3 => Self::ClassWithMembers,
            4 => Self::SystemClassWithMembersAndTypes,
            5 => Self::ClassWithMembersAndTypes,
            6 => Self::BinaryObjectString,
            7 => Self::BinaryArray,
            8 => Self::MemberPrimitiveTyped,
            9 => Self::MemberReference,
            10 => Self::ObjectNull,
            11 => Self::MessageEnd,
            12 => Self::BinaryLibrary,
            13 => Self::ObjectNullMultiple256,
            14 => Self::ObjectNullMultiple,
            15 => Self::ArraySinglePrimitive,
            16 => Self::ArraySingleObject,
            17 => Self::ArraySingleString,
            21 => Self::MethodCall,
            22 => Self::MethodReturn,
            other => return Err(other),
        })
    }
}

/// Declared member/element type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BinaryType {
    /// Fixed-width primitive; carries a [`PrimitiveType`]
    Primitive = 0,
    /// String object
    String = 1,
    /// Any object
    Object = 2,
    /// System class; carries a type name
    SystemClass = 3,
    /// User class; carries a [`ClassTypeInfo`](crate::record::ClassTypeInfo)
    Class = 4,
    /// Array of objects
    ObjectArray = 5,
    /// Array of strings
    StringArray = 6,
    /// Array of primitives; carries a [`PrimitiveType`]
    PrimitiveArray = 7,
    /// Untyped slot
    None = 8,
}

impl BinaryType {
    /// Whether this tag is followed by an additional-info entry
    pub fn has_additional_info(self) -> bool {
        matches!(
            self,
            Self::Primitive | Self::SystemClass | Self::Class | Self::PrimitiveArray
        )
    }

    /// Short lowercase label used in log output
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primitive => "primitive",
            Self::String => "string",
            Self::Object => "object",
            Self::SystemClass => "system-class",
            Self::Class => "class",
            Self::ObjectArray => "object-array",
            Self::StringArray => "string-array",
            Self::PrimitiveArray => "primitive-array",
            Self::None => "none",
        }
    }
}

impl TryFrom<u8> for BinaryType {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, u8> {
        Ok(match value {
            0 => Self::Primitive,
            1 => Self::String,
            2 => Self::Object,
            3 => Self::SystemClass,
            4 => Self::Class,
            5 => Self::ObjectArray,
            6 => Self::StringArray,
            7 => Self::PrimitiveArray,
            8 => Self::None,
            other => return Err(other),
        })
    }
}

/// Primitive value tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PrimitiveType {
    /// 1-byte boolean
    Boolean = 1,
    /// Unsigned byte
    Byte = 2,
    /// Single-byte character
    Char = 3,
    /// 128-bit decimal (unsupported)
    Decimal = 5,
    /// IEEE-754 double
    Double = 6,
    /// Signed 16-bit
    Int16 = 7,
    /// Signed 32-bit
    Int32 = 8,
    /// Signed 64-bit
    Int64 = 9,
    /// Signed byte (unsupported)
    SByte = 10,
    /// IEEE-754 single
    Single = 11,
    /// Tick count as signed 64-bit
    TimeSpan = 12,
    /// Tick count as 64-bit
    DateTime = 13,
    /// Unsigned 16-bit
    UInt16 = 14,
    /// Unsigned 32-bit
    UInt32 = 15,
    /// Unsigned 64-bit
    UInt64 = 16,
    /// Null primitive (unsupported)
    Null = 17,
    /// String primitive (unsupported)
    String = 18,
}

impl PrimitiveType {
    /// On-disk width in bytes, or `None` for kinds this codec refuses.
    pub fn width(self) -> Option<usize> {
        match self {
            Self::Boolean | Self::Byte | Self::Char => Some(1),
            Self::Int16 | Self::UInt16 => Some(2),
            Self::Int32 | Self::UInt32 | Self::Single => Some(4),
            Self::Int64 | Self::UInt64 | Self::Double | Self::TimeSpan | Self::DateTime => Some(8),
            Self::Decimal | Self::SByte | Self::Null | Self::String => None,
        }
    }
}

impl TryFrom<u8> for PrimitiveType {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, u8> {
        Ok(match value {
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
            other => return Err(other),
        })
    }
}

/// Shape of a [`RecordType::BinaryArray`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ArrayShape {
    /// One dimension
    Single = 0,
    /// Array of arrays
    Jagged = 1,
    /// Multi-dimensional
    Rectangular = 2,
    /// One dimension with lower bound
    SingleOffset = 3,
    /// Jagged with lower bounds
    JaggedOffset = 4,
    /// Rectangular with lower bounds
    RectangularOffset = 5,
}

impl ArrayShape {
    /// Whether lower bounds follow the lengths
    pub fn has_lower_bounds(self) -> bool {
        matches!(
            self,
            Self::SingleOffset | Self::JaggedOffset | Self::RectangularOffset
        )
    }
}

impl TryFrom<u8> for ArrayShape {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, u8> {
        Ok(match value {
            0 => Self::Single,
            1 => Self::Jagged,
            2 => Self::Rectangular,
            3 => Self::SingleOffset,
            4 => Self::JaggedOffset,
            5 => Self::RectangularOffset,
            other => return Err(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_type_conversion() {
        assert_eq!(RecordType::try_from(0), Ok(RecordType::SerializedStreamHeader));
        assert_eq!(RecordType::try_from(5), Ok(RecordType::ClassWithMembersAndTypes));
        assert_eq!(RecordType::try_from(11), Ok(RecordType::MessageEnd));
        assert_eq!(RecordType::try_from(17), Ok(RecordType::ArraySingleString));
        assert_eq!(RecordType::try_from(18), Err(18));
        assert_eq!(RecordType::try_from(255), Err(255));
    }

    #[test]
    fn test_additional_info_tags() {
        assert!(BinaryType::Primitive.has_additional_info());
        assert!(BinaryType::Class.has_additional_info());
        assert!(BinaryType::SystemClass.has_additional_info());
        assert!(BinaryType::PrimitiveArray.has_additional_info());
        assert!(!BinaryType::String.has_additional_info());
        assert!(!BinaryType::ObjectArray.has_additional_info());
        assert!(!BinaryType::None.has_additional_info());
    }

    #[test]
    fn test_primitive_widths() {
        assert_eq!(PrimitiveType::Boolean.width(), Some(1));
        assert_eq!(PrimitiveType::Single.width(), Some(4));
        assert_eq!(PrimitiveType::DateTime.width(), Some(8));
        assert_eq!(PrimitiveType::Decimal.width(), None);
        assert_eq!(PrimitiveType::SByte.width(), None);
        assert!(PrimitiveType::try_from(4).is_err());
    }

    #[test]
    fn test_array_shape_lower_bounds() {
        assert!(!ArrayShape::Single.has_lower_bounds());
        assert!(ArrayShape::SingleOffset.has_lower_bounds());
        assert!(ArrayShape::try_from(6).is_err());
    }
}
