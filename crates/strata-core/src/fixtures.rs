//! Record stream builders for tests.

use crate::wire::{encode_prefix, ArrayShape, BinaryType, PrimitiveType, RecordType};
use bytes::{BufMut, BytesMut};

/// Declared member type, as written into a class definition
#[derive(Debug, Clone, Copy)]
pub(crate) enum Decl {
    Prim(PrimitiveType),
    String,
    Object,
    SystemClass(&'static str),
    Class(&'static str, i32),
    ObjectArray,
    StringArray,
    PrimitiveArray(PrimitiveType),
    None,
}

impl Decl {
    fn binary_type(self) -> BinaryType {
        match self {
            Self::Prim(_) => BinaryType::Primitive,
            Self::String => BinaryType::String,
            Self::Object => BinaryType::Object,
            Self::SystemClass(_) => BinaryType::SystemClass,
            Self::Class(..) => BinaryType::Class,
            Self::ObjectArray => BinaryType::ObjectArray,
            Self::StringArray => BinaryType::StringArray,
            Self::PrimitiveArray(_) => BinaryType::PrimitiveArray,
            Self::None => BinaryType::None,
        }
    }
}

/// Appends records to a byte buffer.
#[derive(Debug, Default)]
pub(crate) struct StreamBuilder {
    buf: BytesMut,
}

impl StreamBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Current length, i.e. the offset the next byte lands at
    pub(crate) fn offset(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn tag(mut self, kind: RecordType) -> Self {
        self.buf.put_u8(kind as u8);
        self
    }

    pub(crate) fn u8(mut self, v: u8) -> Self {
        self.buf.put_u8(v);
        self
    }

    pub(crate) fn i16(mut self, v: i16) -> Self {
        self.buf.put_i16_le(v);
        self
    }

    pub(crate) fn i32(mut self, v: i32) -> Self {
        self.buf.put_i32_le(v);
        self
    }

    pub(crate) fn i64(mut self, v: i64) -> Self {
        self.buf.put_i64_le(v);
        self
    }

    pub(crate) fn f32(mut self, v: f32) -> Self {
        self.buf.put_f32_le(v);
        self
    }

    pub(crate) fn f64(mut self, v: f64) -> Self {
        self.buf.put_f64_le(v);
        self
    }

    /// Length-prefixed string
    pub(crate) fn string(mut self, text: &str) -> Self {
        self.buf.put_slice(&encode_prefix(text.len() as u32));
        self.buf.put_slice(text.as_bytes());
        self
    }

    pub(crate) fn header_with(self, root: i32, header: i32, major: i32, minor: i32) -> Self {
        self.tag(RecordType::SerializedStreamHeader)
            .i32(root)
            .i32(header)
            .i32(major)
            .i32(minor)
    }

    pub(crate) fn header(self) -> Self {
        self.header_with(1, -1, 1, 0)
    }

    pub(crate) fn terminator(self) -> Self {
        self.tag(RecordType::MessageEnd)
    }

    pub(crate) fn library(self, id: i32, name: &str) -> Self {
        self.tag(RecordType::BinaryLibrary).i32(id).string(name)
    }

    fn class_body(mut self, id: i32, name: &str, members: &[(&str, Decl)]) -> Self {
        self = self.i32(id).string(name).i32(members.len() as i32);
        for (member, _) in members {
            self = self.string(member);
        }
        for (_, decl) in members {
            self = self.u8(decl.binary_type() as u8);
        }
        for (_, decl) in members {
            self = match *decl {
                Decl::Prim(p) | Decl::PrimitiveArray(p) => self.u8(p as u8),
                Decl::SystemClass(type_name) => self.string(type_name),
                Decl::Class(type_name, library) => self.string(type_name).i32(library),
                _ => self,
            };
        }
        self
    }

    /// Class definition header; member values follow separately
    pub(crate) fn class_def(self, id: i32, name: &str, members: &[(&str, Decl)], library: i32) -> Self {
        self.tag(RecordType::ClassWithMembersAndTypes)
            .class_body(id, name, members)
            .i32(library)
    }

    /// System class definition header (no library id)
    pub(crate) fn system_class_def(self, id: i32, name: &str, members: &[(&str, Decl)]) -> Self {
        self.tag(RecordType::SystemClassWithMembersAndTypes)
            .class_body(id, name, members)
    }

    pub(crate) fn class_ref(self, id: i32, metadata_id: i32) -> Self {
        self.tag(RecordType::ClassWithId).i32(id).i32(metadata_id)
    }

    pub(crate) fn string_object(self, id: i32, text: &str) -> Self {
        self.tag(RecordType::BinaryObjectString).i32(id).string(text)
    }

    pub(crate) fn reference(self, id: i32) -> Self {
        self.tag(RecordType::MemberReference).i32(id)
    }

    pub(crate) fn null(self) -> Self {
        self.tag(RecordType::ObjectNull)
    }

    pub(crate) fn null_run(self, count: u8) -> Self {
        self.tag(RecordType::ObjectNullMultiple256).u8(count)
    }

    pub(crate) fn null_run_wide(self, count: i32) -> Self {
        self.tag(RecordType::ObjectNullMultiple).i32(count)
    }

    /// Single-dimension `BinaryArray` header with a `Class` element type
    pub(crate) fn class_array(self, id: i32, len: i32, type_name: &str, library: i32) -> Self {
        self.tag(RecordType::BinaryArray)
            .i32(id)
            .u8(ArrayShape::Single as u8)
            .i32(1)
            .i32(len)
            .u8(BinaryType::Class as u8)
            .string(type_name)
            .i32(library)
    }

    pub(crate) fn primitive_array(self, id: i32, len: i32, kind: PrimitiveType) -> Self {
        self.tag(RecordType::ArraySinglePrimitive)
            .i32(id)
            .i32(len)
            .u8(kind as u8)
    }

    pub(crate) fn string_array(self, id: i32, len: i32) -> Self {
        self.tag(RecordType::ArraySingleString).i32(id).i32(len)
    }

    pub(crate) fn object_array(self, id: i32, len: i32) -> Self {
        self.tag(RecordType::ArraySingleObject).i32(id).i32(len)
    }

    pub(crate) fn build(self) -> Vec<u8> {
        self.buf.to_vec()
    }
}

/// Header, a library, one `Item` class (`name`, `hp`, `speed`), a second
/// instance through a class reference, terminator.
pub(crate) fn item_stream() -> Vec<u8> {
    let members = [
        ("name", Decl::String),
        ("hp", Decl::Prim(PrimitiveType::Int32)),
        ("speed", Decl::Prim(PrimitiveType::Single)),
    ];
    StreamBuilder::new()
        .header()
        .library(2, "Game")
        .class_def(1, "Item", &members, 2)
        .string_object(3, "Sword")
        .i32(100)
        .f32(0.1)
        .class_ref(4, 1)
        .string_object(5, "Shield")
        .i32(250)
        .f32(1.5)
        .terminator()
        .build()
}
