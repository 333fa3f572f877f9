//! Class metadata and member value decoding.

use super::Decoder;
use crate::error::{Error, Result};
use crate::record::{
    AdditionalInfo, ClassInfo, ClassShape, ClassTypeInfo, Located, MemberTypeInfo, MemberValue,
    Record, Scalar,
};
use crate::wire::{BinaryType, PrimitiveType, VarString};
use tracing::{debug, trace};

impl Decoder<'_> {
    pub(super) fn read_class_info(&mut self) -> Result<ClassInfo> {
        let id_offset = self.position();
        let object_id = Located::new(id_offset, self.cursor.read_i32()?);
        let name = VarString::decode(&mut self.cursor)?;
        let member_count = self.read_count()?;

        let mut member_names = Vec::with_capacity(member_count.min(self.cursor.remaining()));
        for _ in 0..member_count {
            member_names.push(VarString::decode(&mut self.cursor)?);
        }
        Ok(ClassInfo {
            object_id,
            name,
            member_count: member_count as i32,
            member_names,
        })
    }

    /// Reads the member type tags, then the additional infos of the tags that carry one
    pub(super) fn read_member_types(&mut self, info: &ClassInfo) -> Result<MemberTypeInfo> {
        let binary_types = (0..info.member_names.len())
            .map(|_| self.read_binary_type())
            .collect::<Result<Vec<_>>>()?;

        let mut additional_infos = Vec::new();
        for &binary_type in &binary_types {
            if let Some(extra) = self.read_additional_info(binary_type)? {
                additional_infos.push(extra);
            }
        }
        Ok(MemberTypeInfo {
            binary_types,
            additional_infos,
        })
    }

    pub(super) fn read_additional_info(
        &mut self,
        binary_type: BinaryType,
    ) -> Result<Option<AdditionalInfo>> {
        Ok(match binary_type {
            BinaryType::Primitive | BinaryType::PrimitiveArray => {
                Some(AdditionalInfo::Primitive(self.read_primitive_type()?))
            }
            BinaryType::SystemClass => Some(AdditionalInfo::SystemClass(VarString::decode(
                &mut self.cursor,
            )?)),
            BinaryType::Class => {
                let type_name = VarString::decode(&mut self.cursor)?;
                let library_id = self.cursor.read_i32()?;
                match self.table.library(library_id) {
                    Some(library) => trace!(
                        library_id,
                        library,
                        type_name = %type_name.text(),
                        "class member type"
                    ),
                    None => trace!(library_id, "class type names an unregistered library"),
                }
                Some(AdditionalInfo::Class(ClassTypeInfo {
                    type_name,
                    library_id,
                }))
            }
            BinaryType::String
            | BinaryType::Object
            | BinaryType::ObjectArray
            | BinaryType::StringArray
            | BinaryType::None => None,
        })
    }

    /// Decodes one value per member, in declaration order
    pub(super) fn read_members(&mut self, shape: &ClassShape) -> Result<Vec<MemberValue>> {
        let mut values = Vec::with_capacity(shape.info.member_names.len());
        for slot in shape.members() {
            let primitive = match slot.info {
                Some(AdditionalInfo::Primitive(p)) => Some(*p),
                _ => None,
            };
            let value = self.read_element(slot.binary_type, primitive)?;
            trace!(member = %slot.name.text(), kind = slot.binary_type.as_str(), "member");
            values.push(value);
        }
        Ok(values)
    }

    /// Decodes one member or array element.
    ///
    /// Only `Primitive` is read inline; every other tag is a nested record,
    /// which may be of a different kind than the tag declares (a reference or
    /// null in place of a class, for example).
    pub(super) fn read_element(
        &mut self,
        binary_type: BinaryType,
        primitive: Option<PrimitiveType>,
    ) -> Result<MemberValue> {
        match binary_type {
            BinaryType::Primitive => {
                let kind = primitive.ok_or_else(|| {
                    Error::internal("primitive member without a primitive type")
                })?;
                Ok(MemberValue::Scalar(Scalar::decode(kind, &mut self.cursor)?))
            }
            BinaryType::String => {
                let record = self.decode_nested()?;
                if !matches!(
                    record,
                    Record::String(_) | Record::Reference(_) | Record::Null
                ) {
                    debug!(kind = record.kind_name(), "string member holds another record kind");
                }
                Ok(MemberValue::Record(record))
            }
            BinaryType::Object
            | BinaryType::SystemClass
            | BinaryType::Class
            | BinaryType::ObjectArray
            | BinaryType::StringArray
            | BinaryType::PrimitiveArray
            | BinaryType::None => Ok(MemberValue::Record(self.decode_nested()?)),
        }
    }

    /// Decodes `length` array slots. A null run covers its count plus one slot.
    pub(super) fn read_elements(
        &mut self,
        length: usize,
        element: BinaryType,
        primitive: Option<PrimitiveType>,
    ) -> Result<Vec<MemberValue>> {
        let mut elements = Vec::with_capacity(length.min(self.cursor.remaining()));
        let mut slot = 0usize;
        while slot < length {
            let value = self.read_element(element, primitive)?;
            if let MemberValue::Record(Record::NullRun { count, .. }) = &value {
                slot = slot.saturating_add(*count as usize);
            }
            slot += 1;
            elements.push(value);
        }
        if slot > length {
            debug!(slot, length, "null run overruns the array length");
        }
        Ok(elements)
    }
}

#[cfg(test)]
mod tests {
    use crate::decoder::{Decoder, DecoderConfig, FileStatus};
    use crate::fixtures::{Decl, StreamBuilder};
    use crate::record::{AdditionalInfo, ArrayKind, MemberValue, Record};
    use crate::wire::{BinaryType, PrimitiveType};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_every_member_kind() {
        let members = [
            ("guid", Decl::SystemClass("System.Guid")),
            ("objs", Decl::ObjectArray),
            ("names", Decl::StringArray),
            ("nums", Decl::PrimitiveArray(PrimitiveType::Int32)),
            ("misc", Decl::None),
        ];
        let stream = StreamBuilder::new()
            .header()
            .class_def(1, "Bag", &members, 2)
            .reference(9)
            .object_array(20, 1)
            .null()
            .string_array(21, 1)
            .string_object(22, "n")
            .primitive_array(23, 2, PrimitiveType::Int32)
            .i32(1)
            .i32(2)
            .null()
            .terminator()
            .build();
        let decoded = Decoder::new(&stream, DecoderConfig::default()).read_records();
        assert_eq!(decoded.status, FileStatus::FullRead);

        let Record::ClassDef(obj) = &decoded.records[0] else {
            panic!("expected class, got {:?}", decoded.records[0]);
        };
        // only SystemClass and PrimitiveArray carry an additional info
        assert_eq!(obj.shape.member_types.additional_infos.len(), 2);
        let slots: Vec<_> = obj.shape.members().collect();
        assert_eq!(slots[0].binary_type, BinaryType::SystemClass);
        assert!(matches!(slots[0].info, Some(AdditionalInfo::SystemClass(_))));
        assert!(slots[1].info.is_none());
        assert_eq!(
            slots[3].info,
            Some(&AdditionalInfo::Primitive(PrimitiveType::Int32))
        );

        assert_eq!(obj.members[0], MemberValue::Record(Record::Reference(9)));
        match &obj.members[3] {
            MemberValue::Record(Record::Array(array)) => {
                assert_eq!(array.kind, ArrayKind::SinglePrimitive(PrimitiveType::Int32));
                assert_eq!(array.elements.len(), 2);
            }
            other => panic!("expected array member, got {:?}", other),
        }
        assert_eq!(obj.members[4], MemberValue::Record(Record::Null));
    }
}
