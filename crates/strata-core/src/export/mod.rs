//! Projection of decoded records into the export document.
//!
//! The document is an ordered JSON tree:
//!
//! ```text
//! {"records": [
//!     {"class":    {"name": .., "id": .., "members": {..}}},
//!     {"class_id": {"name": .., "id": .., "ref_id": .., "members": {..}}},
//!     {"array_id": .., "values": [..]},
//!     ..
//! ]}
//! ```
//!
//! Member maps keep declaration order (serde_json is built with
//! `preserve_order`). Strings project as `{"obj_string_id", "value"}`,
//! references as `{"reference": id}` and null runs as `{"null_packed": n}`.
//! Headers, libraries, terminators, nulls and unresolved class references
//! have no node of their own at the top level.

mod visitor;

pub use visitor::{walk, NullVisitor, RecordVisitor, StatsVisitor};

use crate::record::{ArrayRecord, ClassObject, MemberValue, Record};
use serde_json::{json, Map, Value};
use tracing::trace;

/// Key of a class definition node
pub const CLASS_KEY: &str = "class";
/// Key of a class reference node
pub const CLASS_REF_KEY: &str = "class_id";
/// Key holding an array's object id
pub const ARRAY_ID_KEY: &str = "array_id";
/// Key holding a string's object id
pub const STRING_ID_KEY: &str = "obj_string_id";

/// Builds the export document for a list of top-level records
pub fn project_records(records: &[Record]) -> Value {
    let projected: Vec<Value> = records
        .iter()
        .filter(|record| has_node(record))
        .map(project)
        .collect();
    trace!(records = records.len(), nodes = projected.len(), "projected");
    json!({ "records": projected })
}

/// Projects a single record. Records without a node project to `null`.
pub fn project(record: &Record) -> Value {
    match record {
        Record::ClassDef(obj) => {
            let mut node = Map::new();
            node.insert("name".into(), Value::from(obj.shape.name().into_owned()));
            node.insert("id".into(), Value::from(obj.shape.object_id()));
            node.insert("members".into(), Value::Object(project_members(obj)));
            json!({ CLASS_KEY: node })
        }
        Record::ClassRef(r) => {
            let obj = &r.object;
            let mut node = Map::new();
            node.insert("name".into(), Value::from(obj.shape.name().into_owned()));
            node.insert("id".into(), Value::from(obj.shape.object_id()));
            node.insert("ref_id".into(), Value::from(r.metadata_id.value));
            node.insert("members".into(), Value::Object(project_members(obj)));
            json!({ CLASS_REF_KEY: node })
        }
        Record::String(s) => json!({
            STRING_ID_KEY: s.object_id,
            "value": s.value.text(),
        }),
        Record::Array(array) => project_array(array),
        Record::Primitive(scalar) => scalar.value.to_json(),
        Record::Reference(id) => json!({ "reference": id }),
        Record::NullRun { count, .. } => json!({ "null_packed": count }),
        Record::Header(_)
        | Record::Library(_)
        | Record::Null
        | Record::Unresolved { .. }
        | Record::Terminator => Value::Null,
    }
}

/// Projects one class member or array element
pub fn project_value(value: &MemberValue) -> Value {
    match value {
        MemberValue::Scalar(scalar) => scalar.value.to_json(),
        MemberValue::Record(record) => project(record),
    }
}

fn project_members(obj: &ClassObject) -> Map<String, Value> {
    obj.shape
        .members()
        .zip(&obj.members)
        .map(|(slot, value)| (slot.name.text().into_owned(), project_value(value)))
        .collect()
}

fn project_array(array: &ArrayRecord) -> Value {
    let values: Vec<Value> = array.elements.iter().map(project_value).collect();
    json!({
        ARRAY_ID_KEY: array.object_id,
        "values": values,
    })
}

/// Whether a top-level record gets a node in the export document.
///
/// The patcher pairs decoded records with document nodes through this same
/// predicate, so the two sides always agree on positions.
pub(crate) fn has_node(record: &Record) -> bool {
    match record {
        Record::ClassDef(_)
        | Record::ClassRef(_)
        | Record::String(_)
        | Record::Array(_)
        | Record::Reference(_)
        | Record::NullRun { .. } => true,
        // non-finite values project to null
        Record::Primitive(scalar) => !scalar.value.to_json().is_null(),
        Record::Header(_)
        | Record::Library(_)
        | Record::Null
        | Record::Unresolved { .. }
        | Record::Terminator => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{Decoder, DecoderConfig, FileStatus};
    use crate::fixtures::{item_stream, Decl, StreamBuilder};
    use crate::wire::PrimitiveType;
    use pretty_assertions::assert_eq;

    fn export(stream: &[u8]) -> (Value, FileStatus) {
        let decoded = Decoder::new(stream, DecoderConfig::default()).read_records();
        (project_records(&decoded.records), decoded.status)
    }

    #[test]
    fn test_class_and_class_ref_nodes() {
        let (doc, status) = export(&item_stream());
        assert_eq!(status, FileStatus::FullRead);
        assert_eq!(
            doc,
            json!({"records": [
                {"class": {"name": "Item", "id": 1, "members": {
                    "name": {"obj_string_id": 3, "value": "Sword"},
                    "hp": 100,
                    "speed": 0.1,
                }}},
                {"class_id": {"name": "Item", "id": 4, "ref_id": 1, "members": {
                    "name": {"obj_string_id": 5, "value": "Shield"},
                    "hp": 250,
                    "speed": 1.5,
                }}},
            ]})
        );
    }

    #[test]
    fn test_member_order_is_declaration_order() {
        let (doc, _) = export(&item_stream());
        let members = doc["records"][0]["class"]["members"].as_object().unwrap();
        let keys: Vec<&str> = members.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["name", "hp", "speed"]);
    }

    #[test]
    fn test_arrays_references_and_null_runs() {
        let stream = StreamBuilder::new()
            .header()
            .object_array(10, 5)
            .reference(3)
            .null_run(2)
            .null()
            .primitive_array(11, 2, PrimitiveType::Boolean)
            .u8(1)
            .u8(0)
            .terminator()
            .build();
        let (doc, status) = export(&stream);
        assert_eq!(status, FileStatus::FullRead);
        assert_eq!(
            doc,
            json!({"records": [
                {"array_id": 10, "values": [{"reference": 3}, {"null_packed": 2}, null]},
                {"array_id": 11, "values": [true, false]},
            ]})
        );
    }

    #[test]
    fn test_unresolved_and_nulls_are_skipped_at_top_level() {
        let stream = StreamBuilder::new()
            .header()
            .null()
            .class_ref(5, 99)
            .string_object(6, "kept")
            .terminator()
            .build();
        let (doc, status) = export(&stream);
        assert_eq!(status, FileStatus::PartialRead);
        assert_eq!(
            doc,
            json!({"records": [{"obj_string_id": 6, "value": "kept"}]})
        );
    }

    #[test]
    fn test_nested_class_member() {
        let stream = StreamBuilder::new()
            .header()
            .library(2, "Game")
            .class_def(1, "Inventory", &[("main", Decl::Class("Item", 2)), ("spare", Decl::Object)], 2)
            .class_def(3, "Item", &[("hp", Decl::Prim(PrimitiveType::UInt16))], 2)
            .i16(9)
            .reference(3)
            .terminator()
            .build();
        let (doc, _) = export(&stream);
        assert_eq!(
            doc["records"][0]["class"]["members"],
            json!({
                "main": {"class": {"name": "Item", "id": 3, "members": {"hp": 9}}},
                "spare": {"reference": 3},
            })
        );
    }
}
