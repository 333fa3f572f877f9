//! Writing an edited export document back into a record stream.
//!
//! The patcher decodes the stream afresh, then walks the decoded records
//! and the export document side by side. Fixed-width values that differ
//! from the document are overwritten at their recorded offsets right away.
//! String changes are staged in an [`EditList`] and spliced in once the walk
//! is done, highest offset first.
//!
//! Matching follows the export layout. Class nodes are located by name and
//! id; class reference nodes by `ref_id`; arrays by `array_id`. When the
//! node at the expected position does not match, the top-level records of
//! the document are searched instead, by id only. An array whose value
//! count differs from the stream is left alone as a whole.
//!
//! Field-level problems (a missing member, a value of the wrong type, an
//! unsafe string edit) are logged and counted in [`PatchReport::skipped`];
//! the rest of the patch still goes through.

mod edits;

pub use edits::{EditList, StringEdit};

use crate::cursor::ByteCursor;
use crate::decoder::{DecoderConfig, Decoder, FileStatus};
use crate::error::{Error, Result};
use crate::export::{has_node, ARRAY_ID_KEY, CLASS_KEY, CLASS_REF_KEY, STRING_ID_KEY};
use crate::record::{ArrayRecord, ClassObject, ClassRef, Located, MemberValue, Record, Scalar, StringObject};
use crate::wire::prefix_len_for;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

/// Configuration for the patcher
#[derive(Debug, Clone, Default)]
pub struct PatchConfig {
    /// Allow string edits that change the width of the length prefix
    pub allow_resize: bool,
    /// Decoder settings for the fresh read
    pub decoder: DecoderConfig,
}

impl PatchConfig {
    /// Creates a new patch config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether prefix-width-changing string edits are applied
    pub fn allow_resize(mut self, allow: bool) -> Self {
        self.allow_resize = allow;
        self
    }

    /// Sets the decoder settings
    pub fn decoder(mut self, config: DecoderConfig) -> Self {
        self.decoder = config;
        self
    }
}

/// Summary of one patch pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PatchReport {
    /// Fixed-width values overwritten
    pub scalars_written: usize,
    /// Strings replaced
    pub strings_written: usize,
    /// Fields left untouched because they could not be matched or written
    pub skipped: usize,
}

impl PatchReport {
    /// Whether the pass changed any bytes
    pub fn is_unchanged(&self) -> bool {
        self.scalars_written == 0 && self.strings_written == 0
    }
}

/// Applies `document` to `stream` in place.
///
/// Fails only when the stream header is invalid or the staged edits cannot
/// be spliced; per-field problems are counted in the report instead.
pub fn patch_stream(stream: &mut Vec<u8>, document: &Value, config: &PatchConfig) -> Result<PatchReport> {
    let decoded = Decoder::new(stream.as_slice(), config.decoder.clone()).read_records();
    match decoded.status {
        FileStatus::Invalid => return Err(Error::invalid_header("cannot patch a stream without a valid header")),
        FileStatus::PartialRead => warn!("patching a partially decoded stream; unread records stay as they are"),
        FileStatus::Empty | FileStatus::FullRead => {}
    }

    let top = document
        .get("records")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::field_mismatch("records", "document has no top-level records array"))?;

    let (edits, mut report) = {
        let mut walker = Walker {
            cursor: ByteCursor::new(&mut *stream),
            top,
            config,
            edits: EditList::new(),
            report: PatchReport::default(),
        };
        walker.top_level(&decoded.records)?;
        (walker.edits, walker.report)
    };

    report.strings_written = edits.apply(stream)?;
    info!(
        scalars = report.scalars_written,
        strings = report.strings_written,
        skipped = report.skipped,
        "patch applied"
    );
    Ok(report)
}

struct Walker<'j, 'b> {
    cursor: ByteCursor<&'b mut Vec<u8>>,
    top: &'j [Value],
    config: &'j PatchConfig,
    edits: EditList,
    report: PatchReport,
}

impl<'j> Walker<'j, '_> {
    fn top_level(&mut self, records: &[Record]) -> Result<()> {
        let top = self.top;
        let mut nodes = top.iter();
        for record in records {
            if !has_node(record) {
                continue;
            }
            let node = nodes.next();
            self.record(record, node, record.kind_name())?;
        }
        Ok(())
    }

    fn skip(&mut self, err: Error) {
        debug_assert!(err.is_recoverable());
        warn!("{}", err);
        self.report.skipped += 1;
    }

    fn record(&mut self, record: &Record, node: Option<&'j Value>, field: &str) -> Result<()> {
        match record {
            Record::ClassDef(obj) => match self.locate_class(obj, node) {
                Some(members) => self.members(obj, members),
                None => {
                    self.skip(Error::field_mismatch(
                        obj.shape.name(),
                        format!("no class node with id {}", obj.shape.object_id()),
                    ));
                    Ok(())
                }
            },
            Record::ClassRef(r) => match self.locate_class_ref(r, node) {
                Some(members) => self.members(&r.object, members),
                None => {
                    self.skip(Error::field_mismatch(
                        r.object.shape.name(),
                        format!("no class_id node with ref_id {}", r.metadata_id.value),
                    ));
                    Ok(())
                }
            },
            Record::Array(array) => match self.locate_array(array, node) {
                Some(values) if values.len() != array.elements.len() => {
                    self.skip(Error::field_mismatch(
                        field,
                        format!(
                            "array {} holds {} value(s), the document has {}",
                            array.object_id,
                            array.elements.len(),
                            values.len()
                        ),
                    ));
                    Ok(())
                }
                Some(values) => {
                    for (i, element) in array.elements.iter().enumerate() {
                        let element_field = format!("{field}[{i}]");
                        self.value(element, values.get(i), &element_field)?;
                    }
                    Ok(())
                }
                None => {
                    self.skip(Error::field_mismatch(
                        field,
                        format!("no array node with array_id {}", array.object_id),
                    ));
                    Ok(())
                }
            },
            Record::String(s) => {
                self.string(s, node, field);
                Ok(())
            }
            Record::Primitive(scalar) => self.scalar(scalar, node, field),
            Record::Header(_)
            | Record::Library(_)
            | Record::Reference(_)
            | Record::Null
            | Record::NullRun { .. }
            | Record::Unresolved { .. }
            | Record::Terminator => Ok(()),
        }
    }

    fn members(&mut self, obj: &ClassObject, members: &'j Map<String, Value>) -> Result<()> {
        for (slot, value) in obj.shape.members().zip(&obj.members) {
            let name = slot.name.text();
            self.value(value, members.get(&*name), &name)?;
        }
        Ok(())
    }

    fn value(&mut self, value: &MemberValue, node: Option<&'j Value>, field: &str) -> Result<()> {
        match value {
            MemberValue::Scalar(scalar) => self.scalar(scalar, node, field),
            MemberValue::Record(record) => self.record(record, node, field),
        }
    }

    fn scalar(&mut self, scalar: &Located<Scalar>, node: Option<&Value>, field: &str) -> Result<()> {
        let Some(node) = node else {
            self.skip(Error::field_mismatch(field, "missing from the document"));
            return Ok(());
        };
        if scalar.value.to_json() == *node {
            return Ok(());
        }
        let kind = scalar.value.kind();
        let Some(new) = Scalar::from_json(kind, node) else {
            self.skip(Error::field_mismatch(field, format!("{node} does not fit a {kind:?} field")));
            return Ok(());
        };
        if new == scalar.value {
            return Ok(());
        }
        self.cursor.write_at(scalar.offset, &new.to_le_bytes())?;
        debug!(field, offset = scalar.offset, old = ?scalar.value, new = ?new, "scalar written");
        self.report.scalars_written += 1;
        Ok(())
    }

    fn string(&mut self, string: &StringObject, node: Option<&'j Value>, field: &str) {
        let node = match node {
            Some(Value::Object(map))
                if map
                    .get(STRING_ID_KEY)
                    .and_then(Value::as_i64)
                    .is_some_and(|id| id != i64::from(string.object_id)) =>
            {
                self.find_top(|n| {
                    n.get(STRING_ID_KEY).and_then(Value::as_i64) == Some(i64::from(string.object_id))
                })
            }
            other => other,
        };
        let text = match node {
            Some(Value::String(text)) => Some(text.as_str()),
            Some(Value::Object(map)) => map.get("value").and_then(Value::as_str),
            _ => None,
        };
        let Some(text) = text else {
            self.skip(Error::field_mismatch(
                field,
                format!("no string value for obj_string_id {}", string.object_id),
            ));
            return;
        };
        if string.value.text() == text {
            return;
        }

        let old_prefix = usize::from(string.value.prefix_len);
        let new_prefix = prefix_len_for(u32::try_from(text.len()).unwrap_or(u32::MAX));
        if !self.config.allow_resize && (old_prefix != 1 || new_prefix != 1) {
            self.skip(Error::UnsafeStringEdit {
                offset: string.value.offset,
                old_prefix,
                new_prefix,
            });
            return;
        }
        match StringEdit::replace(&string.value, text.as_bytes()) {
            Ok(edit) => {
                debug!(field, offset = edit.offset, delta = edit.delta(), "string staged");
                self.edits.push(edit);
            }
            Err(e) => self.skip(Error::field_mismatch(field, e.to_string())),
        }
    }

    fn find_top(&self, pred: impl Fn(&Value) -> bool) -> Option<&'j Value> {
        self.top.iter().find(|node| pred(node))
    }

    fn locate_class(&self, obj: &ClassObject, node: Option<&'j Value>) -> Option<&'j Map<String, Value>> {
        let name = obj.shape.name();
        let id = i64::from(obj.shape.object_id());
        let is_match = |n: &Value, check_id: bool| {
            n.get(CLASS_KEY).is_some_and(|c| {
                c.get("name").and_then(Value::as_str) == Some(&*name)
                    && (!check_id || c.get("id").and_then(Value::as_i64) == Some(id))
            })
        };
        node.filter(|n| is_match(n, true))
            .or_else(|| self.find_top(|n| is_match(n, true)))
            .or_else(|| node.filter(|n| is_match(n, false)))
            .and_then(|n| n[CLASS_KEY].get("members"))
            .and_then(Value::as_object)
    }

    fn locate_class_ref(&self, r: &ClassRef, node: Option<&'j Value>) -> Option<&'j Map<String, Value>> {
        let ref_id = i64::from(r.metadata_id.value);
        let id = i64::from(r.object.shape.object_id());
        let is_match = |n: &Value, check_id: bool| {
            n.get(CLASS_REF_KEY).is_some_and(|c| {
                c.get("ref_id").and_then(Value::as_i64) == Some(ref_id)
                    && (!check_id || c.get("id").and_then(Value::as_i64) == Some(id))
            })
        };
        node.filter(|n| is_match(n, true))
            .or_else(|| self.find_top(|n| is_match(n, true)))
            .or_else(|| node.filter(|n| is_match(n, false)))
            .and_then(|n| n[CLASS_REF_KEY].get("members"))
            .and_then(Value::as_object)
    }

    fn locate_array(&self, array: &ArrayRecord, node: Option<&'j Value>) -> Option<&'j Vec<Value>> {
        let id = i64::from(array.object_id);
        let is_match = |n: &Value| n.get(ARRAY_ID_KEY).and_then(Value::as_i64) == Some(id);
        node.filter(|n| is_match(n))
            .or_else(|| self.find_top(is_match))
            .and_then(|n| n.get("values"))
            .and_then(Value::as_array)
    }
}
