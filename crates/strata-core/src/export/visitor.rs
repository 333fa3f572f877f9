//! Extensible record traversal.
//!
//! [`walk`] visits every record and scalar reachable from a record list,
//! depth first, calling back into a [`RecordVisitor`].

use crate::record::{ArrayRecord, ClassObject, ClassRef, Located, MemberValue, Record, Scalar, StringObject};

/// Callbacks for [`walk`].
///
/// Every method has a no-op default, so implementors only override the
/// record kinds they care about.
///
/// # Example
///
/// ```
/// use strata_core::export::{walk, RecordVisitor};
/// use strata_core::record::StringObject;
///
/// #[derive(Default)]
/// struct Strings(Vec<String>);
///
/// impl RecordVisitor for Strings {
///     fn visit_string(&mut self, string: &StringObject) {
///         self.0.push(string.value.text().into_owned());
///     }
/// }
///
/// let mut strings = Strings::default();
/// walk(&[], &mut strings);
/// assert!(strings.0.is_empty());
/// ```
pub trait RecordVisitor {
    /// A class definition, before its members
    fn visit_class(&mut self, class: &ClassObject) {
        let _ = class;
    }

    /// A class reference, before its members
    fn visit_class_ref(&mut self, class_ref: &ClassRef) {
        let _ = class_ref;
    }

    /// An array, before its elements
    fn visit_array(&mut self, array: &ArrayRecord) {
        let _ = array;
    }

    /// A string object
    fn visit_string(&mut self, string: &StringObject) {
        let _ = string;
    }

    /// A reference to an object id
    fn visit_reference(&mut self, id: i32) {
        let _ = id;
    }

    /// A single null, or an unresolved class reference
    fn visit_null(&mut self) {}

    /// A run of nulls
    fn visit_null_run(&mut self, count: u32) {
        let _ = count;
    }

    /// An inline or standalone primitive
    fn visit_scalar(&mut self, scalar: &Located<Scalar>) {
        let _ = scalar;
    }
}

/// Visits `records` and everything nested in them
pub fn walk<V: RecordVisitor + ?Sized>(records: &[Record], visitor: &mut V) {
    for record in records {
        walk_record(record, visitor);
    }
}

fn walk_record<V: RecordVisitor + ?Sized>(record: &Record, visitor: &mut V) {
    match record {
        Record::ClassDef(obj) => {
            visitor.visit_class(obj);
            walk_values(&obj.members, visitor);
        }
        Record::ClassRef(r) => {
            visitor.visit_class_ref(r);
            walk_values(&r.object.members, visitor);
        }
        Record::Array(array) => {
            visitor.visit_array(array);
            walk_values(&array.elements, visitor);
        }
        Record::String(s) => visitor.visit_string(s),
        Record::Primitive(scalar) => visitor.visit_scalar(scalar),
        Record::Reference(id) => visitor.visit_reference(*id),
        Record::Null | Record::Unresolved { .. } => visitor.visit_null(),
        Record::NullRun { count, .. } => visitor.visit_null_run(*count),
        Record::Header(_) | Record::Library(_) | Record::Terminator => {}
    }
}

fn walk_values<V: RecordVisitor + ?Sized>(values: &[MemberValue], visitor: &mut V) {
    for value in values {
        match value {
            MemberValue::Scalar(scalar) => visitor.visit_scalar(scalar),
            MemberValue::Record(record) => walk_record(record, visitor),
        }
    }
}

/// A visitor that ignores everything
pub struct NullVisitor;

impl RecordVisitor for NullVisitor {}

/// A visitor that counts records by kind
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StatsVisitor {
    /// Class definitions
    pub class_count: usize,
    /// Class references
    pub class_ref_count: usize,
    /// Arrays
    pub array_count: usize,
    /// String objects
    pub string_count: usize,
    /// Object references
    pub reference_count: usize,
    /// Nulls, including unresolved class references
    pub null_count: usize,
    /// Null slots covered by null runs
    pub null_run_slots: usize,
    /// Primitive values
    pub scalar_count: usize,
}

impl RecordVisitor for StatsVisitor {
    fn visit_class(&mut self, _class: &ClassObject) {
        self.class_count += 1;
    }

    fn visit_class_ref(&mut self, _class_ref: &ClassRef) {
        self.class_ref_count += 1;
    }

    fn visit_array(&mut self, _array: &ArrayRecord) {
        self.array_count += 1;
    }

    fn visit_string(&mut self, _string: &StringObject) {
        self.string_count += 1;
    }

    fn visit_reference(&mut self, _id: i32) {
        self.reference_count += 1;
    }

    fn visit_null(&mut self) {
        self.null_count += 1;
    }

    fn visit_null_run(&mut self, count: u32) {
        self.null_run_slots += count as usize + 1;
    }

    fn visit_scalar(&mut self, _scalar: &Located<Scalar>) {
        self.scalar_count += 1;
    }
}

impl std::fmt::Display for StatsVisitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} classes, {} class refs, {} arrays, {} strings, {} references, {} scalars, {} nulls",
            self.class_count,
            self.class_ref_count,
            self.array_count,
            self.string_count,
            self.reference_count,
            self.scalar_count,
            self.null_count + self.null_run_slots
        )
    }
}
