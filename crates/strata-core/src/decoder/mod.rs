//! Record stream decoding.
//!
//! [`Decoder`] reads one record at a time from a borrowed stream, registering
//! class metadata, strings and libraries in a [`ReferenceTable`] so that later
//! records can refer back to them by id.
//!
//! ## Read policy
//!
//! [`Decoder::read_records`] never fails as a whole. It validates the header,
//! then decodes records until the terminator. A record the decoder cannot
//! model stops the read where it is; everything decoded up to that point is
//! kept and the status stays [`FileStatus::PartialRead`].
//!
//! ```
//! use strata_core::decoder::{Decoder, DecoderConfig, FileStatus};
//!
//! // header (1, -1, 1, 0) followed by the terminator
//! let mut stream = vec![0u8];
//! for v in [1i32, -1, 1, 0] {
//!     stream.extend_from_slice(&v.to_le_bytes());
//! }
//! stream.push(11);
//!
//! let decoded = Decoder::new(&stream, DecoderConfig::default()).read_records();
//! assert_eq!(decoded.status, FileStatus::FullRead);
//! assert!(decoded.records.is_empty());
//! ```

mod members;
mod table;

use crate::cursor::ByteCursor;
use crate::error::{Error, Result};
use crate::record::{
    AdditionalInfo, ArrayKind, ArrayRecord, ClassObject, ClassRef, ClassShape, Library, Located,
    Record, Scalar, StreamHeader, StringObject,
};
use crate::wire::{ArrayShape, BinaryType, PrimitiveType, RecordType, VarString};
use tracing::{debug, error, trace, warn};

pub use table::{ReferenceTable, TableEntry};

/// Configuration for the decoder
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Treat unresolved class references as errors instead of placeholders
    pub strict: bool,
    /// Maximum record nesting depth
    pub max_depth: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            strict: false,
            max_depth: 64,
        }
    }
}

impl DecoderConfig {
    /// Creates a new decoder config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets strict reference resolution
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Sets the maximum nesting depth
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}

/// How far a read got
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileStatus {
    /// Nothing to read
    Empty,
    /// Header accepted but the terminator was not reached cleanly
    PartialRead,
    /// Every record decoded up to the terminator
    FullRead,
    /// The stream does not start with a valid header
    Invalid,
}

impl FileStatus {
    /// Short label for log output
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::PartialRead => "partial",
            Self::FullRead => "full",
            Self::Invalid => "invalid",
        }
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of [`Decoder::read_records`]
#[derive(Debug, Clone)]
pub struct Decoded {
    /// Top-level records, header and terminator excluded
    pub records: Vec<Record>,
    /// Final status of the read
    pub status: FileStatus,
}

/// Record decoder over a borrowed stream
#[derive(Debug)]
pub struct Decoder<'a> {
    cursor: ByteCursor<&'a [u8]>,
    table: ReferenceTable,
    config: DecoderConfig,
    depth: usize,
    degraded: bool,
}

impl<'a> Decoder<'a> {
    /// Creates a decoder positioned at the start of `stream`
    pub fn new(stream: &'a [u8], config: DecoderConfig) -> Self {
        Self {
            cursor: ByteCursor::new(stream),
            table: ReferenceTable::new(),
            config,
            depth: 0,
            degraded: false,
        }
    }

    /// Current stream offset
    pub fn position(&self) -> usize {
        self.cursor.position()
    }

    /// Validates the header record without consuming it.
    pub fn check_header(&mut self) -> Result<StreamHeader> {
        let start = self.cursor.position();
        let result = self.peek_header();
        self.cursor.set_position(start);
        result
    }

    fn peek_header(&mut self) -> Result<StreamHeader> {
        let tag = self.cursor.read_u8()?;
        if tag != RecordType::SerializedStreamHeader as u8 {
            return Err(Error::invalid_header(format!(
                "first record has tag {tag}, expected {}",
                RecordType::SerializedStreamHeader as u8
            )));
        }
        let header = self.read_header_body()?;
        if header != StreamHeader::EXPECTED {
            return Err(Error::invalid_header(format!(
                "expected (1, -1, 1, 0), found ({}, {}, {}, {})",
                header.root_id, header.header_id, header.major_version, header.minor_version
            )));
        }
        Ok(header)
    }

    fn read_header_body(&mut self) -> Result<StreamHeader> {
        Ok(StreamHeader {
            root_id: self.cursor.read_i32()?,
            header_id: self.cursor.read_i32()?,
            major_version: self.cursor.read_i32()?,
            minor_version: self.cursor.read_i32()?,
        })
    }

    /// Decodes every record up to the terminator.
    pub fn read_records(mut self) -> Decoded {
        let mut records = Vec::new();
        if self.cursor.is_empty() {
            return Decoded {
                records,
                status: FileStatus::Empty,
            };
        }

        if let Err(e) = self.check_header() {
            warn!("{}", e);
            return Decoded {
                records,
                status: FileStatus::Invalid,
            };
        }

        let mut status = FileStatus::PartialRead;
        let mut first = true;
        loop {
            if self.cursor.remaining() == 0 {
                warn!(offset = self.position(), "stream ended without a terminator");
                break;
            }
            let offset = self.position();
            match self.decode_next() {
                Ok(Record::Header(_)) if first => {}
                Ok(Record::Header(_)) => {
                    error!(
                        "{}",
                        Error::UnexpectedRecord {
                            offset,
                            kind: RecordType::SerializedStreamHeader
                        }
                    );
                    break;
                }
                Ok(Record::Terminator) => {
                    if self.degraded {
                        warn!("read reached the terminator with unresolved records");
                    } else {
                        status = FileStatus::FullRead;
                    }
                    break;
                }
                Ok(record) => {
                    trace!(offset, kind = record.kind_name(), "decoded top-level record");
                    records.push(record);
                }
                Err(e) => {
                    error!("{}; keeping {} record(s) decoded so far", e, records.len());
                    break;
                }
            }
            first = false;
        }

        debug!(
            records = records.len(),
            registered = self.table.len(),
            status = status.as_str(),
            "read finished"
        );
        Decoded { records, status }
    }

    /// Decodes exactly one record at the cursor, tag byte first.
    pub fn decode_next(&mut self) -> Result<Record> {
        let offset = self.position();
        let tag = self.cursor.read_u8()?;
        let kind = RecordType::try_from(tag)
            .map_err(|tag| Error::UnknownRecordType { offset, tag })?;
        trace!(offset, ?kind, "record");

        match kind {
            RecordType::SerializedStreamHeader => Ok(Record::Header(self.read_header_body()?)),
            RecordType::ClassWithId => self.read_class_ref(),
            RecordType::SystemClassWithMembersAndTypes => self.read_class_def(true),
            RecordType::ClassWithMembersAndTypes => self.read_class_def(false),
            RecordType::BinaryObjectString => {
                let object_id = self.cursor.read_i32()?;
                let value = VarString::decode(&mut self.cursor)?;
                debug!(object_id, value = %value.text(), "string object");
                self.table
                    .register(object_id, TableEntry::String(value.text().into_owned()));
                Ok(Record::String(StringObject { object_id, value }))
            }
            RecordType::BinaryArray => self.read_binary_array(offset),
            RecordType::MemberPrimitiveTyped => {
                let kind = self.read_primitive_type()?;
                Ok(Record::Primitive(Scalar::decode(kind, &mut self.cursor)?))
            }
            RecordType::MemberReference => Ok(Record::Reference(self.cursor.read_i32()?)),
            RecordType::ObjectNull => Ok(Record::Null),
            RecordType::MessageEnd => Ok(Record::Terminator),
            RecordType::BinaryLibrary => {
                let library_id = self.cursor.read_i32()?;
                let name = VarString::decode(&mut self.cursor)?;
                debug!(library_id, name = %name.text(), "library");
                self.table
                    .register(library_id, TableEntry::Library(name.text().into_owned()));
                Ok(Record::Library(Library { library_id, name }))
            }
            RecordType::ObjectNullMultiple256 => Ok(Record::NullRun {
                count: u32::from(self.cursor.read_u8()?),
                wide: false,
            }),
            RecordType::ObjectNullMultiple => {
                let count = self.read_count()?;
                Ok(Record::NullRun {
                    count: count as u32,
                    wide: true,
                })
            }
            RecordType::ArraySinglePrimitive => {
                let object_id = self.cursor.read_i32()?;
                let length = self.read_count()?;
                let element = self.read_primitive_type()?;
                let mut elements = Vec::with_capacity(length.min(self.cursor.remaining()));
                for _ in 0..length {
                    elements.push(self.read_element(BinaryType::Primitive, Some(element))?);
                }
                Ok(Record::Array(ArrayRecord {
                    object_id,
                    kind: ArrayKind::SinglePrimitive(element),
                    length: length as i32,
                    elements,
                }))
            }
            RecordType::ArraySingleObject | RecordType::ArraySingleString => {
                let object_id = self.cursor.read_i32()?;
                let length = self.read_count()?;
                let elements = self.read_elements(length, BinaryType::Object, None)?;
                let kind = if kind == RecordType::ArraySingleString {
                    ArrayKind::SingleString
                } else {
                    ArrayKind::SingleObject
                };
                Ok(Record::Array(ArrayRecord {
                    object_id,
                    kind,
                    length: length as i32,
                    elements,
                }))
            }
            RecordType::SystemClassWithMembers
            | RecordType::ClassWithMembers
            | RecordType::MethodCall
            | RecordType::MethodReturn => Err(Error::UnsupportedRecord { offset, kind }),
        }
    }

    /// Decodes a record nested inside a class or array, enforcing the depth limit
    fn decode_nested(&mut self) -> Result<Record> {
        if self.depth >= self.config.max_depth {
            return Err(Error::NestingTooDeep {
                offset: self.position(),
                max: self.config.max_depth,
            });
        }
        self.depth += 1;
        let record = self.decode_next();
        self.depth -= 1;
        record
    }

    fn read_class_def(&mut self, system: bool) -> Result<Record> {
        let info = self.read_class_info()?;
        let member_types = self.read_member_types(&info)?;
        let library_id = if system {
            None
        } else {
            Some(self.cursor.read_i32()?)
        };
        let shape = ClassShape {
            info,
            member_types,
            library_id,
        };
        debug!(
            id = shape.object_id(),
            name = %shape.name(),
            members = shape.info.member_count,
            library = ?library_id.and_then(|id| self.table.library(id)),
            "class definition"
        );

        // registered before member values so nested instances can reuse it
        self.table
            .register(shape.object_id(), TableEntry::Class(shape.clone()));

        let members = self.read_members(&shape)?;
        Ok(Record::ClassDef(ClassObject { shape, members }))
    }

    fn read_class_ref(&mut self) -> Result<Record> {
        let id_offset = self.position();
        let object_id = Located::new(id_offset, self.cursor.read_i32()?);
        let meta_offset = self.position();
        let metadata_id = Located::new(meta_offset, self.cursor.read_i32()?);

        let Some(mut shape) = self.table.class_shape(metadata_id.value).cloned() else {
            let err = Error::dangling_reference(object_id.value, metadata_id.value);
            if self.config.strict {
                return Err(err);
            }
            warn!(offset = id_offset, "{}", err);
            self.degraded = true;
            return Ok(Record::Unresolved {
                object_id: object_id.value,
                metadata_id: metadata_id.value,
            });
        };

        shape.info.object_id = object_id;
        debug!(
            id = object_id.value,
            ref_id = metadata_id.value,
            name = %shape.name(),
            "class reference"
        );
        let members = self.read_members(&shape)?;
        Ok(Record::ClassRef(ClassRef {
            metadata_id,
            object: ClassObject { shape, members },
        }))
    }

    fn read_binary_array(&mut self, offset: usize) -> Result<Record> {
        let object_id = self.cursor.read_i32()?;
        let shape_offset = self.position();
        let shape_tag = self.cursor.read_u8()?;
        let shape = ArrayShape::try_from(shape_tag).map_err(|tag| Error::UnknownArrayShape {
            offset: shape_offset,
            tag,
        })?;
        let rank = self.cursor.read_i32()?;
        if rank != 1 {
            if rank < 1 {
                return Err(Error::InvalidLength {
                    offset,
                    length: i64::from(rank),
                });
            }
            return Err(Error::MultiDimensionalArray { offset, rank });
        }

        let lengths = vec![self.cursor.read_i32()?];
        let lower_bounds = if shape.has_lower_bounds() {
            vec![self.cursor.read_i32()?]
        } else {
            Vec::new()
        };
        let element = self.read_binary_type()?;
        let info = self.read_additional_info(element)?;
        let length = usize::try_from(lengths[0]).map_err(|_| Error::InvalidLength {
            offset,
            length: i64::from(lengths[0]),
        })?;

        debug!(object_id, ?shape, length, element = element.as_str(), "binary array");
        let primitive = match &info {
            Some(AdditionalInfo::Primitive(p)) => Some(*p),
            _ => None,
        };
        let elements = self.read_elements(length, element, primitive)?;
        Ok(Record::Array(ArrayRecord {
            object_id,
            kind: ArrayKind::Binary {
                shape,
                rank,
                lengths,
                lower_bounds,
                element,
                info,
            },
            length: length as i32,
            elements,
        }))
    }

    /// Reads a non-negative i32 count
    fn read_count(&mut self) -> Result<usize> {
        let offset = self.position();
        let raw = self.cursor.read_i32()?;
        usize::try_from(raw).map_err(|_| Error::InvalidLength {
            offset,
            length: i64::from(raw),
        })
    }

    fn read_binary_type(&mut self) -> Result<BinaryType> {
        let offset = self.position();
        let tag = self.cursor.read_u8()?;
        BinaryType::try_from(tag).map_err(|tag| Error::UnknownBinaryType { offset, tag })
    }

    fn read_primitive_type(&mut self) -> Result<PrimitiveType> {
        let offset = self.position();
        let tag = self.cursor.read_u8()?;
        PrimitiveType::try_from(tag).map_err(|tag| Error::UnknownPrimitiveType { offset, tag })
    }
}
