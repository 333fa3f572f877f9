//! Error types for the strata-core library.
//!
//! This module provides error handling using the `thiserror` crate, with
//! variants for each failure mode of decoding, projecting and patching.
//! Most decode variants carry the byte offset (into the record stream) at
//! which the problem was found.

use crate::wire::{PrimitiveType, RecordType};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for strata operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all strata operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Failed to read input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to write output file
    #[error("failed to write file '{path}': {source}")]
    FileWrite {
        /// Path to the file that failed to write
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The stream ended before a field could be read
    #[error("unexpected end of stream at offset {offset}: needed {needed} more byte(s)")]
    UnexpectedEof {
        /// Byte offset where the read started
        offset: usize,
        /// Number of bytes the read required
        needed: usize,
    },

    /// A length prefix did not terminate within five bytes
    #[error("invalid length prefix at offset {offset}")]
    InvalidVarString {
        /// Byte offset of the first prefix byte
        offset: usize,
    },

    /// The stream does not start with a conforming header record
    #[error("invalid stream header: {details}")]
    InvalidHeader {
        /// What did not match
        details: String,
    },

    /// A record tag outside the known enumeration
    #[error("unknown record type {tag} at offset {offset}")]
    UnknownRecordType {
        /// Byte offset of the tag
        offset: usize,
        /// The raw tag byte
        tag: u8,
    },

    /// A known record kind with no implemented body
    #[error("unsupported record type {kind:?} at offset {offset}")]
    UnsupportedRecord {
        /// Byte offset of the tag
        offset: usize,
        /// The record kind
        kind: RecordType,
    },

    /// A record kind that is valid on its own but not where it appeared
    #[error("unexpected {kind:?} record at offset {offset}")]
    UnexpectedRecord {
        /// Byte offset of the tag
        offset: usize,
        /// The record kind
        kind: RecordType,
    },

    /// A binary-type tag outside the known enumeration
    #[error("unknown binary type {tag} at offset {offset}")]
    UnknownBinaryType {
        /// Byte offset of the tag
        offset: usize,
        /// The raw tag byte
        tag: u8,
    },

    /// An array shape tag outside the known enumeration
    #[error("unknown array shape {tag} at offset {offset}")]
    UnknownArrayShape {
        /// Byte offset of the tag
        offset: usize,
        /// The raw tag byte
        tag: u8,
    },

    /// A primitive-type tag outside the known enumeration
    #[error("unknown primitive type {tag} at offset {offset}")]
    UnknownPrimitiveType {
        /// Byte offset of the tag
        offset: usize,
        /// The raw tag byte
        tag: u8,
    },

    /// A primitive kind whose wire width is not modeled
    #[error("unsupported primitive type {kind:?} at offset {offset}")]
    UnsupportedPrimitive {
        /// Byte offset of the value
        offset: usize,
        /// The primitive kind
        kind: PrimitiveType,
    },

    /// Array with more than one dimension
    #[error("multi-dimensional array (rank {rank}) at offset {offset} is not supported")]
    MultiDimensionalArray {
        /// Byte offset of the array record
        offset: usize,
        /// Declared rank
        rank: i32,
    },

    /// A negative count or length field
    #[error("invalid length {length} at offset {offset}")]
    InvalidLength {
        /// Byte offset of the field
        offset: usize,
        /// The decoded value
        length: i64,
    },

    /// Record nesting exceeded the configured depth
    #[error("record nesting deeper than {max} at offset {offset}")]
    NestingTooDeep {
        /// Byte offset of the record that crossed the limit
        offset: usize,
        /// Configured maximum depth
        max: usize,
    },

    /// A class reference whose metadata id was never registered
    #[error("object {object_id} references unknown class metadata {metadata_id}")]
    DanglingReference {
        /// Object id of the referencing record
        object_id: i32,
        /// The metadata id that could not be resolved
        metadata_id: i32,
    },

    /// Malformed gzip payload
    #[error("failed to decompress container: {0}")]
    Decompression(#[source] std::io::Error),

    /// Failed to re-compress the record stream
    #[error("failed to compress container: {0}")]
    Compression(#[source] std::io::Error),

    /// A string edit that would change the length prefix width
    #[error("string at offset {offset} needs a size-changing rewrite ({old_prefix} -> {new_prefix} prefix bytes)")]
    UnsafeStringEdit {
        /// Byte offset of the length prefix
        offset: usize,
        /// Width of the prefix on disk
        old_prefix: usize,
        /// Width of the prefix the new value needs
        new_prefix: usize,
    },

    /// A JSON value that cannot be written into a binary field
    #[error("cannot patch '{field}': {details}")]
    FieldMismatch {
        /// Member name or node description
        field: String,
        /// Why the value was rejected
        details: String,
    },

    /// Generic internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new file write error
    pub fn file_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    /// Creates a new end-of-stream error
    pub fn unexpected_eof(offset: usize, needed: usize) -> Self {
        Self::UnexpectedEof { offset, needed }
    }

    /// Creates a new header validation error
    pub fn invalid_header(details: impl Into<String>) -> Self {
        Self::InvalidHeader {
            details: details.into(),
        }
    }

    /// Creates a new dangling reference error
    pub fn dangling_reference(object_id: i32, metadata_id: i32) -> Self {
        Self::DanglingReference {
            object_id,
            metadata_id,
        }
    }

    /// Creates a new patch field mismatch error
    pub fn field_mismatch(field: impl Into<String>, details: impl Into<String>) -> Self {
        Self::FieldMismatch {
            field: field.into(),
            details: details.into(),
        }
    }

    /// Creates a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns true if this error only affects one record or field.
    ///
    /// Recoverable errors are reported and the surrounding read or patch pass
    /// continues. Everything else leaves the cursor at an unknown position.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DanglingReference { .. }
                | Self::UnsafeStringEdit { .. }
                | Self::FieldMismatch { .. }
        )
    }
}
