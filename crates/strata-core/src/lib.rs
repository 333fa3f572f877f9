//! # strata-core
//!
//! A library for decoding, exporting and patching record-tagged binary
//! object-graph files.
//!
//! This crate provides the core functionality for:
//! - Unframing files (a bare record stream, or a gzip member behind a fixed header)
//! - Decoding the record stream into typed records, resolving class metadata by id
//! - Projecting records into an ordered JSON export document
//! - Writing an edited export document back into the original bytes
//!
//! ## Architecture
//!
//! - [`wire`]: tag enumerations and the length-prefixed string codec
//! - [`cursor`]: positioned little-endian reads and writes
//! - [`record`]: the decoded record model
//! - [`decoder`]: the record decoder and its reference table
//! - [`export`]: the export projection and record visitors
//! - [`patch`]: the in-place patch engine
//! - [`container`]: gzip framing
//! - [`error`]: error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use strata_core::{DataFile, DecoderConfig, FileStatus, PatchConfig};
//!
//! let mut file = DataFile::open("./data/items.dat")?;
//!
//! // Export to JSON
//! let (mut document, status) = file.export(&DecoderConfig::default());
//! assert_eq!(status, FileStatus::FullRead);
//!
//! // Edit and write back
//! document["records"][0]["class"]["members"]["hp"] = 500.into();
//! let report = file.patch(&document, &PatchConfig::default())?;
//! println!("{} value(s) written", report.scalars_written);
//! file.save("./data/items.dat")?;
//! # Ok::<(), strata_core::Error>(())
//! ```
//!
//! ## Extensibility
//!
//! - [`RecordVisitor`]: walk decoded records without matching on every kind
//!

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod container;
pub mod cursor;
pub mod decoder;
pub mod error;
pub mod export;
pub mod patch;
pub mod record;
pub mod wire;

mod file;

#[cfg(test)]
mod fixtures;

// Re-export primary types for convenience
pub use container::{Container, FileType};
pub use decoder::{Decoded, Decoder, DecoderConfig, FileStatus};
pub use error::{Error, Result};
pub use export::{
    project_records, walk as walk_records, NullVisitor, RecordVisitor, StatsVisitor,
};
pub use file::DataFile;
pub use patch::{patch_stream, PatchConfig, PatchReport};
pub use record::Record;

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
