//! File framing around the record stream.
//!
//! A data file is either the bare record stream, or a fixed-size opaque
//! header followed by a gzip member that inflates to the record stream.

use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use tracing::debug;

/// Length of the opaque header in front of a compressed stream
pub const HEADER_LEN: usize = 24;

/// gzip member magic
pub const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Coarse file type, for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    /// Bare record stream
    Raw,
    /// Opaque header plus gzip member
    Compressed,
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Raw => "raw",
            Self::Compressed => "compressed",
        })
    }
}

/// How a record stream was framed on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Container {
    /// The whole file is the record stream
    Raw,
    /// `header` followed by a gzip member
    Gzip {
        /// The opaque header bytes, passed through unchanged
        header: [u8; HEADER_LEN],
    },
}

impl Container {
    /// Detects the framing and returns it with the record stream.
    pub fn probe(bytes: &[u8]) -> Result<(Self, Vec<u8>)> {
        let magic = bytes.get(HEADER_LEN..HEADER_LEN + GZIP_MAGIC.len());
        if magic != Some(&GZIP_MAGIC[..]) {
            return Ok((Self::Raw, bytes.to_vec()));
        }

        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&bytes[..HEADER_LEN]);

        let mut stream = Vec::new();
        GzDecoder::new(&bytes[HEADER_LEN..])
            .read_to_end(&mut stream)
            .map_err(Error::Decompression)?;
        debug!(
            compressed = bytes.len() - HEADER_LEN,
            inflated = stream.len(),
            "gzip container"
        );
        Ok((Self::Gzip { header }, stream))
    }

    /// Frames `stream` the same way it was framed when probed
    pub fn wrap(&self, stream: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Raw => Ok(stream.to_vec()),
            Self::Gzip { header } => {
                let mut encoder = GzEncoder::new(header.to_vec(), Compression::default());
                encoder.write_all(stream).map_err(Error::Compression)?;
                encoder.finish().map_err(Error::Compression)
            }
        }
    }

    /// Coarse file type
    pub fn file_type(&self) -> FileType {
        match self {
            Self::Raw => FileType::Raw,
            Self::Gzip { .. } => FileType::Compressed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_raw_passthrough() {
        let data = vec![0u8, 1, 2, 3];
        let (container, stream) = Container::probe(&data).unwrap();
        assert_eq!(container, Container::Raw);
        assert_eq!(stream, data);
        assert_eq!(container.wrap(&stream).unwrap(), data);
    }

    #[test]
    fn test_gzip_probe_and_wrap() {
        let header = [0x5Au8; HEADER_LEN];
        let payload = b"record stream bytes".to_vec();
        let file = Container::Gzip { header }.wrap(&payload).unwrap();
        assert_eq!(&file[..HEADER_LEN], &header[..]);
        assert_eq!(&file[HEADER_LEN..HEADER_LEN + 2], &GZIP_MAGIC[..]);

        let (container, stream) = Container::probe(&file).unwrap();
        assert_eq!(container, Container::Gzip { header });
        assert_eq!(container.file_type(), FileType::Compressed);
        assert_eq!(stream, payload);
    }

    #[test]
    fn test_corrupt_gzip() {
        let mut file = vec![0u8; HEADER_LEN];
        file.extend_from_slice(&[0x1F, 0x8B, 0xFF, 0xFF, 0x00]);
        assert!(matches!(
            Container::probe(&file),
            Err(Error::Decompression(_))
        ));
    }

    #[test]
    fn test_short_file_is_raw() {
        let (container, _) = Container::probe(&[0x1F, 0x8B]).unwrap();
        assert_eq!(container, Container::Raw);
    }
}
