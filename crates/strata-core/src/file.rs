//! File-level entry point tying framing, decoding, export and patching together.

use crate::container::{Container, FileType};
use crate::decoder::{Decoded, Decoder, DecoderConfig, FileStatus};
use crate::error::{Error, Result};
use crate::export::project_records;
use crate::patch::{patch_stream, PatchConfig, PatchReport};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A data file: its framing plus the inflated record stream.
///
/// ```no_run
/// use strata_core::{DataFile, DecoderConfig, PatchConfig};
///
/// let mut file = DataFile::open("save.dat")?;
/// let (document, status) = file.export(&DecoderConfig::default());
/// println!("{status}: {}", document["records"].as_array().map_or(0, Vec::len));
///
/// file.patch(&document, &PatchConfig::default())?;
/// file.save("save.dat")?;
/// # Ok::<(), strata_core::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct DataFile {
    path: Option<PathBuf>,
    container: Container,
    stream: Vec<u8>,
}

impl DataFile {
    /// Reads and unframes a file from disk
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| Error::file_read(path, e))?;
        let mut file = Self::from_bytes(&bytes)?;
        debug!(
            path = %path.display(),
            size = bytes.len(),
            kind = %file.file_type(),
            "opened"
        );
        file.path = Some(path.to_path_buf());
        Ok(file)
    }

    /// Unframes an in-memory file
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (container, stream) = Container::probe(bytes)?;
        Ok(Self {
            path: None,
            container,
            stream,
        })
    }

    /// Path the file was opened from
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Raw or compressed
    pub fn file_type(&self) -> FileType {
        self.container.file_type()
    }

    /// The framing detected on open
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// The inflated record stream
    pub fn stream(&self) -> &[u8] {
        &self.stream
    }

    /// Decodes the record stream
    pub fn read_records(&self, config: &DecoderConfig) -> Decoded {
        Decoder::new(&self.stream, config.clone()).read_records()
    }

    /// Decodes and projects the record stream into the export document
    pub fn export(&self, config: &DecoderConfig) -> (Value, FileStatus) {
        let decoded = self.read_records(config);
        (project_records(&decoded.records), decoded.status)
    }

    /// Applies an edited export document to the in-memory stream
    pub fn patch(&mut self, document: &Value, config: &PatchConfig) -> Result<PatchReport> {
        patch_stream(&mut self.stream, document, config)
    }

    /// Re-frames the stream the way it was framed on open
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.container.wrap(&self.stream)
    }

    /// Writes the framed file to `path`
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        fs::write(path, &bytes).map_err(|e| Error::file_write(path, e))?;
        info!(path = %path.display(), size = bytes.len(), "saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::HEADER_LEN;
    use crate::fixtures::item_stream;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_open_export_patch_save() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("items.dat");
        fs::write(&path, item_stream()).unwrap();

        let mut file = DataFile::open(&path).unwrap();
        assert_eq!(file.file_type(), FileType::Raw);
        assert_eq!(file.path(), Some(path.as_path()));

        let (mut doc, status) = file.export(&DecoderConfig::default());
        assert_eq!(status, FileStatus::FullRead);
        doc["records"][0]["class"]["members"]["hp"] = json!(12);

        let report = file.patch(&doc, &PatchConfig::default()).unwrap();
        assert_eq!(report.scalars_written, 1);
        file.save(&path).unwrap();

        let reopened = DataFile::open(&path).unwrap();
        let (doc, _) = reopened.export(&DecoderConfig::default());
        assert_eq!(doc["records"][0]["class"]["members"]["hp"], json!(12));
    }

    #[test]
    fn test_compressed_round_trip() {
        let header = [7u8; HEADER_LEN];
        let framed = Container::Gzip { header }.wrap(&item_stream()).unwrap();

        let file = DataFile::from_bytes(&framed).unwrap();
        assert_eq!(file.file_type(), FileType::Compressed);
        assert_eq!(file.stream(), item_stream().as_slice());

        let again = DataFile::from_bytes(&file.to_bytes().unwrap()).unwrap();
        assert_eq!(again.container(), file.container());
        assert_eq!(again.stream(), file.stream());
    }

    #[test]
    fn test_open_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = DataFile::open(dir.path().join("nope.dat")).unwrap_err();
        assert!(matches!(err, Error::FileRead { .. }));
    }
}
