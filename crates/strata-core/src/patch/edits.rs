//! Deferred string replacements.

use crate::error::{Error, Result};
use crate::wire::{encode_string, VarString};
use bytes::Bytes;
use std::collections::BTreeMap;
use tracing::trace;

/// Replacement of one length-prefixed string, prefix included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringEdit {
    /// Offset of the old length prefix
    pub offset: usize,
    /// Bytes to erase: old prefix plus old payload
    pub old_len: usize,
    /// New prefix plus new payload
    pub replacement: Bytes,
}

impl StringEdit {
    /// Builds the edit that replaces `old` with `text`
    pub fn replace(old: &VarString, text: &[u8]) -> Result<Self> {
        Ok(Self {
            offset: old.offset,
            old_len: old.encoded_len(),
            replacement: encode_string(text)?,
        })
    }

    /// Size change this edit causes
    pub fn delta(&self) -> isize {
        self.replacement.len() as isize - self.old_len as isize
    }
}

/// String edits keyed by offset, applied back to front.
///
/// Applying the highest offset first keeps every lower offset valid even
/// when an edit changes the buffer length.
#[derive(Debug, Default)]
pub struct EditList {
    edits: BTreeMap<usize, StringEdit>,
}

impl EditList {
    /// Creates an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages an edit, replacing any earlier edit at the same offset
    pub fn push(&mut self, edit: StringEdit) {
        self.edits.insert(edit.offset, edit);
    }

    /// Number of staged edits
    pub fn len(&self) -> usize {
        self.edits.len()
    }

    /// Returns true if nothing is staged
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Splices every edit into `buf` and returns how many were applied.
    ///
    /// Overlapping edits leave `buf` untouched and fail.
    pub fn apply(self, buf: &mut Vec<u8>) -> Result<usize> {
        let mut limit = buf.len();
        for edit in self.edits.values().rev() {
            let end = edit.offset.saturating_add(edit.old_len);
            if end > limit {
                return Err(Error::internal(format!(
                    "string edit at offset {} overlaps the edit or buffer end at {}",
                    edit.offset, limit
                )));
            }
            limit = edit.offset;
        }

        let count = self.edits.len();
        for edit in self.edits.into_values().rev() {
            trace!(offset = edit.offset, delta = edit.delta(), "splice");
            buf.splice(edit.offset..edit.offset + edit.old_len, edit.replacement);
        }
        Ok(count)
    }
}
