//! Length-prefixed string codec.
//!
//! The prefix is a base-128 varint of at most [`MAX_PREFIX_LEN`] bytes: the
//! low seven bits of each byte are length bits (least significant group first)
//! and a set high bit means another prefix byte follows.

use crate::cursor::ByteCursor;
use crate::error::{Error, Result};
use bytes::{BufMut, Bytes, BytesMut};
use std::borrow::Cow;

/// Longest valid length prefix
pub const MAX_PREFIX_LEN: usize = 5;

/// A decoded length-prefixed string together with its on-disk layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarString {
    /// Stream offset of the first prefix byte
    pub offset: usize,
    /// Raw payload bytes, usually UTF-8
    pub bytes: Vec<u8>,
    /// Payload length decoded from the prefix
    pub decoded_len: u32,
    /// The prefix bytes exactly as read, packed little-endian
    pub original_encoded: u64,
    /// Number of prefix bytes on disk
    pub prefix_len: u8,
}

impl VarString {
    /// Decodes a prefix and payload at the cursor position.
    ///
    /// On a malformed prefix the cursor is restored to where it started.
    pub fn decode<B: AsRef<[u8]>>(cursor: &mut ByteCursor<B>) -> Result<Self> {
        let offset = cursor.position();
        let mut decoded_len: u32 = 0;
        let mut original_encoded: u64 = 0;
        let mut prefix_len: u8 = 0;

        loop {
            if usize::from(prefix_len) == MAX_PREFIX_LEN {
                cursor.set_position(offset);
                return Err(Error::InvalidVarString { offset });
            }
            let byte = cursor.read_u8()?;
            // the fifth byte carries bits 28 to 30 of a non-negative length
            if usize::from(prefix_len) == MAX_PREFIX_LEN - 1 && byte > 0x07 {
                cursor.set_position(offset);
                return Err(Error::InvalidVarString { offset });
            }
            original_encoded |= u64::from(byte) << (8 * u32::from(prefix_len));
            decoded_len |= u32::from(byte & 0x7F) << (7 * u32::from(prefix_len));
            prefix_len += 1;
            if byte & 0x80 == 0 {
                break;
            }
        }

        let bytes = cursor.read_bytes(decoded_len as usize)?.to_vec();
        Ok(Self {
            offset,
            bytes,
            decoded_len,
            original_encoded,
            prefix_len,
        })
    }

    /// Payload as text, with invalid UTF-8 replaced
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    /// Stream offset of the first payload byte
    pub fn payload_offset(&self) -> usize {
        self.offset + usize::from(self.prefix_len)
    }

    /// Total bytes occupied on disk (prefix + payload)
    pub fn encoded_len(&self) -> usize {
        usize::from(self.prefix_len) + self.decoded_len as usize
    }
}

/// Encodes `len` as a length prefix
pub fn encode_prefix(len: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(MAX_PREFIX_LEN);
    let mut rest = len;
    loop {
        let group = (rest & 0x7F) as u8;
        rest >>= 7;
        if rest == 0 {
            out.push(group);
            return out;
        }
        out.push(group | 0x80);
    }
}

/// Number of prefix bytes needed for a payload of `len` bytes
pub fn prefix_len_for(len: u32) -> usize {
    match len {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        0x20_0000..=0x0FFF_FFFF => 4,
        _ => 5,
    }
}

/// Encodes a complete prefix + payload
pub fn encode_string(payload: &[u8]) -> Result<Bytes> {
    let len = i32::try_from(payload.len())
        .map_err(|_| Error::InvalidLength {
            offset: 0,
            length: payload.len() as i64,
        })? as u32;
    let mut out = BytesMut::with_capacity(prefix_len_for(len) + payload.len());
    out.put_slice(&encode_prefix(len));
    out.put_slice(payload);
    Ok(out.freeze())
}
