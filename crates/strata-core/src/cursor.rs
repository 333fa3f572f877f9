//! Positioned little-endian reads and writes over a byte buffer.

use crate::error::{Error, Result};
use byteorder::{ByteOrder, LittleEndian};

/// A byte buffer with a read position.
///
/// Reads advance the position and fail with [`Error::UnexpectedEof`] instead of
/// panicking when the buffer is too short. Writes are positional and never move
/// the read position; they are available when the buffer is mutable.
#[derive(Debug, Clone)]
pub struct ByteCursor<B> {
    buf: B,
    pos: usize,
}

impl<B: AsRef<[u8]>> ByteCursor<B> {
    /// Creates a cursor positioned at the start of `buf`
    pub fn new(buf: B) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current read position
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Moves the read position. Positions past the end are allowed; the next
    /// read will fail.
    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Total buffer length
    pub fn len(&self) -> usize {
        self.buf.as_ref().len()
    }

    /// Returns true if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buf.as_ref().is_empty()
    }

    /// Bytes left after the read position
    pub fn remaining(&self) -> usize {
        self.len().saturating_sub(self.pos)
    }

    fn take(&mut self, n: usize) -> Result<&[u8]> {
        let start = self.pos;
        let end = start
            .checked_add(n)
            .filter(|&end| end <= self.buf.as_ref().len())
            .ok_or_else(|| Error::unexpected_eof(start, n))?;
        self.pos = end;
        Ok(&self.buf.as_ref()[start..end])
    }

    /// Reads `n` raw bytes
    pub fn read_bytes(&mut self, n: usize) -> Result<&[u8]> {
        self.take(n)
    }

    /// Reads one byte
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Reads a little-endian `i16`
    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(LittleEndian::read_i16(self.take(2)?))
    }

    /// Reads a little-endian `u16`
    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    /// Reads a little-endian `i32`
    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    /// Reads a little-endian `u32`
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    /// Reads a little-endian `i64`
    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(LittleEndian::read_i64(self.take(8)?))
    }

    /// Reads a little-endian `u64`
    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }

    /// Reads a little-endian IEEE-754 single
    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(LittleEndian::read_f32(self.take(4)?))
    }

    /// Reads a little-endian IEEE-754 double
    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(LittleEndian::read_f64(self.take(8)?))
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> ByteCursor<B> {
    /// Overwrites `bytes.len()` bytes starting at `offset`
    pub fn write_at(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        let buf = self.buf.as_mut();
        let end = offset
            .checked_add(bytes.len())
            .filter(|&end| end <= buf.len())
            .ok_or_else(|| Error::unexpected_eof(offset, bytes.len()))?;
        buf[offset..end].copy_from_slice(bytes);
        Ok(())
    }
}
