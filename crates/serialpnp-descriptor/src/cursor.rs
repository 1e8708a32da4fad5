//! Bounds-checked reads over a borrowed byte slice.

use crate::error::{DescriptorError, Result};

/// Forward-only reader that never indexes past the end of its buffer.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Offset of the next unread byte.
    pub fn offset(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Next byte without consuming it.
    pub fn peek_u8(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    pub fn read_bytes(&mut self, len: usize, field: &'static str) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(DescriptorError::Truncated {
                field,
                offset: self.pos,
                needed: len,
                remaining: self.remaining(),
            });
        }
        let out = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    pub fn read_u8(&mut self, field: &'static str) -> Result<u8> {
        Ok(self.read_bytes(1, field)?[0])
    }

    pub fn read_u16_le(&mut self, field: &'static str) -> Result<u16> {
        let raw = self.read_bytes(2, field)?;
        Ok(u16::from_le_bytes([raw[0], raw[1]]))
    }

    /// A string with a one-byte length prefix.
    pub fn read_str_u8(&mut self, field: &'static str) -> Result<String> {
        let len = self.read_u8(field)? as usize;
        self.read_utf8(len, field)
    }

    /// A string with a two-byte little-endian length prefix.
    pub fn read_str_u16(&mut self, field: &'static str) -> Result<String> {
        let len = self.read_u16_le(field)? as usize;
        self.read_utf8(len, field)
    }

    fn read_utf8(&mut self, len: usize, field: &'static str) -> Result<String> {
        let raw = self.read_bytes(len, field)?;
        std::str::from_utf8(raw)
            .map(str::to_string)
            .map_err(|_| DescriptorError::InvalidUtf8 { field })
    }

    /// Everything not yet read.
    pub fn rest(&mut self) -> &'a [u8] {
        let out = &self.buf[self.pos..];
        self.pos = self.buf.len();
        out
    }
}
