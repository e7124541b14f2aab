//! Word-oriented wire codec cursors.
//!
//! Every instruction flattens to a sequence of 4-byte words in network byte
//! order, optionally followed by length-prefixed byte strings:
//!
//! ```text
//! ┌────────────┬────────────┬─────┬────────────┬──────────────┐
//! │ word 0 (BE)│ word 1 (BE)│ ... │ length (BE)│ string bytes │
//! └────────────┴────────────┴─────┴────────────┴──────────────┘
//! ```
//!
//! [`WireWriter`] and [`WireReader`] keep a cursor over a caller-owned
//! buffer. Every access is bounds-checked up front and reported as a typed
//! [`CodecError`] — a reader never touches bytes past the buffer, a writer
//! never writes past the caller's allocation.

use crate::error::CodecError;

/// Bytes per wire word.
pub const WORD: usize = 4;

/// Exact wire size of a length-prefixed string field.
pub fn string_field_size(s: &str) -> usize {
    WORD + s.len()
}

// ── Writer ───────────────────────────────────────────────────

/// Cursor that writes network-byte-order words into a caller buffer.
pub struct WireWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> WireWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes written so far.
    pub fn written(&self) -> usize {
        self.pos
    }

    fn reserve(&mut self, count: usize) -> Result<&mut [u8], CodecError> {
        let end = self.pos.checked_add(count).ok_or(CodecError::BufferTooSmall {
            needed: usize::MAX,
            got: self.buf.len(),
        })?;
        if end > self.buf.len() {
            return Err(CodecError::BufferTooSmall {
                needed: end,
                got: self.buf.len(),
            });
        }
        let slice = &mut self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Write one word, big-endian.
    pub fn put_word(&mut self, value: u32) -> Result<(), CodecError> {
        self.reserve(WORD)?.copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    /// Write a length word followed by the raw string bytes.
    ///
    /// An empty string is encoded as a zero length word, not a sentinel.
    pub fn put_string(&mut self, s: &str) -> Result<(), CodecError> {
        self.put_word(s.len() as u32)?;
        self.reserve(s.len())?.copy_from_slice(s.as_bytes());
        Ok(())
    }
}

// ── Reader ───────────────────────────────────────────────────

/// Cursor that reads network-byte-order words from a received buffer.
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes consumed so far.
    pub fn consumed(&self) -> usize {
        self.pos
    }

    /// Bytes left unconsumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], CodecError> {
        let end = self.pos.checked_add(count).ok_or(CodecError::UnexpectedEnd {
            offset: self.pos,
            len: self.buf.len(),
        })?;
        if end > self.buf.len() {
            return Err(CodecError::UnexpectedEnd {
                offset: self.pos,
                len: self.buf.len(),
            });
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Read one word, big-endian.
    pub fn get_word(&mut self) -> Result<u32, CodecError> {
        let bytes = self.take(WORD)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a length-prefixed string.
    ///
    /// The length word is validated against the remaining buffer before any
    /// bytes are touched, so a hostile length cannot trigger an
    /// out-of-bounds read.
    pub fn get_string(&mut self) -> Result<String, CodecError> {
        let declared = self.get_word()? as usize;
        if declared > self.remaining() {
            return Err(CodecError::LengthMismatch {
                declared,
                available: self.remaining(),
            });
        }
        let bytes = self.take(declared)?;
        core::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| CodecError::InvalidString)
    }
}

// ── Tests ────────────────────────────────────────────────────
