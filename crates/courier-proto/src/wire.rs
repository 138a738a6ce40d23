//! Bounds-checked big-endian reader shared by the packet codecs
//!
//! Every read is validated against the remaining buffer before any bytes are
//! copied, and variable-length reads are checked against a caller-supplied
//! maximum before the remaining length is even consulted. Nothing here
//! allocates.

use crate::errors::{ProtocolError, Result};

/// Cursor over an input buffer.
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn take(&mut self, len: usize, field: &'static str) -> Result<&'a [u8]> {
        let Some((head, tail)) = self.buf.split_at_checked(len) else {
            return Err(ProtocolError::Truncated { field, needed: len, available: self.buf.len() });
        };
        self.buf = tail;
        Ok(head)
    }

    pub(crate) fn array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N]> {
        let bytes = self.take(N, field)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub(crate) fn u8(&mut self, field: &'static str) -> Result<u8> {
        Ok(self.array::<1>(field)?[0])
    }

    pub(crate) fn u16(&mut self, field: &'static str) -> Result<u16> {
        Ok(u16::from_be_bytes(self.array(field)?))
    }

    pub(crate) fn u32(&mut self, field: &'static str) -> Result<u32> {
        Ok(u32::from_be_bytes(self.array(field)?))
    }

    pub(crate) fn u64(&mut self, field: &'static str) -> Result<u64> {
        Ok(u64::from_be_bytes(self.array(field)?))
    }

    /// Read `len` bytes after checking `len <= max`.
    pub(crate) fn bounded(&mut self, len: usize, max: usize, field: &'static str) -> Result<&'a [u8]> {
        if len > max {
            return Err(ProtocolError::FieldTooLarge { field, size: len, max });
        }
        self.take(len, field)
    }

    /// Read a `u16` length-prefixed UTF-8 string.
    pub(crate) fn string16(&mut self, max: usize, field: &'static str) -> Result<String> {
        let len = self.u16(field)? as usize;
        let bytes = self.bounded(len, max, field)?;
        let text = std::str::from_utf8(bytes).map_err(|_| ProtocolError::InvalidUtf8(field))?;
        Ok(text.to_owned())
    }

    /// Fail if any input is left.
    pub(crate) fn finish(self) -> Result<()> {
        if self.buf.is_empty() { Ok(()) } else { Err(ProtocolError::TrailingBytes(self.buf.len())) }
    }
}

/// Check a field's length against its limit before encoding.
pub(crate) fn check_len(field: &'static str, size: usize, max: usize) -> Result<()> {
    if size > max {
        return Err(ProtocolError::FieldTooLarge { field, size, max });
    }
    Ok(())
}
