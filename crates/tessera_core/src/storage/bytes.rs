//! Little-endian byte cursors shared by the region codec and adapters.

use crate::error::{StorageError, StorageResult};

/// Growable little-endian writer.
#[derive(Debug, Default)]
pub struct ByteWriter {
    buffer: Vec<u8>,
}

impl ByteWriter {
    /// Creates an empty writer.
    #[must_use]
    pub const fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Creates a writer with reserved capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Returns the number of bytes written.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if nothing has been written.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Returns the written bytes.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Consumes the writer, returning its buffer.
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }

    /// Clears the buffer, keeping its allocation.
    #[inline]
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Writes a single byte.
    #[inline]
    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Writes a u16.
    #[inline]
    pub fn write_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes an i16.
    #[inline]
    pub fn write_i16(&mut self, value: i16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a u32.
    #[inline]
    pub fn write_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes an i32.
    #[inline]
    pub fn write_i32(&mut self, value: i32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes raw bytes without a length prefix.
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Writes a u32 length prefix followed by the bytes.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is longer than `u32::MAX`.
    pub fn write_blob(&mut self, bytes: &[u8]) {
        let len = u32::try_from(bytes.len()).expect("blob larger than 4 GiB");
        self.write_u32(len);
        self.write_bytes(bytes);
    }

    /// Writes a u16 length prefix followed by UTF-8 bytes.
    ///
    /// # Panics
    ///
    /// Panics if the string is longer than `u16::MAX` bytes.
    pub fn write_str(&mut self, value: &str) {
        let len = u16::try_from(value.len()).expect("string longer than 64 KiB");
        self.write_u16(len);
        self.write_bytes(value.as_bytes());
    }
}

/// Bounds-checked little-endian reader.
///
/// Every read past the end is a `Truncated` error.
#[derive(Debug)]
pub struct ByteReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    /// Creates a reader over `buffer`.
    #[must_use]
    pub const fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Returns the number of bytes remaining.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    /// Returns true once every byte has been consumed.
    #[inline]
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Reads exactly `len` bytes.
    ///
    /// # Errors
    ///
    /// Returns `Truncated` if fewer than `len` bytes remain.
    #[inline]
    pub fn read_bytes(&mut self, len: usize) -> StorageResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(StorageError::Truncated {
                needed: len,
                remaining: self.remaining(),
            });
        }
        let slice = &self.buffer[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> StorageResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Reads a single byte.
    ///
    /// # Errors
    ///
    /// Returns `Truncated` at end of input.
    #[inline]
    pub fn read_u8(&mut self) -> StorageResult<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Reads a u16.
    ///
    /// # Errors
    ///
    /// Returns `Truncated` at end of input.
    #[inline]
    pub fn read_u16(&mut self) -> StorageResult<u16> {
        self.read_array().map(u16::from_le_bytes)
    }

    /// Reads an i16.
    ///
    /// # Errors
    ///
    /// Returns `Truncated` at end of input.
    #[inline]
    pub fn read_i16(&mut self) -> StorageResult<i16> {
        self.read_array().map(i16::from_le_bytes)
    }

    /// Reads a u32.
    ///
    /// # Errors
    ///
    /// Returns `Truncated` at end of input.
    #[inline]
    pub fn read_u32(&mut self) -> StorageResult<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    /// Reads an i32.
    ///
    /// # Errors
    ///
    /// Returns `Truncated` at end of input.
    #[inline]
    pub fn read_i32(&mut self) -> StorageResult<i32> {
        self.read_array().map(i32::from_le_bytes)
    }

    /// Reads a u32-length-prefixed blob.
    ///
    /// # Errors
    ///
    /// Returns `Truncated` if the prefix or the payload is cut short.
    pub fn read_blob(&mut self) -> StorageResult<&'a [u8]> {
        let len = self.read_u32()? as usize;
        self.read_bytes(len)
    }

    /// Reads a u16-length-prefixed UTF-8 string.
    ///
    /// # Errors
    ///
    /// Returns `Truncated` on short input, `Corrupt` on invalid UTF-8.
    pub fn read_str(&mut self) -> StorageResult<&'a str> {
        let len = self.read_u16()? as usize;
        let bytes = self.read_bytes(len)?;
        std::str::from_utf8(bytes)
            .map_err(|e| StorageError::Corrupt(format!("invalid utf-8 string: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_values() {
        let mut writer = ByteWriter::new();
        writer.write_u8(7);
        writer.write_i16(-300);
        writer.write_i32(-70_000);
        writer.write_str("palette");
        writer.write_blob(&[1, 2, 3]);

        let bytes = writer.into_inner();
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(reader.read_u8().unwrap(), 7);
        assert_eq!(reader.read_i16().unwrap(), -300);
        assert_eq!(reader.read_i32().unwrap(), -70_000);
        assert_eq!(reader.read_str().unwrap(), "palette");
        assert_eq!(reader.read_blob().unwrap(), &[1, 2, 3]);
        assert!(reader.is_exhausted());
    }

    #[test]
    fn test_truncated_read() {
        let mut reader = ByteReader::new(&[1, 2, 3]);
        let err = reader.read_u32().unwrap_err();
        assert!(matches!(err, StorageError::Truncated { needed: 4, remaining: 3 }));
    }

    #[test]
    fn test_blob_length_past_end() {
        let mut writer = ByteWriter::new();
        writer.write_u32(100);
        writer.write_bytes(&[0; 10]);
        let bytes = writer.into_inner();
        assert!(ByteReader::new(&bytes).read_blob().is_err());
    }
}
