//! # Byte Cursor
//!
//! Growable byte buffer with an internal read position.
//!
//! Writes append to the end of the buffer; reads consume from the current
//! position. Every read is bounds-checked and fails with
//! [`ProtocolError::OutOfBounds`] instead of touching bytes past the end.
//!
//! ```rust
//! use chat_protocol::core::cursor::ByteCursor;
//!
//! let mut cursor = ByteCursor::new();
//! cursor.write_u16_le(0xBEEF);
//! cursor.write_string("hi").unwrap();
//!
//! assert_eq!(cursor.read_u16_le().unwrap(), 0xBEEF);
//! assert_eq!(cursor.read_string().unwrap(), "hi");
//! assert!(cursor.read_u8().is_err());
//! ```

use crate::error::{ProtocolError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ByteCursor {
    data: Vec<u8>,
    pos: usize,
}

impl ByteCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            pos: 0,
        }
    }

    /// Wrap existing bytes, positioned at the start.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes left to read.
    pub fn available_bytes(&self) -> usize {
        self.data.len() - self.pos
    }

    /// True once every byte has been read.
    pub fn is_end(&self) -> bool {
        self.pos == self.data.len()
    }

    /// Clear the contents and move the read position back to zero.
    pub fn reset(&mut self) {
        self.data.clear();
        self.pos = 0;
    }

    /// Move the read position back to zero, keeping the contents.
    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    fn take(&mut self, n: usize) -> Result<&[u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or(ProtocolError::OutOfBounds {
                position: self.pos,
                requested: n,
                len: self.data.len(),
            })?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take_array::<1>()?[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16> {
        self.take_array().map(u16::from_le_bytes)
    }

    pub fn read_u16_be(&mut self) -> Result<u16> {
        self.take_array().map(u16::from_be_bytes)
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        self.take_array().map(u32::from_le_bytes)
    }

    pub fn read_u32_be(&mut self) -> Result<u32> {
        self.take_array().map(u32::from_be_bytes)
    }

    pub fn read_u64_le(&mut self) -> Result<u64> {
        self.take_array().map(u64::from_le_bytes)
    }

    pub fn read_u64_be(&mut self) -> Result<u64> {
        self.take_array().map(u64::from_be_bytes)
    }

    pub fn read_i64_le(&mut self) -> Result<i64> {
        self.take_array().map(i64::from_le_bytes)
    }

    /// Read exactly `n` bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        self.take(n).map(<[u8]>::to_vec)
    }

    /// Read everything from the current position to the end.
    pub fn read_remaining(&mut self) -> Vec<u8> {
        let rest = self.data[self.pos..].to_vec();
        self.pos = self.data.len();
        rest
    }

    /// Read a `u16` little-endian length followed by that many UTF-8 bytes.
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_u16_le()? as usize;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| ProtocolError::InvalidUtf8)
    }

    pub fn write_u8(&mut self, value: u8) {
        self.data.push(value);
    }

    pub fn write_u16_le(&mut self, value: u16) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u16_be(&mut self, value: u16) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u32_le(&mut self, value: u32) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32_be(&mut self, value: u32) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u64_le(&mut self, value: u64) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u64_be(&mut self, value: u64) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i64_le(&mut self, value: i64) {
        self.data.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_bytes(&mut self, buf: &[u8]) {
        self.data.extend_from_slice(buf);
    }

    /// Write a `u16` little-endian length followed by the UTF-8 bytes.
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        let len = u16::try_from(value.len()).map_err(|_| ProtocolError::StringTooLong(value.len()))?;
        self.write_u16_le(len);
        self.write_bytes(value.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_little_and_big_endian_layout() {
        let mut cursor = ByteCursor::new();
        cursor.write_u32_le(0x0102_0304);
        cursor.write_u32_be(0x0102_0304);
        assert_eq!(cursor.as_slice(), &[4, 3, 2, 1, 1, 2, 3, 4]);

        assert_eq!(cursor.read_u32_le().unwrap(), 0x0102_0304);
        assert_eq!(cursor.read_u32_be().unwrap(), 0x0102_0304);
        assert!(cursor.is_end());
    }

    #[test]
    fn test_mixed_width_reads() {
        let mut cursor = ByteCursor::new();
        cursor.write_u8(7);
        cursor.write_u16_be(0xABCD);
        cursor.write_u64_le(u64::MAX - 1);
        cursor.write_u64_be(42);
        cursor.write_i64_le(-5);

        assert_eq!(cursor.read_u8().unwrap(), 7);
        assert_eq!(cursor.read_u16_be().unwrap(), 0xABCD);
        assert_eq!(cursor.read_u64_le().unwrap(), u64::MAX - 1);
        assert_eq!(cursor.read_u64_be().unwrap(), 42);
        assert_eq!(cursor.read_i64_le().unwrap(), -5);
        assert_eq!(cursor.available_bytes(), 0);
    }

    #[test]
    fn test_read_past_end_fails_without_moving() {
        let mut cursor = ByteCursor::from_bytes(vec![1, 2, 3]);
        assert_eq!(cursor.read_u16_le().unwrap(), 0x0201);

        let err = cursor.read_u32_le().unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::OutOfBounds {
                position: 2,
                requested: 4,
                len: 3
            }
        ));
        assert_eq!(cursor.position(), 2);
        assert_eq!(cursor.read_u8().unwrap(), 3);
        assert!(cursor.read_u8().is_err());
    }

    #[test]
    fn test_read_bytes_and_remaining() {
        let mut cursor = ByteCursor::from_bytes(b"hello world".to_vec());
        assert_eq!(cursor.read_bytes(5).unwrap(), b"hello");
        assert!(cursor.read_bytes(100).is_err());
        assert_eq!(cursor.read_remaining(), b" world");
        assert!(cursor.read_remaining().is_empty());
    }

    #[test]
    fn test_huge_length_does_not_overflow() {
        let mut cursor = ByteCursor::from_bytes(vec![0u8; 4]);
        cursor.read_u8().unwrap();
        assert!(cursor.read_bytes(usize::MAX).is_err());
    }

    #[test]
    fn test_reset_and_rewind() {
        let mut cursor = ByteCursor::new();
        cursor.write_bytes(&[9, 8, 7]);
        cursor.read_u8().unwrap();

        cursor.rewind();
        assert_eq!(cursor.position(), 0);
        assert_eq!(cursor.available_bytes(), 3);

        cursor.reset();
        assert!(cursor.is_empty());
        assert_eq!(cursor.available_bytes(), 0);
        assert!(cursor.is_end());
    }

    #[test]
    fn test_string_prefix_and_unicode() {
        let mut cursor = ByteCursor::new();
        cursor.write_string("").unwrap();
        cursor.write_string("привет, мир").unwrap();

        assert_eq!(&cursor.as_slice()[..2], &[0, 0]);
        assert_eq!(cursor.read_string().unwrap(), "");
        assert_eq!(cursor.read_string().unwrap(), "привет, мир");
    }

    #[test]
    fn test_string_too_long() {
        let mut cursor = ByteCursor::new();
        let long = "x".repeat(u16::MAX as usize + 1);
        assert!(matches!(
            cursor.write_string(&long),
            Err(ProtocolError::StringTooLong(65536))
        ));
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_invalid_utf8() {
        let mut cursor = ByteCursor::new();
        cursor.write_u16_le(2);
        cursor.write_bytes(&[0xC3, 0x28]);
        assert!(matches!(cursor.read_string(), Err(ProtocolError::InvalidUtf8)));
    }

    #[test]
    fn test_truncated_string_body() {
        let mut cursor = ByteCursor::new();
        cursor.write_u16_le(10);
        cursor.write_bytes(b"abc");
        assert!(matches!(
            cursor.read_string(),
            Err(ProtocolError::OutOfBounds { .. })
        ));
    }
}
