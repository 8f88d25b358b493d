//! Primitive readers and writers for the binary serialization stream.

use crate::error::DecodeError;

// =============================================================================
// READING
// =============================================================================

/// Reader over a decompressed serialization stream.
#[derive(Debug, Clone)]
pub(crate) struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Reads a single byte; `None` at end of stream.
    #[inline]
    pub fn try_read_byte(&mut self) -> Option<u8> {
        let byte = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(byte)
    }

    /// Reads a single byte.
    #[inline]
    pub fn read_byte(&mut self, context: &'static str) -> Result<u8, DecodeError> {
        self.try_read_byte()
            .ok_or(DecodeError::UnexpectedEof { context })
    }

    /// Reads exactly `n` bytes.
    #[inline]
    pub fn read_bytes(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], DecodeError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or(DecodeError::UnexpectedEof { context })?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    /// Reads an unsigned big-endian integer of `n` bytes, `n` in `1..=8`.
    pub fn read_uint(&mut self, n: usize, context: &'static str) -> Result<u64, DecodeError> {
        debug_assert!(n >= 1 && n <= 8);
        let bytes = self.read_bytes(n, context)?;
        let mut buf = [0u8; 8];
        buf[8 - n..].copy_from_slice(bytes);
        Ok(u64::from_be_bytes(buf))
    }

    /// Reads a big-endian IEEE double.
    #[inline]
    pub fn read_f64(&mut self, context: &'static str) -> Result<f64, DecodeError> {
        let bytes = self.read_bytes(8, context)?;
        // SAFETY: read_bytes guarantees exactly 8 bytes, try_into always succeeds
        Ok(f64::from_be_bytes(bytes.try_into().unwrap()))
    }

    /// Reads `len` bytes as text, replacing invalid UTF-8.
    pub fn read_text(&mut self, len: usize, context: &'static str) -> Result<String, DecodeError> {
        let bytes = self.read_bytes(len, context)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

// =============================================================================
// WRITING
// =============================================================================

/// Writer accumulating a serialization stream.
#[derive(Debug)]
pub(crate) struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    #[inline]
    pub fn write_byte(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Writes the low `n` bytes of `value` big-endian, `n` in `1..=8`.
    pub fn write_uint(&mut self, value: u64, n: usize) {
        debug_assert!(n >= 1 && n <= 8);
        self.buf.extend_from_slice(&value.to_be_bytes()[8 - n..]);
    }

    /// Writes a big-endian IEEE double.
    pub fn write_f64(&mut self, value: f64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_past_end_fails() {
        let mut reader = Reader::new(&[1, 2]);
        assert_eq!(reader.read_byte("a").unwrap(), 1);
        assert!(reader.read_bytes(2, "b").is_err());
        assert_eq!(reader.read_byte("c").unwrap(), 2);
        assert_eq!(reader.try_read_byte(), None);
        assert_eq!(
            reader.read_byte("d"),
            Err(DecodeError::UnexpectedEof { context: "d" })
        );
    }

    #[test]
    fn test_uint_widths_round_trip() {
        let values = [
            (0u64, 1),
            (255, 1),
            (256, 2),
            (65535, 2),
            (16777215, 3),
            (4294967295, 4),
            ((1 << 56) - 1, 7),
            (u64::MAX, 8),
        ];
        for (value, n) in values {
            let mut writer = Writer::with_capacity(8);
            writer.write_uint(value, n);
            let bytes = writer.into_bytes();
            assert_eq!(bytes.len(), n);
            let mut reader = Reader::new(&bytes);
            assert_eq!(reader.read_uint(n, "uint").unwrap(), value);
        }
    }

    #[test]
    fn test_f64_round_trip() {
        for value in [0.0, -0.0, 1.5, -1.0e300, f64::MIN_POSITIVE] {
            let mut writer = Writer::with_capacity(8);
            writer.write_f64(value);
            let bytes = writer.into_bytes();
            let mut reader = Reader::new(&bytes);
            assert_eq!(reader.read_f64("float").unwrap().to_bits(), value.to_bits());
        }
    }

    #[test]
    fn test_zero_length_read_at_end() {
        let mut reader = Reader::new(&[]);
        assert_eq!(reader.read_bytes(0, "empty").unwrap(), &[] as &[u8]);
        assert!(reader.read_bytes(1, "one").is_err());
    }
}
