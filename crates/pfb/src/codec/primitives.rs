//! Primitive encoding/decoding for the Avro binary format.
//!
//! Implements varint, signed varint (zigzag) and the Avro primitive types.
//! Avro encodes `int`, `long` and every length prefix as a zigzag varint.

use crate::error::DecodeError;
use crate::limits::MAX_VARINT_BYTES;

// =============================================================================
// DECODING
// =============================================================================

/// Reader for decoding binary data.
///
/// Wraps a byte slice and provides methods for reading primitives
/// with bounds checking and error handling.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Creates a new reader from a byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns the current position in the data.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns the remaining bytes.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Returns the number of remaining bytes.
    pub fn remaining_len(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns true if all data has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Reads a single byte.
    #[inline]
    pub fn read_byte(&mut self, context: &'static str) -> Result<u8, DecodeError> {
        if self.pos >= self.data.len() {
            return Err(DecodeError::UnexpectedEof { context });
        }
        let byte = self.data[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    /// Reads exactly n bytes.
    #[inline]
    pub fn read_bytes(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining_len() {
            return Err(DecodeError::UnexpectedEof { context });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Reads an unsigned varint (LEB128).
    #[inline]
    pub fn read_varint(&mut self, context: &'static str) -> Result<u64, DecodeError> {
        let mut result: u64 = 0;
        let mut shift = 0;

        for i in 0..MAX_VARINT_BYTES {
            let byte = self.read_byte(context)?;
            let value = (byte & 0x7F) as u64;

            if shift >= 64 || (shift == 63 && value > 1) {
                return Err(DecodeError::VarintOverflow);
            }

            result |= value << shift;

            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;

            if i == MAX_VARINT_BYTES - 1 {
                return Err(DecodeError::VarintTooLong);
            }
        }

        Err(DecodeError::VarintTooLong)
    }

    /// Reads an Avro `long` (zigzag varint).
    #[inline]
    pub fn read_long(&mut self, context: &'static str) -> Result<i64, DecodeError> {
        let unsigned = self.read_varint(context)?;
        Ok(zigzag_decode(unsigned))
    }

    /// Reads an Avro `int`, rejecting values outside the 32-bit range.
    pub fn read_int(&mut self, context: &'static str) -> Result<i32, DecodeError> {
        let value = self.read_long(context)?;
        i32::try_from(value).map_err(|_| DecodeError::IntOutOfRange { value })
    }

    /// Reads a non-negative length prefix bounded by `max_len`.
    pub fn read_len(&mut self, max_len: usize, field: &'static str) -> Result<usize, DecodeError> {
        let len = self.read_long(field)?;
        if len < 0 {
            return Err(DecodeError::NegativeLength { field, len });
        }
        let len = len as usize;
        if len > max_len {
            return Err(DecodeError::LengthExceedsLimit {
                field,
                len,
                max: max_len,
            });
        }
        Ok(len)
    }

    /// Reads an Avro `boolean`.
    pub fn read_boolean(&mut self, context: &'static str) -> Result<bool, DecodeError> {
        match self.read_byte(context)? {
            0x00 => Ok(false),
            0x01 => Ok(true),
            value => Err(DecodeError::InvalidBool { value }),
        }
    }

    /// Reads a little-endian f32 (Avro `float`).
    #[inline]
    pub fn read_float(&mut self, context: &'static str) -> Result<f32, DecodeError> {
        let bytes = self.read_bytes(4, context)?;
        let mut buf = [0u8; 4];
        buf.copy_from_slice(bytes);
        Ok(f32::from_le_bytes(buf))
    }

    /// Reads a little-endian f64 (Avro `double`).
    #[inline]
    pub fn read_double(&mut self, context: &'static str) -> Result<f64, DecodeError> {
        let bytes = self.read_bytes(8, context)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(f64::from_le_bytes(buf))
    }

    /// Reads a length-prefixed UTF-8 string.
    #[inline]
    pub fn read_string(
        &mut self,
        max_len: usize,
        field: &'static str,
    ) -> Result<String, DecodeError> {
        let len = self.read_len(max_len, field)?;
        let bytes = self.read_bytes(len, field)?;
        // Validate on the borrowed slice, then allocate once
        std::str::from_utf8(bytes)
            .map(|s| s.to_string())
            .map_err(|_| DecodeError::InvalidUtf8 { field })
    }

    /// Reads a length-prefixed byte array.
    pub fn read_bytes_prefixed(
        &mut self,
        max_len: usize,
        field: &'static str,
    ) -> Result<Vec<u8>, DecodeError> {
        let len = self.read_len(max_len, field)?;
        let bytes = self.read_bytes(len, field)?;
        Ok(bytes.to_vec())
    }
}

// =============================================================================
// ENCODING
// =============================================================================

/// Writer for encoding binary data.
#[derive(Debug, Clone, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    /// Creates a new writer.
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Creates a new writer with capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Returns the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Returns a reference to the written bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Returns the number of bytes written.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if no bytes have been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Discards everything written so far, keeping the allocation.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Writes a single byte.
    #[inline]
    pub fn write_byte(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    /// Writes raw bytes.
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Writes an unsigned varint (LEB128).
    #[inline]
    pub fn write_varint(&mut self, mut value: u64) {
        let mut buf = [0u8; MAX_VARINT_BYTES];
        let mut len = 0;
        loop {
            let mut byte = (value & 0x7F) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            buf[len] = byte;
            len += 1;
            if value == 0 {
                break;
            }
        }
        self.buf.extend_from_slice(&buf[..len]);
    }

    /// Writes an Avro `long` (zigzag varint).
    pub fn write_long(&mut self, value: i64) {
        self.write_varint(zigzag_encode(value));
    }

    /// Writes an Avro `int`.
    pub fn write_int(&mut self, value: i32) {
        self.write_long(value as i64);
    }

    /// Writes an Avro `boolean`.
    pub fn write_boolean(&mut self, value: bool) {
        self.buf.push(value as u8);
    }

    /// Writes a little-endian f32.
    pub fn write_float(&mut self, value: f32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a little-endian f64.
    pub fn write_double(&mut self, value: f64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a length-prefixed UTF-8 string.
    pub fn write_string(&mut self, s: &str) {
        self.write_long(s.len() as i64);
        self.buf.extend_from_slice(s.as_bytes());
    }

    /// Writes a length-prefixed byte array.
    pub fn write_bytes_prefixed(&mut self, bytes: &[u8]) {
        self.write_long(bytes.len() as i64);
        self.buf.extend_from_slice(bytes);
    }
}

// =============================================================================
// ZIGZAG ENCODING
// =============================================================================

/// Encodes a signed integer using zigzag encoding.
///
/// Maps negative numbers to odd positive numbers:
/// 0 -> 0, -1 -> 1, 1 -> 2, -2 -> 3, 2 -> 4, ...
#[inline]
pub fn zigzag_encode(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

/// Decodes a zigzag-encoded unsigned integer back to signed.
#[inline]
pub fn zigzag_decode(n: u64) -> i64 {
    ((n >> 1) as i64) ^ (-((n & 1) as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zigzag_values() {
        assert_eq!(zigzag_encode(0), 0);
        assert_eq!(zigzag_encode(-1), 1);
        assert_eq!(zigzag_encode(1), 2);
        assert_eq!(zigzag_encode(-2), 3);
        assert_eq!(zigzag_encode(2), 4);
        for v in [i64::MAX, i64::MIN, -64, 63] {
            assert_eq!(zigzag_decode(zigzag_encode(v)), v);
        }
    }

    #[test]
    fn test_long_matches_avro_reference_bytes() {
        // Values from the Avro specification's zigzag table
        let cases: [(i64, &[u8]); 5] = [
            (0, &[0x00]),
            (-1, &[0x01]),
            (1, &[0x02]),
            (-64, &[0x7f]),
            (64, &[0x80, 0x01]),
        ];
        for (value, expected) in cases {
            let mut writer = Writer::new();
            writer.write_long(value);
            assert_eq!(writer.as_bytes(), expected, "encoding {}", value);

            let mut reader = Reader::new(expected);
            assert_eq!(reader.read_long("test").unwrap(), value);
        }
    }

    #[test]
    fn test_string_is_long_prefixed() {
        let mut writer = Writer::new();
        writer.write_string("foo");
        assert_eq!(writer.as_bytes(), &[0x06, b'f', b'o', b'o']);

        let mut reader = Reader::new(writer.as_bytes());
        assert_eq!(reader.read_string(100, "test").unwrap(), "foo");
        assert!(reader.is_empty());
    }

    #[test]
    fn test_unicode_string() {
        let mut writer = Writer::new();
        writer.write_string("unicode: \u{1F600}");
        let mut reader = Reader::new(writer.as_bytes());
        assert_eq!(reader.read_string(100, "test").unwrap(), "unicode: \u{1F600}");
    }

    #[test]
    fn test_int_out_of_range() {
        let mut writer = Writer::new();
        writer.write_long(i64::from(i32::MAX) + 1);
        let mut reader = Reader::new(writer.as_bytes());
        assert!(matches!(
            reader.read_int("test"),
            Err(DecodeError::IntOutOfRange { .. })
        ));
    }

    #[test]
    fn test_float_and_double() {
        let mut writer = Writer::new();
        writer.write_float(1.5);
        writer.write_double(-2.25);
        let mut reader = Reader::new(writer.as_bytes());
        assert_eq!(reader.read_float("f").unwrap(), 1.5);
        assert_eq!(reader.read_double("d").unwrap(), -2.25);
    }

    #[test]
    fn test_invalid_bool() {
        let data = [0x02u8];
        let mut reader = Reader::new(&data);
        assert!(matches!(
            reader.read_boolean("test"),
            Err(DecodeError::InvalidBool { value: 2 })
        ));
    }

    #[test]
    fn test_negative_length_rejected() {
        let mut writer = Writer::new();
        writer.write_long(-3);
        let mut reader = Reader::new(writer.as_bytes());
        assert!(matches!(
            reader.read_string(100, "test"),
            Err(DecodeError::NegativeLength { len: -3, .. })
        ));
    }

    #[test]
    fn test_string_too_long() {
        let mut writer = Writer::new();
        writer.write_long(1000);
        writer.write_bytes(&[0u8; 1000]);

        let mut reader = Reader::new(writer.as_bytes());
        let result = reader.read_string(100, "test");
        assert!(matches!(
            result,
            Err(DecodeError::LengthExceedsLimit { max: 100, .. })
        ));
    }

    #[test]
    fn test_varint_too_long() {
        let data = [0x80u8; 11];
        let mut reader = Reader::new(&data);
        assert!(matches!(
            reader.read_varint("test"),
            Err(DecodeError::VarintTooLong)
        ));
    }

    #[test]
    fn test_unexpected_eof() {
        let data = [0u8; 5];
        let mut reader = Reader::new(&data);
        let result = reader.read_bytes(10, "test");
        assert!(matches!(result, Err(DecodeError::UnexpectedEof { .. })));
    }
}
