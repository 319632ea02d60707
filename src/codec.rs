//! Byte-buffer wire codec.
//!
//! [`ByteStream`] is an append-only buffer with independent write and read
//! cursors. Fixed-width values are little-endian on the wire; strings are a
//! `u32` byte count followed by raw UTF-8; a 3-vector is three `f32`; a
//! rotation is four `f32`, scalar first.
//!
//! Every read is bounds-checked against the bytes actually written. A failed
//! read returns an error and leaves the read cursor where it was.

use glam::{Quat, Vec3};

use crate::core::CodecError;

/// Append-only byte buffer with independent write and read cursors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ByteStream {
    buffer: Vec<u8>,
    read_pos: usize,
}

impl ByteStream {
    /// Create an empty stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty stream with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            read_pos: 0,
        }
    }

    /// Create a stream holding a copy of `data`, read cursor at the start.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self {
            buffer: data.to_vec(),
            read_pos: 0,
        }
    }

    /// All bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Number of bytes written.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether no bytes have been written.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Current read cursor position.
    pub fn read_pos(&self) -> usize {
        self.read_pos
    }

    /// Bytes left between the read cursor and the end of written data.
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.read_pos
    }

    /// Whether `count` more bytes can be read.
    pub fn can_read(&self, count: usize) -> bool {
        self.remaining() >= count
    }

    /// The unread tail of the buffer.
    pub fn remaining_bytes(&self) -> &[u8] {
        &self.buffer[self.read_pos..]
    }

    /// Rewind the read cursor to the start for reparsing.
    pub fn reset_read(&mut self) {
        self.read_pos = 0;
    }

    /// Discard all contents and reset both cursors.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.read_pos = 0;
    }

    /// Append raw bytes.
    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Write a bool as a single byte.
    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(u8::from(value));
    }

    /// Write an `i8`.
    pub fn write_i8(&mut self, value: i8) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Write a `u8`.
    pub fn write_u8(&mut self, value: u8) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Write an `i16`.
    pub fn write_i16(&mut self, value: i16) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Write a `u16`.
    pub fn write_u16(&mut self, value: u16) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Write an `i32`.
    pub fn write_i32(&mut self, value: i32) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Write a `u32`.
    pub fn write_u32(&mut self, value: u32) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Write an `i64`.
    pub fn write_i64(&mut self, value: i64) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Write a `u64`.
    pub fn write_u64(&mut self, value: u64) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Write an `f32`.
    pub fn write_f32(&mut self, value: f32) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Write an `f64`.
    pub fn write_f64(&mut self, value: f64) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Write a length-prefixed UTF-8 string.
    pub fn write_str(&mut self, value: &str) {
        self.write_u32(value.len() as u32);
        self.write_bytes(value.as_bytes());
    }

    /// Write a 3-vector as three `f32`.
    pub fn write_vec3(&mut self, value: Vec3) {
        self.write_f32(value.x);
        self.write_f32(value.y);
        self.write_f32(value.z);
    }

    /// Write a rotation as four `f32`, scalar first.
    pub fn write_quat(&mut self, value: Quat) {
        self.write_f32(value.w);
        self.write_f32(value.x);
        self.write_f32(value.y);
        self.write_f32(value.z);
    }

    /// Read `count` raw bytes.
    pub fn read_bytes(&mut self, count: usize) -> Result<&[u8], CodecError> {
        if !self.can_read(count) {
            return Err(CodecError::UnexpectedEof {
                needed: count,
                remaining: self.remaining(),
            });
        }
        let start = self.read_pos;
        self.read_pos += count;
        Ok(&self.buffer[start..start + count])
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        if !self.can_read(N) {
            return Err(CodecError::UnexpectedEof {
                needed: N,
                remaining: self.remaining(),
            });
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buffer[self.read_pos..self.read_pos + N]);
        self.read_pos += N;
        Ok(out)
    }

    /// Read a bool.
    pub fn read_bool(&mut self) -> Result<bool, CodecError> {
        Ok(self.read_u8()? != 0)
    }

    /// Read an `i8`.
    pub fn read_i8(&mut self) -> Result<i8, CodecError> {
        Ok(i8::from_le_bytes(self.read_array()?))
    }

    /// Read a `u8`.
    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(u8::from_le_bytes(self.read_array()?))
    }

    /// Read an `i16`.
    pub fn read_i16(&mut self) -> Result<i16, CodecError> {
        Ok(i16::from_le_bytes(self.read_array()?))
    }

    /// Read a `u16`.
    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    /// Read an `i32`.
    pub fn read_i32(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    /// Read a `u32`.
    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    /// Read an `i64`.
    pub fn read_i64(&mut self) -> Result<i64, CodecError> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    /// Read a `u64`.
    pub fn read_u64(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Read an `f32`.
    pub fn read_f32(&mut self) -> Result<f32, CodecError> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    /// Read an `f64`.
    pub fn read_f64(&mut self) -> Result<f64, CodecError> {
        Ok(f64::from_le_bytes(self.read_array()?))
    }

    /// Read a length-prefixed UTF-8 string.
    ///
    /// On any failure the read cursor is restored, including when the length
    /// prefix itself was readable but the body is short or not UTF-8.
    pub fn read_string(&mut self) -> Result<String, CodecError> {
        let start = self.read_pos;
        let length = self.read_u32()? as usize;
        if !self.can_read(length) {
            let remaining = self.remaining();
            self.read_pos = start;
            return Err(CodecError::UnexpectedEof {
                needed: length,
                remaining,
            });
        }
        let bytes = &self.buffer[self.read_pos..self.read_pos + length];
        let text = match std::str::from_utf8(bytes) {
            Ok(text) => text.to_owned(),
            Err(_) => {
                self.read_pos = start;
                return Err(CodecError::InvalidUtf8);
            }
        };
        self.read_pos += length;
        Ok(text)
    }

    /// Read a 3-vector.
    pub fn read_vec3(&mut self) -> Result<Vec3, CodecError> {
        if !self.can_read(12) {
            return Err(CodecError::UnexpectedEof {
                needed: 12,
                remaining: self.remaining(),
            });
        }
        Ok(Vec3::new(
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
        ))
    }

    /// Read a rotation written scalar first.
    pub fn read_quat(&mut self) -> Result<Quat, CodecError> {
        if !self.can_read(16) {
            return Err(CodecError::UnexpectedEof {
                needed: 16,
                remaining: self.remaining(),
            });
        }
        let w = self.read_f32()?;
        let x = self.read_f32()?;
        let y = self.read_f32()?;
        let z = self.read_f32()?;
        Ok(Quat::from_xyzw(x, y, z, w))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_roundtrip() {
        let mut stream = ByteStream::new();
        stream.write_bool(true);
        stream.write_i8(-5);
        stream.write_u16(0xBEEF);
        stream.write_i32(-123456);
        stream.write_u64(u64::MAX - 1);
        stream.write_f32(2.5);
        stream.write_f64(-0.125);

        assert!(stream.read_bool().unwrap());
        assert_eq!(stream.read_i8().unwrap(), -5);
        assert_eq!(stream.read_u16().unwrap(), 0xBEEF);
        assert_eq!(stream.read_i32().unwrap(), -123456);
        assert_eq!(stream.read_u64().unwrap(), u64::MAX - 1);
        assert_eq!(stream.read_f32().unwrap(), 2.5);
        assert_eq!(stream.read_f64().unwrap(), -0.125);
        assert_eq!(stream.remaining(), 0);
    }

    #[test]
    fn test_little_endian_layout() {
        let mut stream = ByteStream::new();
        stream.write_u32(0x0403_0201);
        assert_eq!(hex::encode(stream.as_bytes()), "01020304");
    }

    #[test]
    fn test_string_roundtrip() {
        let mut stream = ByteStream::new();
        stream.write_str("hello tether");
        stream.write_str("");

        assert_eq!(stream.read_string().unwrap(), "hello tether");
        assert_eq!(stream.read_string().unwrap(), "");
    }

    #[test]
    fn test_string_layout() {
        let mut stream = ByteStream::new();
        stream.write_str("ab");
        // u32 length prefix then raw bytes
        assert_eq!(hex::encode(stream.as_bytes()), "020000006162");
    }

    #[test]
    fn test_vec3_quat_roundtrip() {
        let mut stream = ByteStream::new();
        stream.write_vec3(Vec3::new(1.0, -2.0, 3.5));
        stream.write_quat(Quat::from_xyzw(0.1, 0.2, 0.3, 0.9));

        assert_eq!(stream.read_vec3().unwrap(), Vec3::new(1.0, -2.0, 3.5));
        assert_eq!(
            stream.read_quat().unwrap(),
            Quat::from_xyzw(0.1, 0.2, 0.3, 0.9)
        );
    }

    #[test]
    fn test_quat_is_scalar_first_on_wire() {
        let mut stream = ByteStream::new();
        stream.write_quat(Quat::from_xyzw(0.0, 0.0, 0.0, 1.0));
        // w is written first
        assert_eq!(stream.read_f32().unwrap(), 1.0);
    }

    #[test]
    fn test_read_past_end_fails_without_consuming() {
        let mut stream = ByteStream::new();
        stream.write_u8(7);

        assert_eq!(stream.read_u8().unwrap(), 7);
        assert!(matches!(
            stream.read_u32(),
            Err(CodecError::UnexpectedEof { .. })
        ));
        assert_eq!(stream.read_pos(), 1);
    }

    #[test]
    fn test_truncated_string_restores_cursor() {
        let mut stream = ByteStream::new();
        stream.write_u32(100); // claims 100 bytes, none follow
        let pos = stream.read_pos();
        assert!(stream.read_string().is_err());
        assert_eq!(stream.read_pos(), pos);
    }

    #[test]
    fn test_invalid_utf8_restores_cursor() {
        let mut stream = ByteStream::new();
        stream.write_u32(2);
        stream.write_bytes(&[0xFF, 0xFE]);
        assert!(matches!(stream.read_string(), Err(CodecError::InvalidUtf8)));
        assert_eq!(stream.read_pos(), 0);
    }

    #[test]
    fn test_reset_read_reparses_from_start() {
        let mut stream = ByteStream::new();
        stream.write_u16(42);

        assert_eq!(stream.read_u16().unwrap(), 42);
        stream.reset_read();
        assert_eq!(stream.read_u16().unwrap(), 42);
    }

    #[test]
    fn test_growth_preserves_written_bytes() {
        let mut stream = ByteStream::with_capacity(4);
        stream.write_u32(0xAABBCCDD);
        stream.write_bytes(&[0u8; 1024]);

        assert_eq!(stream.read_u32().unwrap(), 0xAABBCCDD);
        assert_eq!(stream.len(), 4 + 1024);
    }

    #[test]
    fn test_from_bytes_and_remaining() {
        let mut stream = ByteStream::from_bytes(&[1, 2, 3, 4]);
        assert_eq!(stream.len(), 4);
        assert_eq!(stream.read_u8().unwrap(), 1);
        assert_eq!(stream.remaining_bytes(), &[2, 3, 4]);
    }
}
