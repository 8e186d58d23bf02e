// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Little-endian read/write cursors for frame buffers.

use std::fmt;

/// Low-level wire errors, folded into `crate::Error` by the codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Buffer ended before `needed` more bytes at `offset`.
    UnexpectedEnd { offset: usize, needed: usize },
    /// Bool byte other than 0 or 1.
    InvalidBool { offset: usize, value: u8 },
    /// Presence byte other than 0 or 1.
    InvalidPresence { offset: usize, value: u8 },
    /// String field is not valid UTF-8.
    InvalidUtf8 { offset: usize },
    /// Length prefix larger than the declared bound.
    LengthExceeded {
        offset: usize,
        length: usize,
        max: usize,
    },
    /// Bytes left over after the last field.
    TrailingBytes { offset: usize, remaining: usize },
    /// Value too long for a `u32` length prefix.
    LengthOverflow { length: usize },
}

impl WireError {
    /// Byte count the decoder expected when it stopped.
    pub fn expected_len(&self) -> usize {
        match self {
            Self::UnexpectedEnd { offset, needed } => offset.saturating_add(*needed),
            Self::TrailingBytes { offset, .. } => *offset,
            Self::InvalidBool { offset, .. }
            | Self::InvalidPresence { offset, .. }
            | Self::InvalidUtf8 { offset }
            | Self::LengthExceeded { offset, .. } => *offset,
            Self::LengthOverflow { length } => *length,
        }
    }
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEnd { offset, needed } => {
                write!(f, "unexpected end of buffer at offset {} (needed {} more bytes)", offset, needed)
            }
            Self::InvalidBool { offset, value } => {
                write!(f, "invalid bool byte 0x{:02x} at offset {}", value, offset)
            }
            Self::InvalidPresence { offset, value } => {
                write!(f, "invalid presence byte 0x{:02x} at offset {}", value, offset)
            }
            Self::InvalidUtf8 { offset } => write!(f, "invalid UTF-8 string at offset {}", offset),
            Self::LengthExceeded {
                offset,
                length,
                max,
            } => write!(
                f,
                "length {} exceeds maximum {} at offset {}",
                length, max, offset
            ),
            Self::TrailingBytes { offset, remaining } => {
                write!(f, "{} trailing bytes after offset {}", remaining, offset)
            }
            Self::LengthOverflow { length } => {
                write!(f, "length {} does not fit a u32 prefix", length)
            }
        }
    }
}

impl std::error::Error for WireError {}

pub type WireResult<T> = Result<T, WireError>;

/// Generate write methods for primitive types.
macro_rules! impl_write_le {
    ($name:ident, $type:ty) => {
        pub fn $name(&mut self, value: $type) {
            self.buffer.extend_from_slice(&value.to_le_bytes());
        }
    };
}

/// Generate read methods for primitive types.
macro_rules! impl_read_le {
    ($name:ident, $type:ty, $size:expr) => {
        pub fn $name(&mut self) -> WireResult<$type> {
            let mut bytes = [0u8; $size];
            bytes.copy_from_slice(self.take($size)?);
            Ok(<$type>::from_le_bytes(bytes))
        }
    };
}

/// Growable writer (no alignment, no padding).
#[derive(Debug, Default)]
pub struct WireWriter {
    buffer: Vec<u8>,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    impl_write_le!(write_u8, u8);
    impl_write_le!(write_u16, u16);
    impl_write_le!(write_u32, u32);
    impl_write_le!(write_u64, u64);
    impl_write_le!(write_i8, i8);
    impl_write_le!(write_i16, i16);
    impl_write_le!(write_i32, i32);
    impl_write_le!(write_i64, i64);

    pub fn write_f32(&mut self, value: f32) {
        self.write_u32(value.to_bits());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.write_u64(value.to_bits());
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(u8::from(value));
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// `u32` length prefix.
    pub fn write_len(&mut self, length: usize) -> WireResult<()> {
        let length = u32::try_from(length).map_err(|_| WireError::LengthOverflow { length })?;
        self.write_u32(length);
        Ok(())
    }

    /// Length-prefixed byte string.
    pub fn write_prefixed(&mut self, data: &[u8]) -> WireResult<()> {
        self.write_len(data.len())?;
        self.write_bytes(data);
        Ok(())
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }
}

/// Bounds-checked reader over a borrowed buffer.
#[derive(Debug)]
pub struct WireReader<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.offset)
    }

    impl_read_le!(read_u8, u8, 1);
    impl_read_le!(read_u16, u16, 2);
    impl_read_le!(read_u32, u32, 4);
    impl_read_le!(read_u64, u64, 8);
    impl_read_le!(read_i8, i8, 1);
    impl_read_le!(read_i16, i16, 2);
    impl_read_le!(read_i32, i32, 4);
    impl_read_le!(read_i64, i64, 8);

    pub fn read_f32(&mut self) -> WireResult<f32> {
        self.read_u32().map(f32::from_bits)
    }

    pub fn read_f64(&mut self) -> WireResult<f64> {
        self.read_u64().map(f64::from_bits)
    }

    /// Strict bool: only 0 and 1 are accepted.
    pub fn read_bool(&mut self) -> WireResult<bool> {
        let offset = self.offset;
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(WireError::InvalidBool { offset, value }),
        }
    }

    /// Presence byte of an optional field.
    pub fn read_presence(&mut self) -> WireResult<bool> {
        let offset = self.offset;
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(WireError::InvalidPresence { offset, value }),
        }
    }

    /// `u32` length prefix, checked against an optional bound.
    pub fn read_len(&mut self, max: Option<usize>) -> WireResult<usize> {
        let offset = self.offset;
        let length = self.read_u32()? as usize;
        match max {
            Some(max) if length > max => Err(WireError::LengthExceeded {
                offset,
                length,
                max,
            }),
            _ => Ok(length),
        }
    }

    /// Length-prefixed byte string.
    pub fn read_prefixed(&mut self, max: Option<usize>) -> WireResult<&'a [u8]> {
        let length = self.read_len(max)?;
        self.take(length)
    }

    /// Length-prefixed UTF-8 string.
    pub fn read_string(&mut self, max: Option<usize>) -> WireResult<String> {
        let start = self.offset;
        let bytes = self.read_prefixed(max)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| WireError::InvalidUtf8 { offset: start })
    }

    pub fn take(&mut self, len: usize) -> WireResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(WireError::UnexpectedEnd {
                offset: self.offset,
                needed: len,
            });
        }
        let slice = &self.buffer[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    /// Fail if any byte is left unread.
    pub fn finish(&self) -> WireResult<()> {
        match self.remaining() {
            0 => Ok(()),
            remaining => Err(WireError::TrailingBytes {
                offset: self.offset,
                remaining,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_little_endian_layout() {
        let mut w = WireWriter::new();
        w.write_u16(0x0102);
        w.write_u32(0x0304_0506);
        w.write_i8(-1);
        assert_eq!(w.into_inner(), [0x02, 0x01, 0x06, 0x05, 0x04, 0x03, 0xff]);
    }

    #[test]
    fn test_read_past_end() {
        let mut r = WireReader::new(&[1, 2, 3]);
        assert_eq!(
            r.read_u32(),
            Err(WireError::UnexpectedEnd {
                offset: 0,
                needed: 4
            })
        );
        assert_eq!(r.read_u16(), Ok(0x0201));
        assert_eq!(r.remaining(), 1);
    }

    #[test]
    fn test_strict_bool() {
        let mut r = WireReader::new(&[0, 1, 2]);
        assert_eq!(r.read_bool(), Ok(false));
        assert_eq!(r.read_bool(), Ok(true));
        assert_eq!(r.read_bool(), Err(WireError::InvalidBool { offset: 2, value: 2 }));
    }

    #[test]
    fn test_prefixed_string() {
        let mut w = WireWriter::new();
        w.write_prefixed("héllo".as_bytes()).expect("fits");
        let bytes = w.into_inner();

        let mut r = WireReader::new(&bytes);
        assert_eq!(r.read_string(None).as_deref(), Ok("héllo"));
        assert!(r.finish().is_ok());

        let mut r = WireReader::new(&bytes);
        assert!(matches!(
            r.read_string(Some(3)),
            Err(WireError::LengthExceeded { length: 6, max: 3, .. })
        ));
    }

    #[test]
    fn test_invalid_utf8_and_trailing() {
        let bytes = [2, 0, 0, 0, 0xff, 0xfe, 9];
        let mut r = WireReader::new(&bytes);
        assert_eq!(r.read_string(None), Err(WireError::InvalidUtf8 { offset: 0 }));
        assert_eq!(
            r.finish(),
            Err(WireError::TrailingBytes {
                offset: 6,
                remaining: 1
            })
        );
    }
}
