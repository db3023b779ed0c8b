//! Canonical key encoding.
//!
//! Keys are turned into fixed-width byte strings whose unsigned lexicographic
//! order is the index order:
//!
//! ```text
//! SHORT    i32 -> 4 bytes big-endian
//! INT      i64 -> 8 bytes big-endian
//! VARCHAR  "ab" with width 6 -> 00 00 00 00 61 62
//! ```
//!
//! Integers are stored without a sign bias, so negative values order after
//! every non-negative value. Strings are right-justified, which orders them by
//! length first and bytewise within one length. The empty string encodes to a
//! zero-length key.

use bytes::{Bytes, BytesMut};
use nibble_common::{Key, KeyType, NibbleError, Result};

/// Encoder/decoder for the keys of one index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCodec {
    key_type: KeyType,
    width: usize,
}

impl KeyCodec {
    /// Creates a codec. `max_varchar_len` is only used for string keys.
    pub fn new(key_type: KeyType, max_varchar_len: usize) -> Self {
        let width = key_type.fixed_size().unwrap_or(max_varchar_len);
        Self { key_type, width }
    }

    #[inline]
    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    /// Canonical key width in bytes.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn encode(&self, key: &Key) -> Result<Bytes> {
        if key.key_type() != self.key_type {
            return Err(NibbleError::TypeMismatch {
                expected: self.key_type,
                actual: key.key_type(),
            });
        }

        match key {
            Key::Short(v) => Ok(Bytes::copy_from_slice(&v.to_be_bytes())),
            Key::Int(v) => Ok(Bytes::copy_from_slice(&v.to_be_bytes())),
            Key::Varchar(s) => {
                let bytes = s.as_bytes();
                if bytes.len() > self.width {
                    return Err(NibbleError::KeyTooLarge {
                        size: bytes.len(),
                        max: self.width,
                    });
                }
                if bytes.contains(&0) {
                    return Err(NibbleError::InvalidKey(
                        "string keys cannot contain NUL".to_string(),
                    ));
                }
                if bytes.is_empty() {
                    return Ok(Bytes::new());
                }
                let mut buf = BytesMut::zeroed(self.width);
                buf[self.width - bytes.len()..].copy_from_slice(bytes);
                Ok(buf.freeze())
            }
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<Key> {
        match self.key_type {
            KeyType::Short => {
                let raw: [u8; 4] = bytes.try_into().map_err(|_| self.bad_width(bytes))?;
                Ok(Key::Short(i32::from_be_bytes(raw)))
            }
            KeyType::Int => {
                let raw: [u8; 8] = bytes.try_into().map_err(|_| self.bad_width(bytes))?;
                Ok(Key::Int(i64::from_be_bytes(raw)))
            }
            KeyType::Varchar => {
                if bytes.is_empty() {
                    return Ok(Key::Varchar(String::new()));
                }
                if bytes.len() != self.width {
                    return Err(self.bad_width(bytes));
                }
                let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
                let s = std::str::from_utf8(&bytes[start..])
                    .map_err(|e| NibbleError::Internal(format!("stored key is not UTF-8: {}", e)))?;
                Ok(Key::Varchar(s.to_string()))
            }
        }
    }

    fn bad_width(&self, bytes: &[u8]) -> NibbleError {
        NibbleError::Internal(format!(
            "{} key has {} bytes, expected {}",
            self.key_type,
            bytes.len(),
            self.width
        ))
    }
}
