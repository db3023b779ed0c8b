//! Key, record, and transaction identifier types for Nibble.

use serde::{Deserialize, Serialize};

use crate::error::{NibbleError, Result};

/// Declared key type of an index.
///
/// The key type is fixed when the index is created. Every key handed to
/// that index must carry the matching [`Key`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum KeyType {
    /// 32-bit signed integer.
    Short = 0,
    /// 64-bit signed integer.
    Int = 1,
    /// Bounded-length string.
    Varchar = 2,
}

impl KeyType {
    /// Returns the canonical byte width for numeric types, or None for
    /// strings whose width comes from the engine configuration.
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            KeyType::Short => Some(4),
            KeyType::Int => Some(8),
            KeyType::Varchar => None,
        }
    }

    /// Returns true if this key type is an integer type.
    pub fn is_numeric(&self) -> bool {
        matches!(self, KeyType::Short | KeyType::Int)
    }

    /// Converts a raw type tag back into a key type.
    pub fn from_u8(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(KeyType::Short),
            1 => Ok(KeyType::Int),
            2 => Ok(KeyType::Varchar),
            _ => Err(NibbleError::UnsupportedType(format!("key type tag {}", tag))),
        }
    }
}

impl std::fmt::Display for KeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            KeyType::Short => "SHORT",
            KeyType::Int => "INT",
            KeyType::Varchar => "VARCHAR",
        };
        write!(f, "{}", name)
    }
}

/// A typed key value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    Short(i32),
    Int(i64),
    Varchar(String),
}

impl Key {
    /// Returns the key type this value belongs to.
    pub fn key_type(&self) -> KeyType {
        match self {
            Key::Short(_) => KeyType::Short,
            Key::Int(_) => KeyType::Int,
            Key::Varchar(_) => KeyType::Varchar,
        }
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Short(v) => write!(f, "{}", v),
            Key::Int(v) => write!(f, "{}", v),
            Key::Varchar(s) => write!(f, "'{}'", s),
        }
    }
}

impl From<i32> for Key {
    fn from(v: i32) -> Self {
        Key::Short(v)
    }
}

impl From<i64> for Key {
    fn from(v: i64) -> Self {
        Key::Int(v)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Varchar(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Varchar(s)
    }
}

/// A (key, payload) pair returned by a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub key: Key,
    pub payload: String,
}

impl Record {
    pub fn new(key: impl Into<Key>, payload: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            payload: payload.into(),
        }
    }
}

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.key, self.payload)
    }
}

/// Logical timestamp identifying a transaction or an auto-commit operation.
///
/// Issued from one monotonically increasing counter, so comparing two ids
/// orders the operations that carry them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TxnId(pub u64);

impl TxnId {
    /// Returns the raw timestamp value.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TxnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}
