//! Typed attribute values
//!
//! Elvin notifications carry exactly five value types. `Value` is a closed
//! sum over them so every consumer gets exhaustive matching.

use crate::error::AttributeError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The wire type of a [`Value`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    String,
    Int32,
    Int64,
    Real64,
    Opaque,
}

impl ValueKind {
    /// The Elvin type name, as used by the subscription language type tests
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::Int32 => "int32",
            ValueKind::Int64 => "int64",
            ValueKind::Real64 => "real64",
            ValueKind::Opaque => "opaque",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single typed attribute value
///
/// Values are immutable once built: there are no setters, and the kind of a
/// value is fixed by its variant. Equality follows IEEE 754 for `Real64`
/// (`NaN != NaN`); use [`Value::bit_eq`] when a bit-exact comparison is
/// wanted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    String(String),
    Int32(i32),
    Int64(i64),
    Real64(f64),
    Opaque(Vec<u8>),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn int32(i: i32) -> Self {
        Value::Int32(i)
    }

    pub fn int64(i: i64) -> Self {
        Value::Int64(i)
    }

    pub fn real64(d: f64) -> Self {
        Value::Real64(d)
    }

    /// Build an opaque value, copying the given bytes
    pub fn opaque(bytes: impl Into<Vec<u8>>) -> Self {
        Value::Opaque(bytes.into())
    }

    /// Build an opaque value from a buffer and a declared length.
    ///
    /// Copies the first `length` bytes of `bytes`. Fails when the buffer is
    /// shorter than the declared length.
    pub fn try_opaque(bytes: &[u8], length: usize) -> Result<Self, AttributeError> {
        let slice = bytes
            .get(..length)
            .ok_or(AttributeError::TypeConstruction {
                declared: length,
                available: bytes.len(),
            })?;
        Ok(Value::Opaque(slice.to_vec()))
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::String(_) => ValueKind::String,
            Value::Int32(_) => ValueKind::Int32,
            Value::Int64(_) => ValueKind::Int64,
            Value::Real64(_) => ValueKind::Real64,
            Value::Opaque(_) => ValueKind::Opaque,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real64(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Opaque(b) => Some(b),
            _ => None,
        }
    }

    /// Structural equality with `Real64` compared by bit pattern.
    ///
    /// Two NaNs with the same payload are `bit_eq`, and `0.0` is not
    /// `bit_eq` to `-0.0`.
    pub fn bit_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Real64(a), Value::Real64(b)) => a.to_bits() == b.to_bits(),
            _ => self == other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            Value::Int32(i) => write!(f, "{}", i),
            Value::Int64(i) => write!(f, "{}L", i),
            Value::Real64(d) if d.is_nan() => f.write_str("NaN"),
            Value::Real64(d) => write!(f, "{:?}", d),
            Value::Opaque(bytes) => {
                f.write_str("[")?;
                for byte in bytes {
                    write!(f, "{:02x}", byte)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int32(i)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int64(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Real64(d)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Opaque(bytes)
    }
}

impl From<&[u8]> for Value {
    fn from(bytes: &[u8]) -> Self {
        Value::Opaque(bytes.to_vec())
    }
}
