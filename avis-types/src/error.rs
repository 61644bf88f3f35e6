//! Error types for attribute maps and cursors

use crate::value::ValueKind;
use thiserror::Error;

/// Errors from building values and reading or writing attribute maps
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AttributeError {
    /// Attribute names must be non-empty
    #[error("attribute name cannot be empty")]
    InvalidName,

    /// No attribute with the given name
    #[error("attribute {0:?} not found")]
    NotFound(String),

    /// The attribute exists but holds a different type
    #[error("attribute {name:?} is {found}, not {expected}")]
    WrongType {
        name: String,
        expected: ValueKind,
        found: ValueKind,
    },

    /// A declared opaque length exceeds the supplied buffer
    #[error("opaque length {declared} exceeds buffer of {available} bytes")]
    TypeConstruction { declared: usize, available: usize },
}

/// Errors from the attribute cursor
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum IterError {
    /// The cursor is not positioned on an entry
    #[error("iterator is not positioned on an entry")]
    InvalidState,
}

pub type Result<T> = std::result::Result<T, AttributeError>;
