//! Restartable cursor over an attribute map
//!
//! The cursor mirrors the classic Elvin client loop:
//!
//! ```
//! use avis_types::Attributes;
//!
//! let mut attrs = Attributes::new();
//! attrs.set_int32("Number", 42).unwrap();
//!
//! let mut cursor = attrs.cursor();
//! while cursor.has_next() {
//!     let name = cursor.current_name().unwrap();
//!     let value = cursor.current_value().unwrap();
//!     println!("{} = {}", name, value);
//!     cursor.next();
//! }
//! ```
//!
//! `has_next` is true while the cursor sits on an entry. The cursor borrows
//! the map, so the map can neither change nor be dropped while a cursor
//! over it is live.

use crate::attributes::Attributes;
use crate::error::IterError;
use crate::value::Value;

/// Cursor over the entries of an [`Attributes`] map, in insertion order
#[derive(Debug, Clone)]
pub struct AttributesIter<'a> {
    attributes: &'a Attributes,
    position: usize,
}

impl<'a> AttributesIter<'a> {
    /// Bind a cursor to `attributes`, before any entry has been consumed
    pub fn new(attributes: &'a Attributes) -> Self {
        Self {
            attributes,
            position: 0,
        }
    }

    /// Whether the cursor is positioned on an entry
    pub fn has_next(&self) -> bool {
        self.position < self.attributes.len()
    }

    /// Advance one entry. Returns the new value of [`has_next`].
    ///
    /// Advancing an exhausted cursor is a no-op.
    ///
    /// [`has_next`]: AttributesIter::has_next
    pub fn next(&mut self) -> bool {
        if self.has_next() {
            self.position += 1;
        }
        self.has_next()
    }

    /// Rewind to the first entry
    pub fn restart(&mut self) {
        self.position = 0;
    }

    pub fn current_name(&self) -> Result<&'a str, IterError> {
        self.current().map(|(name, _)| name)
    }

    pub fn current_value(&self) -> Result<&'a Value, IterError> {
        self.current().map(|(_, value)| value)
    }

    pub fn current(&self) -> Result<(&'a str, &'a Value), IterError> {
        self.attributes
            .entry_at(self.position)
            .ok_or(IterError::InvalidState)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_map() {
        let attrs = Attributes::new();
        let mut cursor = attrs.cursor();
        assert!(!cursor.has_next());
        assert_eq!(cursor.current_name(), Err(IterError::InvalidState));
        assert!(!cursor.next());
    }

    #[test]
    fn test_walks_in_insertion_order() {
        let mut attrs = Attributes::new();
        attrs.set_string("b", "two").unwrap();
        attrs.set_int32("a", 1).unwrap();
        attrs.set_real64("c", 3.0).unwrap();

        let mut cursor = attrs.cursor();
        let mut seen = Vec::new();
        while cursor.has_next() {
            seen.push((
                cursor.current_name().unwrap().to_string(),
                cursor.current_value().unwrap().clone(),
            ));
            cursor.next();
        }

        assert_eq!(
            seen,
            vec![
                ("b".to_string(), Value::String("two".into())),
                ("a".to_string(), Value::Int32(1)),
                ("c".to_string(), Value::Real64(3.0)),
            ]
        );
    }

    #[test]
    fn test_next_past_end_is_noop() {
        let mut attrs = Attributes::new();
        attrs.set_int32("only", 1).unwrap();

        let mut cursor = attrs.cursor();
        assert!(!cursor.next());
        assert!(!cursor.next());
        assert_eq!(cursor.current_value(), Err(IterError::InvalidState));
    }

    #[test]
    fn test_restart() {
        let mut attrs = Attributes::new();
        attrs.set_int32("x", 1).unwrap();
        attrs.set_int32("y", 2).unwrap();

        let mut cursor = attrs.cursor();
        cursor.next();
        cursor.next();
        assert!(!cursor.has_next());

        cursor.restart();
        assert_eq!(cursor.current_name().unwrap(), "x");
    }
}
