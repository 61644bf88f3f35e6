//! Insertion-ordered attribute maps
//!
//! `Attributes` is the payload of every notification. Names are unique and
//! case-sensitive; iteration follows insertion order, and re-setting an
//! existing name replaces its value in place without moving it.

use crate::error::{AttributeError, Result};
use crate::iter::AttributesIter;
use crate::value::{Value, ValueKind};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// A notification: a set of named, typed attributes
#[derive(Debug, Clone, Default)]
pub struct Attributes {
    entries: Vec<(String, Value)>,
    index: HashMap<String, usize>,
}

impl Attributes {
    /// Create an empty attribute map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an attribute.
    ///
    /// Replacing keeps the attribute's original iteration position.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(AttributeError::InvalidName);
        }
        let value = value.into();

        match self.index.get(&name) {
            Some(&pos) => self.entries[pos].1 = value,
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, value));
            }
        }
        Ok(())
    }

    /// Set every pair in order, stopping at the first invalid name.
    ///
    /// Pairs before the invalid one stay set.
    pub fn try_extend<N, V>(&mut self, pairs: impl IntoIterator<Item = (N, V)>) -> Result<()>
    where
        N: Into<String>,
        V: Into<Value>,
    {
        for (name, value) in pairs {
            self.set(name, value)?;
        }
        Ok(())
    }

    /// Build a map from pairs, failing on the first invalid name
    pub fn try_from_pairs<N, V>(pairs: impl IntoIterator<Item = (N, V)>) -> Result<Self>
    where
        N: Into<String>,
        V: Into<Value>,
    {
        let mut attributes = Attributes::new();
        attributes.try_extend(pairs)?;
        Ok(attributes)
    }

    pub fn set_string(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.set(name, Value::String(value.into()))
    }

    pub fn set_int32(&mut self, name: impl Into<String>, value: i32) -> Result<()> {
        self.set(name, Value::Int32(value))
    }

    pub fn set_int64(&mut self, name: impl Into<String>, value: i64) -> Result<()> {
        self.set(name, Value::Int64(value))
    }

    pub fn set_real64(&mut self, name: impl Into<String>, value: f64) -> Result<()> {
        self.set(name, Value::Real64(value))
    }

    /// Set an opaque attribute. The bytes are copied, so the caller's buffer
    /// may be reused as soon as this returns.
    pub fn set_opaque(&mut self, name: impl Into<String>, bytes: &[u8]) -> Result<()> {
        self.set(name, Value::Opaque(bytes.to_vec()))
    }

    /// Look up an attribute by name
    pub fn get(&self, name: &str) -> Result<&Value> {
        self.index
            .get(name)
            .map(|&pos| &self.entries[pos].1)
            .ok_or_else(|| AttributeError::NotFound(name.to_string()))
    }

    pub fn get_string(&self, name: &str) -> Result<&str> {
        let value = self.get(name)?;
        value.as_str().ok_or_else(|| wrong_type(name, ValueKind::String, value))
    }

    pub fn get_int32(&self, name: &str) -> Result<i32> {
        let value = self.get(name)?;
        value.as_i32().ok_or_else(|| wrong_type(name, ValueKind::Int32, value))
    }

    pub fn get_int64(&self, name: &str) -> Result<i64> {
        let value = self.get(name)?;
        value.as_i64().ok_or_else(|| wrong_type(name, ValueKind::Int64, value))
    }

    pub fn get_real64(&self, name: &str) -> Result<f64> {
        let value = self.get(name)?;
        value.as_f64().ok_or_else(|| wrong_type(name, ValueKind::Real64, value))
    }

    pub fn get_opaque(&self, name: &str) -> Result<&[u8]> {
        let value = self.get(name)?;
        value.as_bytes().ok_or_else(|| wrong_type(name, ValueKind::Opaque, value))
    }

    /// Remove an attribute, returning its value if it was present.
    ///
    /// Removing an absent name is not an error.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let pos = self.index.remove(name)?;
        let (_, value) = self.entries.remove(pos);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        Some(value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Attribute names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// A restartable cursor over this map
    pub fn cursor(&self) -> AttributesIter<'_> {
        AttributesIter::new(self)
    }

    pub(crate) fn entry_at(&self, pos: usize) -> Option<(&str, &Value)> {
        self.entries
            .get(pos)
            .map(|(name, value)| (name.as_str(), value))
    }
}

fn wrong_type(name: &str, expected: ValueKind, found: &Value) -> AttributeError {
    AttributeError::WrongType {
        name: name.to_string(),
        expected,
        found: found.kind(),
    }
}

/// Order-insensitive: Elvin attribute sets are unordered on the wire.
impl PartialEq for Attributes {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(name, value)| other.get(name).map_or(false, |v| v == value))
    }
}

impl fmt::Display for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in self.iter() {
            writeln!(f, "{}: {}", name, value)?;
        }
        Ok(())
    }
}

impl Serialize for Attributes {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Attributes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct AttributesVisitor;

        impl<'de> Visitor<'de> for AttributesVisitor {
            type Value = Attributes;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of attribute names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Attributes, A::Error> {
                let mut attributes = Attributes::new();
                while let Some((name, value)) = access.next_entry::<String, Value>()? {
                    attributes
                        .set(name, value)
                        .map_err(serde::de::Error::custom)?;
                }
                Ok(attributes)
            }
        }

        deserializer.deserialize_map(AttributesVisitor)
    }
}
