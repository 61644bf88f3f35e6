//! Shared types for Avis Elvin clients
//!
//! This crate provides the notification payload model used across the
//! avis crates: typed [`Value`]s, insertion-ordered [`Attributes`] maps and
//! the [`AttributesIter`] cursor.
//!
//! # Example
//!
//! ```
//! use avis_types::{Attributes, Value};
//!
//! let mut notification = Attributes::new();
//! notification.set_string("Greeting", "Hello World").unwrap();
//! notification.set_int32("Number", 42).unwrap();
//! notification.set_opaque("Opaque", b"dab\0guy").unwrap();
//!
//! assert_eq!(notification.get("Number").unwrap(), &Value::Int32(42));
//! assert_eq!(notification.get_opaque("Opaque").unwrap().len(), 7);
//! ```

pub mod attributes;
pub mod error;
pub mod iter;
pub mod value;

pub use attributes::Attributes;
pub use error::{AttributeError, IterError, Result};
pub use iter::AttributesIter;
pub use value::{Value, ValueKind};
