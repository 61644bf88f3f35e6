//! # Elvin subscription language
//!
//! Compiles subscription expressions such as
//! `require(Opaque) && begins-with(Greeting, 'Hello')` and evaluates them
//! against notification [`Attributes`].
//!
//! Evaluation is three-valued: an expression that reads a missing attribute,
//! or one of the wrong type, is neither true nor false. Only expressions that
//! evaluate to true select a notification.
//!
//! ## Example
//!
//! ```
//! use avis_filter::Filter;
//! use avis_types::Attributes;
//!
//! let filter = Filter::parse("require(Opaque) && Number > 40").unwrap();
//!
//! let mut notification = Attributes::new();
//! notification.set_int32("Number", 42).unwrap();
//! assert_eq!(filter.evaluate(&notification), None);
//!
//! notification.set_opaque("Opaque", &[1, 2, 3]).unwrap();
//! assert!(filter.matches(&notification));
//! ```

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;


pub use ast::{CompareOp, Decomposition, MathOp, Node, NodeType, StringOp};
pub use error::{ErrorContext, FilterError, Result, Span};
pub use lexer::{tokenize, SpannedToken, Token};
pub use parser::{Parser, MAX_DEPTH};

use avis_types::Attributes;
use std::fmt;
use std::str::FromStr;

/// Parse an expression into its tree
pub fn parse(source: &str) -> Result<Node> {
    let tokens = tokenize(source)?;
    Parser::new(&tokens).parse()
}

/// A compiled subscription expression
#[derive(Debug, Clone)]
pub struct Filter {
    expression: String,
    root: Node,
}

impl Filter {
    pub fn parse(expression: &str) -> Result<Self> {
        Ok(Self {
            expression: expression.to_string(),
            root: parse(expression)?,
        })
    }

    /// The source text this filter was compiled from
    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Evaluate against a notification. `None` means the result is undefined.
    pub fn evaluate(&self, attributes: &Attributes) -> Option<bool> {
        self.root.evaluate(attributes)
    }

    /// True only when the expression evaluates to true
    pub fn matches(&self, attributes: &Attributes) -> bool {
        self.evaluate(attributes) == Some(true)
    }
}

impl FromStr for Filter {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self> {
        Filter::parse(s)
    }
}

/// Prints the compiled tree in prefix form
impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)
    }
}
