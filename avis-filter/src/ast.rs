//! Subscription expression tree and its evaluation
//!
//! Evaluation is three-valued. Besides true and false, a predicate can be
//! *bottom*: the notification lacks an attribute the predicate reads, or the
//! attribute has a type the predicate cannot use. Bottom propagates through
//! `!`, and through `&&`/`||`/`^^` unless the result is already decided.
//!
//! Arithmetic follows Java integer rules: int32 and int64 wrap, shift
//! distances are masked to the operand width, and integer division by zero
//! is bottom.

use avis_types::{Attributes, Value, ValueKind};
use regex::Regex;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    fn test(&self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringOp {
    BeginsWith,
    EndsWith,
    Contains,
    Wildcard,
    Regex,
}

impl StringOp {
    pub fn name(&self) -> &'static str {
        match self {
            StringOp::BeginsWith => "begins-with",
            StringOp::EndsWith => "ends-with",
            StringOp::Contains => "contains",
            StringOp::Wildcard => "wildcard",
            StringOp::Regex => "regex",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    /// Logical (zero-filling) right shift
    Ushr,
}

impl MathOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            MathOp::Add => "+",
            MathOp::Sub => "-",
            MathOp::Mul => "*",
            MathOp::Div => "/",
            MathOp::Mod => "%",
            MathOp::BitAnd => "&",
            MathOp::BitOr => "|",
            MathOp::BitXor => "^",
            MathOp::Shl => "<<",
            MathOp::Shr => ">>",
            MathOp::Ushr => ">>>",
        }
    }

    /// Bitwise and shift operators take only int32 and int64 operands
    pub fn is_integer_only(&self) -> bool {
        matches!(
            self,
            MathOp::BitAnd | MathOp::BitOr | MathOp::BitXor | MathOp::Shl | MathOp::Shr | MathOp::Ushr
        )
    }

    fn int32(self, a: i32, b: i32) -> Option<i32> {
        Some(match self {
            MathOp::Add => a.wrapping_add(b),
            MathOp::Sub => a.wrapping_sub(b),
            MathOp::Mul => a.wrapping_mul(b),
            MathOp::Div if b == 0 => return None,
            MathOp::Div => a.wrapping_div(b),
            MathOp::Mod if b == 0 => return None,
            MathOp::Mod => a.wrapping_rem(b),
            MathOp::BitAnd => a & b,
            MathOp::BitOr => a | b,
            MathOp::BitXor => a ^ b,
            MathOp::Shl => a.wrapping_shl(b as u32),
            MathOp::Shr => a.wrapping_shr(b as u32),
            MathOp::Ushr => (a as u32).wrapping_shr(b as u32) as i32,
        })
    }

    fn int64(self, a: i64, b: i64) -> Option<i64> {
        Some(match self {
            MathOp::Add => a.wrapping_add(b),
            MathOp::Sub => a.wrapping_sub(b),
            MathOp::Mul => a.wrapping_mul(b),
            MathOp::Div if b == 0 => return None,
            MathOp::Div => a.wrapping_div(b),
            MathOp::Mod if b == 0 => return None,
            MathOp::Mod => a.wrapping_rem(b),
            MathOp::BitAnd => a & b,
            MathOp::BitOr => a | b,
            MathOp::BitXor => a ^ b,
            MathOp::Shl => a.wrapping_shl(b as u32),
            MathOp::Shr => a.wrapping_shr(b as u32),
            MathOp::Ushr => (a as u64).wrapping_shr(b as u32) as i64,
        })
    }

    fn real64(self, a: f64, b: f64) -> Option<f64> {
        Some(match self {
            MathOp::Add => a + b,
            MathOp::Sub => a - b,
            MathOp::Mul => a * b,
            MathOp::Div => a / b,
            MathOp::Mod => a % b,
            _ => return None,
        })
    }

    /// Apply to two evaluated operands, promoting to the wider type
    fn apply<'a>(self, lhs: Datum<'a>, rhs: Datum<'a>) -> Datum<'a> {
        let result = match (&lhs, &rhs) {
            (Datum::Int32(a), Datum::Int32(b)) => self.int32(*a, *b).map(Datum::Int32),
            (Datum::Int32(_) | Datum::Int64(_), Datum::Int32(_) | Datum::Int64(_)) => {
                let (a, b) = (as_int64(&lhs), as_int64(&rhs));
                a.zip(b).and_then(|(a, b)| self.int64(a, b)).map(Datum::Int64)
            }
            _ => match (as_number(&lhs), as_number(&rhs)) {
                (Some(a), Some(b)) => self.real64(a.to_real(), b.to_real()).map(Datum::Real64),
                _ => None,
            },
        };
        result.unwrap_or(Datum::Bottom)
    }
}

/// Unicode decomposition applied by `decompose` and `decompose-compat`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decomposition {
    /// NFD
    Canonical,
    /// NFKD
    Compatibility,
}

impl Decomposition {
    pub fn name(&self) -> &'static str {
        match self {
            Decomposition::Canonical => "decompose",
            Decomposition::Compatibility => "decompose-compat",
        }
    }

    fn apply(&self, text: &str) -> String {
        match self {
            Decomposition::Canonical => text.nfd().collect(),
            Decomposition::Compatibility => text.nfkd().collect(),
        }
    }
}

/// The static type of an expression, used to reject ill-typed filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Bool,
    Int32,
    Int64,
    Real64,
    String,
    /// Arithmetic over fields: numeric, width known per notification
    Number,
    /// A field reference: its type is only known per notification
    Any,
}

impl NodeType {
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            NodeType::Int32 | NodeType::Int64 | NodeType::Real64 | NodeType::Number
        )
    }

    /// Could evaluate to an int32 or int64
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            NodeType::Int32 | NodeType::Int64 | NodeType::Number | NodeType::Any
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            NodeType::Bool => "boolean",
            NodeType::Int32 => "int32",
            NodeType::Int64 => "int64",
            NodeType::Real64 => "real64",
            NodeType::String => "string",
            NodeType::Number => "number",
            NodeType::Any => "field",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    Const(Value),
    Field(String),
    Require(String),
    Type { name: String, kind: ValueKind },
    Nan(String),
    Size(String),
    FoldCase(Box<Node>),
    Decompose(Decomposition, Box<Node>),
    Negate(Box<Node>),
    BitInvert(Box<Node>),
    Math {
        op: MathOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Compare {
        op: CompareOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    StringMatch {
        op: StringOp,
        expr: Box<Node>,
        pattern: String,
        /// Compiled form for `wildcard` and `regex`
        regex: Option<Regex>,
    },
    And(Vec<Node>),
    Or(Vec<Node>),
    Xor(Box<Node>, Box<Node>),
    Not(Box<Node>),
}

/// Intermediate result of evaluating a node
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Datum<'a> {
    Bottom,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Real64(f64),
    Str(Cow<'a, str>),
    Opaque(&'a [u8]),
}

impl<'a> Datum<'a> {
    fn from_value(value: &'a Value) -> Self {
        match value {
            Value::String(s) => Datum::Str(Cow::Borrowed(s)),
            Value::Int32(i) => Datum::Int32(*i),
            Value::Int64(i) => Datum::Int64(*i),
            Value::Real64(d) => Datum::Real64(*d),
            Value::Opaque(b) => Datum::Opaque(b),
        }
    }

    fn truth(self) -> Option<bool> {
        match self {
            Datum::Bool(b) => Some(b),
            _ => None,
        }
    }
}

fn from_truth<'a>(truth: Option<bool>) -> Datum<'a> {
    truth.map_or(Datum::Bottom, Datum::Bool)
}

impl Node {
    pub fn node_type(&self) -> NodeType {
        match self {
            Node::Const(value) => match value.kind() {
                ValueKind::String | ValueKind::Opaque => NodeType::String,
                ValueKind::Int32 => NodeType::Int32,
                ValueKind::Int64 => NodeType::Int64,
                ValueKind::Real64 => NodeType::Real64,
            },
            Node::Field(_) => NodeType::Any,
            Node::Size(_) => NodeType::Int32,
            Node::FoldCase(_) | Node::Decompose(..) => NodeType::String,
            Node::Negate(inner) | Node::BitInvert(inner) => inner.node_type(),
            Node::Math { op, lhs, rhs } => math_type(*op, lhs.node_type(), rhs.node_type()),
            Node::Require(_)
            | Node::Type { .. }
            | Node::Nan(_)
            | Node::Compare { .. }
            | Node::StringMatch { .. }
            | Node::And(_)
            | Node::Or(_)
            | Node::Xor(..)
            | Node::Not(_) => NodeType::Bool,
        }
    }

    /// Evaluate as a predicate. `None` is bottom.
    pub fn evaluate(&self, attributes: &Attributes) -> Option<bool> {
        self.eval(attributes).truth()
    }

    pub(crate) fn eval<'a>(&'a self, attrs: &'a Attributes) -> Datum<'a> {
        match self {
            Node::Const(value) => Datum::from_value(value),
            Node::Field(name) => attrs.get(name).map_or(Datum::Bottom, Datum::from_value),
            Node::Require(name) => {
                if attrs.contains(name) {
                    Datum::Bool(true)
                } else {
                    Datum::Bottom
                }
            }
            Node::Type { name, kind } => match attrs.get(name) {
                Ok(value) => Datum::Bool(value.kind() == *kind),
                Err(_) => Datum::Bottom,
            },
            Node::Nan(name) => match attrs.get(name) {
                Ok(Value::Real64(d)) => Datum::Bool(d.is_nan()),
                _ => Datum::Bottom,
            },
            Node::Size(name) => match attrs.get(name) {
                Ok(Value::String(s)) => Datum::Int32(s.chars().count() as i32),
                Ok(Value::Opaque(b)) => Datum::Int32(b.len() as i32),
                _ => Datum::Bottom,
            },
            Node::FoldCase(inner) => match inner.eval(attrs) {
                Datum::Str(s) => Datum::Str(Cow::Owned(s.to_lowercase())),
                _ => Datum::Bottom,
            },
            Node::Decompose(mode, inner) => match inner.eval(attrs) {
                Datum::Str(s) => Datum::Str(Cow::Owned(mode.apply(&s))),
                _ => Datum::Bottom,
            },
            Node::Negate(inner) => match inner.eval(attrs) {
                Datum::Int32(i) => Datum::Int32(i.wrapping_neg()),
                Datum::Int64(i) => Datum::Int64(i.wrapping_neg()),
                Datum::Real64(d) => Datum::Real64(-d),
                _ => Datum::Bottom,
            },
            Node::BitInvert(inner) => match inner.eval(attrs) {
                Datum::Int32(i) => Datum::Int32(!i),
                Datum::Int64(i) => Datum::Int64(!i),
                _ => Datum::Bottom,
            },
            Node::Math { op, lhs, rhs } => {
                let lhs = lhs.eval(attrs);
                if as_number(&lhs).is_none() {
                    return Datum::Bottom;
                }
                op.apply(lhs, rhs.eval(attrs))
            }
            Node::Compare { op, lhs, rhs } => compare(*op, lhs.eval(attrs), rhs.eval(attrs)),
            Node::StringMatch {
                op,
                expr,
                pattern,
                regex,
            } => match expr.eval(attrs) {
                Datum::Str(s) => Datum::Bool(match op {
                    StringOp::BeginsWith => s.starts_with(pattern.as_str()),
                    StringOp::EndsWith => s.ends_with(pattern.as_str()),
                    StringOp::Contains => s.contains(pattern.as_str()),
                    StringOp::Wildcard | StringOp::Regex => {
                        regex.as_ref().map_or(false, |re| re.is_match(&s))
                    }
                }),
                _ => Datum::Bottom,
            },
            Node::And(children) => {
                let mut result = Some(true);
                for child in children {
                    match child.eval(attrs).truth() {
                        Some(false) => return Datum::Bool(false),
                        None => result = None,
                        Some(true) => {}
                    }
                }
                from_truth(result)
            }
            Node::Or(children) => {
                let mut result = Some(false);
                for child in children {
                    match child.eval(attrs).truth() {
                        Some(true) => return Datum::Bool(true),
                        None => result = None,
                        Some(false) => {}
                    }
                }
                from_truth(result)
            }
            Node::Xor(a, b) => match (a.eval(attrs).truth(), b.eval(attrs).truth()) {
                (Some(x), Some(y)) => Datum::Bool(x != y),
                _ => Datum::Bottom,
            },
            Node::Not(inner) => from_truth(inner.eval(attrs).truth().map(|b| !b)),
        }
    }
}

enum Number {
    Int(i64),
    Real(f64),
}

impl Number {
    fn to_real(&self) -> f64 {
        match self {
            Number::Int(i) => *i as f64,
            Number::Real(d) => *d,
        }
    }
}

fn as_int64(datum: &Datum<'_>) -> Option<i64> {
    match datum {
        Datum::Int32(i) => Some(i64::from(*i)),
        Datum::Int64(i) => Some(*i),
        _ => None,
    }
}

/// Result type of `lhs op rhs`, following numeric promotion
fn math_type(op: MathOp, lhs: NodeType, rhs: NodeType) -> NodeType {
    match (lhs, rhs) {
        (NodeType::Int32, NodeType::Int32) => NodeType::Int32,
        (NodeType::Int32 | NodeType::Int64, NodeType::Int32 | NodeType::Int64) => NodeType::Int64,
        (NodeType::Real64, _) | (_, NodeType::Real64) if !op.is_integer_only() => NodeType::Real64,
        _ => NodeType::Number,
    }
}

fn as_number(datum: &Datum<'_>) -> Option<Number> {
    match datum {
        Datum::Int32(i) => Some(Number::Int(i64::from(*i))),
        Datum::Int64(i) => Some(Number::Int(*i)),
        Datum::Real64(d) => Some(Number::Real(*d)),
        _ => None,
    }
}

/// Compare two evaluated operands.
///
/// Numbers are promoted to the wider type. Strings compare lexically.
/// Anything else, including a number against a string, is bottom. A NaN
/// operand follows IEEE 754: only `!=` holds.
fn compare<'a>(op: CompareOp, lhs: Datum<'a>, rhs: Datum<'a>) -> Datum<'a> {
    if let (Datum::Str(a), Datum::Str(b)) = (&lhs, &rhs) {
        return Datum::Bool(op.test(a.as_ref().cmp(b.as_ref())));
    }

    let ordering = match (as_number(&lhs), as_number(&rhs)) {
        (Some(Number::Int(a)), Some(Number::Int(b))) => Some(a.cmp(&b)),
        (Some(Number::Int(a)), Some(Number::Real(b))) => (a as f64).partial_cmp(&b),
        (Some(Number::Real(a)), Some(Number::Int(b))) => a.partial_cmp(&(b as f64)),
        (Some(Number::Real(a)), Some(Number::Real(b))) => a.partial_cmp(&b),
        _ => return Datum::Bottom,
    };

    match ordering {
        Some(ordering) => Datum::Bool(op.test(ordering)),
        None => Datum::Bool(op == CompareOp::Ne),
    }
}

/// Translate an Elvin wildcard (`*`, `?`, `\` escape) into an anchored regex
pub(crate) fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::from("(?s)^");
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '\\' => {
                if let Some(escaped) = chars.next() {
                    out.push_str(&regex::escape(&escaped.to_string()));
                }
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    out
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn write_const(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::String(s) => write_quoted(f, s),
        Value::Int32(i) => write!(f, "{}", i),
        Value::Int64(i) => write!(f, "{}L", i),
        Value::Real64(d) => write!(f, "{:?}", d),
        Value::Opaque(_) => write!(f, "{}", value),
    }
}

fn write_field(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    f.write_str("(field ")?;
    write_quoted(f, name)?;
    f.write_str(")")
}

/// Parenthesised prefix form, e.g. `(&& (require (field 'x')) (== (field 'y') 1))`
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Const(value) => write_const(f, value),
            Node::Field(name) => write_field(f, name),
            Node::Require(name) => {
                f.write_str("(require ")?;
                write_field(f, name)?;
                f.write_str(")")
            }
            Node::Type { name, kind } => {
                write!(f, "({} ", kind.name())?;
                write_field(f, name)?;
                f.write_str(")")
            }
            Node::Nan(name) => {
                f.write_str("(nan ")?;
                write_field(f, name)?;
                f.write_str(")")
            }
            Node::Size(name) => {
                f.write_str("(size ")?;
                write_field(f, name)?;
                f.write_str(")")
            }
            Node::FoldCase(inner) => write!(f, "(fold-case {})", inner),
            Node::Decompose(mode, inner) => write!(f, "({} {})", mode.name(), inner),
            Node::Negate(inner) => write!(f, "(- {})", inner),
            Node::BitInvert(inner) => write!(f, "(~ {})", inner),
            Node::Math { op, lhs, rhs } => write!(f, "({} {} {})", op.symbol(), lhs, rhs),
            Node::Compare { op, lhs, rhs } => write!(f, "({} {} {})", op.symbol(), lhs, rhs),
            Node::StringMatch {
                op, expr, pattern, ..
            } => {
                write!(f, "({} {} ", op.name(), expr)?;
                write_quoted(f, pattern)?;
                f.write_str(")")
            }
            Node::And(children) => write_list(f, "&&", children),
            Node::Or(children) => write_list(f, "||", children),
            Node::Xor(a, b) => write!(f, "(^^ {} {})", a, b),
            Node::Not(inner) => write!(f, "(! {})", inner),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, op: &str, children: &[Node]) -> fmt::Result {
    write!(f, "({}", op)?;
    for child in children {
        write!(f, " {}", child)?;
    }
    f.write_str(")")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str) -> Box<Node> {
        Box::new(Node::Field(name.to_string()))
    }

    fn int(i: i32) -> Box<Node> {
        Box::new(Node::Const(Value::Int32(i)))
    }

    #[test]
    fn test_compare_promotes_numbers() {
        let mut attrs = Attributes::new();
        attrs.set_int64("big", 42).unwrap();
        attrs.set_real64("real", 42.0).unwrap();

        let eq = Node::Compare {
            op: CompareOp::Eq,
            lhs: field("big"),
            rhs: int(42),
        };
        assert_eq!(eq.evaluate(&attrs), Some(true));

        let lt = Node::Compare {
            op: CompareOp::Lt,
            lhs: field("real"),
            rhs: field("big"),
        };
        assert_eq!(lt.evaluate(&attrs), Some(false));
    }

    #[test]
    fn test_compare_mismatched_types_is_bottom() {
        let mut attrs = Attributes::new();
        attrs.set_string("name", "x").unwrap();

        let node = Node::Compare {
            op: CompareOp::Eq,
            lhs: field("name"),
            rhs: int(1),
        };
        assert_eq!(node.evaluate(&attrs), None);
    }

    #[test]
    fn test_nan_compare_follows_ieee() {
        let mut attrs = Attributes::new();
        attrs.set_real64("real", f64::NAN).unwrap();

        for (op, expected) in [
            (CompareOp::Eq, false),
            (CompareOp::Ne, true),
            (CompareOp::Lt, false),
            (CompareOp::Ge, false),
        ] {
            let node = Node::Compare {
                op,
                lhs: field("real"),
                rhs: field("real"),
            };
            assert_eq!(node.evaluate(&attrs), Some(expected), "{:?}", op);
        }
    }

    #[test]
    fn test_three_valued_logic() {
        let attrs = Attributes::new();
        let bottom = Node::Require("missing".to_string());
        let false_node = Node::Compare {
            op: CompareOp::Eq,
            lhs: int(1),
            rhs: int(2),
        };
        let true_node = Node::Compare {
            op: CompareOp::Eq,
            lhs: int(1),
            rhs: int(1),
        };

        let and = Node::And(vec![bottom.clone(), false_node.clone()]);
        assert_eq!(and.evaluate(&attrs), Some(false));

        let or = Node::Or(vec![bottom.clone(), true_node.clone()]);
        assert_eq!(or.evaluate(&attrs), Some(true));

        let or_bottom = Node::Or(vec![bottom.clone(), false_node]);
        assert_eq!(or_bottom.evaluate(&attrs), None);

        let not = Node::Not(Box::new(bottom.clone()));
        assert_eq!(not.evaluate(&attrs), None);

        let xor = Node::Xor(Box::new(bottom), Box::new(true_node));
        assert_eq!(xor.evaluate(&attrs), None);
    }

    fn math(op: MathOp, lhs: Value, rhs: Value) -> Option<Value> {
        let node = Node::Math {
            op,
            lhs: Box::new(Node::Const(lhs)),
            rhs: Box::new(Node::Const(rhs)),
        };
        let attrs = Attributes::new();
        let result = match node.eval(&attrs) {
            Datum::Int32(i) => Some(Value::Int32(i)),
            Datum::Int64(i) => Some(Value::Int64(i)),
            Datum::Real64(d) => Some(Value::Real64(d)),
            _ => None,
        };
        result
    }

    #[test]
    fn test_math_promotes_operands() {
        use Value::{Int32, Int64, Real64};

        assert_eq!(math(MathOp::Sub, Int32(20), Int32(30)), Some(Int32(-10)));
        assert_eq!(math(MathOp::Add, Int64(20), Int64(30)), Some(Int64(50)));
        assert_eq!(math(MathOp::Add, Int32(10), Real64(20.25)), Some(Real64(30.25)));
        assert_eq!(math(MathOp::Mul, Int32(20), Int64(30)), Some(Int64(600)));
        assert_eq!(math(MathOp::Div, Int32(20), Int32(30)), Some(Int32(0)));
        assert_eq!(math(MathOp::Mod, Real64(10.5), Real64(20.25)), Some(Real64(10.5)));
        assert_eq!(math(MathOp::Add, Int32(i32::MAX), Int32(1)), Some(Int32(i32::MIN)));
        assert_eq!(math(MathOp::Add, Value::from("1"), Int32(1)), None);
    }

    #[test]
    fn test_division_by_zero() {
        use Value::{Int32, Int64, Real64};

        assert_eq!(math(MathOp::Div, Int32(10), Int32(0)), None);
        assert_eq!(math(MathOp::Div, Int64(10), Int64(0)), None);
        assert_eq!(math(MathOp::Mod, Int32(20), Int32(0)), None);
        assert_eq!(math(MathOp::Div, Real64(10.0), Real64(0.0)), Some(Real64(f64::INFINITY)));
        assert!(matches!(
            math(MathOp::Mod, Real64(20.0), Real64(0.0)),
            Some(Real64(d)) if d.is_nan()
        ));
        assert_eq!(math(MathOp::Div, Int32(i32::MIN), Int32(-1)), Some(Int32(i32::MIN)));
    }

    #[test]
    fn test_bitwise_operators() {
        use Value::{Int32, Int64, Real64};

        assert_eq!(math(MathOp::BitAnd, Int32(20), Int32(30)), Some(Int32(20 & 30)));
        assert_eq!(math(MathOp::BitOr, Int64(20), Int32(30)), Some(Int64(20 | 30)));
        assert_eq!(math(MathOp::BitXor, Int64(20), Int32(30)), Some(Int64(20 ^ 30)));
        assert_eq!(math(MathOp::Shl, Int32(20), Int32(30)), Some(Int32(0)));
        assert_eq!(math(MathOp::Shl, Int64(20), Int32(30)), Some(Int64(20 << 30)));
        assert_eq!(math(MathOp::Shl, Int32(1), Int32(33)), Some(Int32(2)));
        assert_eq!(math(MathOp::Shr, Int32(-16), Int32(2)), Some(Int32(-4)));
        assert_eq!(math(MathOp::Ushr, Int32(-1), Int32(28)), Some(Int32(0xF)));
        assert_eq!(math(MathOp::Ushr, Int64(-1), Int32(60)), Some(Int64(0xF)));
        assert_eq!(math(MathOp::BitAnd, Real64(1.0), Int32(1)), None);

        let invert = Node::BitInvert(Box::new(Node::Const(Int64(1234567890))));
        assert_eq!(invert.eval(&Attributes::new()), Datum::Int64(!1234567890));
        let invert = Node::BitInvert(field("missing"));
        assert_eq!(invert.eval(&Attributes::new()), Datum::Bottom);
    }

    #[test]
    fn test_decomposition() {
        let decompose = |mode, text: &str| {
            let node = Node::Decompose(mode, Box::new(Node::Const(Value::from(text))));
            let attrs = Attributes::new();
            let result = match node.eval(&attrs) {
                Datum::Str(s) => Some(s.into_owned()),
                _ => None,
            };
            result
        };

        assert_eq!(
            decompose(Decomposition::Canonical, "\u{C1}").as_deref(),
            Some("A\u{301}")
        );
        assert_eq!(
            decompose(Decomposition::Canonical, "\u{C4}\u{FB03}n").as_deref(),
            Some("A\u{308}\u{FB03}n")
        );
        assert_eq!(
            decompose(Decomposition::Compatibility, "\u{C4}\u{FB03}n").as_deref(),
            Some("A\u{308}ffin")
        );
    }

    #[test]
    fn test_wildcard_translation() {
        let re = Regex::new(&wildcard_to_regex("hel*lo?")).unwrap();
        assert!(re.is_match("hello!"));
        assert!(re.is_match("helXXlo?"));
        assert!(!re.is_match("hello"));

        let literal = Regex::new(&wildcard_to_regex(r"a\*b")).unwrap();
        assert!(literal.is_match("a*b"));
        assert!(!literal.is_match("aXb"));
    }

    #[test]
    fn test_display() {
        let node = Node::And(vec![
            Node::Require("Opaque".to_string()),
            Node::Compare {
                op: CompareOp::Ne,
                lhs: field("n"),
                rhs: Box::new(Node::Const(Value::Int64(10))),
            },
        ]);
        assert_eq!(
            node.to_string(),
            "(&& (require (field 'Opaque')) (!= (field 'n') 10L))"
        );
    }
}
