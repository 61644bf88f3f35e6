use crate::ast::{wildcard_to_regex, CompareOp, Decomposition, MathOp, Node, NodeType, StringOp};
use crate::error::{FilterError, Result, Span};
use crate::lexer::{SpannedToken, Token};
use avis_types::{Value, ValueKind};
use regex::Regex;

/// Deepest nesting of `!`, unary operators, parentheses, function
/// arguments and left-associative operator chains
pub const MAX_DEPTH: usize = 32;

/// Recursive-descent parser for subscription expressions.
///
/// Precedence, loosest first: `||`, `^^`, `&&`, `!`, comparisons, `|`, `^`,
/// `&`, shifts, `+ -`, `* / %`, unary `-` and `~`. Comparisons do not chain;
/// every other binary operator groups to the left.
pub struct Parser<'a> {
    tokens: &'a [SpannedToken],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [SpannedToken]) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn descend(&mut self) -> Result<()> {
        if self.depth >= MAX_DEPTH {
            return Err(FilterError::ParserError {
                span: self.current_span(),
                message: format!("Expression nested more than {} levels deep", MAX_DEPTH),
            });
        }
        self.depth += 1;
        Ok(())
    }

    /// Run `parse` one nesting level down
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.descend()?;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn peek(&self) -> Option<&'a SpannedToken> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&'a SpannedToken> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, expected: &Token) -> bool {
        self.peek()
            .map(|t| std::mem::discriminant(&t.token) == std::mem::discriminant(expected))
            .unwrap_or(false)
    }

    fn current_span(&self) -> Span {
        self.peek().map(|t| t.span).unwrap_or_default()
    }

    fn expect(&mut self, expected: Token) -> Result<Span> {
        match self.peek() {
            Some(t) if std::mem::discriminant(&t.token) == std::mem::discriminant(&expected) => {
                self.pos += 1;
                Ok(t.span)
            }
            Some(t) => Err(FilterError::ParserError {
                span: t.span,
                message: format!("Expected {}, found {}", expected.describe(), t.token.describe()),
            }),
            None => Err(FilterError::ParserError {
                span: Span::default(),
                message: format!("Expected {}", expected.describe()),
            }),
        }
    }

    /// Parse a complete predicate, rejecting trailing input
    pub fn parse(&mut self) -> Result<Node> {
        let (node, span) = self.parse_or()?;
        expect_predicate(&node, span)?;

        if let Some(t) = self.peek() {
            if !matches!(t.token, Token::Eof) {
                return Err(FilterError::ParserError {
                    span: t.span,
                    message: format!("Unexpected {}", t.token.describe()),
                });
            }
        }

        Ok(node)
    }

    fn parse_or(&mut self) -> Result<(Node, Span)> {
        let (first, mut span) = self.parse_xor()?;
        if !self.check(&Token::OrOr) {
            return Ok((first, span));
        }

        expect_predicate(&first, span)?;
        let mut children = vec![first];
        while self.check(&Token::OrOr) {
            self.advance();
            let (child, child_span) = self.parse_xor()?;
            expect_predicate(&child, child_span)?;
            span = span.to(child_span);
            children.push(child);
        }
        Ok((Node::Or(children), span))
    }

    fn parse_xor(&mut self) -> Result<(Node, Span)> {
        let (mut lhs, mut span) = self.parse_and()?;
        let base = self.depth;
        while self.check(&Token::XorXor) {
            self.advance();
            expect_predicate(&lhs, span)?;
            self.descend()?;
            let (rhs, rhs_span) = self.parse_and()?;
            expect_predicate(&rhs, rhs_span)?;
            span = span.to(rhs_span);
            lhs = Node::Xor(Box::new(lhs), Box::new(rhs));
        }
        self.depth = base;
        Ok((lhs, span))
    }

    fn parse_and(&mut self) -> Result<(Node, Span)> {
        let (first, mut span) = self.parse_not()?;
        if !self.check(&Token::AndAnd) {
            return Ok((first, span));
        }

        expect_predicate(&first, span)?;
        let mut children = vec![first];
        while self.check(&Token::AndAnd) {
            self.advance();
            let (child, child_span) = self.parse_not()?;
            expect_predicate(&child, child_span)?;
            span = span.to(child_span);
            children.push(child);
        }
        Ok((Node::And(children), span))
    }

    fn parse_not(&mut self) -> Result<(Node, Span)> {
        if self.check(&Token::Bang) {
            let start = self.current_span();
            self.advance();
            let (inner, inner_span) = self.nested(Self::parse_not)?;
            expect_predicate(&inner, inner_span)?;
            return Ok((Node::Not(Box::new(inner)), start.to(inner_span)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<(Node, Span)> {
        let (lhs, lhs_span) = self.parse_bit_or()?;

        let op = match self.peek().map(|t| &t.token) {
            Some(Token::EqEq) => CompareOp::Eq,
            Some(Token::NotEq) => CompareOp::Ne,
            Some(Token::Lt) => CompareOp::Lt,
            Some(Token::Le) => CompareOp::Le,
            Some(Token::Gt) => CompareOp::Gt,
            Some(Token::Ge) => CompareOp::Ge,
            _ => return Ok((lhs, lhs_span)),
        };
        self.advance();

        let (rhs, rhs_span) = self.parse_bit_or()?;
        let span = lhs_span.to(rhs_span);
        let node = compare_node(op, (lhs, lhs_span), (rhs, rhs_span))?;

        if let Some(t) = self.peek() {
            if matches!(
                t.token,
                Token::EqEq | Token::NotEq | Token::Lt | Token::Le | Token::Gt | Token::Ge
            ) {
                return Err(FilterError::ParserError {
                    span: t.span,
                    message: "Comparisons cannot be chained".to_string(),
                });
            }
        }

        Ok((node, span))
    }

    /// One left-associative level of binary math operators
    fn parse_math_level(
        &mut self,
        operator: fn(&Token) -> Option<MathOp>,
        operand: fn(&mut Self) -> Result<(Node, Span)>,
    ) -> Result<(Node, Span)> {
        let mut lhs = operand(self)?;
        let base = self.depth;
        while let Some(op) = self.peek().and_then(|t| operator(&t.token)) {
            self.advance();
            self.descend()?;
            let rhs = operand(self)?;
            lhs = math_node(op, lhs, rhs)?;
        }
        self.depth = base;
        Ok(lhs)
    }

    fn parse_bit_or(&mut self) -> Result<(Node, Span)> {
        self.parse_math_level(
            |t| matches!(t, Token::Pipe).then_some(MathOp::BitOr),
            Self::parse_bit_xor,
        )
    }

    fn parse_bit_xor(&mut self) -> Result<(Node, Span)> {
        self.parse_math_level(
            |t| matches!(t, Token::Caret).then_some(MathOp::BitXor),
            Self::parse_bit_and,
        )
    }

    fn parse_bit_and(&mut self) -> Result<(Node, Span)> {
        self.parse_math_level(
            |t| matches!(t, Token::Amp).then_some(MathOp::BitAnd),
            Self::parse_shift,
        )
    }

    fn parse_shift(&mut self) -> Result<(Node, Span)> {
        self.parse_math_level(
            |t| match t {
                Token::Shl => Some(MathOp::Shl),
                Token::Shr => Some(MathOp::Shr),
                Token::Ushr => Some(MathOp::Ushr),
                _ => None,
            },
            Self::parse_additive,
        )
    }

    fn parse_additive(&mut self) -> Result<(Node, Span)> {
        self.parse_math_level(
            |t| match t {
                Token::Plus => Some(MathOp::Add),
                Token::Minus => Some(MathOp::Sub),
                _ => None,
            },
            Self::parse_multiplicative,
        )
    }

    fn parse_multiplicative(&mut self) -> Result<(Node, Span)> {
        self.parse_math_level(
            |t| match t {
                Token::Star => Some(MathOp::Mul),
                Token::Slash => Some(MathOp::Div),
                Token::Percent => Some(MathOp::Mod),
                _ => None,
            },
            Self::parse_unary,
        )
    }

    fn parse_unary(&mut self) -> Result<(Node, Span)> {
        if self.check(&Token::Tilde) {
            let start = self.current_span();
            self.advance();
            let (inner, inner_span) = self.nested(Self::parse_unary)?;
            let ty = inner.node_type();
            if !ty.is_integer() {
                return Err(FilterError::TypeError {
                    span: inner_span,
                    message: format!("'~' needs an integer, found {} expression", ty.name()),
                });
            }
            return Ok((Node::BitInvert(Box::new(inner)), start.to(inner_span)));
        }

        if !self.check(&Token::Minus) {
            return self.parse_primary();
        }

        let start = self.current_span();
        self.advance();
        let (inner, inner_span) = self.nested(Self::parse_unary)?;
        let span = start.to(inner_span);

        let node = match inner {
            Node::Const(Value::Int32(i)) => Node::Const(Value::Int32(i.wrapping_neg())),
            Node::Const(Value::Int64(i)) => Node::Const(Value::Int64(i.wrapping_neg())),
            Node::Const(Value::Real64(d)) => Node::Const(Value::Real64(-d)),
            other => {
                let ty = other.node_type();
                if !(ty.is_numeric() || ty == NodeType::Any) {
                    return Err(FilterError::TypeError {
                        span: inner_span,
                        message: format!("Cannot negate a {} expression", ty.name()),
                    });
                }
                Node::Negate(Box::new(other))
            }
        };
        Ok((node, span))
    }

    fn parse_primary(&mut self) -> Result<(Node, Span)> {
        let token = match self.advance() {
            Some(t) => t,
            None => {
                return Err(FilterError::ParserError {
                    span: Span::default(),
                    message: "Unexpected end of expression".to_string(),
                })
            }
        };

        match &token.token {
            Token::Int32(i) => Ok((Node::Const(Value::Int32(*i)), token.span)),
            Token::Int64(i) => Ok((Node::Const(Value::Int64(*i)), token.span)),
            Token::Real64(d) => Ok((Node::Const(Value::Real64(*d)), token.span)),
            Token::StringLiteral(s) => Ok((Node::Const(Value::String(s.clone())), token.span)),
            Token::LParen => {
                let (inner, _) = self.nested(Self::parse_or)?;
                let close = self.expect(Token::RParen)?;
                Ok((inner, token.span.to(close)))
            }
            Token::Identifier(name) => {
                if self.check(&Token::LParen) {
                    self.parse_call(name, token.span)
                } else {
                    Ok((Node::Field(name.clone()), token.span))
                }
            }
            other => Err(FilterError::ParserError {
                span: token.span,
                message: format!("Unexpected {}", other.describe()),
            }),
        }
    }

    fn parse_arguments(&mut self) -> Result<(Vec<(Node, Span)>, Span)> {
        self.expect(Token::LParen)?;
        let mut args = Vec::new();

        if !self.check(&Token::RParen) {
            loop {
                args.push(self.nested(Self::parse_or)?);
                if self.check(&Token::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }

        let close = self.expect(Token::RParen)?;
        Ok((args, close))
    }

    fn parse_call(&mut self, name: &str, name_span: Span) -> Result<(Node, Span)> {
        let function = Function::lookup(name).ok_or_else(|| FilterError::UnknownFunction {
            span: name_span,
            name: name.to_string(),
        })?;

        let (args, close) = self.parse_arguments()?;
        let span = name_span.to(close);
        let node = function.build(name, span, args)?;
        Ok((node, span))
    }
}

/// Built-in functions
#[derive(Debug, Clone, Copy)]
enum Function {
    Require,
    TypeTest(ValueKind),
    Nan,
    Size,
    FoldCase,
    Decompose(Decomposition),
    Equals,
    StringMatch(StringOp),
}

impl Function {
    fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "require" => Function::Require,
            "int32" => Function::TypeTest(ValueKind::Int32),
            "int64" => Function::TypeTest(ValueKind::Int64),
            "real64" => Function::TypeTest(ValueKind::Real64),
            "string" => Function::TypeTest(ValueKind::String),
            "opaque" => Function::TypeTest(ValueKind::Opaque),
            "nan" => Function::Nan,
            "size" => Function::Size,
            "fold-case" => Function::FoldCase,
            "decompose" => Function::Decompose(Decomposition::Canonical),
            "decompose-compat" => Function::Decompose(Decomposition::Compatibility),
            "equals" => Function::Equals,
            "begins-with" => Function::StringMatch(StringOp::BeginsWith),
            "ends-with" => Function::StringMatch(StringOp::EndsWith),
            "contains" => Function::StringMatch(StringOp::Contains),
            "wildcard" => Function::StringMatch(StringOp::Wildcard),
            "regex" => Function::StringMatch(StringOp::Regex),
            _ => return None,
        })
    }

    fn build(self, name: &str, span: Span, args: Vec<(Node, Span)>) -> Result<Node> {
        match self {
            Function::Require => Ok(Node::Require(single_field(name, span, args)?)),
            Function::TypeTest(kind) => Ok(Node::Type {
                name: single_field(name, span, args)?,
                kind,
            }),
            Function::Nan => Ok(Node::Nan(single_field(name, span, args)?)),
            Function::Size => Ok(Node::Size(single_field(name, span, args)?)),
            Function::FoldCase => {
                let (arg, arg_span) = exactly_one(name, span, args)?;
                expect_string(&arg, arg_span)?;
                Ok(Node::FoldCase(Box::new(arg)))
            }
            Function::Decompose(mode) => {
                let (arg, arg_span) = exactly_one(name, span, args)?;
                expect_string(&arg, arg_span)?;
                Ok(Node::Decompose(mode, Box::new(arg)))
            }
            Function::Equals => {
                let mut args = at_least_two(name, span, args)?;
                let (subject, subject_span) = args.remove(0);
                let mut alternatives = Vec::new();
                for (arg, arg_span) in args {
                    alternatives.push(compare_node(
                        CompareOp::Eq,
                        (subject.clone(), subject_span),
                        (arg, arg_span),
                    )?);
                }
                Ok(one_or_any(alternatives))
            }
            Function::StringMatch(op) => {
                let mut args = at_least_two(name, span, args)?;
                let (subject, subject_span) = args.remove(0);
                expect_string(&subject, subject_span)?;

                let mut alternatives = Vec::new();
                for (arg, arg_span) in args {
                    let pattern = match arg {
                        Node::Const(Value::String(pattern)) => pattern,
                        other => {
                            return Err(FilterError::TypeError {
                                span: arg_span,
                                message: format!(
                                    "{} expects a string constant, found {}",
                                    name,
                                    other.node_type().name()
                                ),
                            })
                        }
                    };
                    let regex = compile_pattern(op, &pattern, arg_span)?;
                    alternatives.push(Node::StringMatch {
                        op,
                        expr: Box::new(subject.clone()),
                        pattern,
                        regex,
                    });
                }
                Ok(one_or_any(alternatives))
            }
        }
    }
}

fn one_or_any(mut alternatives: Vec<Node>) -> Node {
    if alternatives.len() == 1 {
        alternatives.remove(0)
    } else {
        Node::Or(alternatives)
    }
}

fn compile_pattern(op: StringOp, pattern: &str, span: Span) -> Result<Option<Regex>> {
    let source = match op {
        StringOp::Regex => format!("(?s){}", pattern),
        StringOp::Wildcard => wildcard_to_regex(pattern),
        _ => return Ok(None),
    };
    Regex::new(&source)
        .map(Some)
        .map_err(|e| FilterError::InvalidPattern {
            span,
            message: format!("'{}': {}", pattern, e),
        })
}

fn exactly_one(name: &str, span: Span, mut args: Vec<(Node, Span)>) -> Result<(Node, Span)> {
    if args.len() != 1 {
        return Err(FilterError::ArityMismatch {
            span,
            name: name.to_string(),
            expected: "1 argument".to_string(),
            got: args.len(),
        });
    }
    Ok(args.remove(0))
}

fn at_least_two(name: &str, span: Span, args: Vec<(Node, Span)>) -> Result<Vec<(Node, Span)>> {
    if args.len() < 2 {
        return Err(FilterError::ArityMismatch {
            span,
            name: name.to_string(),
            expected: "at least 2 arguments".to_string(),
            got: args.len(),
        });
    }
    Ok(args)
}

fn single_field(name: &str, span: Span, args: Vec<(Node, Span)>) -> Result<String> {
    match exactly_one(name, span, args)? {
        (Node::Field(field), _) => Ok(field),
        (_, arg_span) => Err(FilterError::TypeError {
            span: arg_span,
            message: format!("{} expects an attribute name", name),
        }),
    }
}

fn expect_predicate(node: &Node, span: Span) -> Result<()> {
    let ty = node.node_type();
    if ty == NodeType::Bool {
        Ok(())
    } else {
        Err(FilterError::TypeError {
            span,
            message: format!("Expected a predicate, found {} expression", ty.name()),
        })
    }
}

fn expect_string(node: &Node, span: Span) -> Result<()> {
    match node.node_type() {
        NodeType::String | NodeType::Any => Ok(()),
        ty => Err(FilterError::TypeError {
            span,
            message: format!("Expected a string, found {} expression", ty.name()),
        }),
    }
}

fn math_node(op: MathOp, lhs: (Node, Span), rhs: (Node, Span)) -> Result<(Node, Span)> {
    let (lhs, lhs_span) = lhs;
    let (rhs, rhs_span) = rhs;

    for (node, span) in [(&lhs, lhs_span), (&rhs, rhs_span)] {
        let ty = node.node_type();
        let (valid, wanted) = if op.is_integer_only() {
            (ty.is_integer(), "an integer")
        } else {
            (ty.is_numeric() || ty == NodeType::Any, "a number")
        };
        if !valid {
            return Err(FilterError::TypeError {
                span,
                message: format!("'{}' needs {}, found {} expression", op.symbol(), wanted, ty.name()),
            });
        }
    }

    let node = Node::Math {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    };
    Ok((node, lhs_span.to(rhs_span)))
}

fn compare_node(op: CompareOp, lhs: (Node, Span), rhs: (Node, Span)) -> Result<Node> {
    let (lhs, lhs_span) = lhs;
    let (rhs, rhs_span) = rhs;
    let (lt, rt) = (lhs.node_type(), rhs.node_type());

    for (ty, span) in [(lt, lhs_span), (rt, rhs_span)] {
        if ty == NodeType::Bool {
            return Err(FilterError::TypeError {
                span,
                message: format!("Cannot compare a predicate with '{}'", op.symbol()),
            });
        }
    }

    let incompatible = (lt == NodeType::String && rt.is_numeric())
        || (lt.is_numeric() && rt == NodeType::String);
    if incompatible {
        return Err(FilterError::TypeError {
            span: lhs_span.to(rhs_span),
            message: format!("Cannot compare {} with {}", lt.name(), rt.name()),
        });
    }

    Ok(Node::Compare {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    })
}
