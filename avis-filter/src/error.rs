use std::fmt;

/// Byte range within a subscription expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Smallest span covering both
    pub fn to(&self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

/// Errors raised while compiling a subscription expression
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FilterError {
    #[error("Lexer error at {span:?}: {message}")]
    LexerError { span: Span, message: String },

    #[error("Parse error at {span:?}: {message}")]
    ParserError { span: Span, message: String },

    #[error("Type error at {span:?}: {message}")]
    TypeError { span: Span, message: String },

    #[error("Unknown function at {span:?}: {name}")]
    UnknownFunction { span: Span, name: String },

    #[error("Arity mismatch at {span:?}: {name} expects {expected}, got {got}")]
    ArityMismatch {
        span: Span,
        name: String,
        expected: String,
        got: usize,
    },

    #[error("Invalid pattern at {span:?}: {message}")]
    InvalidPattern { span: Span, message: String },
}

impl FilterError {
    pub fn span(&self) -> Span {
        match self {
            FilterError::LexerError { span, .. } => *span,
            FilterError::ParserError { span, .. } => *span,
            FilterError::TypeError { span, .. } => *span,
            FilterError::UnknownFunction { span, .. } => *span,
            FilterError::ArityMismatch { span, .. } => *span,
            FilterError::InvalidPattern { span, .. } => *span,
        }
    }
}

pub type Result<T> = std::result::Result<T, FilterError>;

/// Renders an error against the expression it came from
pub struct ErrorContext<'a> {
    pub source: &'a str,
    pub error: &'a FilterError,
}

impl<'a> ErrorContext<'a> {
    pub fn new(source: &'a str, error: &'a FilterError) -> Self {
        Self { source, error }
    }

    /// Column of the error (1-indexed, in characters)
    pub fn column(&self) -> usize {
        let start = self.error.span().start.min(self.source.len());
        self.source[..start].chars().count() + 1
    }
}

impl<'a> fmt::Display for ErrorContext<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.error)?;
        writeln!(f, "  {}", self.source)?;

        let span = self.error.span();
        let start = span.start.min(self.source.len());
        let end = span.end.clamp(start, self.source.len());
        let width = self.source[start..end].chars().count().max(1);
        writeln!(f, "  {}{}", " ".repeat(self.column() - 1), "^".repeat(width))
    }
}
