use crate::error::{FilterError, Result, Span};
use logos::Logos;

/// Tokens of the Elvin subscription language
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token {
    // Names. Function names such as `begins-with` contain hyphens; longest
    // match keeps `begins-with` from splitting into `begins` `-` `with`.
    #[regex(r"([A-Za-z_]|\\.)([A-Za-z0-9_]|\\.)*", |lex| unescape(lex.slice()))]
    #[regex(r"begins-with|ends-with|fold-case|decompose-compat", |lex| lex.slice().to_string())]
    Identifier(String),

    // Literals
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i32>().ok())]
    #[regex(r"0[xX][0-9a-fA-F]+", |lex| u32::from_str_radix(&lex.slice()[2..], 16).ok().map(|v| v as i32))]
    Int32(i32),

    #[regex(r"[0-9]+[lL]", |lex| { let s = lex.slice(); s[..s.len() - 1].parse::<i64>().ok() })]
    #[regex(r"0[xX][0-9a-fA-F]+[lL]", |lex| { let s = lex.slice(); u64::from_str_radix(&s[2..s.len() - 1], 16).ok().map(|v| v as i64) })]
    Int64(i64),

    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Real64(f64),

    #[regex(r#""([^"\\]|\\.)*""#, |lex| unquote(lex.slice()))]
    #[regex(r"'([^'\\]|\\.)*'", |lex| unquote(lex.slice()))]
    StringLiteral(String),

    // Operators
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("^^")]
    XorXor,
    #[token("!")]
    Bang,
    #[token("-")]
    Minus,
    #[token("~")]
    Tilde,

    // Arithmetic and bitwise
    #[token("+")]
    Plus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
    #[token(">>>")]
    Ushr,

    // Delimiters
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,

    Eof,
}

impl Token {
    /// Short description for error messages
    pub fn describe(&self) -> String {
        match self {
            Token::Identifier(name) => format!("identifier '{}'", name),
            Token::Int32(i) => format!("integer {}", i),
            Token::Int64(i) => format!("integer {}L", i),
            Token::Real64(d) => format!("real {}", d),
            Token::StringLiteral(s) => format!("string '{}'", s),
            Token::EqEq => "'=='".to_string(),
            Token::NotEq => "'!='".to_string(),
            Token::Lt => "'<'".to_string(),
            Token::Le => "'<='".to_string(),
            Token::Gt => "'>'".to_string(),
            Token::Ge => "'>='".to_string(),
            Token::AndAnd => "'&&'".to_string(),
            Token::OrOr => "'||'".to_string(),
            Token::XorXor => "'^^'".to_string(),
            Token::Bang => "'!'".to_string(),
            Token::Minus => "'-'".to_string(),
            Token::Tilde => "'~'".to_string(),
            Token::Plus => "'+'".to_string(),
            Token::Star => "'*'".to_string(),
            Token::Slash => "'/'".to_string(),
            Token::Percent => "'%'".to_string(),
            Token::Amp => "'&'".to_string(),
            Token::Pipe => "'|'".to_string(),
            Token::Caret => "'^'".to_string(),
            Token::Shl => "'<<'".to_string(),
            Token::Shr => "'>>'".to_string(),
            Token::Ushr => "'>>>'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Eof => "end of expression".to_string(),
        }
    }
}

/// Drop backslash escapes: `\x` becomes `x`
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn unquote(text: &str) -> String {
    unescape(&text[1..text.len() - 1])
}

/// A token with its source span
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

impl SpannedToken {
    pub fn new(token: Token, span: Span) -> Self {
        Self { token, span }
    }
}

/// Tokenize a subscription expression, appending a trailing `Eof`
pub fn tokenize(source: &str) -> Result<Vec<SpannedToken>> {
    let mut lex = Token::lexer(source);
    let mut tokens = Vec::new();

    while let Some(token_result) = lex.next() {
        let span = Span::new(lex.span().start, lex.span().end);

        match token_result {
            Ok(token) => tokens.push(SpannedToken::new(token, span)),
            Err(_) => {
                return Err(FilterError::LexerError {
                    span,
                    message: format!("Invalid token: {}", &source[span.start..span.end]),
                });
            }
        }
    }

    tokens.push(SpannedToken::new(
        Token::Eof,
        Span::new(source.len(), source.len()),
    ));
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn test_identifiers() {
        let tokens = kinds("hello _hello _ _1 begins-with");
        assert_eq!(tokens[0], Token::Identifier("hello".into()));
        assert_eq!(tokens[1], Token::Identifier("_hello".into()));
        assert_eq!(tokens[2], Token::Identifier("_".into()));
        assert_eq!(tokens[3], Token::Identifier("_1".into()));
        assert_eq!(tokens[4], Token::Identifier("begins-with".into()));
    }

    #[test]
    fn test_escaped_identifier() {
        let tokens = kinds(r"tricky\ id");
        assert_eq!(tokens[0], Token::Identifier("tricky id".into()));
    }

    #[test]
    fn test_strings() {
        let tokens = kinds(r#"'a\n' "a\"" "'abc'""#);
        assert_eq!(tokens[0], Token::StringLiteral("an".into()));
        assert_eq!(tokens[1], Token::StringLiteral("a\"".into()));
        assert_eq!(tokens[2], Token::StringLiteral("'abc'".into()));
    }

    #[test]
    fn test_numbers() {
        let tokens = kinds("42 10L 0x0F 3.4 1.2e10 1.2E-10");
        assert_eq!(tokens[0], Token::Int32(42));
        assert_eq!(tokens[1], Token::Int64(10));
        assert_eq!(tokens[2], Token::Int32(15));
        assert_eq!(tokens[3], Token::Real64(3.4));
        assert_eq!(tokens[4], Token::Real64(1.2e10));
        assert_eq!(tokens[5], Token::Real64(1.2e-10));
    }

    #[test]
    fn test_operators() {
        let tokens = kinds("== != < <= > >= && || ^^ ! - ( ) ,");
        assert_eq!(
            &tokens[..14],
            &[
                Token::EqEq,
                Token::NotEq,
                Token::Lt,
                Token::Le,
                Token::Gt,
                Token::Ge,
                Token::AndAnd,
                Token::OrOr,
                Token::XorXor,
                Token::Bang,
                Token::Minus,
                Token::LParen,
                Token::RParen,
                Token::Comma,
            ]
        );
        assert_eq!(tokens[14], Token::Eof);
    }

    #[test]
    fn test_math_operators() {
        let tokens = kinds("a+b*c/d%e & f|g^h ~i << >> >>> >= && || ^^ decompose-compat");
        assert_eq!(
            &tokens[..],
            &[
                Token::Identifier("a".into()),
                Token::Plus,
                Token::Identifier("b".into()),
                Token::Star,
                Token::Identifier("c".into()),
                Token::Slash,
                Token::Identifier("d".into()),
                Token::Percent,
                Token::Identifier("e".into()),
                Token::Amp,
                Token::Identifier("f".into()),
                Token::Pipe,
                Token::Identifier("g".into()),
                Token::Caret,
                Token::Identifier("h".into()),
                Token::Tilde,
                Token::Identifier("i".into()),
                Token::Shl,
                Token::Shr,
                Token::Ushr,
                Token::Ge,
                Token::AndAnd,
                Token::OrOr,
                Token::XorXor,
                Token::Identifier("decompose-compat".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_invalid_tokens() {
        assert!(tokenize("0.").is_err());
        assert!(tokenize(".1").is_err());
        assert!(tokenize("'unterminated").is_err());
        assert!(tokenize("99999999999").is_err());
    }
}
