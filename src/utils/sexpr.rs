//! S-expression reader and printer.
//!
//! The textual assembly format and the side-effect summary cache are both
//! written as s-expressions:
//!
//! ```text
//! (method (public static) "LFoo;.<clinit>:()V"
//!  (
//!   (const v0 1)          ; comments run to the end of the line
//!   (sput v0 "LFoo;.bar:I")
//!   (return-void)
//!  )
//! )
//! ```
//!
//! Atoms are integers (`42`, `-7`), quoted strings (`"LFoo;"`) or bare symbols
//! (`v0`, `:loop`, `public`).

use std::fmt;

use crate::Result;

/// A parsed s-expression.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SExpr {
    /// A signed integer atom.
    Int(i64),
    /// A quoted string atom.
    Str(String),
    /// A bare symbol atom.
    Symbol(String),
    /// A parenthesized list.
    List(Vec<SExpr>),
}

impl SExpr {
    /// Parses exactly one s-expression from `input`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the input is not a single well-formed
    /// expression.
    pub fn parse(input: &str) -> Result<SExpr> {
        let mut parser = Parser::new(input);
        let expr = parser.expr()?;
        parser.skip_trivia();
        if parser.pos < parser.bytes.len() {
            return Err(malformed_error!(
                "trailing input at offset {} after s-expression",
                parser.pos
            ));
        }
        Ok(expr)
    }

    /// Parses a sequence of top-level s-expressions.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] on the first malformed expression.
    pub fn parse_all(input: &str) -> Result<Vec<SExpr>> {
        let mut parser = Parser::new(input);
        let mut exprs = Vec::new();
        loop {
            parser.skip_trivia();
            if parser.pos >= parser.bytes.len() {
                return Ok(exprs);
            }
            exprs.push(parser.expr()?);
        }
    }

    /// Creates a string atom.
    pub fn string(value: impl Into<String>) -> Self {
        Self::Str(value.into())
    }

    /// Creates a symbol atom.
    pub fn symbol(value: impl Into<String>) -> Self {
        Self::Symbol(value.into())
    }

    /// Returns the list elements, if this is a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[SExpr]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the string contents, if this is a quoted string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the symbol name, if this is a bare symbol.
    #[must_use]
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Self::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer value, if this is an integer.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for SExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Symbol(s) => f.write_str(s),
            Self::Str(s) => {
                f.write_str("\"")?;
                for c in s.chars() {
                    match c {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        '\t' => f.write_str("\\t")?,
                        c => write!(f, "{c}")?,
                    }
                }
                f.write_str("\"")
            }
            Self::List(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
        }
    }
}

struct Parser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn skip_trivia(&mut self) {
        while let Some(&b) = self.bytes.get(self.pos) {
            if b.is_ascii_whitespace() {
                self.pos += 1;
            } else if b == b';' {
                while self.bytes.get(self.pos).is_some_and(|&c| c != b'\n') {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn expr(&mut self) -> Result<SExpr> {
        self.skip_trivia();
        match self.bytes.get(self.pos) {
            None => Err(malformed_error!("unexpected end of s-expression input")),
            Some(b'(') => {
                self.pos += 1;
                let mut items = Vec::new();
                loop {
                    self.skip_trivia();
                    match self.bytes.get(self.pos) {
                        None => return Err(malformed_error!("unterminated list")),
                        Some(b')') => {
                            self.pos += 1;
                            return Ok(SExpr::List(items));
                        }
                        Some(_) => items.push(self.expr()?),
                    }
                }
            }
            Some(b')') => Err(malformed_error!("unexpected ')' at offset {}", self.pos)),
            Some(b'"') => self.string(),
            Some(_) => Ok(self.atom()),
        }
    }

    fn string(&mut self) -> Result<SExpr> {
        let start = self.pos;
        self.pos += 1;
        let mut value = String::new();
        let mut chars = self.input[self.pos..].char_indices();
        while let Some((offset, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos += offset + 1;
                    return Ok(SExpr::Str(value));
                }
                '\\' => match chars.next() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, other)) => value.push(other),
                    None => break,
                },
                c => value.push(c),
            }
        }
        Err(malformed_error!("unterminated string starting at offset {}", start))
    }

    fn atom(&mut self) -> SExpr {
        let start = self.pos;
        while let Some(&b) = self.bytes.get(self.pos) {
            if b.is_ascii_whitespace() || matches!(b, b'(' | b')' | b'"' | b';') {
                break;
            }
            self.pos += 1;
        }
        let token = &self.input[start..self.pos];
        match token.parse::<i64>() {
            Ok(value) => SExpr::Int(value),
            Err(_) => SExpr::Symbol(token.to_string()),
        }
    }
}
