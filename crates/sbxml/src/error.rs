//! Error types for sbxml

use std::fmt;
use thiserror::Error;

/// Position in source text
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pos {
    pub offset: usize,
    pub line: u32,
    pub col: u32,
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

impl Pos {
    pub const fn new(offset: usize, line: u32, col: u32) -> Self {
        Self { offset, line, col }
    }
}

/// Span representing a range in source text
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Span {
    pub start: Pos,
    pub end: Pos,
}

impl Span {
    pub const fn new(start: Pos, end: Pos) -> Self {
        Self { start, end }
    }

    pub const fn at(pos: Pos) -> Self {
        Self {
            start: pos,
            end: pos,
        }
    }

    pub const fn empty() -> Self {
        Self {
            start: Pos::new(0, 0, 0),
            end: Pos::new(0, 0, 0),
        }
    }
}

/// Error kind for detailed categorization
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Mutation attempted on a token or node whose kind does not allow it
    InvalidXmlOperation,
    /// Attribute, element or namespace name is empty
    EmptyName,
    UnexpectedEof,
    MismatchedTag { expected: String, found: String },
    InvalidToken,
    InvalidEntity { entity: String },
    InvalidUtf8,
    UnboundPrefix { prefix: String },
    DuplicateAttribute { name: String },
    MaxDepthExceeded { max: u16 },
    MaxSizeExceeded { max: usize },
    UnsupportedMathElement { name: String },
    InvalidNumber { text: String },
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidXmlOperation => write!(f, "invalid xml operation"),
            Self::EmptyName => write!(f, "empty name"),
            Self::UnexpectedEof => write!(f, "unexpected end of input"),
            Self::MismatchedTag { expected, found } => {
                write!(f, "mismatched closing tag: expected </{expected}>, found </{found}>")
            }
            Self::InvalidToken => write!(f, "invalid token"),
            Self::InvalidEntity { entity } => write!(f, "invalid entity: &{entity};"),
            Self::InvalidUtf8 => write!(f, "invalid utf-8"),
            Self::UnboundPrefix { prefix } => write!(f, "unbound namespace prefix: {prefix}"),
            Self::DuplicateAttribute { name } => write!(f, "duplicate attribute: {name}"),
            Self::MaxDepthExceeded { max } => write!(f, "max depth exceeded: {max}"),
            Self::MaxSizeExceeded { max } => write!(f, "max size exceeded: {max}"),
            Self::UnsupportedMathElement { name } => {
                write!(f, "unsupported MathML element: {name}")
            }
            Self::InvalidNumber { text } => write!(f, "invalid number: {text}"),
            Self::Io => write!(f, "i/o error"),
        }
    }
}

/// Main error type for sbxml
#[derive(Error, Clone, Debug, PartialEq)]
pub struct Error {
    kind: ErrorKind,
    span: Span,
    message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, span: Span) -> Self {
        let message = kind.to_string();
        Self {
            kind,
            span,
            message,
        }
    }

    pub fn with_message(kind: ErrorKind, span: Span, message: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            message: message.into(),
        }
    }

    /// Error without a source location
    pub fn operation(kind: ErrorKind) -> Self {
        Self::new(kind, Span::empty())
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Create error at specific position
    pub fn at(kind: ErrorKind, pos: Pos) -> Self {
        Self::new(kind, Span::at(pos))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.span == Span::empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "error at {}: {}", self.span.start, self.message)
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::with_message(ErrorKind::Io, Span::empty(), err.to_string())
    }
}

/// Result type alias for sbxml
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pos_display() {
        let pos = Pos::new(42, 10, 5);
        assert_eq!(pos.to_string(), "10:5");
    }

    #[test]
    fn test_error_creation() {
        let err = Error::at(ErrorKind::InvalidToken, Pos::new(0, 1, 1));
        assert_eq!(err.kind(), &ErrorKind::InvalidToken);
        assert_eq!(err.span().start.line, 1);
    }

    #[test]
    fn test_error_display() {
        let err = Error::at(
            ErrorKind::InvalidEntity {
                entity: "nbsp".to_string(),
            },
            Pos::new(10, 2, 5),
        );
        let display = err.to_string();
        assert!(display.contains("error at 2:5"));
        assert!(display.contains("&nbsp;"));
    }

    #[test]
    fn test_operation_error_has_no_location() {
        let err = Error::operation(ErrorKind::InvalidXmlOperation);
        assert_eq!(err.to_string(), "invalid xml operation");
    }
}
