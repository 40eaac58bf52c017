//! Source locations and the error taxonomy shared by the builder and the
//! parser.
//!
//! Three failure kinds exist and callers are expected to match on them:
//!
//! - [`GrammarError`]: the grammar description is malformed, refers to
//!   undefined symbols, or has LALR(1) conflicts the build policy does not
//!   resolve. Raised only while building a [`ParseTable`](crate::ParseTable).
//! - [`LexError`]: no terminal pattern matches the input at some position.
//! - [`ParseError`]: the automaton rejects a token or the end of input.
//!
//! [`Error`] is the tagged union of the three.
//!
//! # Examples
//!
//! ```rust
//! # use lalrex::{GrammarError, Position, Span, span};
//! let sp = Span::new(Position::new(0, 1, 1), Position::new(4, 1, 5));
//! assert_eq!(sp.to_string(), "1:1-1:5");
//!
//! let err = GrammarError::new("undefined rule `expr`", span!(0, 1, 1, 4, 1, 5));
//! assert_eq!(err.to_string(), "undefined rule `expr` at 1:1-1:5");
//! ```

use crate::Token;
use smartstring::alias::String;
use std::fmt;
use thiserror::Error;

/// A location in source text.
///
/// `offset` is a byte offset; `line` and `column` are 1-based and human
/// facing (`column` counts characters, not bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    /// 0-based byte offset.
    pub offset: usize,
    /// 1-based line number.
    pub line: usize,
    /// 1-based column number.
    pub column: usize,
}

impl Position {
    /// Creates a new `Position`.
    #[inline]
    pub const fn new(offset: usize, line: usize, column: usize) -> Self {
        Self {
            offset,
            line,
            column,
        }
    }

    /// Computes the position of byte `offset` within `text`.
    ///
    /// Offsets past the end of `text` are clamped to its length, offsets
    /// inside a multi-byte character move back to its first byte.
    pub fn locate(text: &str, offset: usize) -> Self {
        let mut offset = offset.min(text.len());
        while !text.is_char_boundary(offset) {
            offset -= 1;
        }
        let mut pos = Self::default();
        for c in text[..offset].chars() {
            pos.advance(c);
        }
        pos
    }

    /// Moves the position past `c`.
    #[inline]
    pub fn advance(&mut self, c: char) {
        self.offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new(0, 1, 1)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A half-open source range: `[start, end)`.
///
/// `Span` marks the region of source text that a token or tree node covers,
/// or attaches a location to a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Span {
    /// Starting position (inclusive).
    pub start: Position,
    /// Ending position (exclusive).
    pub end: Position,
}

impl Span {
    /// Creates a new `Span`.
    #[inline]
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Merge two spans into one that covers both.
    #[inline]
    pub fn merge(&self, other: &Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Returns `true` if the span is empty (same start and end position).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Returns the byte range covered by this span.
    #[inline]
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start.offset..self.end.offset
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Merges `other` into an optional span accumulator.
pub(crate) fn merge_span(acc: &mut Option<Span>, other: Option<Span>) {
    if let Some(other) = other {
        *acc = Some(match acc {
            Some(span) => span.merge(&other),
            None => other,
        });
    }
}

fn at_span(span: &Option<Span>) -> std::string::String {
    match span {
        Some(span) => format!(" at {span}"),
        None => std::string::String::new(),
    }
}

/// The grammar description could not be turned into a parse table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}{}", at_span(.span))]
pub struct GrammarError {
    /// Human-readable reason.
    pub message: String,
    /// Location in the grammar text, when one can be attributed.
    pub span: Option<Span>,
}

impl GrammarError {
    /// Creates a new `GrammarError`.
    pub fn new(message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

/// No terminal pattern matches the input at `position`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no terminal matches {found:?} at {position} (offset {})", .position.offset)]
pub struct LexError {
    /// Where lexing stopped.
    pub position: Position,
    /// The character found at `position`.
    pub found: char,
}

/// The parse table rejected a token, or input ended too early.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ParseError {
    /// Parser state in which the error was detected.
    pub state: usize,
    /// The offending token, `None` at end of input.
    pub token: Option<Token>,
    /// Where the offending token (or end of input) begins.
    pub position: Position,
    /// Names of the terminals that would have been accepted.
    pub expected: Vec<String>,
}

impl ParseError {
    /// Returns `true` if the error was caused by running out of input.
    pub fn is_unexpected_end(&self) -> bool {
        self.token.is_none()
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.token {
            Some(token) => write!(
                f,
                "unexpected token {:?} ({}) at {}",
                token.text.as_str(),
                token.name,
                self.position
            )?,
            None => write!(f, "unexpected end of input at {}", self.position)?,
        }
        write!(f, " in state {}", self.state)?;
        if !self.expected.is_empty() {
            let names: Vec<&str> = self
                .expected
                .iter()
                .map(|name| match name.as_str() {
                    crate::END_TERMINAL => "end of input",
                    name => name,
                })
                .collect();
            write!(f, "; expected one of: {}", names.join(", "))?;
        }
        Ok(())
    }
}

/// Any failure produced by building a table or parsing with it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Build-time failure.
    #[error("grammar error: {0}")]
    Grammar(#[from] GrammarError),
    /// No terminal matched during parsing.
    #[error("lex error: {0}")]
    Lex(#[from] LexError),
    /// The automaton rejected the input.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
}

/// Build an `Option<Span>` inline from offset/line/column coordinates.
///
/// # Examples
///
/// ```rust
/// # use lalrex::span;
/// let s = span!(0, 1, 1, 3, 1, 4);
/// assert_eq!(s.unwrap().end.column, 4);
/// ```
#[macro_export]
macro_rules! span {
    ($off_start:expr, $line_start:expr, $col_start:expr, $off_end:expr, $line_end:expr, $col_end:expr) => {
        Some($crate::Span {
            start: $crate::Position {
                offset: $off_start,
                line: $line_start,
                column: $col_start,
            },
            end: $crate::Position {
                offset: $off_end,
                line: $line_end,
                column: $col_end,
            },
        })
    };
}
