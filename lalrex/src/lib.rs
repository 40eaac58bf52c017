//! Copyright (c) 2005–2025 IKH Software, Inc.
//!
//! Released under the terms of the GNU Lesser General Public License, version 3.0
//! or (at your option) any later version (LGPL-3.0-or-later).
//!
//! LALR(1) parser runtime.
//!
//! `lalrex` holds everything needed to parse text once a grammar has been
//! compiled by `lalrex-gen`:
//!  * [`ParseTable`]: the immutable action/goto table, grammar metadata and
//!    the compiled lexer;
//!  * [`Lexer`]: a longest-match lexer over a single multi-pattern DFA;
//!  * [`Parser`] / [`parse`]: the table-driven shift/reduce loop that shapes
//!    a [`Tree`] while it reduces;
//!  * [`Error`]: the error taxonomy ([`GrammarError`], [`LexError`],
//!    [`ParseError`]).
//!
//! A table is `Send + Sync`; build it once and parse from as many threads as
//! needed.

mod cursor;
mod error;
mod lexer;
mod parser;
pub mod table;
mod tree;

pub use crate::cursor::LexerCursor;
pub use crate::error::{Error, GrammarError, LexError, ParseError, Position, Span};
pub use crate::lexer::{Lexer, LexerStats, Token, Tokens};
pub use crate::parser::{Parser, ParserStats, parse};
pub use crate::table::{ParseTable, ParserAction};
pub use crate::tree::{Child, Leaves, Subtrees, Tree};

/// Name of the end-of-input marker terminal.
pub const END_TERMINAL: &str = "$END";

/// Name of the augmented start symbol.
pub const START_NONTERMINAL: &str = "$start";
