//! Lexer for grammar descriptions.
//!
//! Converts grammar text into a flat vector of [`Token`]s, each carrying the
//! [`Span`] it covers. Newlines are kept because statements are
//! line-oriented; blanks and `//` comments are dropped.
//!
//! The lexer is built on the [`logos`] crate. Spans are tracked with a
//! [`LexerCursor`] that is advanced over every matched slice and over the
//! skipped text in between.

use lalrex::{GrammarError, LexerCursor, Span};
use logos::Logos;
use smartstring::alias::String;

/// Kinds of tokens of the grammar language.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\f\r]+")]
pub enum TokenKind {
    /// End of a statement, unless the next line starts with `|`.
    #[token("\n")]
    Newline,

    /// A `//` comment, dropped by [`tokenize_all`].
    #[regex(r"//[^\n]*")]
    Comment,

    /// A rule name, e.g. `expr` or `_items`.
    #[regex(r"_*[a-z][_a-z0-9]*")]
    Rule,

    /// A terminal name, e.g. `NUMBER` or `_NL`.
    #[regex(r"_*[A-Z][_A-Z0-9]*")]
    Term,

    /// A quoted literal with an optional `i` flag.
    #[regex(r#""(?:[^"\\\n]|\\[^\n])*"i?"#)]
    Literal,

    /// A `/regex/flags` pattern.
    #[regex(r"/(?:[^/\\\n]|\\[^\n])(?:[^/\\\n]|\\[^\n])*/[imslux]*")]
    Regexp,

    #[regex(r"-?[0-9]+")]
    Number,

    /// `%ignore`, `%import`, `%start` and friends.
    #[regex(r"%[a-z]+")]
    Directive,

    #[token(":")]
    Colon,
    #[token("|")]
    Pipe,
    #[token("->")]
    Arrow,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBrack,
    #[token("]")]
    RBrack,
    #[token("?")]
    Question,
    #[token("*")]
    Star,
    #[token("+")]
    Plus,
    #[token("!")]
    Bang,
    #[token("~")]
    Tilde,
    #[token(".")]
    Dot,
    #[token("..")]
    DotDot,
    #[token(",")]
    Comma,
}

impl TokenKind {
    /// Human readable description used in diagnostics.
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Newline => "end of line",
            TokenKind::Comment => "comment",
            TokenKind::Rule => "rule name",
            TokenKind::Term => "terminal name",
            TokenKind::Literal => "string literal",
            TokenKind::Regexp => "regular expression",
            TokenKind::Number => "number",
            TokenKind::Directive => "directive",
            TokenKind::Colon => "`:`",
            TokenKind::Pipe => "`|`",
            TokenKind::Arrow => "`->`",
            TokenKind::LParen => "`(`",
            TokenKind::RParen => "`)`",
            TokenKind::LBrack => "`[`",
            TokenKind::RBrack => "`]`",
            TokenKind::Question => "`?`",
            TokenKind::Star => "`*`",
            TokenKind::Plus => "`+`",
            TokenKind::Bang => "`!`",
            TokenKind::Tilde => "`~`",
            TokenKind::Dot => "`.`",
            TokenKind::DotDot => "`..`",
            TokenKind::Comma => "`,`",
        }
    }
}

/// A token of the grammar language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// The matched source text.
    pub text: String,
    pub span: Span,
}

/// Tokenizes the entire grammar text.
///
/// Comments are dropped. Fails on the first character that starts no token.
pub fn tokenize_all(input: &str) -> Result<Vec<Token>, GrammarError> {
    let mut lex = TokenKind::lexer(input);
    let mut cursor = LexerCursor::new();
    let mut out = Vec::new();
    while let Some(kind) = lex.next() {
        let range = lex.span();
        cursor.advance(&input[cursor.offset()..range.start]);
        let span = cursor.advance(lex.slice());
        match kind {
            Ok(TokenKind::Comment) => continue,
            Ok(kind) => out.push(Token {
                kind,
                text: lex.slice().into(),
                span,
            }),
            Err(()) => {
                return Err(GrammarError::new(
                    format!("unexpected character {:?}", lex.slice()),
                    Some(span),
                ));
            }
        }
    }
    log::trace!("grammar text: {} tokens", out.len());
    Ok(out)
}
