//! Syntax tree of a grammar description, as produced by the reader.

use lalrex::Span;
use smartstring::alias::String;

/// An expression in a rule or terminal body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Reference to a rule (lower-case) or terminal (upper-case).
    Name(String, Span),
    /// Unescaped literal text.
    Literal {
        text: String,
        insensitive: bool,
        span: Span,
    },
    /// Regular expression source with `/.../` flags.
    Regex {
        source: String,
        flags: String,
        span: Span,
    },
    /// Inclusive character range `"a".."z"`.
    Range(char, char, Span),
    Seq(Vec<Expr>),
    Alt(Vec<Expr>),
    Optional(Box<Expr>),
    Star(Box<Expr>),
    Plus(Box<Expr>),
    /// `expr ~ min..max`.
    Repeat(Box<Expr>, usize, usize),
}

impl Expr {
    /// Span of the first token of the expression, if any.
    pub fn span(&self) -> Option<Span> {
        match self {
            Expr::Name(_, span)
            | Expr::Literal { span, .. }
            | Expr::Regex { span, .. }
            | Expr::Range(_, _, span) => Some(*span),
            Expr::Seq(items) | Expr::Alt(items) => items.iter().find_map(Expr::span),
            Expr::Optional(inner)
            | Expr::Star(inner)
            | Expr::Plus(inner)
            | Expr::Repeat(inner, _, _) => inner.span(),
        }
    }

    /// Returns `true` if this is a terminal name.
    pub fn is_terminal_name(name: &str) -> bool {
        name.trim_start_matches('_')
            .starts_with(|c: char| c.is_ascii_uppercase())
    }
}

/// Tree-shape modifier written before a rule name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RuleModifiers {
    /// `?rule`: inline when the node has a single child.
    pub inline_single: bool,
    /// `!rule`: keep all tokens.
    pub keep_all_tokens: bool,
}

/// One alternative of a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alternative {
    pub expr: Expr,
    /// `-> alias`
    pub alias: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDef {
    pub name: String,
    pub modifiers: RuleModifiers,
    pub alternatives: Vec<Alternative>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermDef {
    pub name: String,
    pub priority: i32,
    pub expr: Expr,
    pub span: Span,
}

/// `%import module.NAME [-> ALIAS]` or `%import module (A, B)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub module: String,
    /// Imported name and the local name it is bound to.
    pub names: Vec<(String, String)>,
    pub span: Span,
}

/// A top-level statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Rule(RuleDef),
    Term(TermDef),
    Ignore(Expr, Span),
    Start(String, Span),
    Import(Import),
}
