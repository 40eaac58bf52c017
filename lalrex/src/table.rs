//! The immutable LALR(1) parse table and the grammar metadata it carries.
//!
//! Token ids follow a single numbering shared by every column of the table:
//! non-terminals come first (id `0` is the augmented start symbol
//! [`START_NONTERMINAL`](crate::START_NONTERMINAL)), then terminals in
//! declaration order, then the end-of-input marker
//! [`END_TERMINAL`](crate::END_TERMINAL). Non-terminal columns hold
//! [`ParserAction::Goto`] entries, terminal columns hold shift, reduce and
//! accept entries.
//!
//! A `ParseTable` is produced once by the builder and then only read. It is
//! `Send + Sync`, so one table can serve concurrent parses.

use crate::lexer::Lexer;
use crate::{END_TERMINAL, Error, GrammarError, Tree};
use smartstring::alias::String;
use std::fmt;

/// Index of a parser state.
pub type StateID = usize;

/// Index of a production.
pub type ProdID = usize;

/// Index of a table column (non-terminal, terminal or end marker).
pub type TokenID = usize;

/// How a terminal recognizes text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Pattern {
    /// Exact text.
    Literal(String),
    /// A regular expression in `regex` syntax (flags already applied).
    Regex(String),
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Literal(text) => write!(f, "{:?}", text.as_str()),
            Pattern::Regex(source) => write!(f, "/{source}/"),
        }
    }
}

/// A terminal (token class) definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalDef {
    /// Terminal name, e.g. `NUMBER` or `"+"` for anonymous literals.
    pub name: String,
    pub pattern: Pattern,
    /// Higher priority wins between matches of equal length.
    pub priority: i32,
    /// Matched text is discarded instead of being passed to the parser.
    pub ignored: bool,
    /// Tokens of this terminal are kept in parse trees.
    pub keep: bool,
}

/// How nodes of a non-terminal appear in the parse tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expand {
    /// A node labelled by the rule (or the alternative's alias).
    #[default]
    Keep,
    /// Children are spliced into the parent node.
    Inline,
    /// Replaced by its only child when it has exactly one.
    InlineSingle,
}

/// A non-terminal definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonTerminalDef {
    pub name: String,
    pub expand: Expand,
    /// Keep tokens of anonymous terminals in this rule's nodes.
    pub keep_all_tokens: bool,
}

/// A grammar symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Symbol {
    /// Index into the table's terminals.
    Terminal(usize),
    /// Index into the table's non-terminals.
    NonTerminal(usize),
}

/// A production `head -> body`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Production {
    /// Index of the head non-terminal.
    pub head: usize,
    pub body: Vec<Symbol>,
    /// Tree label overriding the head's name.
    pub alias: Option<String>,
}

/// A parse table entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParserAction {
    Error,
    Accept,
    Shift(StateID),
    Reduce(ProdID),
    Goto(StateID),
}

/// The two kinds of LR conflicts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConflictKind {
    ShiftReduce,
    ReduceReduce,
}

/// A conflict that was resolved by a tie-break while building the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub state: StateID,
    /// Name of the lookahead terminal.
    pub terminal: String,
    pub kind: ConflictKind,
    /// The action kept in the table.
    pub chosen: ParserAction,
    /// The action that lost the tie-break.
    pub rejected: ParserAction,
}

/// Everything the builder hands over to construct a [`ParseTable`].
#[derive(Debug, Clone)]
pub struct TableParts {
    pub terminals: Vec<TerminalDef>,
    pub nonterminals: Vec<NonTerminalDef>,
    pub productions: Vec<Production>,
    /// `actions[state][token_id]`.
    pub actions: Vec<Vec<ParserAction>>,
    pub start_state: StateID,
    pub conflicts: Vec<Conflict>,
}

/// An immutable LALR(1) parse table together with its compiled lexer.
#[derive(Debug, Clone)]
pub struct ParseTable {
    terminals: Vec<TerminalDef>,
    nonterminals: Vec<NonTerminalDef>,
    productions: Vec<Production>,
    actions: Vec<Vec<ParserAction>>,
    start_state: StateID,
    conflicts: Vec<Conflict>,
    lexer: Lexer,
}

impl ParseTable {
    /// Validates `parts` and compiles the lexer for its terminals.
    pub fn try_new(parts: TableParts) -> Result<Self, GrammarError> {
        let TableParts {
            terminals,
            nonterminals,
            productions,
            actions,
            start_state,
            conflicts,
        } = parts;

        if nonterminals.is_empty() || productions.is_empty() {
            return Err(GrammarError::new("grammar has no rules", None));
        }
        let n_tokens = nonterminals.len() + terminals.len() + 1;
        if let Some(i) = actions.iter().position(|row| row.len() != n_tokens) {
            return Err(GrammarError::new(
                format!("table row {i} does not have {n_tokens} columns"),
                None,
            ));
        }
        if start_state >= actions.len() {
            return Err(GrammarError::new(
                format!("start state {start_state} is out of range"),
                None,
            ));
        }
        for (i, prod) in productions.iter().enumerate() {
            let bad_symbol = prod.body.iter().any(|sym| match *sym {
                Symbol::Terminal(t) => t >= terminals.len(),
                Symbol::NonTerminal(n) => n >= nonterminals.len(),
            });
            if prod.head >= nonterminals.len() || bad_symbol {
                return Err(GrammarError::new(
                    format!("production {i} refers to an unknown symbol"),
                    None,
                ));
            }
        }
        for (state, row) in actions.iter().enumerate() {
            let bad = row.iter().enumerate().find(|(_, action)| match **action {
                ParserAction::Shift(s) | ParserAction::Goto(s) => s >= actions.len(),
                ParserAction::Reduce(p) => p >= productions.len(),
                ParserAction::Accept | ParserAction::Error => false,
            });
            if let Some((token, action)) = bad {
                return Err(GrammarError::new(
                    format!("action {action:?} in state {state} on token {token} is out of range"),
                    None,
                ));
            }
        }

        let lexer = Lexer::try_new(&terminals)?;
        Ok(Self {
            terminals,
            nonterminals,
            productions,
            actions,
            start_state,
            conflicts,
            lexer,
        })
    }

    /// Parses `input` into a tree.
    ///
    /// Equivalent to [`parse`](crate::parse)`(self, input)`.
    pub fn parse(&self, input: &str) -> Result<Tree, Error> {
        crate::parse(self, input)
    }

    #[inline]
    pub fn lookup(&self, state: StateID, token_id: TokenID) -> ParserAction {
        self.actions[state][token_id]
    }

    #[inline]
    pub fn start_state(&self) -> StateID {
        self.start_state
    }

    pub fn n_states(&self) -> usize {
        self.actions.len()
    }

    /// Number of columns: non-terminals, terminals and the end marker.
    pub fn n_tokens(&self) -> usize {
        self.nonterminals.len() + self.terminals.len() + 1
    }

    pub fn terminals(&self) -> &[TerminalDef] {
        &self.terminals
    }

    pub fn nonterminals(&self) -> &[NonTerminalDef] {
        &self.nonterminals
    }

    pub fn productions(&self) -> &[Production] {
        &self.productions
    }

    /// Conflicts resolved by tie-breaks while the table was built.
    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    pub fn lexer(&self) -> &Lexer {
        &self.lexer
    }

    /// Name of the rule the parse starts from.
    pub fn start_rule(&self) -> &str {
        match self.productions[0].body.first() {
            Some(Symbol::NonTerminal(n)) => &self.nonterminals[*n].name,
            _ => &self.nonterminals[0].name,
        }
    }

    /// Column of terminal `terminal`.
    #[inline]
    pub fn terminal_token(&self, terminal: usize) -> TokenID {
        self.nonterminals.len() + terminal
    }

    /// Column of the end-of-input marker.
    #[inline]
    pub fn end_token(&self) -> TokenID {
        self.nonterminals.len() + self.terminals.len()
    }

    /// Column of `symbol`.
    pub fn symbol_token(&self, symbol: Symbol) -> TokenID {
        match symbol {
            Symbol::Terminal(t) => self.terminal_token(t),
            Symbol::NonTerminal(n) => n,
        }
    }

    /// Name of the symbol in column `token_id`.
    pub fn token_label(&self, token_id: TokenID) -> &str {
        let n_nonterms = self.nonterminals.len();
        if token_id < n_nonterms {
            &self.nonterminals[token_id].name
        } else if token_id - n_nonterms < self.terminals.len() {
            &self.terminals[token_id - n_nonterms].name
        } else {
            END_TERMINAL
        }
    }

    /// Names of the terminals with a non-error action in `state`, in column
    /// order (the end marker last).
    pub fn expected(&self, state: StateID) -> Vec<String> {
        (self.terminal_token(0)..=self.end_token())
            .filter(|&t| self.actions[state][t] != ParserAction::Error)
            .map(|t| self.token_label(t).into())
            .collect()
    }

    /// Renders production `prod` as `head -> body`.
    pub fn format_production(&self, prod: ProdID) -> std::string::String {
        let p = &self.productions[prod];
        let mut out = format!("{} ->", self.nonterminals[p.head].name);
        for sym in &p.body {
            out.push(' ');
            out.push_str(self.token_label(self.symbol_token(*sym)));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `$start -> start`, `start -> "a"`, by hand.
    pub(crate) fn tiny_parts() -> TableParts {
        use ParserAction::*;
        TableParts {
            terminals: vec![TerminalDef {
                name: "\"a\"".into(),
                pattern: Pattern::Literal("a".into()),
                priority: 0,
                ignored: false,
                keep: true,
            }],
            nonterminals: vec![
                NonTerminalDef {
                    name: crate::START_NONTERMINAL.into(),
                    expand: Expand::Keep,
                    keep_all_tokens: true,
                },
                NonTerminalDef {
                    name: "start".into(),
                    expand: Expand::Keep,
                    keep_all_tokens: true,
                },
            ],
            productions: vec![
                Production {
                    head: 0,
                    body: vec![Symbol::NonTerminal(1)],
                    alias: None,
                },
                Production {
                    head: 1,
                    body: vec![Symbol::Terminal(0)],
                    alias: None,
                },
            ],
            // columns: $start, start, "a", $END
            actions: vec![
                vec![Error, Goto(1), Shift(2), Error],
                vec![Error, Error, Error, Accept],
                vec![Error, Error, Error, Reduce(1)],
            ],
            start_state: 0,
            conflicts: Vec::new(),
        }
    }

    #[test]
    fn column_layout() {
        let table = ParseTable::try_new(tiny_parts()).unwrap();
        assert_eq!(table.n_tokens(), 4);
        assert_eq!(table.terminal_token(0), 2);
        assert_eq!(table.end_token(), 3);
        assert_eq!(table.token_label(1), "start");
        assert_eq!(table.token_label(2), "\"a\"");
        assert_eq!(table.token_label(3), END_TERMINAL);
        assert_eq!(table.start_rule(), "start");
        assert_eq!(table.format_production(1), "start -> \"a\"");
    }

    #[test]
    fn expected_lists_terminal_columns() {
        let table = ParseTable::try_new(tiny_parts()).unwrap();
        assert_eq!(table.expected(0), vec![String::from("\"a\"")]);
        assert_eq!(table.expected(1), vec![String::from(END_TERMINAL)]);
    }

    #[test]
    fn rejects_ragged_rows() {
        let mut parts = tiny_parts();
        parts.actions[1].pop();
        let err = ParseTable::try_new(parts).unwrap_err();
        assert!(err.message.contains("row 1"));
    }

    #[test]
    fn rejects_unknown_symbols() {
        let mut parts = tiny_parts();
        parts.productions[1].body.push(Symbol::Terminal(7));
        assert!(ParseTable::try_new(parts).is_err());
    }

    #[test]
    fn rejects_out_of_range_actions() {
        let mut parts = tiny_parts();
        parts.actions[0][2] = ParserAction::Shift(3);
        let err = ParseTable::try_new(parts).unwrap_err();
        assert_eq!(
            err.message.as_str(),
            "action Shift(3) in state 0 on token 2 is out of range"
        );

        let mut parts = tiny_parts();
        parts.actions[2][3] = ParserAction::Reduce(2);
        assert!(ParseTable::try_new(parts).is_err());

        let mut parts = tiny_parts();
        parts.actions[0][1] = ParserAction::Goto(9);
        assert!(ParseTable::try_new(parts).is_err());
    }

    fn _assert_send_sync<T: Send + Sync>() {}
    #[test]
    fn table_is_send_sync() {
        _assert_send_sync::<ParseTable>();
    }
}
