use crate::lexer::LexerStats;
use crate::table::{Expand, ParseTable, ParserAction, ProdID, StateID};
use crate::{Child, Error, LexerCursor, ParseError, Position, Token, Tree};
use smartstring::alias::String;
use std::fmt;

/// Counters of the last parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserStats {
    /// Tokens read from the lexer (ignored terminals excluded).
    pub tokens: usize,
    pub shifts: usize,
    pub reductions: usize,
}

/// A value on the parser stack.
#[derive(Debug, Clone)]
enum StackValue {
    Token(Token),
    Tree(Tree),
    /// Children of an inlined rule, waiting to be spliced into the parent.
    Inline(Vec<Child>),
}

impl fmt::Display for StackValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackValue::Token(token) => write!(f, "{:?}", token.text.as_str()),
            StackValue::Tree(tree) => write!(f, "{}", tree.rule),
            StackValue::Inline(children) => write!(f, "[{}]", children.len()),
        }
    }
}

/// Table-driven shift/reduce parser.
///
/// A `Parser` borrows a [`ParseTable`] and owns the stacks of one parse at a
/// time. It can be reused for several inputs; [`Parser::stats`] reports on the
/// most recent one.
#[derive(Debug)]
pub struct Parser<'t> {
    table: &'t ParseTable,
    states: Vec<StateID>,
    values: Vec<StackValue>,
    stats: ParserStats,
}

impl<'t> Parser<'t> {
    pub fn new(table: &'t ParseTable) -> Self {
        Self {
            table,
            states: Vec::new(),
            values: Vec::new(),
            stats: ParserStats::default(),
        }
    }

    pub fn stats(&self) -> ParserStats {
        self.stats
    }

    /// Parses `input` with the borrowed table.
    pub fn parse(&mut self, input: &str) -> Result<Tree, Error> {
        let table = self.table;
        let lexer = table.lexer();
        self.states.clear();
        self.values.clear();
        self.stats = ParserStats::default();

        let mut cursor = LexerCursor::new();
        let mut lexer_stats = LexerStats::default();
        let mut lookahead = lexer.next_token_with_stats(input, &mut cursor, &mut lexer_stats)?;

        let mut state = table.start_state();
        self.states.push(state);
        if log::log_enabled!(log::Level::Trace) {
            self.dump_state(lookahead.as_ref());
        }

        loop {
            let token_id = match &lookahead {
                Some(token) => table.terminal_token(token.terminal),
                None => table.end_token(),
            };
            match table.lookup(state, token_id) {
                ParserAction::Shift(next) => {
                    log::trace!("Shift {}", next);
                    let Some(token) = lookahead.take() else {
                        return Err(self.reject(state, None, cursor.pos));
                    };
                    self.values.push(StackValue::Token(token));
                    state = next;
                    self.states.push(state);
                    self.stats.shifts += 1;
                    lookahead = lexer.next_token_with_stats(input, &mut cursor, &mut lexer_stats)?;
                }

                ParserAction::Reduce(prod) => {
                    log::trace!("Reduce {} ({})", prod, table.format_production(prod));
                    state = match self.reduce(prod) {
                        Some(next) => next,
                        None => {
                            return Err(self.reject(state, lookahead, cursor.pos));
                        }
                    };
                    self.stats.reductions += 1;
                }

                ParserAction::Accept => {
                    log::trace!("Accept");
                    self.stats.tokens = lexer_stats.tokens;
                    return match self.accept() {
                        Some(tree) => Ok(tree),
                        None => Err(self.reject(state, None, cursor.pos)),
                    };
                }

                ParserAction::Error | ParserAction::Goto(_) => {
                    self.stats.tokens = lexer_stats.tokens;
                    return Err(self.reject(state, lookahead, cursor.pos));
                }
            }

            if log::log_enabled!(log::Level::Trace) {
                self.dump_state(lookahead.as_ref());
            }
        }
    }

    /// Pops the body of `prod`, pushes the shaped value and the goto state.
    ///
    /// Returns the new state, or `None` if the stacks do not fit the table.
    fn reduce(&mut self, prod: ProdID) -> Option<StateID> {
        let table = self.table;
        let production = &table.productions()[prod];
        let n = production.body.len();
        if n > self.values.len() || n >= self.states.len() {
            return None;
        }
        let popped = self.values.split_off(self.values.len() - n);
        self.states.truncate(self.states.len() - n);
        let exposed = *self.states.last()?;

        let ParserAction::Goto(next) = table.lookup(exposed, production.head) else {
            return None;
        };
        self.values.push(self.shape(prod, popped));
        self.states.push(next);
        Some(next)
    }

    /// Builds the tree value for a reduction by `prod`.
    fn shape(&self, prod: ProdID, popped: Vec<StackValue>) -> StackValue {
        let table = self.table;
        let production = &table.productions()[prod];
        let head = &table.nonterminals()[production.head];

        let mut children = Vec::with_capacity(popped.len());
        for value in popped {
            match value {
                StackValue::Token(token) => {
                    if head.keep_all_tokens || table.terminals()[token.terminal].keep {
                        children.push(Child::Token(token));
                    }
                }
                StackValue::Tree(tree) => children.push(Child::Tree(tree)),
                StackValue::Inline(inner) => children.extend(inner),
            }
        }

        if let Some(alias) = &production.alias {
            return StackValue::Tree(Tree::new(alias.clone(), children));
        }
        match head.expand {
            Expand::Inline => StackValue::Inline(children),
            Expand::InlineSingle if children.len() == 1 => match children.pop() {
                Some(Child::Tree(tree)) => StackValue::Tree(tree),
                Some(Child::Token(token)) => StackValue::Token(token),
                None => StackValue::Inline(Vec::new()),
            },
            _ => StackValue::Tree(Tree::new(head.name.clone(), children)),
        }
    }

    /// Takes the final value and makes sure it is a tree.
    fn accept(&mut self) -> Option<Tree> {
        if self.values.len() != 1 {
            return None;
        }
        let start: String = self.table.start_rule().into();
        Some(match self.values.pop()? {
            StackValue::Tree(tree) => tree,
            StackValue::Token(token) => Tree::new(start, vec![Child::Token(token)]),
            StackValue::Inline(children) => Tree::new(start, children),
        })
    }

    fn reject(&self, state: StateID, token: Option<Token>, end: Position) -> Error {
        let position = token.as_ref().map_or(end, |t| t.span.start);
        let err = ParseError {
            state,
            token,
            position,
            expected: self.table.expected(state),
        };
        log::trace!("Error: {}", err);
        Error::Parse(err)
    }

    fn dump_state(&self, incoming: Option<&Token>) {
        let mut output = std::string::String::new();
        let n = self.states.len();
        for (i, state) in self.states.iter().enumerate() {
            output.push_str(&format!("<{}>  ", state));
            if i + 1 < n {
                output.push_str(&format!("{}  ", self.values[i]));
            }
        }
        match incoming {
            Some(token) => output.push_str(&format!("<-  {:?}", token.text.as_str())),
            None => output.push_str("<-  $END"),
        }
        log::trace!("{}", output);
    }
}

/// Parses `input` with `table`.
///
/// Returns the tree on success, [`Error::Lex`] when no terminal matches
/// and [`Error::Parse`] when the automaton rejects the input.
pub fn parse(table: &ParseTable, input: &str) -> Result<Tree, Error> {
    Parser::new(table).parse(input)
}
