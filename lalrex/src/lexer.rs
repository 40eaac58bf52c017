//! Longest-match lexer driven by a single multi-pattern DFA.
//!
//! Every terminal pattern is compiled once into an anchored dense DFA with
//! [`MatchKind::All`]. Patterns are registered in rank order (priority
//! descending, then declaration order), so that among all patterns matching
//! the longest prefix the one with the smallest pattern id wins.
//!
//! A dense DFA cannot decide Unicode word boundaries on non-ASCII input and
//! quits instead. Lexers with such patterns keep a PikeVM over the same NFA
//! and rerun the match there when the DFA quits.

use crate::table::{Pattern, TerminalDef};
use crate::{GrammarError, LexError, LexerCursor, Span};
use regex_automata::{
    Anchored, Input, MatchKind,
    PatternID,
    dfa::{Automaton, StartKind, dense},
    nfa::thompson::{NFA, pikevm::PikeVM},
    util::{primitives::StateID, syntax},
};
use smartstring::alias::String;
use std::fmt;

/// A lexeme produced by the lexer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    /// Index of the terminal in the table.
    pub terminal: usize,
    /// Name of the terminal.
    pub name: String,
    /// Matched text.
    pub text: String,
    pub span: Span,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Counters of the lexer's work on one input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LexerStats {
    /// Tokens handed to the caller.
    pub tokens: usize,
    /// Tokens of ignored terminals that were skipped.
    pub skipped: usize,
}

/// The compiled lexer of a [`ParseTable`](crate::ParseTable).
#[derive(Debug, Clone)]
pub struct Lexer {
    dfa: dense::DFA<Vec<u32>>,
    /// Used where the DFA quits on `\b` next to non-ASCII text.
    fallback: Option<PikeVM>,
    /// Pattern id -> terminal index.
    ranked: Vec<usize>,
    names: Vec<String>,
    ignored: Vec<bool>,
}

impl Lexer {
    /// Compiles `terminals` into a DFA.
    ///
    /// Fails if a pattern does not compile or can match the empty string.
    pub fn try_new(terminals: &[TerminalDef]) -> Result<Self, GrammarError> {
        let mut ranked: Vec<usize> = (0..terminals.len()).collect();
        // stable: equal priorities keep declaration order
        ranked.sort_by_key(|&t| std::cmp::Reverse(terminals[t].priority));

        let mut hirs = Vec::with_capacity(ranked.len());
        let mut unicode_boundary = false;
        for &t in &ranked {
            let term = &terminals[t];
            let source = match &term.pattern {
                Pattern::Literal(text) => regex::escape(text),
                Pattern::Regex(source) => source.to_string(),
            };
            let hir = syntax::parse(&source).map_err(|e| {
                GrammarError::new(
                    format!("invalid pattern for terminal {}: {e}", term.name),
                    None,
                )
            })?;
            if hir.properties().minimum_len() == Some(0) {
                return Err(GrammarError::new(
                    format!(
                        "terminal {} ({}) matches the empty string",
                        term.name, term.pattern
                    ),
                    None,
                ));
            }
            unicode_boundary |= hir.properties().look_set().contains_word_unicode();
            hirs.push(hir);
        }

        let nfa = NFA::compiler()
            .build_many_from_hir(&hirs)
            .map_err(|e| GrammarError::new(format!("cannot compile lexer: {e}"), None))?;
        let dfa = dense::Builder::new()
            .configure(
                dense::DFA::config()
                    .match_kind(MatchKind::All)
                    .start_kind(StartKind::Anchored)
                    .unicode_word_boundary(true),
            )
            .build_from_nfa(&nfa)
            .map_err(|e| GrammarError::new(format!("cannot compile lexer: {e}"), None))?;
        log::debug!(
            "lexer: {} patterns, {} bytes of DFA",
            ranked.len(),
            dfa.memory_usage()
        );
        let fallback = if unicode_boundary {
            let vm = PikeVM::builder()
                .configure(PikeVM::config().match_kind(MatchKind::All))
                .build_from_nfa(nfa)
                .map_err(|e| GrammarError::new(format!("cannot compile lexer: {e}"), None))?;
            Some(vm)
        } else {
            None
        };

        Ok(Self {
            dfa,
            fallback,
            ranked,
            names: terminals.iter().map(|t| t.name.clone()).collect(),
            ignored: terminals.iter().map(|t| t.ignored).collect(),
        })
    }

    /// Returns the next token that is not ignored, or `None` at end of input.
    pub fn next_token(
        &self,
        input: &str,
        cursor: &mut LexerCursor,
    ) -> Result<Option<Token>, LexError> {
        self.next_token_with_stats(input, cursor, &mut LexerStats::default())
    }

    pub(crate) fn next_token_with_stats(
        &self,
        input: &str,
        cursor: &mut LexerCursor,
        stats: &mut LexerStats,
    ) -> Result<Option<Token>, LexError> {
        while cursor.offset() < input.len() {
            let start = cursor.offset();
            let Some((terminal, end)) = self.try_match(input, start) else {
                return Err(LexError {
                    position: cursor.pos,
                    found: input[start..].chars().next().unwrap_or_default(),
                });
            };
            let text = &input[start..end];
            let span = cursor.advance(text);
            log::trace!(
                "MATCHED: terminal {} ({}), text {:?}, span {}",
                terminal,
                self.names[terminal],
                text,
                span
            );
            if self.ignored[terminal] {
                stats.skipped += 1;
                continue;
            }
            stats.tokens += 1;
            return Ok(Some(Token {
                terminal,
                name: self.names[terminal].clone(),
                text: text.into(),
                span,
            }));
        }
        Ok(None)
    }

    /// Finds the longest, best ranked match starting at byte `offset`.
    ///
    /// Returns the terminal and the end offset of the match.
    fn try_match(&self, input: &str, offset: usize) -> Option<(usize, usize)> {
        let dfa = &self.dfa;
        let bytes = input.as_bytes();
        let config = Input::new(input)
            .span(offset..bytes.len())
            .anchored(Anchored::Yes);
        let mut state = match dfa.start_state_forward(&config) {
            Ok(state) => state,
            Err(e) => {
                log::trace!("START FAILED: offset={}, err={}", offset, e);
                return self.fallback_match(input, offset);
            }
        };

        let mut last_match = None;
        let mut at = offset;
        while at < bytes.len() {
            state = dfa.next_state(state, bytes[at]);
            if dfa.is_special_state(state) {
                if dfa.is_match_state(state) {
                    // matches are reported one byte late
                    last_match = Some((self.best_pattern(state), at));
                } else if dfa.is_quit_state(state) {
                    log::trace!("QUIT: at={}, b={:#04x}", at, bytes[at]);
                    return self.fallback_match(input, offset);
                } else if dfa.is_dead_state(state) {
                    log::trace!("DEAD: at={}, b={:?}", at, bytes[at] as char);
                    break;
                }
            }
            at += 1;
        }
        if at == bytes.len() {
            state = dfa.next_eoi_state(state);
            if dfa.is_match_state(state) {
                last_match = Some((self.best_pattern(state), at));
            }
        }

        last_match
            .filter(|&(_, end)| end > offset)
            .map(|(pattern, end)| (self.ranked[pattern], end))
    }

    /// Runs every pattern anchored at `offset` on the PikeVM and keeps the
    /// longest match, the smallest pattern id winning ties.
    fn fallback_match(&self, input: &str, offset: usize) -> Option<(usize, usize)> {
        let vm = self.fallback.as_ref()?;
        let mut cache = vm.create_cache();
        let mut best: Option<(usize, usize)> = None;
        for pattern in 0..self.ranked.len() {
            let Ok(pid) = PatternID::new(pattern) else {
                break;
            };
            let config = Input::new(input)
                .span(offset..input.len())
                .anchored(Anchored::Pattern(pid));
            let Some(m) = vm.find(&mut cache, config) else {
                continue;
            };
            if m.end() > offset && best.is_none_or(|(_, end)| m.end() > end) {
                best = Some((pattern, m.end()));
            }
        }
        log::trace!("FALLBACK: offset={}, match={:?}", offset, best);
        best.map(|(pattern, end)| (self.ranked[pattern], end))
    }

    /// Smallest pattern id of a match state.
    fn best_pattern(&self, state: StateID) -> usize {
        (0..self.dfa.match_len(state))
            .map(|i| self.dfa.match_pattern(state, i).as_usize())
            .min()
            .unwrap_or_default()
    }

    /// Iterates over the kept tokens of `input`.
    ///
    /// The iterator yields at most one error and then stops.
    pub fn tokenize<'a>(&'a self, input: &'a str) -> Tokens<'a> {
        Tokens {
            lexer: self,
            input,
            cursor: LexerCursor::new(),
            done: false,
        }
    }

    pub fn pattern_count(&self) -> usize {
        self.ranked.len()
    }
}

/// Iterator returned by [`Lexer::tokenize`].
#[derive(Debug)]
pub struct Tokens<'a> {
    lexer: &'a Lexer,
    input: &'a str,
    cursor: LexerCursor,
    done: bool,
}

impl Iterator for Tokens<'_> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.lexer.next_token(self.input, &mut self.cursor) {
            Ok(Some(token)) => Some(Ok(token)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl std::iter::FusedIterator for Tokens<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Position;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn term(name: &str, pattern: Pattern, priority: i32, ignored: bool) -> TerminalDef {
        TerminalDef {
            name: name.into(),
            pattern,
            priority,
            ignored,
            keep: true,
        }
    }

    fn lit(text: &str) -> Pattern {
        Pattern::Literal(text.into())
    }

    fn re(source: &str) -> Pattern {
        Pattern::Regex(source.into())
    }

    fn names(lexer: &Lexer, input: &str) -> Vec<(std::string::String, std::string::String)> {
        lexer
            .tokenize(input)
            .map(|t| {
                let t = t.unwrap();
                (t.name.to_string(), t.text.to_string())
            })
            .collect()
    }

    #[test]
    fn longest_match_wins() {
        init_logger();
        let lexer = Lexer::try_new(&[
            term("EQ", lit("="), 0, false),
            term("EQEQ", lit("=="), 0, false),
        ])
        .unwrap();
        assert_eq!(
            names(&lexer, "==="),
            vec![("EQEQ".into(), "==".into()), ("EQ".into(), "=".into())]
        );
    }

    #[test]
    fn declaration_order_breaks_ties() {
        init_logger();
        let lexer = Lexer::try_new(&[
            term("IF", lit("if"), 0, false),
            term("NAME", re("[a-z]+"), 0, false),
        ])
        .unwrap();
        assert_eq!(names(&lexer, "if"), vec![("IF".into(), "if".into())]);
        assert_eq!(names(&lexer, "iff"), vec![("NAME".into(), "iff".into())]);
    }

    #[test]
    fn priority_beats_declaration_order() {
        init_logger();
        let lexer = Lexer::try_new(&[
            term("NAME", re("[a-z]+"), 0, false),
            term("IF", lit("if"), 2, false),
        ])
        .unwrap();
        assert_eq!(names(&lexer, "if"), vec![("IF".into(), "if".into())]);
    }

    #[test]
    fn ignored_terminals_are_skipped() {
        init_logger();
        let lexer = Lexer::try_new(&[
            term("INT", re("[0-9]+"), 0, false),
            term("WS", re("[ \t\n]+"), 0, true),
        ])
        .unwrap();
        let tokens: Vec<Token> = lexer.tokenize(" 12\n 3 ").map(|t| t.unwrap()).collect();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1].text, "3");
        assert_eq!(tokens[1].span.start, Position::new(5, 2, 2));
        assert_eq!(tokens[1].span.end, Position::new(6, 2, 3));

        let mut cursor = LexerCursor::new();
        let mut stats = LexerStats::default();
        while lexer
            .next_token_with_stats(" 12\n 3 ", &mut cursor, &mut stats)
            .unwrap()
            .is_some()
        {}
        assert_eq!(stats, LexerStats { tokens: 2, skipped: 3 });
    }

    #[test]
    fn reports_unmatched_character() {
        init_logger();
        let lexer = Lexer::try_new(&[term("A", lit("a"), 0, false)]).unwrap();
        let mut tokens = lexer.tokenize("aé");
        assert!(tokens.next().unwrap().is_ok());
        let err = tokens.next().unwrap().unwrap_err();
        assert_eq!(err.found, 'é');
        assert_eq!(err.position, Position::new(1, 1, 2));
        assert!(tokens.next().is_none());
    }

    #[test]
    fn word_boundaries_around_non_ascii_text() {
        init_logger();
        let lexer = Lexer::try_new(&[
            term("WORD", re(r"\b[a-zé]+\b"), 0, false),
            term("WS", re(" +"), 0, true),
        ])
        .unwrap();
        assert_eq!(
            names(&lexer, "café olé"),
            vec![
                ("WORD".into(), "café".into()),
                ("WORD".into(), "olé".into())
            ]
        );
        assert_eq!(names(&lexer, "tea"), vec![("WORD".into(), "tea".into())]);
        assert!(lexer.tokenize("é!").nth(1).unwrap().is_err());
    }

    #[test]
    fn rejects_empty_matching_terminal() {
        init_logger();
        let err = Lexer::try_new(&[term("OPT", re("a*"), 0, false)]).unwrap_err();
        assert!(err.message.contains("empty string"), "{err}");
    }

    #[test]
    fn rejects_invalid_regex() {
        init_logger();
        let err = Lexer::try_new(&[term("BAD", re("(a"), 0, false)]).unwrap_err();
        assert!(err.message.contains("BAD"), "{err}");
    }

    #[test]
    fn literals_are_not_regexes() {
        init_logger();
        let lexer = Lexer::try_new(&[term("DOTS", lit("..."), 0, false)]).unwrap();
        assert_eq!(lexer.pattern_count(), 1);
        assert!(lexer.tokenize("abc").next().unwrap().is_err());
        assert_eq!(names(&lexer, "..."), vec![("DOTS".into(), "...".into())]);
    }
}
