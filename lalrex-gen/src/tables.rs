//! Action/goto table construction and conflict resolution.

use crate::grammar::Grammar;
use crate::lalr::Automaton;
use crate::options::BuildOptions;
use lalrex::table::{Conflict, ConflictKind, ParserAction};
use lalrex::{END_TERMINAL, GrammarError};

/// Rows of the parse table together with the conflicts resolved while
/// filling them.
#[derive(Debug, Clone)]
pub struct Tables {
    pub actions: Vec<Vec<ParserAction>>,
    pub conflicts: Vec<Conflict>,
}

/// Fills the table from the automaton.
///
/// Transitions become shifts and gotos, completed items become reductions on
/// their lookaheads and the completed start production accepts on the end
/// marker. A shift beats a reduction and the earliest production wins
/// between reductions, unless `options` turns these tie-breaks off. A
/// reduction clashing with accept is always an error.
pub fn construct(
    grammar: &Grammar,
    automaton: &Automaton,
    options: &BuildOptions,
) -> Result<Tables, GrammarError> {
    let n_nonterm = grammar.n_nonterms();
    let n_tokens = n_nonterm + grammar.n_terms() + 1;
    let mut actions = vec![vec![ParserAction::Error; n_tokens]; automaton.states.len()];
    let mut conflicts = Vec::new();

    for (s, state) in automaton.states.iter().enumerate() {
        for (&sym, &next) in &state.transitions {
            actions[s][sym] = if sym < n_nonterm {
                ParserAction::Goto(next)
            } else {
                ParserAction::Shift(next)
            };
        }

        for (&prod, lookaheads) in &state.reductions {
            for &t in lookaheads {
                if prod == 0 {
                    actions[s][t] = ParserAction::Accept;
                    continue;
                }
                let reduce = ParserAction::Reduce(prod);
                match actions[s][t] {
                    ParserAction::Error => actions[s][t] = reduce,
                    ParserAction::Shift(_) => {
                        if !options.shift_over_reduce {
                            return Err(GrammarError::new(
                                format!(
                                    "shift/reduce conflict in state {s} on {}: shift or reduce `{}`",
                                    terminal_name(grammar, t),
                                    grammar.format_production(prod)
                                ),
                                grammar.spans[prod],
                            ));
                        }
                        log::debug!(
                            "shift/reduce conflict in state {s} on {}: shifting over `{}`",
                            terminal_name(grammar, t),
                            grammar.format_production(prod)
                        );
                        conflicts.push(Conflict {
                            state: s,
                            terminal: terminal_name(grammar, t).into(),
                            kind: ConflictKind::ShiftReduce,
                            chosen: actions[s][t],
                            rejected: reduce,
                        });
                    }
                    ParserAction::Reduce(other) => {
                        if other == prod {
                            continue;
                        }
                        let (first, second) = (other.min(prod), other.max(prod));
                        if !options.earliest_reduce {
                            return Err(GrammarError::new(
                                format!(
                                    "reduce/reduce conflict in state {s} on {}: `{}` or `{}`",
                                    terminal_name(grammar, t),
                                    grammar.format_production(first),
                                    grammar.format_production(second)
                                ),
                                grammar.spans[second],
                            ));
                        }
                        log::warn!(
                            "reduce/reduce conflict in state {s} on {}: `{}` wins over `{}`",
                            terminal_name(grammar, t),
                            grammar.format_production(first),
                            grammar.format_production(second)
                        );
                        actions[s][t] = ParserAction::Reduce(first);
                        conflicts.push(Conflict {
                            state: s,
                            terminal: terminal_name(grammar, t).into(),
                            kind: ConflictKind::ReduceReduce,
                            chosen: ParserAction::Reduce(first),
                            rejected: ParserAction::Reduce(second),
                        });
                    }
                    ParserAction::Accept | ParserAction::Goto(_) => {
                        return Err(GrammarError::new(
                            format!(
                                "reduce/accept conflict in state {s} on {}: `{}`",
                                terminal_name(grammar, t),
                                grammar.format_production(prod)
                            ),
                            grammar.spans[prod],
                        ));
                    }
                }
            }
        }
    }

    Ok(Tables { actions, conflicts })
}

fn terminal_name(grammar: &Grammar, column: usize) -> &str {
    match grammar.terminals.get(column - grammar.n_nonterms()) {
        Some(def) => def.name.as_str(),
        None => END_TERMINAL,
    }
}
