// Human-readable dumps of the grammar, the automaton and the table, in the
// line-oriented `TAG,...` format used for debugging table construction.

use crate::lalr::Automaton;
use lalrex::table::{Conflict, ConflictKind, ParserAction};
use std::collections::BTreeSet;
use std::io::{self, Write};

/// Writes the grammar productions to an output stream.
///
/// # Output Format
/// ```text
/// PS,<number of productions>
///
/// P,<index>,<LHS> -> <RHS symbols>
/// ```
pub fn write_prods<W: Write>(
    out: &mut W,
    prods: &[Vec<usize>],
    tokens: &[String],
) -> io::Result<()> {
    writeln!(out, "PS,{}\n", prods.len())?;
    for (i, prod) in prods.iter().enumerate() {
        write!(out, "P,{},", i)?;
        for (j, t) in prod.iter().enumerate() {
            write!(out, "{} ", tokens[*t])?;
            if j == 0 {
                write!(out, "-> ")?;
            }
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Writes the kernel items of every state with their lookaheads, followed by
/// the state's transitions.
pub fn write_states<W: Write>(
    out: &mut W,
    automaton: &Automaton,
    prods: &[Vec<usize>],
    tokens: &[String],
) -> io::Result<()> {
    writeln!(out, "CS,{}\n", automaton.states.len())?;
    for (i, state) in automaton.states.iter().enumerate() {
        for (item, lookaheads) in state.kernel.iter().zip(&state.lookaheads) {
            write!(out, "C,{},", i)?;
            let p = &prods[item.prod];
            for (j, t) in p.iter().enumerate() {
                if j == item.dot {
                    write!(out, ". ")?;
                }
                write!(out, "{} ", tokens[*t])?;
                if j == 0 {
                    write!(out, "-> ")?;
                }
            }
            if p.len() == item.dot {
                write!(out, ". ")?;
            }
            write_set(out, lookaheads, tokens)?;
            writeln!(out)?;
        }
        for (sym, next) in &state.transitions {
            writeln!(out, "T,{},{},{}", i, tokens[*sym], next)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Writes the FIRST sets of the non-terminals, marking nullable ones with
/// `` `empty' ``.
pub fn write_first<W: Write>(
    out: &mut W,
    first: &[BTreeSet<usize>],
    nullable: &[bool],
    n_nonterm: usize,
    tokens: &[String],
) -> io::Result<()> {
    for sym in 0..n_nonterm {
        write!(out, "FIRST,{},{{", tokens[sym])?;
        if nullable[sym] {
            write!(out, "`empty', ")?;
        }
        for &t in &first[sym] {
            write!(out, "{}, ", tokens[t])?;
        }
        writeln!(out, "}}")?;
    }
    Ok(())
}

/// Writes the non-error table entries, one per line.
///
/// # Output Format
/// ```text
/// TS,<number of states>
///
/// A,<state>,<token>,<action>
/// ```
pub fn write_table<W: Write>(
    out: &mut W,
    actions: &[Vec<ParserAction>],
    tokens: &[String],
) -> io::Result<()> {
    writeln!(out, "TS,{}\n", actions.len())?;
    for (state, row) in actions.iter().enumerate() {
        for (token, action) in row.iter().enumerate() {
            if *action != ParserAction::Error {
                writeln!(out, "A,{},{},{}", state, tokens[token], action_str(action))?;
            }
        }
    }
    Ok(())
}

/// Writes the conflicts resolved by tie-breaks.
pub fn write_conflicts<W: Write>(out: &mut W, conflicts: &[Conflict]) -> io::Result<()> {
    writeln!(out, "XS,{}\n", conflicts.len())?;
    for c in conflicts {
        let kind = match c.kind {
            ConflictKind::ShiftReduce => "shift/reduce",
            ConflictKind::ReduceReduce => "reduce/reduce",
        };
        writeln!(
            out,
            "X,{},{},{},{} over {}",
            c.state,
            c.terminal,
            kind,
            action_str(&c.chosen),
            action_str(&c.rejected)
        )?;
    }
    Ok(())
}

fn write_set<W: Write>(out: &mut W, set: &BTreeSet<usize>, tokens: &[String]) -> io::Result<()> {
    write!(out, "{{")?;
    for (i, t) in set.iter().enumerate() {
        if i > 0 {
            write!(out, ", ")?;
        }
        write!(out, "{}", tokens[*t])?;
    }
    write!(out, "}}")
}

fn action_str(action: &ParserAction) -> String {
    match action {
        ParserAction::Error => "error".to_string(),
        ParserAction::Accept => "accept".to_string(),
        ParserAction::Shift(s) => format!("shift {s}"),
        ParserAction::Reduce(p) => format!("reduce {p}"),
        ParserAction::Goto(s) => format!("goto {s}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lalr::Lalr;

    fn tokens() -> Vec<String> {
        ["$start", "S", "x", "$END"].map(String::from).to_vec()
    }

    #[test]
    fn productions_and_states() {
        // $start -> S ; S -> x
        let prods = vec![vec![0, 1], vec![1, 2]];
        let automaton = Lalr::new(&prods, 2, 2).build();
        let mut out = Vec::new();
        write_prods(&mut out, &prods, &tokens()).unwrap();
        write_states(&mut out, &automaton, &prods, &tokens()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("PS,2\n\nP,0,$start -> S \nP,1,S -> x \n"));
        assert!(text.contains("CS,3\n\nC,0,$start -> . S {$END}\nT,0,S,1\nT,0,x,2\n"));
        assert!(text.contains("C,2,S -> x . {$END}\n"));
    }

    #[test]
    fn table_and_conflicts() {
        let actions = vec![vec![
            ParserAction::Goto(1),
            ParserAction::Error,
            ParserAction::Shift(2),
            ParserAction::Accept,
        ]];
        let mut out = Vec::new();
        write_table(&mut out, &actions, &tokens()).unwrap();
        write_conflicts(
            &mut out,
            &[Conflict {
                state: 0,
                terminal: "x".into(),
                kind: ConflictKind::ShiftReduce,
                chosen: ParserAction::Shift(2),
                rejected: ParserAction::Reduce(1),
            }],
        )
        .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "TS,1\n\nA,0,$start,goto 1\nA,0,x,shift 2\nA,0,$END,accept\n\
             XS,1\n\nX,0,x,shift/reduce,shift 2 over reduce 1\n"
        );
    }
}
