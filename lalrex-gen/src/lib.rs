//! Copyright (c) 2005–2025 IKH Software, Inc.
//!
//! Released under the terms of the GNU Lesser General Public License, version 3.0
//! or (at your option) any later version (LGPL-3.0-or-later).
//!
//! LALR(1) table builder for Lark-style grammar descriptions.
//!
//! `lalrex-gen` turns grammar text into a [`lalrex::ParseTable`]:
//!  * the grammar text is tokenized with `logos` and read by a
//!    recursive-descent reader;
//!  * rules are lowered to plain productions, terminals are compiled to
//!    regular expressions (with the built-in `common` library available
//!    through `%import`);
//!  * the LALR(1) automaton is built from the LR(0) kernels with propagated
//!    lookaheads, and the action/goto table is filled, resolving conflicts
//!    as configured in [`BuildOptions`].
//!
//! ```rust
//! let table = lalrex_gen::build("start: \"a\" \"b\"").unwrap();
//! let tree = table.parse("ab").unwrap();
//! assert_eq!(tree.to_string(), "start(a b)");
//! ```

mod ast;
mod common;
mod grammar;
mod lalr;
mod lexer;
mod options;
mod reader;
mod report;
mod symtab;
mod tables;

use crate::grammar::Grammar;
use crate::lalr::{Automaton, Lalr};
use crate::tables::Tables;
use lalrex::table::TableParts;
use std::io::{self, Write};

pub use crate::options::BuildOptions;
pub use lalrex::{GrammarError, ParseTable};

/// Builds a parse table from grammar text with the default options.
pub fn build(grammar_text: &str) -> Result<ParseTable, GrammarError> {
    build_with_options(grammar_text, &BuildOptions::default())
}

/// Builds a parse table from grammar text.
pub fn build_with_options(
    grammar_text: &str,
    options: &BuildOptions,
) -> Result<ParseTable, GrammarError> {
    let build = Build::new(grammar_text, options)?;
    if options.debug && log::log_enabled!(log::Level::Debug) {
        let mut report = Vec::new();
        if build.write(&mut report).is_ok() {
            log::debug!("{}", String::from_utf8_lossy(&report));
        }
    }
    build.into_table()
}

/// Writes the productions, FIRST sets, automaton states, table and resolved
/// conflicts of a grammar to `out`.
pub fn write_report<W: Write>(
    grammar_text: &str,
    options: &BuildOptions,
    out: &mut W,
) -> anyhow::Result<()> {
    let build = Build::new(grammar_text, options)?;
    build.write(out)?;
    Ok(())
}

/// Intermediate results of one build.
struct Build {
    grammar: Grammar,
    prods: Vec<Vec<usize>>,
    automaton: Automaton,
    tables: Tables,
}

impl Build {
    fn new(grammar_text: &str, options: &BuildOptions) -> Result<Self, GrammarError> {
        let statements = reader::read(grammar_text)?;
        log::debug!("read {} statements", statements.len());
        let grammar = grammar::compile(&statements, options)?;
        let prods = grammar.encoded();
        let automaton = Lalr::new(&prods, grammar.n_nonterms(), grammar.n_terms() + 1).build();
        log::debug!("automaton has {} states", automaton.states.len());
        let tables = tables::construct(&grammar, &automaton, options)?;
        if !tables.conflicts.is_empty() {
            log::debug!("resolved {} conflicts", tables.conflicts.len());
        }
        Ok(Self {
            grammar,
            prods,
            automaton,
            tables,
        })
    }

    fn write<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let tokens = self.grammar.token_names();
        report::write_prods(out, &self.prods, &tokens)?;
        writeln!(out)?;
        report::write_first(
            out,
            &self.automaton.first,
            &self.automaton.nullable,
            self.grammar.n_nonterms(),
            &tokens,
        )?;
        writeln!(out)?;
        report::write_states(out, &self.automaton, &self.prods, &tokens)?;
        report::write_table(out, &self.tables.actions, &tokens)?;
        writeln!(out)?;
        report::write_conflicts(out, &self.tables.conflicts)
    }

    fn into_table(self) -> Result<ParseTable, GrammarError> {
        ParseTable::try_new(TableParts {
            terminals: self.grammar.terminals,
            nonterminals: self.grammar.nonterminals,
            productions: self.grammar.productions,
            actions: self.tables.actions,
            start_state: 0,
            conflicts: self.tables.conflicts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lalrex::table::ConflictKind;
    use lalrex::{Error, Parser, ParserAction};

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    const JSON: &str = r#"
?start: value

?value: object
      | array
      | string
      | SIGNED_NUMBER      -> number
      | "true"             -> true
      | "false"            -> false
      | "null"             -> null

array  : "[" [value ("," value)*] "]"
object : "{" [pair ("," pair)*] "}"
pair   : string ":" value

string : ESCAPED_STRING

%import common.ESCAPED_STRING
%import common.SIGNED_NUMBER
%import common.WS
%ignore WS
"#;

    const DANGLING_ELSE: &str = r#"
start: stmt
stmt: "if" "x" stmt
    | "if" "x" stmt "else" stmt
    | "y"
%ignore " "
"#;

    #[test]
    fn sequence_of_two_literals() {
        init_logger();
        let table = build("start: \"a\" \"b\"").unwrap();

        let tree = table.parse("ab").unwrap();
        assert_eq!(tree.rule.as_str(), "start");
        let texts: Vec<&str> = tree.leaves().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, ["a", "b"]);
        assert_eq!(tree.span.unwrap().range(), 0..2);

        let Err(Error::Parse(err)) = table.parse("a") else {
            panic!("expected a parse error");
        };
        assert!(err.is_unexpected_end());
        let expected: Vec<&str> = err.expected.iter().map(|s| s.as_str()).collect();
        assert_eq!(expected, ["\"b\""]);
        assert_eq!(err.position.offset, 1);

        let Err(Error::Lex(err)) = table.parse("ac") else {
            panic!("expected a lex error");
        };
        assert_eq!(err.position.offset, 1);
        assert_eq!(err.found, 'c');
    }

    #[test]
    fn empty_input() {
        init_logger();
        let table = build("start: \"a\"*").unwrap();
        let tree = table.parse("").unwrap();
        assert_eq!(tree.rule.as_str(), "start");
        assert!(tree.children.is_empty());
        assert_eq!(tree.span, None);

        let table = build("start: \"a\"").unwrap();
        let Err(Error::Parse(err)) = table.parse("") else {
            panic!("expected a parse error");
        };
        assert!(err.is_unexpected_end());
        assert_eq!(err.position.offset, 0);
    }

    #[test]
    fn json_values() {
        init_logger();
        let table = build(JSON).unwrap();
        assert!(table.conflicts().is_empty());

        let tree = table.parse(r#"{"a": [1, true]}"#).unwrap();
        assert_eq!(
            tree.pretty(),
            "object\n  {\n  pair\n    string\t\"a\"\n    :\n    array\n      [\n      \
             number\t1\n      ,\n      true\ttrue\n      ]\n  }\n"
        );

        let tree = table.parse(" -2.5e3 ").unwrap();
        assert_eq!(tree.to_string(), "number(-2.5e3)");

        let tree = table.parse("[]").unwrap();
        assert_eq!(tree.to_string(), "array([ ])");

        let Err(Error::Parse(err)) = table.parse("[1,]") else {
            panic!("expected a parse error");
        };
        assert_eq!(err.token.as_ref().unwrap().text.as_str(), "]");
        assert_eq!(err.position.column, 4);
    }

    #[test]
    fn json_without_anonymous_tokens() {
        init_logger();
        let options = BuildOptions::default().with_keep_all_tokens(false);
        let table = build_with_options(JSON, &options).unwrap();
        let tree = table.parse(r#"{"a": [1, null], "b": {}}"#).unwrap();
        assert_eq!(
            tree.to_string(),
            r#"object(pair(string("a") array(number(1) null())) pair(string("b") object()))"#
        );
    }

    #[test]
    fn leaves_match_tokens_and_round_trip() {
        init_logger();
        let table = build(JSON).unwrap();
        let input = r#"{"key": ["v", -1, 2.0, false], "n": null}"#;
        let tree = table.parse(input).unwrap();

        let leaves: Vec<&str> = tree.leaves().map(|t| t.text.as_str()).collect();
        let tokens: Vec<String> = table
            .lexer()
            .tokenize(input)
            .map(|t| t.unwrap().text.to_string())
            .collect();
        assert_eq!(leaves, tokens);
        let without_spaces: String = input.chars().filter(|c| *c != ' ').collect();
        assert_eq!(leaves.concat(), without_spaces);

        assert_eq!(table.parse(input).unwrap(), tree);
    }

    #[test]
    fn dangling_else_binds_to_nearest_if() {
        init_logger();
        let table = build(DANGLING_ELSE).unwrap();
        assert_eq!(table.conflicts().len(), 1);
        assert_eq!(table.conflicts()[0].kind, ConflictKind::ShiftReduce);

        let tree = table.parse("if x if x y else y").unwrap();
        assert_eq!(
            tree.to_string(),
            "start(stmt(if x stmt(if x stmt(y) else stmt(y))))"
        );

        let err = build_with_options(DANGLING_ELSE, &BuildOptions::strict()).unwrap_err();
        assert!(err.message.contains("shift/reduce"), "{err}");
    }

    #[test]
    fn reduce_reduce_takes_earliest_production() {
        init_logger();
        let grammar = "start: a | b\na: \"x\"\nb: \"x\"";
        let table = build(grammar).unwrap();
        assert_eq!(table.conflicts()[0].kind, ConflictKind::ReduceReduce);
        assert_eq!(table.parse("x").unwrap().to_string(), "start(a(x))");

        let err = build_with_options(grammar, &BuildOptions::strict()).unwrap_err();
        assert!(err.message.contains("reduce/reduce"), "{err}");
    }

    #[test]
    fn json_table_is_conflict_free() {
        init_logger();
        let table = build(JSON).unwrap();
        assert!(table.conflicts().is_empty(), "{:?}", table.conflicts());
        let accepts = (0..table.n_states())
            .filter(|&s| table.lookup(s, table.end_token()) == ParserAction::Accept)
            .count();
        assert_eq!(accepts, 1);
        for s in 0..table.n_states() {
            for t in table.nonterminals().len()..table.n_tokens() {
                assert!(!matches!(table.lookup(s, t), ParserAction::Goto(_)));
            }
        }
    }

    #[test]
    fn lalr_lookaheads_avoid_slr_conflicts() {
        init_logger();
        // FOLLOW(r) contains "=", so an SLR table would clash on `l "=" r`
        // against `r: l` after reading an `l`.
        let table = build("start: l \"=\" r | r\nl: \"*\" r | ID\nr: l\nID: /[a-z]+/").unwrap();
        assert!(table.conflicts().is_empty(), "{:?}", table.conflicts());
        assert_eq!(
            table.parse("x=*y").unwrap().to_string(),
            "start(l(x) = r(l(* r(l(y)))))"
        );
        assert_eq!(table.parse("*x").unwrap().to_string(), "start(r(l(* r(l(x)))))");
        let Err(Error::Parse(err)) = table.parse("x=y=z") else {
            panic!("expected a parse error");
        };
        assert_eq!(err.token.as_ref().unwrap().text.as_str(), "=");
    }

    #[test]
    fn grammar_errors_carry_locations() {
        init_logger();
        let err = build("start: x\n").unwrap_err();
        assert_eq!(err.message.as_str(), "undefined rule `x`");
        let span = err.span.unwrap();
        assert_eq!((span.start.line, span.start.column), (1, 8));

        let err = build("start: \"a\"\n  | : b").unwrap_err();
        assert_eq!(err.span.unwrap().start.line, 2);
    }

    #[test]
    fn stateful_parser_reports_statistics() {
        init_logger();
        let table = build(JSON).unwrap();
        let mut parser = Parser::new(&table);
        parser.parse("[1, 2]").unwrap();
        let stats = parser.stats();
        assert_eq!(stats.tokens, 5);
        assert_eq!(stats.shifts, 5);
    }

    #[test]
    fn parses_from_several_threads() {
        init_logger();
        let table = build(JSON).unwrap();
        let expected = table.parse("[1, 2, 3]").unwrap();
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..10 {
                        assert_eq!(table.parse("[1, 2, 3]").unwrap(), expected);
                    }
                });
            }
        });
    }

    #[test]
    fn report_lists_every_section() {
        init_logger();
        let mut out = Vec::new();
        write_report(DANGLING_ELSE, &BuildOptions::default(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        for tag in ["PS,", "FIRST,stmt,", "CS,", "TS,", "XS,1"] {
            assert!(text.contains(tag), "missing {tag}");
        }
        assert!(write_report("start: x", &BuildOptions::default(), &mut Vec::new()).is_err());
    }
}
