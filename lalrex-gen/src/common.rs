//! The built-in `common` terminal library (`%import common.NAME`).
//!
//! Definitions follow the conventional Lark `common` module, written as
//! regular expressions the lexer DFA can run: no look-around and no lazy
//! quantifiers, since matches are always the longest.

use indexmap::IndexMap;
use once_cell::sync::Lazy;

const DEFINITIONS: &[(&str, &str)] = &[
    ("DIGIT", r"[0-9]"),
    ("HEXDIGIT", r"[a-fA-F0-9]"),
    ("INT", r"[0-9]+"),
    ("SIGNED_INT", r"[+-]?[0-9]+"),
    ("DECIMAL", r"[0-9]+\.[0-9]*|\.[0-9]+"),
    ("_EXP", r"[eE][+-]?[0-9]+"),
    (
        "FLOAT",
        r"[0-9]+[eE][+-]?[0-9]+|(?:[0-9]+\.[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?",
    ),
    (
        "SIGNED_FLOAT",
        r"[+-]?(?:[0-9]+[eE][+-]?[0-9]+|(?:[0-9]+\.[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?)",
    ),
    (
        "NUMBER",
        r"[0-9]+[eE][+-]?[0-9]+|(?:[0-9]+\.[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?|[0-9]+",
    ),
    (
        "SIGNED_NUMBER",
        r"[+-]?(?:[0-9]+[eE][+-]?[0-9]+|(?:[0-9]+\.[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?|[0-9]+)",
    ),
    ("ESCAPED_STRING", r#""(?:[^"\\\n]|\\[^\n])*""#),
    ("LCASE_LETTER", r"[a-z]"),
    ("UCASE_LETTER", r"[A-Z]"),
    ("LETTER", r"[A-Za-z]"),
    ("WORD", r"[A-Za-z]+"),
    ("CNAME", r"[_A-Za-z][_A-Za-z0-9]*"),
    ("WS_INLINE", r"[ \t]+"),
    ("WS", r"[ \t\f\r\n]+"),
    ("CR", r"\r"),
    ("LF", r"\n"),
    ("NEWLINE", r"(?:\r?\n)+"),
    ("SH_COMMENT", r"#[^\n]*"),
    ("CPP_COMMENT", r"//[^\n]*"),
    ("C_COMMENT", r"/\*(?:[^*]|\*+[^*/])*\*+/"),
    ("SQL_COMMENT", r"--[^\n]*"),
];

static COMMON: Lazy<IndexMap<&'static str, &'static str>> =
    Lazy::new(|| DEFINITIONS.iter().copied().collect());

/// Looks up `name` in `module`, returning its regular expression.
///
/// Only the `common` module exists.
pub fn lookup(module: &str, name: &str) -> Option<&'static str> {
    match module {
        "common" => COMMON.get(name).copied(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    fn full(name: &str) -> Regex {
        Regex::new(&format!("^(?:{})$", lookup("common", name).unwrap())).unwrap()
    }

    #[test]
    fn all_definitions_compile_and_reject_empty() {
        for (name, _) in DEFINITIONS {
            assert!(!full(name).is_match(""), "{name} matches the empty string");
        }
    }

    #[test]
    fn numbers() {
        let n = full("SIGNED_NUMBER");
        for ok in ["1", "-12", "+3.5", "1e10", ".5", "2.", "6.02E-23"] {
            assert!(n.is_match(ok), "{ok}");
        }
        for bad in ["-", "e5", "1e", "1.2.3"] {
            assert!(!n.is_match(bad), "{bad}");
        }
    }

    #[test]
    fn strings_and_comments() {
        let s = full("ESCAPED_STRING");
        assert!(s.is_match(r#""a \"quoted\" word""#));
        assert!(!s.is_match(r#""open"#));
        let c = full("C_COMMENT");
        assert!(c.is_match("/* a ** b */"));
        assert!(!c.is_match("/* a */ b */"));
    }

    #[test]
    fn unknown_module_or_name() {
        assert_eq!(lookup("common", "NOPE"), None);
        assert_eq!(lookup("other", "WS"), None);
    }
}
