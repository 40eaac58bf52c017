use crate::error::merge_span;
use crate::{Span, Token};
use smartstring::alias::String;
use std::fmt::{self, Write};

/// A node of a parse tree.
///
/// The label is the rule name, or the alias of the alternative that
/// produced the node. Children are ordered left to right.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    pub rule: String,
    pub children: Vec<Child>,
    /// Covers all tokens below this node, `None` when there are none.
    pub span: Option<Span>,
}

/// A child of a [`Tree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Child {
    Tree(Tree),
    Token(Token),
}

impl Child {
    pub fn span(&self) -> Option<Span> {
        match self {
            Child::Tree(tree) => tree.span,
            Child::Token(token) => Some(token.span),
        }
    }

    pub fn as_tree(&self) -> Option<&Tree> {
        match self {
            Child::Tree(tree) => Some(tree),
            Child::Token(_) => None,
        }
    }

    pub fn as_token(&self) -> Option<&Token> {
        match self {
            Child::Tree(_) => None,
            Child::Token(token) => Some(token),
        }
    }
}

impl From<Tree> for Child {
    fn from(tree: Tree) -> Self {
        Child::Tree(tree)
    }
}

impl From<Token> for Child {
    fn from(token: Token) -> Self {
        Child::Token(token)
    }
}

impl fmt::Display for Child {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Child::Tree(tree) => fmt::Display::fmt(tree, f),
            Child::Token(token) => fmt::Display::fmt(token, f),
        }
    }
}

impl Tree {
    /// Creates a node, computing its span from the children.
    pub fn new(rule: impl Into<String>, children: Vec<Child>) -> Self {
        let mut span = None;
        for child in &children {
            merge_span(&mut span, child.span());
        }
        Self {
            rule: rule.into(),
            children,
            span,
        }
    }

    /// Tokens of the tree, left to right.
    pub fn leaves(&self) -> Leaves<'_> {
        Leaves {
            stack: vec![self.children.iter()],
        }
    }

    /// This node and all nodes below it, in pre-order.
    pub fn subtrees(&self) -> Subtrees<'_> {
        Subtrees { stack: vec![self] }
    }

    /// Nodes labelled `rule`, in pre-order.
    pub fn find<'a>(&'a self, rule: &'a str) -> impl Iterator<Item = &'a Tree> + 'a {
        self.subtrees().filter(move |t| t.rule.as_str() == rule)
    }

    /// Renders the tree as an indented outline.
    ///
    /// Each node is printed on its own line, indented two spaces per level.
    /// A node whose only child is a token is printed as `label<TAB>text`.
    ///
    /// ```rust
    /// # use lalrex::{Child, Position, Span, Token, Tree};
    /// let tok = |text: &str, at: usize| Token {
    ///     terminal: 0,
    ///     name: "NAME".into(),
    ///     text: text.into(),
    ///     span: Span::new(Position::new(at, 1, at + 1), Position::new(at + 1, 1, at + 2)),
    /// };
    /// let tree = Tree::new(
    ///     "start",
    ///     vec![
    ///         Child::Tree(Tree::new("x", vec![Child::Token(tok("a", 0))])),
    ///         Child::Token(tok("b", 1)),
    ///     ],
    /// );
    /// assert_eq!(tree.pretty(), "start\n  x\ta\n  b\n");
    /// ```
    pub fn pretty(&self) -> std::string::String {
        let mut out = std::string::String::new();
        self.write_pretty(&mut out, 0);
        out
    }

    fn write_pretty(&self, out: &mut std::string::String, level: usize) {
        push_indent(out, level);
        out.push_str(&self.rule);
        if let [Child::Token(token)] = self.children.as_slice() {
            let _ = writeln!(out, "\t{token}");
            return;
        }
        out.push('\n');
        for child in &self.children {
            match child {
                Child::Tree(tree) => tree.write_pretty(out, level + 1),
                Child::Token(token) => {
                    push_indent(out, level + 1);
                    let _ = writeln!(out, "{token}");
                }
            }
        }
    }
}

fn push_indent(out: &mut std::string::String, level: usize) {
    for _ in 0..level {
        out.push_str("  ");
    }
}

/// Compact one-line form: `label(child child ...)`.
impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.rule)?;
        for (i, child) in self.children.iter().enumerate() {
            if i > 0 {
                f.write_char(' ')?;
            }
            fmt::Display::fmt(child, f)?;
        }
        f.write_char(')')
    }
}

/// Iterator returned by [`Tree::leaves`].
#[derive(Debug)]
pub struct Leaves<'a> {
    stack: Vec<std::slice::Iter<'a, Child>>,
}

impl<'a> Iterator for Leaves<'a> {
    type Item = &'a Token;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(iter) = self.stack.last_mut() {
            match iter.next() {
                Some(Child::Token(token)) => return Some(token),
                Some(Child::Tree(tree)) => self.stack.push(tree.children.iter()),
                None => {
                    self.stack.pop();
                }
            }
        }
        None
    }
}

/// Iterator returned by [`Tree::subtrees`].
#[derive(Debug)]
pub struct Subtrees<'a> {
    stack: Vec<&'a Tree>,
}

impl<'a> Iterator for Subtrees<'a> {
    type Item = &'a Tree;

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.stack.pop()?;
        self.stack
            .extend(tree.children.iter().rev().filter_map(Child::as_tree));
        Some(tree)
    }
}
