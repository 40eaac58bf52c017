//! Compilation of a grammar description into a flat context-free grammar.
//!
//! This step resolves imports, compiles terminal bodies into regular
//! expressions, assigns anonymous terminals to inline literals and patterns,
//! lowers the EBNF operators into plain productions and validates every
//! reference. The result is a [`Grammar`] whose productions use the same
//! symbol numbering as the final parse table.
//!
//! Lowering follows the usual Lark conventions:
//!
//! - `x?` and `[x]` duplicate the enclosing alternative with and without `x`;
//! - `( a | b )` is distributed into the enclosing alternatives;
//! - `x+` becomes an inlined rule `__r_plus_n: x | __r_plus_n x`;
//! - `x*` becomes an inlined `+` rule that may also be left out;
//! - `x ~ n..m` expands into the sequences of `n` to `m` copies of `x`.

use crate::ast::{Expr, RuleDef, Statement};
use crate::common;
use crate::options::BuildOptions;
use crate::symtab::Symtab;
use indexmap::IndexMap;
use lalrex::table::{Expand, NonTerminalDef, Pattern, Production, Symbol, TerminalDef};
use lalrex::{END_TERMINAL, GrammarError, START_NONTERMINAL, Span};
use regex::Regex;
use smartstring::alias::String;
use std::collections::{HashMap, HashSet};

/// A compiled context-free grammar.
///
/// Non-terminal 0 is the augmented start symbol and production 0 is
/// `$start -> start`.
#[derive(Debug, Clone)]
pub struct Grammar {
    pub terminals: Vec<TerminalDef>,
    pub nonterminals: Vec<NonTerminalDef>,
    pub productions: Vec<Production>,
    /// Source location of the alternative each production came from.
    pub spans: Vec<Option<Span>>,
}

impl Grammar {
    pub fn n_nonterms(&self) -> usize {
        self.nonterminals.len()
    }

    /// Number of terminals, not counting the end marker.
    pub fn n_terms(&self) -> usize {
        self.terminals.len()
    }

    /// Table column of `sym`.
    pub fn token_id(&self, sym: Symbol) -> usize {
        match sym {
            Symbol::NonTerminal(n) => n,
            Symbol::Terminal(t) => self.n_nonterms() + t,
        }
    }

    /// Names of all table columns: non-terminals, terminals, end marker.
    pub fn token_names(&self) -> Vec<std::string::String> {
        self.nonterminals
            .iter()
            .map(|n| n.name.to_string())
            .chain(self.terminals.iter().map(|t| t.name.to_string()))
            .chain(std::iter::once(END_TERMINAL.to_string()))
            .collect()
    }

    /// Productions as `[head, body...]` vectors of table columns.
    pub fn encoded(&self) -> Vec<Vec<usize>> {
        self.productions
            .iter()
            .map(|p| {
                std::iter::once(p.head)
                    .chain(p.body.iter().map(|sym| self.token_id(*sym)))
                    .collect()
            })
            .collect()
    }

    /// Renders production `prod` as `head -> body`.
    pub fn format_production(&self, prod: usize) -> std::string::String {
        let p = &self.productions[prod];
        let mut out = format!("{} ->", self.nonterminals[p.head].name);
        for sym in &p.body {
            out.push(' ');
            match *sym {
                Symbol::NonTerminal(n) => out.push_str(&self.nonterminals[n].name),
                Symbol::Terminal(t) => out.push_str(&self.terminals[t].name),
            }
        }
        out
    }
}

/// Compiles the statements of a grammar description.
pub fn compile(statements: &[Statement], options: &BuildOptions) -> Result<Grammar, GrammarError> {
    let mut compiler = Compiler::new(options);
    compiler.collect(statements)?;
    compiler.compile_terminals()?;
    compiler.order_terminals(statements)?;
    compiler.build_terminals()?;
    let start = compiler.create_nonterminals()?;
    compiler.lower_rules()?;
    compiler.check_reachable(start);
    log::debug!(
        "grammar: {} terminals, {} non-terminals, {} productions",
        compiler.terminals.len(),
        compiler.nonterms.len(),
        compiler.productions.len()
    );
    Ok(Grammar {
        terminals: compiler.terminals,
        nonterminals: compiler.nonterminals,
        productions: compiler.productions,
        spans: compiler.spans,
    })
}

/// Identity of a lexer terminal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TermKey {
    Named(String),
    Anon(Pattern),
}

/// Body of a named terminal.
#[derive(Debug, Clone)]
struct TermSource {
    expr: Expr,
    priority: i32,
    span: Span,
}

/// Where a terminal first appears.
#[derive(Debug, Clone)]
struct Origin {
    /// Name given to an anonymous terminal.
    anon_name: Option<String>,
    /// Comes from an inline literal.
    literal: bool,
    span: Span,
}

/// State of the EBNF lowering of one rule.
struct AuxCtx {
    base: String,
    keep_all_tokens: bool,
    counter: usize,
}

struct Compiler<'a> {
    options: &'a BuildOptions,
    rules: IndexMap<String, &'a RuleDef>,
    term_defs: IndexMap<String, TermSource>,
    start: Option<(String, Span)>,

    regexes: HashMap<String, String>,
    named_patterns: HashMap<String, Pattern>,
    by_pattern: HashMap<Pattern, String>,
    /// Terminals referenced from other terminal bodies.
    referenced: HashSet<String>,

    order: IndexMap<TermKey, Origin>,
    used: HashSet<TermKey>,
    ignored: HashSet<TermKey>,
    anon_count: usize,

    term_ids: HashMap<TermKey, usize>,
    terminals: Vec<TerminalDef>,
    nonterms: Symtab,
    nonterminals: Vec<NonTerminalDef>,
    productions: Vec<Production>,
    spans: Vec<Option<Span>>,
    pending: Vec<(usize, Vec<Vec<Symbol>>, Option<Span>)>,
}

impl<'a> Compiler<'a> {
    fn new(options: &'a BuildOptions) -> Self {
        Self {
            options,
            rules: IndexMap::new(),
            term_defs: IndexMap::new(),
            start: None,
            regexes: HashMap::new(),
            named_patterns: HashMap::new(),
            by_pattern: HashMap::new(),
            referenced: HashSet::new(),
            order: IndexMap::new(),
            used: HashSet::new(),
            ignored: HashSet::new(),
            anon_count: 0,
            term_ids: HashMap::new(),
            terminals: Vec::new(),
            nonterms: Symtab::new(),
            nonterminals: Vec::new(),
            productions: Vec::new(),
            spans: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// Gathers definitions and directives, rejecting duplicates.
    fn collect(&mut self, statements: &'a [Statement]) -> Result<(), GrammarError> {
        for statement in statements {
            match statement {
                Statement::Rule(rule) => {
                    if self.rules.contains_key(&rule.name) {
                        return Err(GrammarError::new(
                            format!("rule `{}` is defined more than once", rule.name),
                            Some(rule.span),
                        ));
                    }
                    self.rules.insert(rule.name.clone(), rule);
                }
                Statement::Term(term) => self.define_term(
                    term.name.clone(),
                    TermSource {
                        expr: term.expr.clone(),
                        priority: term.priority,
                        span: term.span,
                    },
                )?,
                Statement::Import(import) => {
                    for (name, local) in &import.names {
                        if !Expr::is_terminal_name(name) || !Expr::is_terminal_name(local) {
                            return Err(GrammarError::new(
                                format!("only terminals can be imported, found `{name}`"),
                                Some(import.span),
                            ));
                        }
                        let Some(regex) = common::lookup(&import.module, name) else {
                            return Err(GrammarError::new(
                                format!("cannot import `{}.{}`", import.module, name),
                                Some(import.span),
                            ));
                        };
                        self.define_term(
                            local.clone(),
                            TermSource {
                                expr: Expr::Regex {
                                    source: regex.into(),
                                    flags: String::new(),
                                    span: import.span,
                                },
                                priority: 0,
                                span: import.span,
                            },
                        )?;
                    }
                }
                Statement::Ignore(..) => {}
                Statement::Start(name, span) => {
                    if self.start.is_some() {
                        return Err(GrammarError::new(
                            "`%start` is given more than once",
                            Some(*span),
                        ));
                    }
                    self.start = Some((name.clone(), *span));
                }
            }
        }
        Ok(())
    }

    fn define_term(&mut self, name: String, source: TermSource) -> Result<(), GrammarError> {
        if self.term_defs.contains_key(&name) {
            return Err(GrammarError::new(
                format!("terminal {name} is defined more than once"),
                Some(source.span),
            ));
        }
        self.term_defs.insert(name, source);
        Ok(())
    }

    /// Compiles every named terminal, including the ones that end up unused.
    fn compile_terminals(&mut self) -> Result<(), GrammarError> {
        let names: Vec<String> = self.term_defs.keys().cloned().collect();
        for name in names {
            let Some(source) = self.term_defs.get(&name) else {
                continue;
            };
            let (span, expr) = (source.span, source.expr.clone());
            let regex = self.term_regex(&name, span, &mut Vec::new())?;
            let pattern = match expr {
                Expr::Literal {
                    text,
                    insensitive: false,
                    ..
                } => Pattern::Literal(text),
                _ => Pattern::Regex(regex),
            };
            self.by_pattern
                .entry(pattern.clone())
                .or_insert_with(|| name.clone());
            self.named_patterns.insert(name, pattern);
        }
        Ok(())
    }

    fn term_regex(
        &mut self,
        name: &str,
        at: Span,
        visiting: &mut Vec<String>,
    ) -> Result<String, GrammarError> {
        if let Some(regex) = self.regexes.get(name) {
            return Ok(regex.clone());
        }
        if visiting.iter().any(|v| v.as_str() == name) {
            return Err(GrammarError::new(
                format!("terminal {name} is defined in terms of itself"),
                Some(at),
            ));
        }
        let Some(source) = self.term_defs.get(name) else {
            return Err(GrammarError::new(
                format!("undefined terminal {name}"),
                Some(at),
            ));
        };
        let expr = source.expr.clone();
        visiting.push(name.into());
        let regex = self.expr_regex(&expr, name, visiting)?;
        visiting.pop();
        self.regexes.insert(name.into(), regex.clone());
        Ok(regex)
    }

    /// Compiles a terminal body to a regular expression.
    fn expr_regex(
        &mut self,
        expr: &Expr,
        owner: &str,
        visiting: &mut Vec<String>,
    ) -> Result<String, GrammarError> {
        Ok(match expr {
            Expr::Name(name, span) => {
                if !Expr::is_terminal_name(name) {
                    return Err(GrammarError::new(
                        format!("rule `{name}` cannot be used inside terminal {owner}"),
                        Some(*span),
                    ));
                }
                self.referenced.insert(name.clone());
                let inner = self.term_regex(name, *span, visiting)?;
                format!("(?:{inner})").into()
            }
            Expr::Literal {
                text, insensitive, ..
            } => literal_regex(text, *insensitive),
            Expr::Regex { source, flags, .. } => flagged_regex(source, flags),
            Expr::Range(lo, hi, _) => range_regex(*lo, *hi),
            Expr::Seq(items) => {
                let mut out = String::new();
                for item in items {
                    out.push_str(&self.expr_regex(item, owner, visiting)?);
                }
                out
            }
            Expr::Alt(items) => {
                let mut parts = Vec::with_capacity(items.len());
                for item in items {
                    parts.push(self.expr_regex(item, owner, visiting)?);
                }
                format!("(?:{})", parts.join("|")).into()
            }
            Expr::Optional(inner) => format!("(?:{})?", self.expr_regex(inner, owner, visiting)?).into(),
            Expr::Star(inner) => format!("(?:{})*", self.expr_regex(inner, owner, visiting)?).into(),
            Expr::Plus(inner) => format!("(?:{})+", self.expr_regex(inner, owner, visiting)?).into(),
            Expr::Repeat(inner, min, max) => {
                format!("(?:{}){{{min},{max}}}", self.expr_regex(inner, owner, visiting)?).into()
            }
        })
    }

    /// Pattern and name of an inline literal or regular expression.
    fn anon_pattern(expr: &Expr) -> Option<(Pattern, Option<String>, bool)> {
        match expr {
            Expr::Literal {
                text,
                insensitive: false,
                ..
            } => Some((
                Pattern::Literal(text.clone()),
                Some(format!("{:?}", text.as_str()).into()),
                true,
            )),
            Expr::Literal {
                text,
                insensitive: true,
                ..
            } => Some((
                Pattern::Regex(literal_regex(text, true)),
                Some(format!("{:?}i", text.as_str()).into()),
                true,
            )),
            Expr::Regex { source, flags, .. } => {
                Some((Pattern::Regex(flagged_regex(source, flags)), None, false))
            }
            Expr::Range(lo, hi, _) => Some((Pattern::Regex(range_regex(*lo, *hi)), None, false)),
            _ => None,
        }
    }

    /// Named terminal with the same pattern, if any.
    fn resolve_key(&self, pattern: Pattern) -> TermKey {
        match self.by_pattern.get(&pattern) {
            Some(name) => TermKey::Named(name.clone()),
            None => TermKey::Anon(pattern),
        }
    }

    fn touch(&mut self, key: TermKey, anon_name: Option<String>, literal: bool, span: Span) {
        if self.order.contains_key(&key) {
            return;
        }
        let anon_name = match key {
            TermKey::Named(_) => None,
            TermKey::Anon(_) => Some(anon_name.unwrap_or_else(|| {
                let name = format!("__ANON_{}", self.anon_count);
                self.anon_count += 1;
                name.into()
            })),
        };
        self.order.insert(
            key,
            Origin {
                anon_name,
                literal,
                span,
            },
        );
    }

    /// Records terminals in order of first appearance.
    fn order_terminals(&mut self, statements: &[Statement]) -> Result<(), GrammarError> {
        for statement in statements {
            match statement {
                Statement::Rule(rule) => {
                    for alt in &rule.alternatives {
                        self.touch_expr(&alt.expr)?;
                    }
                }
                Statement::Term(term) => {
                    self.touch(TermKey::Named(term.name.clone()), None, false, term.span)
                }
                Statement::Import(import) => {
                    for (_, local) in &import.names {
                        self.touch(TermKey::Named(local.clone()), None, false, import.span);
                    }
                }
                Statement::Ignore(expr, span) => self.touch_ignore(expr, *span)?,
                Statement::Start(..) => {}
            }
        }
        Ok(())
    }

    fn touch_expr(&mut self, expr: &Expr) -> Result<(), GrammarError> {
        match expr {
            Expr::Name(name, span) => {
                if Expr::is_terminal_name(name) {
                    let key = self.named_key(name, *span)?;
                    self.touch(key.clone(), None, false, *span);
                    self.used.insert(key);
                }
            }
            Expr::Literal { span, .. } | Expr::Regex { span, .. } | Expr::Range(_, _, span) => {
                if let Some((pattern, name, literal)) = Self::anon_pattern(expr) {
                    let key = self.resolve_key(pattern);
                    self.touch(key.clone(), name, literal, *span);
                    self.used.insert(key);
                }
            }
            Expr::Seq(items) | Expr::Alt(items) => {
                for item in items {
                    self.touch_expr(item)?;
                }
            }
            Expr::Optional(inner)
            | Expr::Star(inner)
            | Expr::Plus(inner)
            | Expr::Repeat(inner, _, _) => self.touch_expr(inner)?,
        }
        Ok(())
    }

    fn touch_ignore(&mut self, expr: &Expr, at: Span) -> Result<(), GrammarError> {
        let (key, name, literal, span) = match expr {
            Expr::Name(name, span) if Expr::is_terminal_name(name) => {
                (self.named_key(name, *span)?, None, false, *span)
            }
            Expr::Name(name, span) => {
                return Err(GrammarError::new(
                    format!("`%ignore` expects terminals, found rule `{name}`"),
                    Some(*span),
                ));
            }
            _ => {
                let (pattern, name, literal) = match Self::anon_pattern(expr) {
                    Some(anon) => anon,
                    None => {
                        let regex = self.expr_regex(expr, "%ignore", &mut Vec::new())?;
                        (Pattern::Regex(regex), None, false)
                    }
                };
                (self.resolve_key(pattern), name, literal, expr.span().unwrap_or(at))
            }
        };
        self.touch(key.clone(), name, literal, span);
        self.used.insert(key.clone());
        self.ignored.insert(key);
        Ok(())
    }

    fn named_key(&self, name: &str, span: Span) -> Result<TermKey, GrammarError> {
        if !self.term_defs.contains_key(name) {
            return Err(GrammarError::new(
                format!("undefined terminal {name}"),
                Some(span),
            ));
        }
        Ok(TermKey::Named(name.into()))
    }

    /// Creates the lexer terminals from the used keys, in order.
    fn build_terminals(&mut self) -> Result<(), GrammarError> {
        for (key, origin) in &self.order {
            if !self.used.contains(key) {
                if let TermKey::Named(name) = key {
                    if !self.referenced.contains(name) {
                        log::warn!("terminal {name} is defined but not used");
                    }
                }
                continue;
            }
            let (name, pattern, priority, span, keep) = match key {
                TermKey::Named(name) => {
                    let (Some(pattern), Some(source)) =
                        (self.named_patterns.get(name), self.term_defs.get(name))
                    else {
                        return Err(GrammarError::new(
                            format!("undefined terminal {name}"),
                            Some(origin.span),
                        ));
                    };
                    let keep = !name.starts_with('_');
                    (name.clone(), pattern.clone(), source.priority, source.span, keep)
                }
                TermKey::Anon(pattern) => {
                    let keep = !origin.literal || self.options.keep_all_tokens;
                    let name = origin.anon_name.clone().unwrap_or_default();
                    (name, pattern.clone(), 0, origin.span, keep)
                }
            };
            check_nonempty(&name, &pattern, span)?;
            self.term_ids.insert(key.clone(), self.terminals.len());
            self.terminals.push(TerminalDef {
                name,
                pattern,
                priority,
                ignored: self.ignored.contains(key),
                keep,
            });
        }
        Ok(())
    }

    /// Registers `$start` and all rules; returns the start rule.
    fn create_nonterminals(&mut self) -> Result<usize, GrammarError> {
        self.nonterms.add(START_NONTERMINAL);
        self.nonterminals.push(NonTerminalDef {
            name: START_NONTERMINAL.into(),
            expand: Expand::Keep,
            keep_all_tokens: false,
        });
        for (name, rule) in &self.rules {
            self.nonterms.add(name);
            let expand = if name.starts_with('_') {
                Expand::Inline
            } else if rule.modifiers.inline_single {
                Expand::InlineSingle
            } else {
                Expand::Keep
            };
            self.nonterminals.push(NonTerminalDef {
                name: name.clone(),
                expand,
                keep_all_tokens: rule.modifiers.keep_all_tokens,
            });
        }

        let (start, span) = match (&self.options.start, &self.start) {
            (Some(start), _) => (start.clone(), None),
            (None, Some((start, span))) => (start.clone(), Some(*span)),
            (None, None) => ("start".into(), None),
        };
        let Some(start_id) = self.nonterms.idx(&start).filter(|&id| id != 0) else {
            return Err(GrammarError::new(
                format!("start rule `{start}` is not defined"),
                span,
            ));
        };
        self.productions.push(Production {
            head: 0,
            body: vec![Symbol::NonTerminal(start_id)],
            alias: None,
        });
        self.spans.push(span);
        Ok(start_id)
    }

    fn lower_rules(&mut self) -> Result<(), GrammarError> {
        let rules: Vec<&'a RuleDef> = self.rules.values().copied().collect();
        for rule in rules {
            let head = self.nonterms.idx(&rule.name).unwrap_or_default();
            let mut ctx = AuxCtx {
                base: rule.name.trim_start_matches('_').into(),
                keep_all_tokens: rule.modifiers.keep_all_tokens,
                counter: 0,
            };
            let mut seen = HashSet::new();
            for alt in &rule.alternatives {
                for body in self.expand(&alt.expr, &mut ctx, &rule.name)? {
                    if seen.insert((body.clone(), alt.alias.clone())) {
                        self.push_production(head, body, alt.alias.clone(), Some(alt.span));
                    }
                }
            }
            for (aux, bodies, span) in std::mem::take(&mut self.pending) {
                let mut seen = HashSet::new();
                for body in bodies {
                    if seen.insert(body.clone()) {
                        self.push_production(aux, body, None, span);
                    }
                }
            }
        }
        Ok(())
    }

    fn push_production(
        &mut self,
        head: usize,
        body: Vec<Symbol>,
        alias: Option<String>,
        span: Option<Span>,
    ) {
        self.productions.push(Production { head, body, alias });
        self.spans.push(span);
    }

    /// Lowers `expr` into the list of symbol sequences it stands for.
    fn expand(
        &mut self,
        expr: &Expr,
        ctx: &mut AuxCtx,
        rule: &str,
    ) -> Result<Vec<Vec<Symbol>>, GrammarError> {
        Ok(match expr {
            Expr::Name(name, span) if Expr::is_terminal_name(name) => {
                let id = self.terminal_symbol(&TermKey::Named(name.clone()), rule, *span)?;
                vec![vec![Symbol::Terminal(id)]]
            }
            Expr::Name(name, span) => {
                let Some(id) = self.nonterms.idx(name).filter(|&id| id != 0) else {
                    return Err(GrammarError::new(
                        format!("undefined rule `{name}`"),
                        Some(*span),
                    ));
                };
                vec![vec![Symbol::NonTerminal(id)]]
            }
            Expr::Literal { span, .. } | Expr::Regex { span, .. } | Expr::Range(_, _, span) => {
                let Some((pattern, _, _)) = Self::anon_pattern(expr) else {
                    return Ok(Vec::new());
                };
                let key = self.resolve_key(pattern);
                vec![vec![Symbol::Terminal(self.terminal_symbol(&key, rule, *span)?)]]
            }
            Expr::Seq(items) => {
                let mut acc = vec![Vec::new()];
                for item in items {
                    let alts = self.expand(item, ctx, rule)?;
                    acc = product(&acc, &alts);
                }
                acc
            }
            Expr::Alt(items) => {
                let mut out = Vec::new();
                for item in items {
                    out.extend(self.expand(item, ctx, rule)?);
                }
                out
            }
            Expr::Optional(inner) => {
                let mut out = self.expand(inner, ctx, rule)?;
                out.push(Vec::new());
                out
            }
            Expr::Plus(inner) => {
                let aux = self.aux_rule(ctx, "plus", inner, rule)?;
                vec![vec![Symbol::NonTerminal(aux)]]
            }
            Expr::Star(inner) => {
                let aux = self.aux_rule(ctx, "star", inner, rule)?;
                vec![vec![Symbol::NonTerminal(aux)], Vec::new()]
            }
            Expr::Repeat(inner, min, max) => {
                let alts = self.expand(inner, ctx, rule)?;
                let mut out = Vec::new();
                let mut acc = vec![Vec::new()];
                for k in 0..=*max {
                    if k >= *min {
                        out.extend(acc.iter().cloned());
                    }
                    if k < *max {
                        acc = product(&acc, &alts);
                    }
                }
                out
            }
        })
    }

    /// Creates the inlined rule `aux: x | aux x`.
    fn aux_rule(
        &mut self,
        ctx: &mut AuxCtx,
        kind: &str,
        inner: &Expr,
        rule: &str,
    ) -> Result<usize, GrammarError> {
        // `foo` and `_foo` share a base, and users may spell helper names.
        let name = loop {
            let name = format!("__{}_{}_{}", ctx.base, kind, ctx.counter);
            ctx.counter += 1;
            if self.nonterms.idx(&name).is_none() {
                break name;
            }
        };
        let id = self.nonterms.add(&name);
        debug_assert_eq!(id, self.nonterminals.len());
        self.nonterminals.push(NonTerminalDef {
            name: name.into(),
            expand: Expand::Inline,
            keep_all_tokens: ctx.keep_all_tokens,
        });
        let alts = self.expand(inner, ctx, rule)?;
        let mut bodies = alts.clone();
        for alt in alts {
            let mut body = vec![Symbol::NonTerminal(id)];
            body.extend(alt);
            bodies.push(body);
        }
        self.pending.push((id, bodies, inner.span()));
        Ok(id)
    }

    fn terminal_symbol(&self, key: &TermKey, rule: &str, span: Span) -> Result<usize, GrammarError> {
        let Some(&id) = self.term_ids.get(key) else {
            let name = match key {
                TermKey::Named(name) => name.clone(),
                TermKey::Anon(pattern) => pattern.to_string().into(),
            };
            return Err(GrammarError::new(
                format!("undefined terminal {name}"),
                Some(span),
            ));
        };
        if self.terminals[id].ignored {
            return Err(GrammarError::new(
                format!(
                    "terminal {} is ignored and cannot be used in rule `{}`",
                    self.terminals[id].name, rule
                ),
                Some(span),
            ));
        }
        Ok(id)
    }

    /// Warns about rules the start rule cannot reach.
    fn check_reachable(&self, start: usize) {
        let mut reached = vec![false; self.nonterminals.len()];
        reached[0] = true;
        reached[start] = true;
        let mut stack = vec![start];
        while let Some(n) = stack.pop() {
            for prod in self.productions.iter().filter(|p| p.head == n) {
                for sym in &prod.body {
                    if let Symbol::NonTerminal(m) = *sym {
                        if !reached[m] {
                            reached[m] = true;
                            stack.push(m);
                        }
                    }
                }
            }
        }
        for (id, def) in self.nonterminals.iter().enumerate() {
            if !reached[id] && !def.name.starts_with("__") {
                log::warn!(
                    "rule `{}` is not reachable from `{}`",
                    def.name,
                    self.nonterminals[start].name
                );
            }
        }
    }
}

fn product(acc: &[Vec<Symbol>], alts: &[Vec<Symbol>]) -> Vec<Vec<Symbol>> {
    let mut out = Vec::with_capacity(acc.len() * alts.len());
    for prefix in acc {
        for alt in alts {
            let mut body = prefix.clone();
            body.extend_from_slice(alt);
            out.push(body);
        }
    }
    out
}

fn literal_regex(text: &str, insensitive: bool) -> String {
    let escaped = regex::escape(text);
    if insensitive {
        format!("(?i:{escaped})").into()
    } else {
        escaped.into()
    }
}

fn flagged_regex(source: &str, flags: &str) -> String {
    if flags.contains('x') {
        // A trailing `#` comment would swallow the closing parenthesis.
        format!("(?{flags}:{source}\n)").into()
    } else {
        format!("(?{flags}:{source})").into()
    }
}

fn range_regex(lo: char, hi: char) -> String {
    format!(
        "[{}-{}]",
        regex::escape(lo.encode_utf8(&mut [0; 4])),
        regex::escape(hi.encode_utf8(&mut [0; 4]))
    )
    .into()
}

/// Rejects patterns that do not compile or match the empty string.
fn check_nonempty(name: &str, pattern: &Pattern, span: Span) -> Result<(), GrammarError> {
    let source = match pattern {
        Pattern::Literal(text) if text.is_empty() => {
            return Err(GrammarError::new(
                format!("terminal {name} is an empty literal"),
                Some(span),
            ));
        }
        Pattern::Literal(_) => return Ok(()),
        Pattern::Regex(source) => source,
    };
    let regex = Regex::new(&format!("^(?:{source})$")).map_err(|e| {
        GrammarError::new(
            format!("invalid pattern for terminal {name}: {e}"),
            Some(span),
        )
    })?;
    if regex.is_match("") {
        return Err(GrammarError::new(
            format!("terminal {name} can match the empty string"),
            Some(span),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn grammar(text: &str) -> Grammar {
        init_logger();
        compile(&read(text).unwrap(), &BuildOptions::default()).unwrap()
    }

    fn error(text: &str) -> GrammarError {
        init_logger();
        compile(&read(text).unwrap(), &BuildOptions::default()).unwrap_err()
    }

    fn terminal_names(g: &Grammar) -> Vec<&str> {
        g.terminals.iter().map(|t| t.name.as_str()).collect()
    }

    fn productions(g: &Grammar) -> Vec<std::string::String> {
        (0..g.productions.len())
            .map(|i| g.format_production(i))
            .collect()
    }

    #[test]
    fn terminals_in_order_of_first_appearance() {
        let g = grammar("start: B \"x\" A /[0-9]+/\nA: \"a\"\nB: \"b\"\nUNUSED: \"u\"");
        assert_eq!(terminal_names(&g), ["B", "\"x\"", "A", "__ANON_0"]);
        assert_eq!(g.terminals[3].pattern, Pattern::Regex("(?:[0-9]+)".into()));
        assert_eq!(g.terminals[0].pattern, Pattern::Literal("b".into()));
    }

    #[test]
    fn inline_literal_reuses_named_terminal() {
        let g = grammar("start: \"+\" PLUS\nPLUS: \"+\"");
        assert_eq!(terminal_names(&g), ["PLUS"]);
        assert_eq!(productions(&g)[1], "start -> PLUS PLUS");
    }

    #[test]
    fn ebnf_is_lowered_into_inlined_rules() {
        let g = grammar("start: a+ b*\na: \"x\"\nb: \"y\" [\"z\"]");
        assert_eq!(
            productions(&g),
            [
                "$start -> start",
                "start -> __start_plus_0 __start_star_1",
                "start -> __start_plus_0",
                "__start_plus_0 -> a",
                "__start_plus_0 -> __start_plus_0 a",
                "__start_star_1 -> b",
                "__start_star_1 -> __start_star_1 b",
                "a -> \"x\"",
                "b -> \"y\" \"z\"",
                "b -> \"y\"",
            ]
        );
        let aux = &g.nonterminals[4];
        assert_eq!(aux.name.as_str(), "__start_plus_0");
        assert_eq!(aux.expand, Expand::Inline);
    }

    #[test]
    fn helper_rules_get_distinct_names() {
        let g = grammar("start: foo _foo\nfoo: \"a\"+\n_foo: \"b\"+");
        let names: Vec<&str> = g.nonterminals.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(
            names,
            ["$start", "start", "foo", "_foo", "__foo_plus_0", "__foo_plus_1"]
        );
        assert_eq!(
            productions(&g)[2..],
            [
                "foo -> __foo_plus_0",
                "__foo_plus_0 -> \"a\"",
                "__foo_plus_0 -> __foo_plus_0 \"a\"",
                "_foo -> __foo_plus_1",
                "__foo_plus_1 -> \"b\"",
                "__foo_plus_1 -> __foo_plus_1 \"b\"",
            ]
        );

        let g = grammar("start: \"a\"* __start_star_0\n__start_star_0: \"b\"");
        let names: Vec<&str> = g.nonterminals.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["$start", "start", "__start_star_0", "__start_star_1"]);
    }

    #[test]
    fn groups_distribute_and_repeat_expands() {
        let g = grammar("start: (\"a\" | \"b\") \"c\" ~ 1..2 -> pair");
        assert_eq!(
            productions(&g)[1..],
            [
                "start -> \"a\" \"c\"",
                "start -> \"a\" \"c\" \"c\"",
                "start -> \"b\" \"c\"",
                "start -> \"b\" \"c\" \"c\"",
            ]
        );
        assert!(g.productions[1..].iter().all(|p| p.alias.as_deref() == Some("pair")));
    }

    #[test]
    fn rule_shapes_and_token_filters() {
        let text = "?start: _inner | keep\n_inner: _SEP NAME\n!keep: \"k\"\n\
                    _SEP: \";\"\nNAME: /[a-z]+/";
        let g = grammar(text);
        let shape: Vec<(&str, Expand, bool)> = g
            .nonterminals
            .iter()
            .map(|n| (n.name.as_str(), n.expand, n.keep_all_tokens))
            .collect();
        assert_eq!(
            shape,
            [
                ("$start", Expand::Keep, false),
                ("start", Expand::InlineSingle, false),
                ("_inner", Expand::Inline, false),
                ("keep", Expand::Keep, true),
            ]
        );
        let keep: Vec<bool> = g.terminals.iter().map(|t| t.keep).collect();
        assert_eq!(terminal_names(&g), ["_SEP", "NAME", "\"k\""]);
        assert_eq!(keep, [false, true, true]);

        let options = BuildOptions::default().with_keep_all_tokens(false);
        let g = compile(&read(text).unwrap(), &options).unwrap();
        assert!(!g.terminals[2].keep);
    }

    #[test]
    fn terminal_bodies_compile_to_regex() {
        let g = grammar(
            "start: WORD NUM\nWORD.2: LETTER+ (\"-\" LETTER+)?\nLETTER: \"a\"..\"z\"\n\
             NUM: DIGIT ~ 2\nDIGIT: /[0-9]/",
        );
        assert_eq!(terminal_names(&g), ["WORD", "NUM"]);
        assert_eq!(g.terminals[0].priority, 2);
        let Pattern::Regex(word) = &g.terminals[0].pattern else {
            panic!("expected a regex");
        };
        let re = Regex::new(&format!("^(?:{word})$")).unwrap();
        assert!(re.is_match("well-known"));
        assert!(!re.is_match("well-"));
    }

    #[test]
    fn verbose_patterns_keep_their_comments() {
        let g = grammar("start: A\nA: /a+ # letters/x");
        let Pattern::Regex(source) = &g.terminals[0].pattern else {
            panic!("expected a regex");
        };
        assert_eq!(source.as_str(), "(?x:a+ # letters\n)");
        let re = Regex::new(&format!("^(?:{source})$")).unwrap();
        assert!(re.is_match("aaa"));
        assert!(!re.is_match("a+ # letters"));
    }

    #[test]
    fn imports_and_ignores() {
        let g = grammar(
            "start: NUM+\n%import common.SIGNED_NUMBER -> NUM\n%import common (WS)\n%ignore WS\n\
             %ignore /#[^\\n]*/",
        );
        assert_eq!(terminal_names(&g), ["NUM", "WS", "__ANON_0"]);
        let ignored: Vec<bool> = g.terminals.iter().map(|t| t.ignored).collect();
        assert_eq!(ignored, [false, true, true]);
    }

    #[test]
    fn explicit_start_rule() {
        let g = grammar("%start expr\nexpr: \"x\"");
        assert_eq!(productions(&g)[0], "$start -> expr");
        let options = BuildOptions::default().with_start("other");
        let g = compile(&read("start: other\nother: \"y\"").unwrap(), &options).unwrap();
        assert_eq!(productions(&g)[0], "$start -> other");
    }

    #[test]
    fn reports_undefined_and_duplicate_symbols() {
        let err = error("start: a\n");
        assert_eq!(err.message.as_str(), "undefined rule `a`");
        assert_eq!(err.span.unwrap().start.column, 8);

        let err = error("start: A\n");
        assert_eq!(err.message.as_str(), "undefined terminal A");

        let err = error("start: \"x\"\nstart: \"y\"");
        assert!(err.message.contains("more than once"), "{err}");
        assert_eq!(err.span.unwrap().start.line, 2);

        let err = error("rule: \"x\"");
        assert_eq!(err.message.as_str(), "start rule `start` is not defined");

        let err = error("%import common.NOPE\nstart: \"x\"");
        assert!(err.message.contains("cannot import"), "{err}");
    }

    #[test]
    fn rejects_bad_terminals() {
        let err = error("start: A\nA: \"a\" B\nB: A");
        assert!(err.message.contains("in terms of itself"), "{err}");

        let err = error("start: A\nA: /a*/");
        assert!(err.message.contains("empty string"), "{err}");

        let err = error("start: A\nA: /(/");
        assert!(err.message.contains("invalid pattern"), "{err}");

        let err = error("start: WS \"x\"\n%import common.WS\n%ignore WS");
        assert!(err.message.contains("is ignored"), "{err}");

        let err = error("start: A\nA: \"a\" x\nx: \"b\"");
        assert!(err.message.contains("cannot be used inside terminal"), "{err}");
    }

    #[test]
    fn encodes_productions_as_columns() {
        let g = grammar("start: \"a\" b\nb: \"c\"");
        // columns: $start start b | "a" "c" | $END
        assert_eq!(g.encoded(), vec![vec![0, 1], vec![1, 3, 2], vec![2, 4]]);
        assert_eq!(g.token_names(), ["$start", "start", "b", "\"a\"", "\"c\"", "$END"]);
    }
}
