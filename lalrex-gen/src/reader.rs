//! Recursive-descent reader for grammar descriptions.
//!
//! Statements are line-oriented: a statement ends at a newline unless the
//! next non-blank line starts with `|`, which continues the alternatives of
//! the current definition. Newlines inside `( ... )` and `[ ... ]` are
//! insignificant.

use crate::ast::{Alternative, Expr, Import, RuleDef, RuleModifiers, Statement, TermDef};
use crate::lexer::{Token, TokenKind, tokenize_all};
use lalrex::{GrammarError, Position, Span};
use smartstring::alias::String;

/// Reads `input` into a list of statements.
pub fn read(input: &str) -> Result<Vec<Statement>, GrammarError> {
    let tokens = tokenize_all(input)?;
    let end = Position::locate(input, input.len());
    let mut reader = Reader {
        tokens: &tokens,
        pos: 0,
        depth: 0,
        last: Span::new(end, end),
        eof: Span::new(end, end),
    };
    reader.statements()
}

struct Reader<'a> {
    tokens: &'a [Token],
    pos: usize,
    /// Nesting of brackets; newlines are skipped while it is positive.
    depth: usize,
    /// Span of the last consumed token.
    last: Span,
    eof: Span,
}

impl<'a> Reader<'a> {
    fn statements(&mut self) -> Result<Vec<Statement>, GrammarError> {
        let mut out = Vec::new();
        while let Some(kind) = self.peek() {
            let statement = match kind {
                TokenKind::Newline => {
                    self.pos += 1;
                    continue;
                }
                TokenKind::Bang | TokenKind::Question | TokenKind::Rule => {
                    Statement::Rule(self.rule_def()?)
                }
                TokenKind::Term => Statement::Term(self.term_def()?),
                TokenKind::Directive => self.directive()?,
                _ => return Err(self.unexpected("a rule, terminal or directive")),
            };
            out.push(statement);
            match self.peek() {
                None | Some(TokenKind::Newline) => {}
                Some(_) => return Err(self.unexpected("end of line")),
            }
        }
        Ok(out)
    }

    fn peek(&mut self) -> Option<TokenKind> {
        if self.depth > 0 {
            while self
                .tokens
                .get(self.pos)
                .is_some_and(|t| t.kind == TokenKind::Newline)
            {
                self.pos += 1;
            }
        }
        self.tokens.get(self.pos).map(|t| t.kind)
    }

    fn next(&mut self) -> Option<&'a Token> {
        self.peek()?;
        let token = &self.tokens[self.pos];
        self.pos += 1;
        self.last = token.span;
        Some(token)
    }

    /// Span of the next token, or the end of input.
    fn here(&mut self) -> Span {
        self.peek();
        self.tokens.get(self.pos).map_or(self.eof, |t| t.span)
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.peek() == Some(kind) {
            self.next();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<&'a Token, GrammarError> {
        if self.peek() == Some(kind) {
            if let Some(token) = self.next() {
                return Ok(token);
            }
        }
        Err(self.unexpected(kind.describe()))
    }

    fn unexpected(&mut self, expected: &str) -> GrammarError {
        let span = self.here();
        let found = match self.tokens.get(self.pos) {
            Some(t) if t.kind == TokenKind::Newline => "end of line".into(),
            Some(t) => format!("{:?}", t.text.as_str()),
            None => "end of input".into(),
        };
        GrammarError::new(format!("expected {expected}, found {found}"), Some(span))
    }

    /// Consumes a `|` that continues the current definition, possibly on a
    /// following line.
    fn continue_with_pipe(&mut self) -> bool {
        let mut i = self.pos;
        while self
            .tokens
            .get(i)
            .is_some_and(|t| t.kind == TokenKind::Newline)
        {
            i += 1;
        }
        match self.tokens.get(i) {
            Some(t) if t.kind == TokenKind::Pipe => {
                self.pos = i + 1;
                self.last = t.span;
                true
            }
            _ => false,
        }
    }

    fn priority(&mut self) -> Result<Option<i32>, GrammarError> {
        if !self.eat(TokenKind::Dot) {
            return Ok(None);
        }
        let token = self.expect(TokenKind::Number)?;
        token.text.parse::<i32>().map(Some).map_err(|_| {
            GrammarError::new(
                format!("invalid priority {:?}", token.text.as_str()),
                Some(token.span),
            )
        })
    }

    fn rule_def(&mut self) -> Result<RuleDef, GrammarError> {
        let start = self.here();
        let mut modifiers = RuleModifiers::default();
        loop {
            if self.eat(TokenKind::Bang) {
                modifiers.keep_all_tokens = true;
            } else if self.eat(TokenKind::Question) {
                modifiers.inline_single = true;
            } else {
                break;
            }
        }
        let name = self.expect(TokenKind::Rule)?;
        if let Some(priority) = self.priority()? {
            log::warn!(
                "rule `{}`: priority {} has no effect on an LALR(1) parser",
                name.text,
                priority
            );
        }
        self.expect(TokenKind::Colon)?;
        let alternatives = self.alternatives()?;
        Ok(RuleDef {
            name: name.text.clone(),
            modifiers,
            alternatives,
            span: start.merge(&name.span),
        })
    }

    fn term_def(&mut self) -> Result<TermDef, GrammarError> {
        let name = self.expect(TokenKind::Term)?;
        let priority = self.priority()?.unwrap_or(0);
        self.expect(TokenKind::Colon)?;
        let alternatives = self.alternatives()?;
        if let Some(alt) = alternatives.iter().find(|a| a.alias.is_some()) {
            return Err(GrammarError::new(
                format!("terminal {} cannot have an alias", name.text),
                Some(alt.span),
            ));
        }
        Ok(TermDef {
            name: name.text.clone(),
            priority,
            expr: join_alternatives(alternatives),
            span: name.span,
        })
    }

    fn directive(&mut self) -> Result<Statement, GrammarError> {
        let token = self.expect(TokenKind::Directive)?;
        match token.text.as_str() {
            "%ignore" => {
                let alternatives = self.alternatives()?;
                Ok(Statement::Ignore(join_alternatives(alternatives), token.span))
            }
            "%start" => {
                let name = self.expect(TokenKind::Rule)?;
                Ok(Statement::Start(name.text.clone(), name.span))
            }
            "%import" => self.import(token.span).map(Statement::Import),
            other => Err(GrammarError::new(
                format!("unsupported directive `{other}`"),
                Some(token.span),
            )),
        }
    }

    fn import(&mut self, start: Span) -> Result<Import, GrammarError> {
        let mut path = vec![self.expect(TokenKind::Rule)?.text.clone()];
        while self.eat(TokenKind::Dot) {
            path.push(self.import_name()?);
        }

        let names = if self.eat(TokenKind::LParen) {
            self.depth += 1;
            let mut names = Vec::new();
            loop {
                let name = self.import_name()?;
                names.push((name.clone(), name));
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RParen)?;
            self.depth -= 1;
            names
        } else {
            if path.len() < 2 {
                return Err(self.unexpected("`.` and a name to import"));
            }
            let name = path.pop().unwrap_or_default();
            let local = if self.eat(TokenKind::Arrow) {
                self.import_name()?
            } else {
                name.clone()
            };
            vec![(name, local)]
        };

        Ok(Import {
            module: path.join(".").into(),
            names,
            span: start.merge(&self.last),
        })
    }

    fn import_name(&mut self) -> Result<String, GrammarError> {
        match self.peek() {
            Some(TokenKind::Term | TokenKind::Rule) => {
                Ok(self.next().map(|t| t.text.clone()).unwrap_or_default())
            }
            _ => Err(self.unexpected("a name")),
        }
    }

    /// Alternatives of a definition, separated by `|`.
    fn alternatives(&mut self) -> Result<Vec<Alternative>, GrammarError> {
        // `name:` followed by `|` on the next line starts with that alternative
        if self.peek() == Some(TokenKind::Newline) {
            self.continue_with_pipe();
        }
        let mut alternatives = vec![self.alternative()?];
        while self.continue_with_pipe() {
            alternatives.push(self.alternative()?);
        }
        Ok(alternatives)
    }

    fn alternative(&mut self) -> Result<Alternative, GrammarError> {
        let first = self.here();
        let consumed_before = self.pos;
        let expr = self.expansion()?;
        let alias = if self.eat(TokenKind::Arrow) {
            Some(self.expect(TokenKind::Rule)?.text.clone())
        } else {
            None
        };
        let span = if self.pos > consumed_before {
            Span::new(first.start, self.last.end)
        } else {
            Span::new(first.start, first.start)
        };
        Ok(Alternative { expr, alias, span })
    }

    /// A sequence of expressions.
    fn expansion(&mut self) -> Result<Expr, GrammarError> {
        let mut items = Vec::new();
        while let Some(kind) = self.peek() {
            match kind {
                TokenKind::Pipe
                | TokenKind::RParen
                | TokenKind::RBrack
                | TokenKind::Arrow
                | TokenKind::Newline => break,
                _ => items.push(self.expr()?),
            }
        }
        Ok(if items.len() == 1 {
            items.remove(0)
        } else {
            Expr::Seq(items)
        })
    }

    fn expr(&mut self) -> Result<Expr, GrammarError> {
        let atom = self.atom()?;
        Ok(match self.peek() {
            Some(TokenKind::Question) => {
                self.next();
                Expr::Optional(Box::new(atom))
            }
            Some(TokenKind::Star) => {
                self.next();
                Expr::Star(Box::new(atom))
            }
            Some(TokenKind::Plus) => {
                self.next();
                Expr::Plus(Box::new(atom))
            }
            Some(TokenKind::Tilde) => {
                self.next();
                let min = self.count()?;
                let max = if self.eat(TokenKind::DotDot) {
                    self.count()?
                } else {
                    min
                };
                if max < min {
                    return Err(GrammarError::new(
                        format!("empty repetition range {min}..{max}"),
                        Some(self.last),
                    ));
                }
                Expr::Repeat(Box::new(atom), min, max)
            }
            _ => atom,
        })
    }

    fn count(&mut self) -> Result<usize, GrammarError> {
        let token = self.expect(TokenKind::Number)?;
        token.text.parse::<usize>().map_err(|_| {
            GrammarError::new(
                format!("invalid repetition count {:?}", token.text.as_str()),
                Some(token.span),
            )
        })
    }

    fn atom(&mut self) -> Result<Expr, GrammarError> {
        match self.peek() {
            Some(TokenKind::LParen) => {
                self.next();
                let expr = self.group(TokenKind::RParen)?;
                Ok(expr)
            }
            Some(TokenKind::LBrack) => {
                self.next();
                let expr = self.group(TokenKind::RBrack)?;
                Ok(Expr::Optional(Box::new(expr)))
            }
            Some(TokenKind::Rule | TokenKind::Term) => {
                let token = self.expect_any()?;
                Ok(Expr::Name(token.text.clone(), token.span))
            }
            Some(TokenKind::Literal) => {
                let token = self.expect_any()?;
                let (text, insensitive) = unquote(token)?;
                if !self.eat(TokenKind::DotDot) {
                    return Ok(Expr::Literal {
                        text,
                        insensitive,
                        span: token.span,
                    });
                }
                let upper = self.expect(TokenKind::Literal)?;
                let (upper_text, _) = unquote(upper)?;
                let span = token.span.merge(&upper.span);
                match (single_char(&text), single_char(&upper_text)) {
                    (Some(lo), Some(hi)) if lo <= hi => Ok(Expr::Range(lo, hi, span)),
                    _ => Err(GrammarError::new(
                        format!("invalid range {:?}..{:?}", text.as_str(), upper_text.as_str()),
                        Some(span),
                    )),
                }
            }
            Some(TokenKind::Regexp) => {
                let token = self.expect_any()?;
                let (source, flags) = split_regexp(&token.text);
                if let Some(flag) = flags.chars().find(|c| !matches!(c, 'i' | 'm' | 's' | 'x')) {
                    return Err(GrammarError::new(
                        format!("unsupported regex flag `{flag}`"),
                        Some(token.span),
                    ));
                }
                Ok(Expr::Regex {
                    source,
                    flags,
                    span: token.span,
                })
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn expect_any(&mut self) -> Result<&'a Token, GrammarError> {
        match self.next() {
            Some(token) => Ok(token),
            None => Err(self.unexpected("a token")),
        }
    }

    /// Alternatives inside brackets, up to and including `close`.
    fn group(&mut self, close: TokenKind) -> Result<Expr, GrammarError> {
        self.depth += 1;
        let mut alternatives = vec![self.expansion()?];
        while self.eat(TokenKind::Pipe) {
            alternatives.push(self.expansion()?);
        }
        self.expect(close)?;
        self.depth -= 1;
        Ok(if alternatives.len() == 1 {
            alternatives.remove(0)
        } else {
            Expr::Alt(alternatives)
        })
    }
}

fn join_alternatives(mut alternatives: Vec<Alternative>) -> Expr {
    if alternatives.len() == 1 {
        alternatives.remove(0).expr
    } else {
        Expr::Alt(alternatives.into_iter().map(|a| a.expr).collect())
    }
}

fn single_char(text: &str) -> Option<char> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

/// Splits `/source/flags`, unescaping `\/`.
fn split_regexp(text: &str) -> (String, String) {
    let close = text.rfind('/').unwrap_or(text.len());
    let body = text.get(1..close).unwrap_or("");
    let flags: String = text.get(close + 1..).unwrap_or("").into();

    let mut source = String::new();
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            source.push(c);
            continue;
        }
        match chars.next() {
            Some('/') => source.push('/'),
            Some(next) => {
                source.push('\\');
                source.push(next);
            }
            None => source.push('\\'),
        }
    }
    (source, flags)
}

/// Decodes a `"..."` literal token, returning its text and the `i` flag.
fn unquote(token: &Token) -> Result<(String, bool), GrammarError> {
    let raw = token.text.as_str();
    let insensitive = raw.ends_with('i');
    let end = raw.len() - if insensitive { 2 } else { 1 };
    let body = raw.get(1..end).unwrap_or("");
    let bad_escape = |what: &str| {
        GrammarError::new(format!("invalid escape {what} in literal"), Some(token.span))
    };

    let mut text = String::new();
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            text.push(c);
            continue;
        }
        let Some(esc) = chars.next() else {
            return Err(bad_escape("at end"));
        };
        let decoded = match esc {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'f' => '\x0c',
            'v' => '\x0b',
            'a' => '\x07',
            'b' => '\x08',
            '0' => '\0',
            '\\' | '"' | '\'' => esc,
            'x' | 'u' | 'U' => {
                let width = match esc {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let digits: std::string::String = chars.by_ref().take(width).collect();
                u32::from_str_radix(&digits, 16)
                    .ok()
                    .filter(|_| digits.len() == width)
                    .and_then(char::from_u32)
                    .ok_or_else(|| bad_escape(&format!("\\{esc}{digits}")))?
            }
            other => {
                text.push('\\');
                other
            }
        };
        text.push(decoded);
    }
    Ok((text, insensitive))
}
