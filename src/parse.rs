//! The textual term reader.
//!
//! Terms are written in bracket syntax: `[relation arg1 arg2 ...]`, with
//! `?` as the anonymous wildcard, `?name` as a class-constrained variable,
//! `"..."` string literals, bare numbers, and `@start:stop` time-range
//! values. A line may carry a leading `@range|` prefix scoping the term it
//! introduces, and `;` starts a comment.
//!
//! The reader is line-oriented because the knowledge files are: one term
//! per line, blank lines and comments skipped. [`parse_term`] is the
//! strict single-term entry; [`parse_line`] adds the prefix and comment
//! handling the loader wants.

use crate::context::ContextId;
use crate::error::{ParseError, RekhResult};
use crate::symbol::{CreatePolicy, SymbolTable};
use crate::temporal::TimeRange;
use crate::term::Term;

/// One meaningful line of a knowledge file.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLine {
    /// Range from a `@...|` prefix, if the line had one.
    pub range: Option<TimeRange>,
    pub term: Term,
}

/// Parse exactly one term from `input`. Anything left over is an error.
pub fn parse_term(symbols: &SymbolTable, input: &str) -> RekhResult<Term> {
    let mut parser = Parser::new(symbols, input);
    parser.skip_whitespace();
    let term = parser.term()?;
    parser.skip_whitespace();
    if !parser.at_end() {
        return Err(ParseError::TrailingInput {
            text: parser.rest(),
        }
        .into());
    }
    Ok(term)
}

/// Parse a knowledge-file line in context `cx`.
///
/// Blank lines and `;` comments yield `Ok(None)`. A `@range|` prefix is
/// resolved against `cx`; a trailing comment after the term is ignored.
pub fn parse_line(
    symbols: &SymbolTable,
    line: &str,
    cx: ContextId,
) -> RekhResult<Option<ParsedLine>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with(';') {
        return Ok(None);
    }
    let (range, body) = match trimmed.strip_prefix('@') {
        Some(after) => {
            let Some((spec, body)) = after.split_once('|') else {
                return Err(ParseError::BadRange {
                    text: trimmed.to_string(),
                }
                .into());
            };
            let range = TimeRange::parse(spec, cx).map_err(ParseError::from)?;
            (Some(range), body)
        }
        None => (None, trimmed),
    };
    let mut parser = Parser::new(symbols, body);
    parser.skip_whitespace();
    let term = parser.term()?;
    parser.skip_whitespace();
    if !parser.at_end() && !parser.rest().starts_with(';') {
        return Err(ParseError::TrailingInput {
            text: parser.rest(),
        }
        .into());
    }
    Ok(Some(ParsedLine { range, term }))
}

struct Parser<'a> {
    symbols: &'a SymbolTable,
    chars: Vec<char>,
    pos: usize,
    input: &'a str,
}

impl<'a> Parser<'a> {
    fn new(symbols: &'a SymbolTable, input: &'a str) -> Self {
        Self {
            symbols,
            chars: input.chars().collect(),
            pos: 0,
            input,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        Some(ch)
    }

    fn rest(&self) -> String {
        self.chars[self.pos.min(self.chars.len())..]
            .iter()
            .collect()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn term(&mut self) -> RekhResult<Term> {
        self.skip_whitespace();
        match self.peek() {
            None => Err(ParseError::EmptyTerm.into()),
            Some('[') => self.compound(),
            Some(']') => Err(ParseError::Unbalanced {
                text: self.input.to_string(),
            }
            .into()),
            Some('"') => self.string(),
            Some(_) => self.atom(),
        }
    }

    fn compound(&mut self) -> RekhResult<Term> {
        self.bump();
        let mut elements = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => {
                    return Err(ParseError::Unbalanced {
                        text: self.input.to_string(),
                    }
                    .into());
                }
                Some(']') => {
                    self.bump();
                    return Ok(Term::Compound(elements));
                }
                Some(_) => elements.push(self.term()?),
            }
        }
    }

    fn string(&mut self) -> RekhResult<Term> {
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                None => {
                    return Err(ParseError::UnterminatedString {
                        text: self.input.to_string(),
                    }
                    .into());
                }
                Some('"') => break,
                Some('\\') => match self.bump() {
                    None => {
                        return Err(ParseError::UnterminatedString {
                            text: self.input.to_string(),
                        }
                        .into());
                    }
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some(other) => value.push(other),
                },
                Some(other) => value.push(other),
            }
        }
        let class = self.symbols.intern("string", CreatePolicy::CreateAbstract)?;
        Ok(Term::Str { value, class })
    }

    fn atom(&mut self) -> RekhResult<Term> {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() || matches!(ch, '[' | ']' | '"') {
                break;
            }
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if text.is_empty() {
            return Err(ParseError::EmptyTerm.into());
        }
        // Time-range values carry the root context; only a fact's truth
        // range is context-scoped.
        if let Some(spec) = text.strip_prefix('@') {
            let range = TimeRange::parse(spec, ContextId::ROOT).map_err(ParseError::from)?;
            return Ok(Term::Range(range));
        }
        if looks_numeric(&text) {
            if let Ok(n) = text.parse::<f64>() {
                return Ok(Term::Number(n));
            }
        }
        let id = self.symbols.intern(&text, CreatePolicy::CreateAbstract)?;
        Ok(Term::Symbol(id))
    }
}

/// Whether a token should even be tried as a number. Keeps words like
/// `inf` and version-ish names out of `f64::parse`.
fn looks_numeric(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(ch) if ch.is_ascii_digit() => true,
        Some('-' | '+' | '.') => chars.next().is_some_and(|c| c.is_ascii_digit() || c == '.'),
        _ => false,
    }
}
