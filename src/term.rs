//! Terms, the value language of the knowledge base.
//!
//! A [`Term`] is either atomic (symbol, number, typed string, time range) or
//! a compound `[relation arg1 arg2 ...]` whose first element names the
//! relation. Propositions, rule bodies, and query patterns are all the same
//! compound shape; what distinguishes a pattern is that it contains variable
//! symbols (`?x`, `?human`, or the bare wildcard `?`).

use serde::{Deserialize, Serialize};

use crate::symbol::{SymbolId, SymbolTable};
use crate::temporal::TimeRange;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Term {
    /// An interned symbol.
    Symbol(SymbolId),
    /// `[relation arg1 arg2 ...]`; the relation itself is element 0.
    Compound(Vec<Term>),
    /// A numeric value.
    Number(f64),
    /// A string literal typed by a class symbol.
    Str { value: String, class: SymbolId },
    /// A time range used as a value (distinct from a fact's truth range).
    Range(TimeRange),
}

impl Term {
    pub fn compound(elements: Vec<Term>) -> Self {
        Term::Compound(elements)
    }

    /// Element 0 of a compound.
    pub fn head(&self) -> Option<&Term> {
        match self {
            Term::Compound(elements) => elements.first(),
            _ => None,
        }
    }

    /// The relation symbol of a compound, when its head is a symbol.
    pub fn rel(&self) -> Option<SymbolId> {
        self.head().and_then(Term::as_symbol)
    }

    /// Element `i` of a compound (0 is the relation).
    pub fn arg(&self, i: usize) -> Option<&Term> {
        match self {
            Term::Compound(elements) => elements.get(i),
            _ => None,
        }
    }

    pub fn elements(&self) -> Option<&[Term]> {
        match self {
            Term::Compound(elements) => Some(elements),
            _ => None,
        }
    }

    /// Number of elements of a compound; atomic terms have length 0.
    pub fn len(&self) -> usize {
        match self {
            Term::Compound(elements) => elements.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_compound(&self) -> bool {
        matches!(self, Term::Compound(_))
    }

    pub fn as_symbol(&self) -> Option<SymbolId> {
        match self {
            Term::Symbol(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Term::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Whether this term is a variable symbol.
    pub fn is_var(&self, symbols: &SymbolTable) -> bool {
        self.as_symbol().map(|id| symbols.is_var(id)).unwrap_or(false)
    }

    /// Whether this term is the bare wildcard `?`.
    pub fn is_wildcard(&self, symbols: &SymbolTable) -> bool {
        self.as_symbol()
            .map(|id| symbols.is_wildcard(id))
            .unwrap_or(false)
    }

    /// Copy of a compound with element `i` replaced.
    ///
    /// Non-compounds and out-of-range slots return the term unchanged.
    pub fn with_element(&self, i: usize, replacement: Term) -> Term {
        match self {
            Term::Compound(elements) if i < elements.len() => {
                let mut copy = elements.clone();
                copy[i] = replacement;
                Term::Compound(copy)
            }
            other => other.clone(),
        }
    }

    /// Structural replacement of every occurrence of `from` with `to`.
    pub fn substitute(&self, from: &Term, to: &Term) -> Term {
        if self == from {
            return to.clone();
        }
        match self {
            Term::Compound(elements) => Term::Compound(
                elements.iter().map(|e| e.substitute(from, to)).collect(),
            ),
            other => other.clone(),
        }
    }

    /// Replacement of every subterm the pattern describes with `to`.
    ///
    /// Unlike [`Term::substitute`] the match is one-way: variables in the
    /// pattern accept any value, ground slots must be equal.
    pub fn substitute_similar(&self, symbols: &SymbolTable, pattern: &Term, to: &Term) -> Term {
        if self.similar(symbols, pattern) {
            return to.clone();
        }
        match self {
            Term::Compound(elements) => Term::Compound(
                elements
                    .iter()
                    .map(|e| e.substitute_similar(symbols, pattern, to))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// One-way structural match: does `pattern` describe this term?
    pub fn similar(&self, symbols: &SymbolTable, pattern: &Term) -> bool {
        if pattern.is_var(symbols) {
            return true;
        }
        match (pattern, self) {
            (Term::Compound(ps), Term::Compound(ts)) => {
                ps.len() == ts.len() && ts.iter().zip(ps).all(|(t, p)| t.similar(symbols, p))
            }
            _ => pattern == self,
        }
    }

    /// A trailing numeric strength annotation, if present.
    ///
    /// `[likes jim pizza 0.9]` carries weight 0.9; a two-element compound
    /// never does, since its single argument is a real argument.
    pub fn trailing_weight(&self) -> Option<f64> {
        match self {
            Term::Compound(elements) if elements.len() > 2 => {
                elements.last().and_then(Term::as_number)
            }
            _ => None,
        }
    }

    /// Copy without the trailing weight annotation, if one is present.
    pub fn without_trailing_weight(&self) -> Term {
        if self.trailing_weight().is_some() {
            if let Term::Compound(elements) = self {
                return Term::Compound(elements[..elements.len() - 1].to_vec());
            }
        }
        self.clone()
    }

    /// Displayable form resolving symbol IDs to names through `symbols`.
    pub fn display<'a>(&'a self, symbols: &'a SymbolTable) -> TermDisplay<'a> {
        TermDisplay {
            term: self,
            symbols,
        }
    }
}

/// Renders a term in bracket syntax, e.g. `[red ball1 0.9]`.
pub struct TermDisplay<'a> {
    term: &'a Term,
    symbols: &'a SymbolTable,
}

impl std::fmt::Display for TermDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.term {
            Term::Symbol(id) => write!(f, "{}", self.symbols.name(*id)),
            Term::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                    write!(f, "{n:.0}")
                } else {
                    write!(f, "{n}")
                }
            }
            Term::Str { value, .. } => {
                write!(f, "\"")?;
                for ch in value.chars() {
                    match ch {
                        '"' => write!(f, "\\\"")?,
                        '\\' => write!(f, "\\\\")?,
                        other => write!(f, "{other}")?,
                    }
                }
                write!(f, "\"")
            }
            Term::Range(range) => write!(f, "{range}"),
            Term::Compound(elements) => {
                write!(f, "[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", element.display(self.symbols))?;
                }
                write!(f, "]")
            }
        }
    }
}
