//! Taxonomy-aware unification.
//!
//! Unification here is looser than textbook first-order unification in two
//! deliberate ways:
//!
//! - a non-variable symbol on the pattern side accepts any taxonomic
//!   descendant, so a rule written against `animal` applies to `dog`
//! - compounds unify over their common prefix, so shorter patterns match
//!   longer facts (and trailing strength annotations never block a match)
//!
//! Typed variables (`?human`) gate their binding through
//! [`Taxonomy::isap`](crate::taxonomy::Taxonomy::isap), which is also where
//! `?nonhuman` gets its meaning.

use serde::{Deserialize, Serialize};

use crate::symbol::{SymbolId, SymbolTable};
use crate::taxonomy::Taxonomy;
use crate::term::Term;

/// A set of variable bindings accumulated during unification.
///
/// Small enough in practice that a vector beats a map; lookups scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bindings(Vec<(SymbolId, Term)>);

impl Bindings {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// The value bound to `var`, if any.
    pub fn lookup(&self, var: SymbolId) -> Option<&Term> {
        self.0.iter().find(|(v, _)| *v == var).map(|(_, t)| t)
    }

    /// Bind `var`, replacing any existing binding for it.
    pub fn bind(&mut self, var: SymbolId, value: Term) {
        if let Some(slot) = self.0.iter_mut().find(|(v, _)| *v == var) {
            slot.1 = value;
        } else {
            self.0.push((var, value));
        }
    }

    /// Union of two binding sets; on conflict this set's entries win.
    pub fn merge(&self, other: &Bindings) -> Bindings {
        let mut merged = self.clone();
        for (var, value) in &other.0 {
            if merged.lookup(*var).is_none() {
                merged.0.push((*var, value.clone()));
            }
        }
        merged
    }

    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &Term)> {
        self.0.iter().map(|(v, t)| (*v, t))
    }

    /// Human-readable form, `{?x = jim, ?y = pizza}`.
    pub fn display<'a>(&'a self, symbols: &'a SymbolTable) -> BindingsDisplay<'a> {
        BindingsDisplay {
            bindings: self,
            symbols,
        }
    }
}

pub struct BindingsDisplay<'a> {
    bindings: &'a Bindings,
    symbols: &'a SymbolTable,
}

impl std::fmt::Display for BindingsDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (var, value)) in self.bindings.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(
                f,
                "{} = {}",
                self.symbols.name(*var),
                value.display(self.symbols)
            )?;
        }
        write!(f, "}}")
    }
}

/// Unification over a symbol table and taxonomy.
pub struct Unifier<'a> {
    symbols: &'a SymbolTable,
    taxonomy: &'a Taxonomy,
}

impl<'a> Unifier<'a> {
    pub fn new(symbols: &'a SymbolTable, taxonomy: &'a Taxonomy) -> Self {
        Self { symbols, taxonomy }
    }

    /// Unify two terms under existing bindings.
    ///
    /// `t1` is the pattern side: its symbols accept descendants, and rules
    /// and stored facts go on this side when matched against a goal.
    pub fn unify(&self, t1: &Term, t2: &Term, bd: &Bindings) -> Option<Bindings> {
        if let (Some(s1), Some(s2)) = (t1.as_symbol(), t2.as_symbol()) {
            if self.taxonomy.isa(s1, s2) {
                return Some(bd.clone());
            }
        }
        if t1.is_var(self.symbols) {
            return self.unify_var(t1, t2, bd);
        }
        if t2.is_var(self.symbols) {
            return self.unify_var(t2, t1, bd);
        }
        if let (Term::Compound(e1), Term::Compound(e2)) = (t1, t2) {
            // Common-prefix unification, mirroring the quick filter used by
            // retrieval so the two never disagree.
            let len = e1.len().min(e2.len());
            let mut bd = bd.clone();
            for i in 0..len {
                bd = self.unify(&e1[i], &e2[i], &bd)?;
            }
            return Some(bd);
        }
        match (t1, t2) {
            (Term::Number(a), Term::Number(b)) if a == b => Some(bd.clone()),
            (Term::Str { value: a, .. }, Term::Str { value: b, .. }) if a == b => Some(bd.clone()),
            (Term::Range(a), Term::Range(b)) if a == b => Some(bd.clone()),
            _ => None,
        }
    }

    fn unify_var(&self, var: &Term, other: &Term, bd: &Bindings) -> Option<Bindings> {
        let var_sym = var.as_symbol()?;
        if var == other || self.symbols.is_wildcard(var_sym) || other.is_wildcard(self.symbols) {
            return Some(bd.clone());
        }
        if let Some(value) = bd.lookup(var_sym) {
            let value = value.clone();
            return self.unify(&value, other, bd);
        }
        if let Some(class) = self.symbols.var_class(var_sym) {
            if !self.taxonomy.isap(self.symbols, &Term::Symbol(class), other) {
                return None;
            }
        }
        let mut next = bd.clone();
        next.bind(var_sym, other.clone());
        Some(next)
    }

    /// Cheap pre-filter used by indexed retrieval.
    ///
    /// True when every ground slot of the pattern structurally equals the
    /// fact's slot. A pattern one element longer than the fact still passes
    /// when the extra element is a trailing number.
    pub fn quick_unify(&self, pattern: &Term, fact: &Term) -> bool {
        let (Some(p), Some(f)) = (pattern.elements(), fact.elements()) else {
            return pattern.is_var(self.symbols) || pattern == fact;
        };
        let len = if p.len() < f.len() {
            p.len()
        } else if p.len() == f.len() + 1 {
            match p.last() {
                Some(Term::Number(_)) => f.len(),
                _ => return false,
            }
        } else if p.len() > f.len() {
            return false;
        } else {
            f.len()
        };
        p[..len]
            .iter()
            .zip(&f[..len])
            .all(|(pi, fi)| pi.is_var(self.symbols) || pi == fi)
    }

    /// Replace variables by their bound values, chasing binding chains.
    pub fn instantiate(&self, term: &Term, bd: &Bindings) -> Term {
        if let Some(sym) = term.as_symbol() {
            if self.symbols.is_var(sym) {
                if let Some(value) = bd.lookup(sym) {
                    let value = value.clone();
                    return self.instantiate(&value, bd);
                }
                return term.clone();
            }
        }
        if let Term::Compound(elements) = term {
            return Term::Compound(elements.iter().map(|e| self.instantiate(e, bd)).collect());
        }
        term.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{CoreSymbols, CreatePolicy};

    struct Fixture {
        symbols: SymbolTable,
        taxonomy: Taxonomy,
    }

    fn fixture() -> Fixture {
        let symbols = SymbolTable::new();
        let core = CoreSymbols::resolve(&symbols).unwrap();
        let taxonomy = Taxonomy::new(core, 30);
        Fixture { symbols, taxonomy }
    }

    fn sym(f: &Fixture, name: &str) -> Term {
        Term::Symbol(f.symbols.intern(name, CreatePolicy::CreateAbstract).unwrap())
    }

    #[test]
    fn identical_symbols_unify() {
        let f = fixture();
        let u = Unifier::new(&f.symbols, &f.taxonomy);
        let dog = sym(&f, "dog");
        assert!(u.unify(&dog, &dog, &Bindings::new()).is_some());
    }

    #[test]
    fn ancestor_pattern_accepts_descendant() {
        let f = fixture();
        let dog = sym(&f, "dog");
        let animal = sym(&f, "animal");
        f.taxonomy
            .add_isa(&f.symbols, dog.as_symbol().unwrap(), animal.as_symbol().unwrap())
            .unwrap();
        let u = Unifier::new(&f.symbols, &f.taxonomy);
        assert!(u.unify(&animal, &dog, &Bindings::new()).is_some());
        // Only the pattern side generalizes.
        assert!(u.unify(&dog, &animal, &Bindings::new()).is_none());
    }

    #[test]
    fn variable_binds_and_is_consistent() {
        let f = fixture();
        let u = Unifier::new(&f.symbols, &f.taxonomy);
        let x = sym(&f, "?x");
        let likes = sym(&f, "likes");
        let jim = sym(&f, "jim");
        let pizza = sym(&f, "pizza");
        let pattern = Term::compound(vec![likes.clone(), x.clone(), x.clone()]);
        let same = Term::compound(vec![likes.clone(), jim.clone(), jim.clone()]);
        let mixed = Term::compound(vec![likes.clone(), jim.clone(), pizza.clone()]);

        let bd = u.unify(&pattern, &same, &Bindings::new()).unwrap();
        assert_eq!(bd.lookup(x.as_symbol().unwrap()), Some(&jim));
        assert!(u.unify(&pattern, &mixed, &Bindings::new()).is_none());
    }

    #[test]
    fn wildcard_matches_without_binding() {
        let f = fixture();
        let u = Unifier::new(&f.symbols, &f.taxonomy);
        let wild = sym(&f, "?");
        let jim = sym(&f, "jim");
        let bd = u.unify(&wild, &jim, &Bindings::new()).unwrap();
        assert!(bd.is_empty());
    }

    #[test]
    fn typed_variable_enforces_class() {
        let f = fixture();
        let jim = sym(&f, "jim");
        let pizza = sym(&f, "pizza");
        let human = f.symbols.lookup("human").unwrap();
        f.taxonomy
            .add_isa(&f.symbols, jim.as_symbol().unwrap(), human)
            .unwrap();
        let var = sym(&f, "?human");
        let u = Unifier::new(&f.symbols, &f.taxonomy);
        assert!(u.unify(&var, &jim, &Bindings::new()).is_some());
        assert!(u.unify(&var, &pizza, &Bindings::new()).is_none());
    }

    #[test]
    fn nonhuman_variable_rejects_humans() {
        let f = fixture();
        let jim = sym(&f, "jim");
        let rock = sym(&f, "rock");
        let human = f.symbols.lookup("human").unwrap();
        f.taxonomy
            .add_isa(&f.symbols, jim.as_symbol().unwrap(), human)
            .unwrap();
        let var = sym(&f, "?nonhuman");
        let u = Unifier::new(&f.symbols, &f.taxonomy);
        assert!(u.unify(&var, &jim, &Bindings::new()).is_none());
        assert!(u.unify(&var, &rock, &Bindings::new()).is_some());
    }

    #[test]
    fn bound_variable_must_agree() {
        let f = fixture();
        let u = Unifier::new(&f.symbols, &f.taxonomy);
        let x = sym(&f, "?x");
        let jim = sym(&f, "jim");
        let pizza = sym(&f, "pizza");
        let mut bd = Bindings::new();
        bd.bind(x.as_symbol().unwrap(), jim.clone());
        assert!(u.unify(&x, &jim, &bd).is_some());
        assert!(u.unify(&x, &pizza, &bd).is_none());
    }

    #[test]
    fn numbers_unify_by_value() {
        let f = fixture();
        let u = Unifier::new(&f.symbols, &f.taxonomy);
        assert!(u.unify(&Term::Number(5.0), &Term::Number(5.0), &Bindings::new()).is_some());
        assert!(u.unify(&Term::Number(5.0), &Term::Number(6.0), &Bindings::new()).is_none());
    }

    #[test]
    fn prefix_unification_tolerates_trailing_weight() {
        let f = fixture();
        let u = Unifier::new(&f.symbols, &f.taxonomy);
        let likes = sym(&f, "likes");
        let jim = sym(&f, "jim");
        let pizza = sym(&f, "pizza");
        let x = sym(&f, "?x");
        let pattern = Term::compound(vec![likes.clone(), jim.clone(), x.clone()]);
        let weighted = Term::compound(vec![likes, jim, pizza.clone(), Term::Number(0.9)]);
        let bd = u.unify(&pattern, &weighted, &Bindings::new()).unwrap();
        assert_eq!(bd.lookup(x.as_symbol().unwrap()), Some(&pizza));
    }

    #[test]
    fn quick_unify_filters_on_ground_slots() {
        let f = fixture();
        let u = Unifier::new(&f.symbols, &f.taxonomy);
        let likes = sym(&f, "likes");
        let jim = sym(&f, "jim");
        let pizza = sym(&f, "pizza");
        let beer = sym(&f, "beer");
        let wild = sym(&f, "?");
        let fact = Term::compound(vec![likes.clone(), jim.clone(), pizza.clone()]);

        let hit = Term::compound(vec![likes.clone(), jim.clone(), wild.clone()]);
        assert!(u.quick_unify(&hit, &fact));

        let miss = Term::compound(vec![likes.clone(), jim.clone(), beer.clone()]);
        assert!(!u.quick_unify(&miss, &fact));

        // One extra trailing number is a strength annotation, not a mismatch.
        let weighted = Term::compound(vec![likes.clone(), jim.clone(), pizza.clone(), Term::Number(0.9)]);
        assert!(u.quick_unify(&weighted, &fact));

        // Longer by a non-number is a real arity mismatch.
        let too_long = Term::compound(vec![likes, jim, pizza, beer]);
        assert!(!u.quick_unify(&too_long, &fact));
    }

    #[test]
    fn instantiate_chases_binding_chains() {
        let f = fixture();
        let u = Unifier::new(&f.symbols, &f.taxonomy);
        let x = sym(&f, "?x");
        let y = sym(&f, "?y");
        let jim = sym(&f, "jim");
        let likes = sym(&f, "likes");
        let mut bd = Bindings::new();
        bd.bind(x.as_symbol().unwrap(), y.clone());
        bd.bind(y.as_symbol().unwrap(), jim.clone());
        let goal = Term::compound(vec![likes.clone(), x.clone()]);
        let ground = u.instantiate(&goal, &bd);
        assert_eq!(ground, Term::compound(vec![likes, jim]));
    }

    #[test]
    fn merge_prefers_own_bindings() {
        let f = fixture();
        let x = sym(&f, "?x").as_symbol().unwrap();
        let y = sym(&f, "?y").as_symbol().unwrap();
        let jim = sym(&f, "jim");
        let pizza = sym(&f, "pizza");
        let mut a = Bindings::new();
        a.bind(x, jim.clone());
        let mut b = Bindings::new();
        b.bind(x, pizza.clone());
        b.bind(y, pizza.clone());
        let merged = a.merge(&b);
        assert_eq!(merged.lookup(x), Some(&jim));
        assert_eq!(merged.lookup(y), Some(&pizza));
    }
}
