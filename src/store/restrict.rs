//! Selectional restrictions on relation arguments.
//!
//! A restriction is an ordinary assertion `[r1 rel class]` (`r2` for the
//! second argument, and so on) declaring the class an argument of `rel`
//! must belong to. Validation is soft: violations are logged and the
//! assertion proceeds, since commonsense input is noisy and a wrong guess
//! by the caller is better surfaced than silently dropped.

use tracing::{debug, warn};

use crate::context::ContextId;
use crate::symbol::SymbolId;
use crate::temporal::Timestamp;
use crate::term::Term;

use super::Store;

/// Restrictions apply to argument slots 1 through 4.
const MAX_RESTRICT_SLOT: usize = 4;

impl Store {
    /// The declared argument-class restriction for slot `slot` of `rel`.
    ///
    /// Looked up timelessly, widening `rel` up the taxonomy so a relation
    /// inherits the restrictions of its generalizations. `concept` (the
    /// taxonomy root, satisfied by anything) when none is declared.
    pub fn restriction_for(&self, cx: ContextId, rel: SymbolId, slot: usize) -> SymbolId {
        let Some(slot_rel) = slot
            .checked_sub(1)
            .and_then(|i| self.core.restrict_slots.get(i))
        else {
            warn!("restriction lookup for argument slot {slot}");
            return self.core.concept;
        };
        let pattern = Term::Compound(vec![
            Term::Symbol(*slot_rel),
            Term::Symbol(rel),
            Term::Symbol(self.core.wildcard),
        ]);
        self.retrieve_anc(Timestamp::Na, None, cx, &pattern, 1, true, self.widen_depth)
            .first()
            .and_then(|f| f.element(2))
            .and_then(Term::as_symbol)
            .unwrap_or(self.core.concept)
    }

    /// Whether any restriction is declared for slot `slot` of `rel`.
    pub fn has_restriction(&self, cx: ContextId, rel: SymbolId, slot: usize) -> bool {
        self.restriction_for(cx, rel, slot) != self.core.concept
    }

    /// Check a proposition's arguments against the restrictions declared
    /// for its relation. Log-only; never blocks the assertion.
    pub(crate) fn validate_restrictions(&self, elements: &[Term], cx: ContextId) {
        let Some(rel) = elements.first().and_then(Term::as_symbol) else {
            return;
        };
        for slot in 1..=MAX_RESTRICT_SLOT {
            let class = self.restriction_for(cx, rel, slot);
            if class == self.core.concept {
                continue;
            }
            let Some(value) = elements.get(slot) else {
                debug!(
                    "slot {} with restriction to {} is empty: {}",
                    slot,
                    self.symbols.name(class),
                    Term::Compound(elements.to_vec()).display(&self.symbols)
                );
                continue;
            };
            if !self.taxonomy.isap(&self.symbols, &Term::Symbol(class), value) {
                warn!(
                    "{} slot #{} {} is not {}",
                    self.symbols.name(rel),
                    slot,
                    value.display(&self.symbols),
                    self.symbols.name(class)
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::context::ContextTree;
    use crate::symbol::{CoreSymbols, CreatePolicy, SymbolTable};
    use crate::taxonomy::Taxonomy;
    use crate::temporal::TimeRange;

    use super::*;

    fn store() -> Store {
        let symbols = Arc::new(SymbolTable::new());
        let core = CoreSymbols::resolve(&symbols).unwrap();
        let taxonomy = Arc::new(Taxonomy::new(core, 30));
        let contexts = Arc::new(ContextTree::new());
        Store::new(symbols, taxonomy, contexts).unwrap()
    }

    fn sym(store: &Store, name: &str) -> SymbolId {
        store
            .symbols()
            .intern(name, CreatePolicy::CreateAbstract)
            .unwrap()
    }

    fn prop(store: &Store, names: &[&str]) -> Term {
        Term::Compound(
            names
                .iter()
                .map(|n| Term::Symbol(sym(store, n)))
                .collect(),
        )
    }

    fn always(store: &Store) -> TimeRange {
        TimeRange::always(store.contexts().root())
    }

    #[test]
    fn undeclared_restriction_is_concept() {
        let st = store();
        let likes = sym(&st, "likes");
        assert_eq!(
            st.restriction_for(ContextId::ROOT, likes, 1),
            st.core().concept
        );
        assert!(!st.has_restriction(ContextId::ROOT, likes, 1));
    }

    #[test]
    fn declared_restriction_is_found() {
        let st = store();
        let r = always(&st);
        st.assert_fact(r, prop(&st, &["r1", "likes", "human"])).unwrap();

        let likes = sym(&st, "likes");
        assert_eq!(st.restriction_for(ContextId::ROOT, likes, 1), sym(&st, "human"));
        assert!(st.has_restriction(ContextId::ROOT, likes, 1));
        // slot 2 still unrestricted
        assert_eq!(
            st.restriction_for(ContextId::ROOT, likes, 2),
            st.core().concept
        );
    }

    #[test]
    fn restrictions_inherit_from_relation_ancestors() {
        let st = store();
        let r = always(&st);
        st.assert_fact(r, prop(&st, &["r1", "attitude", "human"])).unwrap();
        st.taxonomy()
            .add_isa(st.symbols(), sym(&st, "likes"), sym(&st, "attitude"))
            .unwrap();

        let likes = sym(&st, "likes");
        assert_eq!(st.restriction_for(ContextId::ROOT, likes, 1), sym(&st, "human"));
    }

    #[test]
    fn violation_warns_but_assertion_proceeds() {
        let st = store();
        let r = always(&st);
        st.assert_fact(r, prop(&st, &["r1", "likes", "human"])).unwrap();
        st.taxonomy()
            .add_isa(st.symbols(), sym(&st, "jim"), sym(&st, "human"))
            .unwrap();

        // jim satisfies the restriction, the table does not; both assert fine
        let ok = st.assert_fact(r, prop(&st, &["likes", "jim", "pizza"]));
        assert!(ok.is_ok());
        let violating = st.assert_fact(r, prop(&st, &["likes", "table3", "pizza"]));
        assert!(violating.is_ok());
        assert_eq!(st.len(), 3);
    }
}
