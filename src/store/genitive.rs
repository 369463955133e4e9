//! Part-whole and pseudo-ownership retrieval.
//!
//! "Jim's left foot", "my stereo", "her apartment": genitives resolve
//! through two mechanisms layered on the widened retrievals:
//!
//! - **Part-whole** — `[part-of class whole-class]` declares that wholes of
//!   a class have parts of a class; `[cpart-of instance whole]` records a
//!   concrete part. [`Store::retrieve_part`] searches the concrete layer
//!   and materializes instances from the class layer on demand.
//! - **Pseudo-ownership** — `owner-of`, `residence-of`, `headquarters-of`,
//!   and `unique-author-of` each relate an owner to a possession at a fixed
//!   argument position.

use tracing::{debug, warn};

use crate::context::ContextId;
use crate::symbol::SymbolId;
use crate::temporal::{TimeRange, Timestamp};
use crate::term::Term;

use super::Store;

impl Store {
    /// Whether `part` is reachable from `whole` through concrete
    /// `cpart-of` links, searching at most `part_depth` levels down.
    pub fn is_part_of(
        &self,
        ts: Timestamp,
        cx: ContextId,
        part: SymbolId,
        whole: SymbolId,
    ) -> bool {
        self.is_part_of_inner(ts, cx, part, whole, self.part_depth)
    }

    fn is_part_of_inner(
        &self,
        ts: Timestamp,
        cx: ContextId,
        part: SymbolId,
        whole: SymbolId,
        depth: u32,
    ) -> bool {
        if depth == 0 {
            return false;
        }
        let pattern = Term::Compound(vec![
            Term::Symbol(self.core.cpart_of),
            Term::Symbol(self.core.wildcard),
            Term::Symbol(whole),
        ]);
        for fact in self.retrieve(ts, cx, &pattern) {
            let Some(found) = fact.element(1).and_then(Term::as_symbol) else {
                continue;
            };
            if found == part {
                return true;
            }
            if self.is_part_of_inner(ts, cx, part, found, depth - 1) {
                return true;
            }
        }
        false
    }

    /// Class-level counterpart of [`Store::is_part_of`]: reachability over
    /// timeless `part-of` declarations, widening the whole up the taxonomy.
    pub fn is_part_of_class(&self, cx: ContextId, part: SymbolId, whole: SymbolId) -> bool {
        self.is_part_of_class_inner(cx, part, whole, self.part_depth)
    }

    fn is_part_of_class_inner(
        &self,
        cx: ContextId,
        part: SymbolId,
        whole: SymbolId,
        depth: u32,
    ) -> bool {
        if depth == 0 {
            return false;
        }
        let pattern = Term::Compound(vec![
            Term::Symbol(self.core.part_of),
            Term::Symbol(self.core.wildcard),
            Term::Symbol(whole),
        ]);
        for fact in self.retrieve_anc(Timestamp::Na, None, cx, &pattern, 2, true, self.widen_depth)
        {
            let Some(found) = fact.element(1).and_then(Term::as_symbol) else {
                continue;
            };
            if found == part {
                return true;
            }
            if self.is_part_of_class_inner(cx, part, found, depth - 1) {
                return true;
            }
        }
        false
    }

    /// Find or materialize a concrete part of `whole` belonging to the
    /// abstract class `part`.
    ///
    /// Iterative deepening over the part hierarchy: each round allows one
    /// more level of containment. When a class-level `part-of` declaration
    /// exists but no concrete part does, a fresh instance is created,
    /// linked under its class, and recorded with an always-range
    /// `cpart-of` assertion so later lookups reuse it.
    pub fn retrieve_part(
        &self,
        ts: Timestamp,
        cx: ContextId,
        part: SymbolId,
        whole: SymbolId,
    ) -> Option<SymbolId> {
        for depth in 1..=self.part_depth {
            if let Some(found) = self.retrieve_part_inner(ts, cx, part, whole, depth) {
                return Some(found);
            }
        }
        debug!(
            "no part {} of {} found",
            self.symbols.name(part),
            self.symbols.name(whole)
        );
        None
    }

    fn retrieve_part_inner(
        &self,
        ts: Timestamp,
        cx: ContextId,
        part: SymbolId,
        whole: SymbolId,
        depth: u32,
    ) -> Option<SymbolId> {
        if depth == 0 {
            return None;
        }
        let declared = Term::Compound(vec![
            Term::Symbol(self.core.part_of),
            Term::Symbol(self.core.wildcard),
            Term::Symbol(whole),
        ]);
        for fact in self.retrieve_anc(ts, None, cx, &declared, 2, true, self.widen_depth) {
            let Some(pclass) = fact.element(1).and_then(Term::as_symbol) else {
                continue;
            };
            let obj = match self.concrete_part(ts, cx, pclass, whole) {
                Some(existing) => existing,
                None => match self.materialize_part(cx, pclass, whole) {
                    Some(created) => created,
                    None => continue,
                },
            };
            if self.taxonomy.isa(part, obj) {
                return Some(obj);
            }
            if let Some(found) = self.retrieve_part_inner(ts, cx, part, obj, depth - 1) {
                return Some(found);
            }
        }
        None
    }

    /// An already-recorded concrete part of `whole` under `pclass`,
    /// widening the class downward.
    fn concrete_part(
        &self,
        ts: Timestamp,
        cx: ContextId,
        pclass: SymbolId,
        whole: SymbolId,
    ) -> Option<SymbolId> {
        let probe = Term::Compound(vec![
            Term::Symbol(self.core.cpart_of),
            Term::Symbol(pclass),
            Term::Symbol(whole),
        ]);
        self.retrieve_desc(ts, None, cx, &probe, 1, true, self.widen_depth)
            .first()
            .and_then(|f| f.element(1))
            .and_then(Term::as_symbol)
    }

    fn materialize_part(
        &self,
        cx: ContextId,
        pclass: SymbolId,
        whole: SymbolId,
    ) -> Option<SymbolId> {
        let obj = match self.symbols.create_instance(pclass) {
            Ok(obj) => obj,
            Err(err) => {
                warn!("materializing part of {}: {err}", self.symbols.name(whole));
                return None;
            }
        };
        if let Err(err) = self.taxonomy.add_isa(&self.symbols, obj, pclass) {
            warn!("linking materialized part {}: {err}", self.symbols.name(obj));
        }
        let prop = Term::Compound(vec![
            Term::Symbol(self.core.cpart_of),
            Term::Symbol(obj),
            Term::Symbol(whole),
        ]);
        if let Err(err) = self.assert_fact(TimeRange::always(cx), prop) {
            warn!("recording materialized part {}: {err}", self.symbols.name(obj));
        }
        Some(obj)
    }

    /// The concrete whole of class `whole_class` that `part` belongs to,
    /// following `cpart-of` links outward. Only finds existing wholes; a
    /// knob could sit on a television or a radio, so nothing is invented
    /// here.
    pub fn retrieve_whole(
        &self,
        ts: Timestamp,
        cx: ContextId,
        whole_class: SymbolId,
        part: SymbolId,
    ) -> Option<SymbolId> {
        self.retrieve_whole_inner(ts, cx, whole_class, part, self.part_depth)
    }

    fn retrieve_whole_inner(
        &self,
        ts: Timestamp,
        cx: ContextId,
        whole_class: SymbolId,
        part: SymbolId,
        depth: u32,
    ) -> Option<SymbolId> {
        if depth == 0 {
            return None;
        }
        let pattern = Term::Compound(vec![
            Term::Symbol(self.core.cpart_of),
            Term::Symbol(part),
            Term::Symbol(self.core.wildcard),
        ]);
        for fact in self.retrieve(ts, cx, &pattern) {
            let Some(found) = fact.element(2).and_then(Term::as_symbol) else {
                continue;
            };
            if self.taxonomy.isa(whole_class, found) {
                return Some(found);
            }
            if let Some(outer) =
                self.retrieve_whole_inner(ts, cx, whole_class, found, depth - 1)
            {
                return Some(outer);
            }
        }
        None
    }

    /// Resolve a genitive: things of class `obj` belonging to `of_obj`.
    ///
    /// Part-whole wins outright when it finds anything. Otherwise the
    /// ownership relations are tried in turn and their results pooled.
    pub fn genitive_retrieve(
        &self,
        ts: Timestamp,
        cx: ContextId,
        obj: SymbolId,
        of_obj: SymbolId,
    ) -> Vec<Term> {
        if let Some(part) = self.retrieve_part(ts, cx, obj, of_obj) {
            return vec![Term::Symbol(part)];
        }
        let relations = [
            (self.core.owner_of, 1),
            (self.core.residence_of, 2),
            (self.core.headquarters_of, 2),
            (self.core.unique_author_of, 1),
        ];
        let mut out = Vec::new();
        for (rel, pos) in relations {
            self.pseudo_owners(ts, cx, obj, of_obj, rel, pos, &mut out);
        }
        out
    }

    /// Collect possessions under one ownership relation. `pos` is the
    /// argument position holding the possession; the found instances come
    /// from that same position of the widened matches.
    fn pseudo_owners(
        &self,
        ts: Timestamp,
        cx: ContextId,
        obj: SymbolId,
        of_obj: SymbolId,
        rel: SymbolId,
        pos: usize,
        out: &mut Vec<Term>,
    ) {
        let pattern = match pos {
            1 => Term::Compound(vec![
                Term::Symbol(rel),
                Term::Symbol(obj),
                Term::Symbol(of_obj),
            ]),
            2 => Term::Compound(vec![
                Term::Symbol(rel),
                Term::Symbol(of_obj),
                Term::Symbol(obj),
            ]),
            _ => {
                warn!("ownership retrieval with argument position {pos}");
                return;
            }
        };
        for fact in self.retrieve_desc(ts, None, cx, &pattern, pos, true, self.widen_depth) {
            if let Some(found) = fact.element(pos) {
                if out.iter().all(|t| t != found) {
                    out.push(found.clone());
                }
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

    fn isa(store: &Store, child: &str, parent: &str) {
        store
            .taxonomy()
            .add_isa(store.symbols(), sym(store, child), sym(store, parent))
            .unwrap();
    }

    fn put(store: &Store, names: &[&str]) {
        let prop = Term::Compound(
            names
                .iter()
                .map(|n| Term::Symbol(sym(store, n)))
                .collect(),
        );
        store
            .assert_fact(TimeRange::always(ContextId::ROOT), prop)
            .unwrap();
    }

    const TS: Timestamp = Timestamp::At(0);

    #[test]
    fn direct_and_nested_parts() {
        let st = store();
        put(&st, &["cpart-of", "knob3", "panel7"]);
        put(&st, &["cpart-of", "panel7", "radio9"]);

        let knob3 = sym(&st, "knob3");
        let panel7 = sym(&st, "panel7");
        let radio9 = sym(&st, "radio9");

        assert!(st.is_part_of(TS, ContextId::ROOT, knob3, radio9));
        assert!(st.is_part_of(TS, ContextId::ROOT, panel7, radio9));
        assert!(!st.is_part_of(TS, ContextId::ROOT, radio9, knob3));
    }

    #[test]
    fn part_chains_deeper_than_the_limit_are_not_found() {
        let st = store();
        for i in 0..8 {
            put(&st, &[
                "cpart-of",
                &format!("layer{}", i + 1),
                &format!("layer{i}"),
            ]);
        }
        let top = sym(&st, "layer0");
        assert!(st.is_part_of(TS, ContextId::ROOT, sym(&st, "layer3"), top));
        assert!(!st.is_part_of(TS, ContextId::ROOT, sym(&st, "layer8"), top));
    }

    #[test]
    fn class_level_parts_widen_the_whole() {
        let st = store();
        put(&st, &["part-of", "wheel", "car"]);
        isa(&st, "sports-car", "car");

        let wheel = sym(&st, "wheel");
        assert!(st.is_part_of_class(ContextId::ROOT, wheel, sym(&st, "sports-car")));
        assert!(st.is_part_of_class(ContextId::ROOT, wheel, sym(&st, "car")));
        assert!(!st.is_part_of_class(ContextId::ROOT, sym(&st, "sail"), sym(&st, "car")));
    }

    #[test]
    fn retrieve_part_materializes_and_caches() {
        let st = store();
        put(&st, &["part-of", "wheel", "car"]);
        isa(&st, "car12", "car");

        let wheel = sym(&st, "wheel");
        let car12 = sym(&st, "car12");

        let first = st.retrieve_part(TS, ContextId::ROOT, wheel, car12).unwrap();
        assert!(st.taxonomy().isa(wheel, first));
        assert!(st.symbols().name(first).starts_with("wheel"));

        // the materialized instance is cached, not recreated
        let before = st.len();
        let second = st.retrieve_part(TS, ContextId::ROOT, wheel, car12).unwrap();
        assert_eq!(first, second);
        assert_eq!(st.len(), before);
    }

    #[test]
    fn retrieve_part_descends_through_containers() {
        let st = store();
        put(&st, &["part-of", "door", "house"]);
        put(&st, &["part-of", "knob", "door"]);
        isa(&st, "house7", "house");

        let knob = sym(&st, "knob");
        let found = st
            .retrieve_part(TS, ContextId::ROOT, knob, sym(&st, "house7"))
            .unwrap();
        assert!(st.taxonomy().isa(knob, found));
    }

    #[test]
    fn retrieve_part_prefers_existing_concrete_parts() {
        let st = store();
        put(&st, &["part-of", "wheel", "car"]);
        put(&st, &["cpart-of", "wheel99", "car12"]);
        isa(&st, "car12", "car");
        isa(&st, "wheel99", "wheel");

        let found = st
            .retrieve_part(TS, ContextId::ROOT, sym(&st, "wheel"), sym(&st, "car12"))
            .unwrap();
        assert_eq!(found, sym(&st, "wheel99"));
    }

    #[test]
    fn retrieve_whole_walks_outward() {
        let st = store();
        put(&st, &["cpart-of", "knob3", "panel7"]);
        put(&st, &["cpart-of", "panel7", "radio9"]);
        isa(&st, "radio9", "radio");

        let found = st
            .retrieve_whole(TS, ContextId::ROOT, sym(&st, "radio"), sym(&st, "knob3"))
            .unwrap();
        assert_eq!(found, sym(&st, "radio9"));

        assert!(st
            .retrieve_whole(TS, ContextId::ROOT, sym(&st, "television"), sym(&st, "knob3"))
            .is_none());
    }

    #[test]
    fn genitive_prefers_parts_over_ownership() {
        let st = store();
        put(&st, &["part-of", "left-foot", "human"]);
        isa(&st, "jim", "human");

        let found = st.genitive_retrieve(TS, ContextId::ROOT, sym(&st, "left-foot"), sym(&st, "jim"));
        assert_eq!(found.len(), 1);
        let Term::Symbol(foot) = found[0] else {
            panic!("expected a symbol");
        };
        assert!(st.taxonomy().isa(sym(&st, "left-foot"), foot));
    }

    #[test]
    fn genitive_falls_back_to_ownership_relations() {
        let st = store();
        put(&st, &["owner-of", "stereo22", "jim"]);
        isa(&st, "stereo22", "stereo");

        let found = st.genitive_retrieve(TS, ContextId::ROOT, sym(&st, "stereo"), sym(&st, "jim"));
        assert_eq!(found, vec![Term::Symbol(sym(&st, "stereo22"))]);
    }

    #[test]
    fn genitive_finds_residences_in_the_second_position() {
        let st = store();
        put(&st, &["residence-of", "jim", "apt23"]);
        isa(&st, "apt23", "apartment");

        let found =
            st.genitive_retrieve(TS, ContextId::ROOT, sym(&st, "apartment"), sym(&st, "jim"));
        assert_eq!(found, vec![Term::Symbol(sym(&st, "apt23"))]);
    }
}
