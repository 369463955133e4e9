//! Temporal assertion store with five-way hash indexing.
//!
//! The store is the fact base every other component reads through:
//!
//! - **Assertion** — idempotent insert with soft selectional-restriction
//!   validation, indexed five ways for ground-slot lookup
//! - **Retrieval** — context-visible, temporally filtered matching, plus
//!   taxonomy widening over ancestors and descendants of a chosen slot
//! - **Retraction** — in place within the asserting context, copy-on-write
//!   when a descendant context retracts an inherited fact
//! - **Accessors** — enumerated and graded attribute values, relation
//!   values, and part-whole lookup built on the widened retrievals

pub mod genitive;
pub mod restrict;

use std::fmt;
use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::context::{ContextId, ContextTree};
use crate::error::{RekhResult, StoreError};
use crate::symbol::{CoreSymbols, SymbolId, SymbolTable};
use crate::taxonomy::Taxonomy;
use crate::temporal::{TimeRange, Timestamp};
use crate::term::Term;
use crate::unify::Unifier;

/// Widening depth for the downward half of enumerated-value lookup.
/// Shallower than the general widening depth since enumerated properties
/// sit close under their generic property in the taxonomy.
const ENUM_DESC_DEPTH: u32 = 3;

/// Called with each newly indexed fact. Used for generation side effects
/// and for change tracking by embedders.
pub type AssertHook = Box<dyn Fn(&Fact) + Send + Sync>;

// ---------------------------------------------------------------------------
// Fact identifiers
// ---------------------------------------------------------------------------

/// Index of a fact in the store's arena.
///
/// Stable for the life of the store. Facts are never removed, only stopped
/// or superseded, so an id handed out once stays valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FactId(u32);

impl FactId {
    /// Arena position of this fact.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Raw id value.
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for FactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fact:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Facts
// ---------------------------------------------------------------------------

/// An asserted proposition together with its temporal extent and bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub id: FactId,
    /// Elements of the proposition; element 0 is the relation.
    pub elements: Vec<Term>,
    /// When and in which context the proposition holds.
    pub range: TimeRange,
    /// Explicit certainty assigned at assertion time, if any.
    pub weight: Option<f64>,
    /// Facts this one was derived from (the original, for retraction copies).
    pub justification: Vec<FactId>,
    /// Copies that supersede this fact in descendant contexts.
    pub superseded_by: Vec<FactId>,
}

impl Fact {
    /// The proposition as a compound term.
    pub fn proposition(&self) -> Term {
        Term::Compound(self.elements.clone())
    }

    /// The relation symbol, when element 0 is a symbol.
    pub fn rel(&self) -> Option<SymbolId> {
        self.elements.first().and_then(Term::as_symbol)
    }

    /// Element `i` of the proposition.
    pub fn element(&self, i: usize) -> Option<&Term> {
        self.elements.get(i)
    }

    /// Certainty score; 1.0 when no weight was given.
    ///
    /// Trailing numeric weights are folded into [`Fact::weight`] at
    /// assertion time, so the elements themselves never carry one.
    pub fn score(&self) -> f64 {
        self.weight.unwrap_or(1.0)
    }

    /// The proposition in its textual form, with the weight restored as a
    /// trailing element for round-tripping.
    pub fn weighted_term(&self) -> Term {
        match self.weight {
            Some(w) => {
                let mut elements = self.elements.clone();
                elements.push(Term::Number(w));
                Term::Compound(elements)
            }
            None => self.proposition(),
        }
    }
}

// ---------------------------------------------------------------------------
// Index keys
// ---------------------------------------------------------------------------

/// Hashable projection of a term for index keys.
///
/// Compound and range slots all share one coarse key; the structural filter
/// applied during retrieval separates them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SlotKey {
    Sym(SymbolId),
    Num(u64),
    Str(String),
    Other,
}

fn slot_key(term: &Term) -> SlotKey {
    match term {
        Term::Symbol(id) => SlotKey::Sym(*id),
        Term::Number(n) => {
            // fold -0.0 into +0.0 so both land in one bucket
            let n = if *n == 0.0 { 0.0 } else { *n };
            SlotKey::Num(n.to_bits())
        }
        Term::Str { value, .. } => SlotKey::Str(value.clone()),
        Term::Compound(_) | Term::Range(_) => SlotKey::Other,
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// The assertion store.
///
/// Facts live in an append-only arena guarded by a [`RwLock`]; the five
/// indices map slot keys to fact ids and are concurrent maps, so readers
/// never block each other.
pub struct Store {
    symbols: Arc<SymbolTable>,
    taxonomy: Arc<Taxonomy>,
    contexts: Arc<ContextTree>,
    core: CoreSymbols,
    facts: RwLock<Vec<Fact>>,
    by_rel_a1: DashMap<(SlotKey, SlotKey), Vec<FactId>>,
    by_rel_a2: DashMap<(SlotKey, SlotKey), Vec<FactId>>,
    by_rel: DashMap<SlotKey, Vec<FactId>>,
    by_a1: DashMap<SlotKey, Vec<FactId>>,
    by_a2: DashMap<SlotKey, Vec<FactId>>,
    hooks: RwLock<Vec<AssertHook>>,
    widen_depth: u32,
    part_depth: u32,
    validate: bool,
}

impl Store {
    /// Create an empty store over shared symbol, taxonomy, and context
    /// structures.
    pub fn new(
        symbols: Arc<SymbolTable>,
        taxonomy: Arc<Taxonomy>,
        contexts: Arc<ContextTree>,
    ) -> RekhResult<Self> {
        let core = CoreSymbols::resolve(&symbols)?;
        Ok(Self {
            symbols,
            taxonomy,
            contexts,
            core,
            facts: RwLock::new(Vec::new()),
            by_rel_a1: DashMap::new(),
            by_rel_a2: DashMap::new(),
            by_rel: DashMap::new(),
            by_a1: DashMap::new(),
            by_a2: DashMap::new(),
            hooks: RwLock::new(Vec::new()),
            widen_depth: 5,
            part_depth: 5,
            validate: true,
        })
    }

    /// Override the default widening depth, part-search depth, and
    /// restriction-validation switch.
    pub fn with_limits(mut self, widen_depth: u32, part_depth: u32, validate: bool) -> Self {
        self.widen_depth = widen_depth;
        self.part_depth = part_depth;
        self.validate = validate;
        self
    }

    pub fn symbols(&self) -> &Arc<SymbolTable> {
        &self.symbols
    }

    pub fn taxonomy(&self) -> &Arc<Taxonomy> {
        &self.taxonomy
    }

    pub fn contexts(&self) -> &Arc<ContextTree> {
        &self.contexts
    }

    pub fn core(&self) -> &CoreSymbols {
        &self.core
    }

    /// Default taxonomy-widening depth for retrievals.
    pub fn widen_depth(&self) -> u32 {
        self.widen_depth
    }

    pub(crate) fn unifier(&self) -> Unifier<'_> {
        Unifier::new(&self.symbols, &self.taxonomy)
    }

    /// Number of facts ever asserted, including stopped and superseded ones.
    pub fn len(&self) -> usize {
        self.facts.read().expect("store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the fact with the given id.
    pub fn fact(&self, id: FactId) -> Option<Fact> {
        self.facts
            .read()
            .expect("store lock poisoned")
            .get(id.index())
            .cloned()
    }

    /// Register a hook fired after each successful (non-duplicate) assert.
    pub fn register_hook(&self, hook: AssertHook) {
        self.hooks.write().expect("store lock poisoned").push(hook);
    }

    // -----------------------------------------------------------------------
    // Assertion
    // -----------------------------------------------------------------------

    /// Assert a proposition over a time range.
    ///
    /// Re-asserting an identical proposition with the same range in the same
    /// context is a no-op that returns the existing fact id. Selectional
    /// restrictions are checked but violations only warn; the assertion
    /// proceeds.
    pub fn assert_fact(&self, range: TimeRange, proposition: Term) -> RekhResult<FactId> {
        self.assert_inner(range, proposition, None, Vec::new())
    }

    /// Assert with an explicit certainty weight.
    pub fn assert_weighted(
        &self,
        range: TimeRange,
        proposition: Term,
        weight: f64,
    ) -> RekhResult<FactId> {
        self.assert_inner(range, proposition, Some(weight), Vec::new())
    }

    pub(crate) fn assert_inner(
        &self,
        range: TimeRange,
        proposition: Term,
        weight: Option<f64>,
        justification: Vec<FactId>,
    ) -> RekhResult<FactId> {
        // a trailing number in the textual form is a weight, not an argument
        let weight = weight.or_else(|| proposition.trailing_weight());
        let proposition = proposition.without_trailing_weight();
        let elements = match proposition {
            Term::Compound(ref elements) if !elements.is_empty() => elements.clone(),
            other => {
                return Err(StoreError::NotAProposition {
                    text: other.display(&self.symbols).to_string(),
                }
                .into());
            }
        };

        // fast path for duplicates, before validation re-warns
        {
            let facts = self.facts.read().expect("store lock poisoned");
            if let Some(id) = self.existing(&facts, &elements, &range, weight) {
                debug!(fact = %id, "assertion already present");
                return Ok(id);
            }
        }

        if self.validate {
            self.validate_restrictions(&elements, range.context);
        }

        let fact = {
            let mut facts = self.facts.write().expect("store lock poisoned");
            // re-check under the write lock so concurrent asserts stay idempotent
            if let Some(id) = self.existing(&facts, &elements, &range, weight) {
                return Ok(id);
            }
            let raw = u32::try_from(facts.len()).map_err(|_| StoreError::TableFull)?;
            let fact = Fact {
                id: FactId(raw),
                elements,
                range,
                weight,
                justification,
                superseded_by: Vec::new(),
            };
            facts.push(fact.clone());
            fact
        };

        self.index(&fact);
        debug!(
            fact = %fact.id,
            "asserted {}",
            fact.proposition().display(&self.symbols)
        );
        for hook in self.hooks.read().expect("store lock poisoned").iter() {
            hook(&fact);
        }
        Ok(fact.id)
    }

    /// Find a fact with the same elements, range, context, and weight.
    fn existing(
        &self,
        facts: &[Fact],
        elements: &[Term],
        range: &TimeRange,
        weight: Option<f64>,
    ) -> Option<FactId> {
        let ids = match elements.get(1) {
            Some(a1) => self
                .by_rel_a1
                .get(&(slot_key(&elements[0]), slot_key(a1)))
                .map(|v| v.clone())?,
            None => self.by_rel.get(&slot_key(&elements[0])).map(|v| v.clone())?,
        };
        ids.into_iter().find(|id| {
            let fact = &facts[id.index()];
            fact.range == *range && fact.weight == weight && fact.elements == elements
        })
    }

    /// Insert a fact id into every index its slots support.
    fn index(&self, fact: &Fact) {
        let rel = fact.elements.first().map(slot_key);
        let a1 = fact.elements.get(1).map(slot_key);
        let a2 = fact.elements.get(2).map(slot_key);
        if let (Some(r), Some(a)) = (&rel, &a1) {
            self.by_rel_a1
                .entry((r.clone(), a.clone()))
                .or_default()
                .push(fact.id);
        }
        if let (Some(r), Some(a)) = (&rel, &a2) {
            self.by_rel_a2
                .entry((r.clone(), a.clone()))
                .or_default()
                .push(fact.id);
        }
        if let Some(r) = rel {
            self.by_rel.entry(r).or_default().push(fact.id);
        }
        if let Some(a) = a1 {
            self.by_a1.entry(a).or_default().push(fact.id);
        }
        if let Some(a) = a2 {
            self.by_a2.entry(a).or_default().push(fact.id);
        }
    }

    // -----------------------------------------------------------------------
    // Retrieval
    // -----------------------------------------------------------------------

    /// Retrieve facts matching `pattern` that hold at `ts`, visible from
    /// context `cx`.
    pub fn retrieve(&self, ts: Timestamp, cx: ContextId, pattern: &Term) -> Vec<Fact> {
        self.retrieval(ts, None, cx, pattern, None)
    }

    /// Retrieve facts whose range overlaps `range`, visible from the
    /// range's own context.
    pub fn retrieve_overlapping(&self, range: &TimeRange, pattern: &Term) -> Vec<Fact> {
        self.retrieval(Timestamp::Na, Some(range), range.context, pattern, None)
    }

    /// Stop facts matching `pattern` as of `ts`, from the point of view
    /// of context `cx`.
    ///
    /// Facts asserted in `cx` itself have their stop timestamp moved in
    /// place. Facts inherited from an ancestor context are left untouched
    /// there and superseded by a stopped copy asserted in `cx`, so sibling
    /// contexts keep seeing the original. Returns the affected facts.
    pub fn retract(&self, ts: Timestamp, cx: ContextId, pattern: &Term) -> Vec<Fact> {
        self.retrieval(ts, None, cx, pattern, Some(ts))
    }

    /// Core retrieval: one ground-slot index probe, then context, temporal,
    /// and structural filtering. `retract_at` turns the matches into
    /// retractions afterwards.
    fn retrieval(
        &self,
        ts: Timestamp,
        range: Option<&TimeRange>,
        cx: ContextId,
        pattern: &Term,
        retract_at: Option<Timestamp>,
    ) -> Vec<Fact> {
        let Some(elements) = pattern.elements() else {
            warn!(
                "retrieval pattern is not a proposition: {}",
                pattern.display(&self.symbols)
            );
            return Vec::new();
        };
        let Some(ids) = self.candidates(elements) else {
            warn!(
                "retrieval pattern has no ground slot: {}",
                pattern.display(&self.symbols)
            );
            return Vec::new();
        };

        let unifier = self.unifier();
        let mut found = Vec::new();
        {
            let facts = self.facts.read().expect("store lock poisoned");
            for id in ids {
                let fact = &facts[id.index()];
                if !self.contexts.is_ancestor(fact.range.context, cx) {
                    continue;
                }
                if superseded_in(&facts, fact, &self.contexts, cx) {
                    continue;
                }
                let in_time = match range {
                    Some(r) => fact.range.overlaps(r),
                    None => fact.range.matches(ts),
                };
                if !in_time {
                    continue;
                }
                if !unifier.quick_unify(pattern, &fact.proposition()) {
                    continue;
                }
                found.push(fact.clone());
            }
        }

        if let Some(stop) = retract_at {
            self.retract_found(&mut found, cx, stop);
        }
        found
    }

    /// Pick the most selective index for a pattern. Pair indices beat
    /// single-slot ones; a slot only counts when present and non-variable.
    fn candidates(&self, elements: &[Term]) -> Option<Vec<FactId>> {
        let ground = |i: usize| {
            elements
                .get(i)
                .filter(|t| !t.is_var(&self.symbols))
                .map(slot_key)
        };
        let rel = ground(0);
        let a1 = ground(1);
        let a2 = ground(2);
        if let (Some(r), Some(a)) = (&rel, &a1) {
            let ids = self.by_rel_a1.get(&(r.clone(), a.clone()));
            return Some(ids.map(|v| v.clone()).unwrap_or_default());
        }
        if let (Some(r), Some(a)) = (&rel, &a2) {
            let ids = self.by_rel_a2.get(&(r.clone(), a.clone()));
            return Some(ids.map(|v| v.clone()).unwrap_or_default());
        }
        if let Some(r) = rel {
            return Some(self.by_rel.get(&r).map(|v| v.clone()).unwrap_or_default());
        }
        if let Some(a) = a1 {
            return Some(self.by_a1.get(&a).map(|v| v.clone()).unwrap_or_default());
        }
        if let Some(a) = a2 {
            return Some(self.by_a2.get(&a).map(|v| v.clone()).unwrap_or_default());
        }
        None
    }

    fn retract_found(&self, found: &mut [Fact], cx: ContextId, stop: Timestamp) {
        for fact in found.iter_mut() {
            if fact.range.context == cx {
                {
                    let mut facts = self.facts.write().expect("store lock poisoned");
                    facts[fact.id.index()].range.stop = stop;
                }
                fact.range.stop = stop;
                info!("retracted {}", fact.proposition().display(&self.symbols));
            } else {
                let copy_range = TimeRange::new(fact.range.start, stop, cx);
                match self.assert_inner(
                    copy_range,
                    fact.proposition(),
                    fact.weight,
                    vec![fact.id],
                ) {
                    Ok(copy_id) => {
                        let mut facts = self.facts.write().expect("store lock poisoned");
                        facts[fact.id.index()].superseded_by.push(copy_id);
                        fact.superseded_by.push(copy_id);
                        info!(
                            "retracted by copying {}",
                            fact.proposition().display(&self.symbols)
                        );
                    }
                    Err(err) => {
                        warn!("copy-on-write retraction failed: {err}");
                    }
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Widened retrieval
    // -----------------------------------------------------------------------

    /// Retrieve with downward taxonomy widening of the symbol at `slot`.
    ///
    /// The exact pattern is tried first at every node. With `lockout`, a
    /// node whose own exact retrieval produced anything cuts the walk below
    /// itself; sibling branches are unaffected.
    pub fn retrieve_desc(
        &self,
        ts: Timestamp,
        range: Option<&TimeRange>,
        cx: ContextId,
        pattern: &Term,
        slot: usize,
        lockout: bool,
        depth: u32,
    ) -> Vec<Fact> {
        let mut acc = Vec::new();
        self.desc_walk(ts, range, cx, pattern, slot, lockout, depth, &mut acc);
        acc
    }

    /// Retrieve with upward taxonomy widening of the symbol at `slot`.
    pub fn retrieve_anc(
        &self,
        ts: Timestamp,
        range: Option<&TimeRange>,
        cx: ContextId,
        pattern: &Term,
        slot: usize,
        lockout: bool,
        depth: u32,
    ) -> Vec<Fact> {
        let mut acc = Vec::new();
        self.anc_walk(ts, range, cx, pattern, slot, lockout, depth, &mut acc);
        acc
    }

    /// Retrieve widening `anc_slot` upward, with a lockout descendant walk
    /// of `desc_slot` at every node visited on the way up.
    pub fn retrieve_anc_desc(
        &self,
        ts: Timestamp,
        range: Option<&TimeRange>,
        cx: ContextId,
        pattern: &Term,
        anc_slot: usize,
        desc_slot: usize,
        anc_depth: u32,
        desc_depth: u32,
    ) -> Vec<Fact> {
        let mut acc = Vec::new();
        self.anc_desc_walk(
            ts, range, cx, pattern, anc_slot, desc_slot, anc_depth, desc_depth, &mut acc,
        );
        acc
    }

    #[allow(clippy::too_many_arguments)]
    fn desc_walk(
        &self,
        ts: Timestamp,
        range: Option<&TimeRange>,
        cx: ContextId,
        pattern: &Term,
        slot: usize,
        lockout: bool,
        depth: u32,
        acc: &mut Vec<Fact>,
    ) {
        let before = acc.len();
        self.collect_exact(ts, range, cx, pattern, acc);
        if lockout && acc.len() > before {
            return;
        }
        if depth == 0 {
            return;
        }
        // compound pivots have no taxonomy neighborhood
        let Some(pivot) = pattern.arg(slot).and_then(Term::as_symbol) else {
            return;
        };
        for child in self.taxonomy.children(pivot) {
            if self.symbols.is_var(child) {
                continue;
            }
            let widened = pattern.with_element(slot, Term::Symbol(child));
            self.desc_walk(ts, range, cx, &widened, slot, lockout, depth - 1, acc);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn anc_walk(
        &self,
        ts: Timestamp,
        range: Option<&TimeRange>,
        cx: ContextId,
        pattern: &Term,
        slot: usize,
        lockout: bool,
        depth: u32,
        acc: &mut Vec<Fact>,
    ) {
        let before = acc.len();
        self.collect_exact(ts, range, cx, pattern, acc);
        if lockout && acc.len() > before {
            return;
        }
        if depth == 0 {
            return;
        }
        let Some(pivot) = pattern.arg(slot).and_then(Term::as_symbol) else {
            return;
        };
        for parent in self.taxonomy.parents(pivot) {
            if self.symbols.is_var(parent) {
                continue;
            }
            let widened = pattern.with_element(slot, Term::Symbol(parent));
            self.anc_walk(ts, range, cx, &widened, slot, lockout, depth - 1, acc);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn anc_desc_walk(
        &self,
        ts: Timestamp,
        range: Option<&TimeRange>,
        cx: ContextId,
        pattern: &Term,
        anc_slot: usize,
        desc_slot: usize,
        anc_depth: u32,
        desc_depth: u32,
        acc: &mut Vec<Fact>,
    ) {
        self.desc_walk(ts, range, cx, pattern, desc_slot, true, desc_depth, acc);
        if anc_depth == 0 {
            return;
        }
        let Some(pivot) = pattern.arg(anc_slot).and_then(Term::as_symbol) else {
            return;
        };
        for parent in self.taxonomy.parents(pivot) {
            if self.symbols.is_var(parent) {
                continue;
            }
            let widened = pattern.with_element(anc_slot, Term::Symbol(parent));
            self.anc_desc_walk(
                ts,
                range,
                cx,
                &widened,
                anc_slot,
                desc_slot,
                anc_depth - 1,
                desc_depth,
                acc,
            );
        }
    }

    /// Exact retrieval appended into `acc`, skipping facts already found
    /// along another widening path.
    fn collect_exact(
        &self,
        ts: Timestamp,
        range: Option<&TimeRange>,
        cx: ContextId,
        pattern: &Term,
        acc: &mut Vec<Fact>,
    ) {
        for fact in self.retrieval(ts, range, cx, pattern, None) {
            if acc.iter().all(|f| f.id != fact.id) {
                acc.push(fact);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Value accessors
    // -----------------------------------------------------------------------

    /// Value of an enumerated property: the most specific assertion of a
    /// descendant of `prop` on `obj`, widening `obj` up the taxonomy for
    /// class-level defaults. Falls back to `default` with a log line.
    pub fn enum_value(
        &self,
        ts: Timestamp,
        cx: ContextId,
        prop: SymbolId,
        obj: &Term,
        default: SymbolId,
    ) -> SymbolId {
        let pattern = Term::Compound(vec![Term::Symbol(prop), obj.clone()]);
        let found =
            self.retrieve_anc_desc(ts, None, cx, &pattern, 1, 0, self.widen_depth, ENUM_DESC_DEPTH);
        match found.first().and_then(|f| f.element(0)).and_then(Term::as_symbol) {
            Some(value) => value,
            None => {
                debug!(
                    "{} of {} unknown; assumed {}",
                    self.symbols.name(prop),
                    obj.display(&self.symbols),
                    self.symbols.name(default)
                );
                default
            }
        }
    }

    /// Mean certainty of a graded attribute over `obj`, widening `obj`
    /// upward. `None` when nothing is asserted.
    pub fn attribute_value(
        &self,
        ts: Timestamp,
        cx: ContextId,
        attr: SymbolId,
        obj: &Term,
    ) -> Option<f64> {
        let pattern = Term::Compound(vec![Term::Symbol(attr), obj.clone()]);
        let found = self.retrieve_anc(ts, None, cx, &pattern, 1, true, self.widen_depth);
        if found.is_empty() {
            return None;
        }
        let sum: f64 = found.iter().map(Fact::score).sum();
        Some(sum / found.len() as f64)
    }

    /// Assertions of `rel` with `obj` in argument position `pos` (1 or 2),
    /// widening that position upward.
    pub fn relation_assertions(
        &self,
        ts: Timestamp,
        cx: ContextId,
        rel: SymbolId,
        obj: &Term,
        pos: usize,
    ) -> Vec<Fact> {
        let wild = Term::Symbol(self.core.wildcard);
        let (pattern, slot) = match pos {
            1 => (
                Term::Compound(vec![Term::Symbol(rel), obj.clone(), wild]),
                1,
            ),
            2 => (
                Term::Compound(vec![Term::Symbol(rel), wild, obj.clone()]),
                2,
            ),
            _ => {
                warn!("relation retrieval with argument position {pos}");
                return Vec::new();
            }
        };
        self.retrieve_anc(ts, None, cx, &pattern, slot, true, self.widen_depth)
    }

    /// The partners of `obj` under `rel`: the terms found in the argument
    /// position opposite `pos`. When the requested position has no
    /// assertions the probe flips to the opposite one.
    pub fn relation_values(
        &self,
        ts: Timestamp,
        cx: ContextId,
        rel: SymbolId,
        obj: &Term,
        pos: usize,
    ) -> Vec<Term> {
        let other = if pos == 1 { 2 } else { 1 };
        let found = self.relation_assertions(ts, cx, rel, obj, pos);
        if !found.is_empty() {
            return found
                .iter()
                .filter_map(|f| f.element(other).cloned())
                .collect();
        }
        self.relation_assertions(ts, cx, rel, obj, other)
            .iter()
            .filter_map(|f| f.element(pos).cloned())
            .collect()
    }

    /// First partner of `obj` as argument 1 of `rel`, or `default` with a
    /// log line. A converse phrasing still answers: when `obj` never
    /// occurs as argument 1 the probe flips to argument 2.
    pub fn relation_value(
        &self,
        ts: Timestamp,
        cx: ContextId,
        rel: SymbolId,
        obj: &Term,
        default: &Term,
    ) -> Term {
        let direct = self
            .relation_assertions(ts, cx, rel, obj, 1)
            .first()
            .and_then(|f| f.element(2))
            .cloned();
        let flipped = || {
            self.relation_assertions(ts, cx, rel, obj, 2)
                .first()
                .and_then(|f| f.element(1))
                .cloned()
        };
        match direct.or_else(flipped) {
            Some(value) => value,
            None => {
                debug!(
                    "{} of {} unknown; assumed {}",
                    self.symbols.name(rel),
                    obj.display(&self.symbols),
                    default.display(&self.symbols)
                );
                default.clone()
            }
        }
    }

    /// First partner of `obj` as argument 2 of `rel`, or `default` with a
    /// log line.
    pub fn relation_value_converse(
        &self,
        ts: Timestamp,
        cx: ContextId,
        rel: SymbolId,
        obj: &Term,
        default: &Term,
    ) -> Term {
        match self
            .relation_assertions(ts, cx, rel, obj, 2)
            .first()
            .and_then(|f| f.element(1))
        {
            Some(value) => value.clone(),
            None => {
                debug!(
                    "{} of {} unknown; assumed {}",
                    self.symbols.name(rel),
                    obj.display(&self.symbols),
                    default.display(&self.symbols)
                );
                default.clone()
            }
        }
    }
}

/// Whether any superseding copy of `fact` was asserted in `cx` or an
/// ancestor of it, hiding the fact from `cx`.
fn superseded_in(facts: &[Fact], fact: &Fact, contexts: &ContextTree, cx: ContextId) -> bool {
    fact.superseded_by.iter().any(|sid| {
        facts
            .get(sid.index())
            .is_some_and(|s| contexts.is_ancestor(s.range.context, cx))
    })
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("facts", &self.len())
            .field(
                "pair_buckets",
                &(self.by_rel_a1.len() + self.by_rel_a2.len()),
            )
            .field(
                "single_buckets",
                &(self.by_rel.len() + self.by_a1.len() + self.by_a2.len()),
            )
            .field("widen_depth", &self.widen_depth)
            .finish_non_exhaustive()
    }
}
