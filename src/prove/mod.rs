//! Backward-chaining prover over the assertion store.
//!
//! Goals are proved by recursive descent over their head:
//!
//! - **Taxonomy goals** (`isa`, `ako`) are answered directly from the
//!   taxonomy, enumerating descendants or ancestors when one side is a
//!   variable.
//! - **Connectives** (`and`, `or`, `not`) thread bindings through their
//!   operands; `not` is negation as failure.
//! - **Comparatives** (descendants of `arithmetic-relation`) evaluate
//!   numeric or structural equality without touching the store.
//! - **Everything else** is matched against stored facts with descendant
//!   widening, against caller-supplied ad hoc facts, against a registered
//!   [`SpatialOracle`], and finally backward-chained through `ifthen`
//!   rules.
//!
//! Every successful branch yields a [`Proof`] tree whose score is the
//! product of the fact and rule weights along the way, so callers can rank
//! competing derivations.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::context::ContextId;
use crate::store::{Fact, Store};
use crate::symbol::{CoreSymbols, SymbolId, SymbolTable};
use crate::taxonomy::traverse::{self, TraversalConfig};
use crate::temporal::{TimeRange, Timestamp};
use crate::term::Term;
use crate::unify::{Bindings, Unifier};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Limits applied to a proof search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProveConfig {
    /// Maximum recursion depth before a branch is abandoned.
    pub max_depth: u32,
}

impl Default for ProveConfig {
    fn default() -> Self {
        Self { max_depth: 30 }
    }
}

// ---------------------------------------------------------------------------
// Proofs
// ---------------------------------------------------------------------------

/// One derivation of a goal.
///
/// `fact` is the proposition this node establishes: the stored fact for
/// database matches, the goal itself for builtin and rule nodes. `rule`
/// names how it was established, either a builtin marker (`true`, `isa`,
/// `and`, ...) or the full `ifthen` term that fired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proof {
    pub score: f64,
    pub fact: Term,
    pub bindings: Bindings,
    pub rule: Term,
    pub reasons: Vec<Proof>,
}

impl Proof {
    /// Render the proof tree indented, one node per line.
    pub fn render(&self, symbols: &SymbolTable) -> String {
        let mut out = String::new();
        self.render_into(symbols, 0, &mut out);
        out
    }

    fn render_into(&self, symbols: &SymbolTable, indent: usize, out: &mut String) {
        use std::fmt::Write;
        let pad = "  ".repeat(indent);
        let _ = write!(
            out,
            "{pad}{:.4} {} because {}",
            self.score,
            self.fact.display(symbols),
            self.rule.display(symbols),
        );
        if !self.bindings.is_empty() {
            let _ = write!(out, " with {}", self.bindings.display(symbols));
        }
        out.push('\n');
        for reason in &self.reasons {
            reason.render_into(symbols, indent + 1, out);
        }
    }
}

/// Wrap each subproof in a new level for `fact`, multiplying scores and
/// merging `bd` over the subproof's bindings.
fn add_level(
    score: f64,
    bd: Option<&Bindings>,
    fact: &Term,
    rule: &Term,
    subproofs: Vec<Proof>,
) -> Vec<Proof> {
    subproofs
        .into_iter()
        .map(|sub| {
            let bindings = match bd {
                Some(bd) => bd.merge(&sub.bindings),
                None => sub.bindings.clone(),
            };
            Proof {
                score: score * sub.score,
                fact: fact.clone(),
                bindings,
                rule: rule.clone(),
                reasons: vec![sub],
            }
        })
        .collect()
}

/// Cross `head` with each continuation in `tails`, keeping the head's fact
/// and rule while combining scores, bindings, and reasons.
fn append_each(head: &Proof, tails: &[Proof], out: &mut Vec<Proof>) {
    for tail in tails {
        let mut reasons = head.reasons.clone();
        reasons.extend(tail.reasons.iter().cloned());
        out.push(Proof {
            score: head.score * tail.score,
            fact: head.fact.clone(),
            bindings: head.bindings.merge(&tail.bindings),
            rule: head.rule.clone(),
            reasons,
        });
    }
}

// ---------------------------------------------------------------------------
// Spatial oracle
// ---------------------------------------------------------------------------

/// External source of spatial truth, consulted for `location-of`, `near`,
/// and `near-audible` goals before the store is searched.
///
/// Implementations typically front a simulation grid or a geometry index;
/// the prover only needs yes/no answers and candidate terms.
pub trait SpatialOracle: Send + Sync {
    /// The range over which `obj` is at `loc`, if it is.
    fn located_at(
        &self,
        ts: Timestamp,
        range: Option<&TimeRange>,
        obj: &Term,
        loc: &Term,
    ) -> Option<TimeRange>;

    /// Terms found near `obj` that match `near`.
    fn find_near(&self, ts: Timestamp, range: Option<&TimeRange>, obj: &Term, near: &Term)
    -> Vec<Term>;

    /// Instances of `class` within earshot of `source`.
    fn find_near_audible(
        &self,
        ts: Timestamp,
        range: Option<&TimeRange>,
        class: SymbolId,
        source: &Term,
    ) -> Vec<Term>;
}

// ---------------------------------------------------------------------------
// Prover
// ---------------------------------------------------------------------------

/// Backward chainer over a [`Store`] and a rule base.
pub struct Prover {
    store: Arc<Store>,
    core: CoreSymbols,
    rules: RwLock<Vec<Fact>>,
    spatial: RwLock<Option<Arc<dyn SpatialOracle>>>,
    config: ProveConfig,
}

impl Prover {
    pub fn new(store: Arc<Store>, config: ProveConfig) -> Self {
        let core = *store.core();
        Self {
            store,
            core,
            rules: RwLock::new(Vec::new()),
            spatial: RwLock::new(None),
            config,
        }
    }

    fn symbols(&self) -> &SymbolTable {
        self.store.symbols()
    }

    fn unifier(&self) -> Unifier<'_> {
        Unifier::new(self.store.symbols(), self.store.taxonomy())
    }

    /// Register an `ifthen` fact as an inference rule. Anything else is
    /// refused; re-registering a fact already in the rule base is a no-op.
    pub fn add_rule(&self, rule: Fact) -> bool {
        if rule.rel() != Some(self.core.ifthen) {
            warn!(
                "not an inference rule: {}",
                rule.proposition().display(self.symbols())
            );
            return false;
        }
        let mut rules = self.rules.write().expect("prover lock poisoned");
        if !rules.iter().any(|r| r.id == rule.id) {
            rules.push(rule);
        }
        true
    }

    /// Register every `ifthen` fact in `facts`, returning how many were
    /// accepted.
    pub fn add_rules<I>(&self, facts: I) -> usize
    where
        I: IntoIterator<Item = Fact>,
    {
        let mut rules = self.rules.write().expect("prover lock poisoned");
        let mut accepted = 0;
        for fact in facts {
            if fact.rel() == Some(self.core.ifthen) && !rules.iter().any(|r| r.id == fact.id) {
                rules.push(fact);
                accepted += 1;
            }
        }
        accepted
    }

    pub fn rule_count(&self) -> usize {
        self.rules.read().expect("prover lock poisoned").len()
    }

    pub fn set_spatial(&self, oracle: Arc<dyn SpatialOracle>) {
        *self.spatial.write().expect("prover lock poisoned") = Some(oracle);
    }

    /// Prove `goal` as of `ts` (or over `range`) in context `cx`.
    ///
    /// `extra` supplies ad hoc facts that hold for this call only. Proofs
    /// come back sorted by descending score.
    pub fn prove(
        &self,
        ts: Timestamp,
        range: Option<&TimeRange>,
        cx: ContextId,
        goal: &Term,
        extra: &[Term],
    ) -> Vec<Proof> {
        let mut proofs = self.prove_inner(ts, range, cx, goal, extra, 0);
        proofs.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        proofs
    }

    /// Prove `pattern` and return the instantiated propositions, deduplicated
    /// and ordered by the best proof first.
    pub fn prove_retrieve(
        &self,
        ts: Timestamp,
        range: Option<&TimeRange>,
        cx: ContextId,
        pattern: &Term,
    ) -> Vec<Term> {
        let pattern = pattern.without_trailing_weight();
        let unifier = self.unifier();
        let mut out = Vec::new();
        for proof in self.prove(ts, range, cx, &pattern, &[]) {
            let term = unifier.instantiate(&proof.fact, &proof.bindings);
            if !out.contains(&term) {
                out.push(term);
            }
        }
        out
    }

    fn prove_inner(
        &self,
        ts: Timestamp,
        range: Option<&TimeRange>,
        cx: ContextId,
        goal: &Term,
        extra: &[Term],
        depth: u32,
    ) -> Vec<Proof> {
        if depth > self.config.max_depth {
            debug!(
                depth,
                "proof depth limit reached at {}",
                goal.display(self.symbols())
            );
            return Vec::new();
        }
        trace!(depth, "prove {}", goal.display(self.symbols()));
        let head = goal.rel();
        let proofs = match head {
            Some(h) if h == self.core.isa || h == self.core.ako => self.prove_isa(goal),
            Some(h) if h == self.core.and => self.prove_and(ts, range, cx, goal, extra, depth),
            Some(h) if h == self.core.or => self.prove_or(ts, range, cx, goal, extra, depth),
            Some(h) if h == self.core.not => self.prove_not(ts, range, cx, goal, extra, depth),
            Some(h) if self.store.taxonomy().isa(self.core.arithmetic_relation, h) => {
                self.prove_comparative(goal)
            }
            _ => self.prove_fact(ts, range, cx, goal, extra, depth),
        };
        trace!(
            depth,
            proofs = proofs.len(),
            "{} {}",
            if proofs.is_empty() { "unproved" } else { "proved" },
            goal.display(self.symbols())
        );
        proofs
    }

    /// `isa`/`ako` goals. A variable on either side enumerates the taxonomy;
    /// enumeration is reflexive, so the bound endpoint itself is among the
    /// answers.
    fn prove_isa(&self, goal: &Term) -> Vec<Proof> {
        let symbols = self.symbols();
        let (Some(arg1), Some(arg2)) = (goal.arg(1), goal.arg(2)) else {
            return Vec::new();
        };
        let rule = Term::Symbol(self.core.isa);
        let config = TraversalConfig::default();
        if arg1.is_var(symbols) {
            let (Some(var), Some(class)) = (arg1.as_symbol(), arg2.as_symbol()) else {
                return Vec::new();
            };
            return traverse::descendants(self.store.taxonomy(), symbols, class, &config)
                .into_iter()
                .map(|d| {
                    let mut bindings = Bindings::new();
                    bindings.bind(var, Term::Symbol(d));
                    Proof {
                        score: 1.0,
                        fact: goal.clone(),
                        bindings,
                        rule: rule.clone(),
                        reasons: Vec::new(),
                    }
                })
                .collect();
        }
        if arg2.is_var(symbols) {
            let (Some(var), Some(seed)) = (arg2.as_symbol(), arg1.as_symbol()) else {
                return Vec::new();
            };
            return std::iter::once(seed)
                .chain(traverse::ancestors(
                    self.store.taxonomy(),
                    symbols,
                    seed,
                    &config,
                ))
                .map(|a| {
                    let mut bindings = Bindings::new();
                    bindings.bind(var, Term::Symbol(a));
                    Proof {
                        score: 1.0,
                        fact: goal.clone(),
                        bindings,
                        rule: rule.clone(),
                        reasons: Vec::new(),
                    }
                })
                .collect();
        }
        let (Some(des), Some(anc)) = (arg1.as_symbol(), arg2.as_symbol()) else {
            return Vec::new();
        };
        if self.store.taxonomy().isa(anc, des) {
            vec![Proof {
                score: 1.0,
                fact: goal.clone(),
                bindings: Bindings::new(),
                rule,
                reasons: Vec::new(),
            }]
        } else {
            Vec::new()
        }
    }

    /// Conjunction. Proofs of the first conjunct seed the search; each later
    /// conjunct is instantiated with the bindings accumulated so far, and a
    /// stage with no survivors fails the whole goal.
    fn prove_and(
        &self,
        ts: Timestamp,
        range: Option<&TimeRange>,
        cx: ContextId,
        goal: &Term,
        extra: &[Term],
        depth: u32,
    ) -> Vec<Proof> {
        let Some(elements) = goal.elements() else {
            return Vec::new();
        };
        if elements.len() < 2 {
            return Vec::new();
        }
        let rule = Term::Symbol(self.core.and);
        let unifier = self.unifier();
        let first = self.prove_inner(ts, range, cx, &elements[1], extra, depth + 1);
        let mut acc = add_level(1.0, None, goal, &rule, first);
        if acc.is_empty() {
            return Vec::new();
        }
        for conjunct in &elements[2..] {
            let mut next = Vec::new();
            for proof in &acc {
                let instantiated = unifier.instantiate(conjunct, &proof.bindings);
                let sub = self.prove_inner(ts, range, cx, &instantiated, extra, depth + 1);
                let wrapped = add_level(1.0, None, goal, &rule, sub);
                append_each(proof, &wrapped, &mut next);
            }
            if next.is_empty() {
                return Vec::new();
            }
            acc = next;
        }
        acc
    }

    /// Disjunction: the union of the disjuncts' proofs. No disjunct proving
    /// means the goal fails.
    fn prove_or(
        &self,
        ts: Timestamp,
        range: Option<&TimeRange>,
        cx: ContextId,
        goal: &Term,
        extra: &[Term],
        depth: u32,
    ) -> Vec<Proof> {
        let Some(elements) = goal.elements() else {
            return Vec::new();
        };
        let rule = Term::Symbol(self.core.or);
        let mut acc = Vec::new();
        for disjunct in &elements[1..] {
            let sub = self.prove_inner(ts, range, cx, disjunct, extra, depth + 1);
            acc.extend(add_level(1.0, None, goal, &rule, sub));
        }
        acc
    }

    /// Negation as failure.
    fn prove_not(
        &self,
        ts: Timestamp,
        range: Option<&TimeRange>,
        cx: ContextId,
        goal: &Term,
        extra: &[Term],
        depth: u32,
    ) -> Vec<Proof> {
        let Some(inner) = goal.arg(1) else {
            return Vec::new();
        };
        if self
            .prove_inner(ts, range, cx, inner, extra, depth + 1)
            .is_empty()
        {
            vec![Proof {
                score: 1.0,
                fact: goal.clone(),
                bindings: Bindings::new(),
                rule: Term::Symbol(self.core.not),
                reasons: Vec::new(),
            }]
        } else {
            Vec::new()
        }
    }

    /// Comparative goals under `arithmetic-relation`. Two numbers compare
    /// numerically; anything else supports only structural `eq`/`ne`.
    fn prove_comparative(&self, goal: &Term) -> Vec<Proof> {
        let symbols = self.symbols();
        let (Some(head), Some(arg1), Some(arg2)) = (goal.rel(), goal.arg(1), goal.arg(2)) else {
            return Vec::new();
        };
        let (holds, rule_sym) = match (arg1.as_number(), arg2.as_number()) {
            (Some(a), Some(b)) => {
                let holds = if head == self.core.eq {
                    a == b
                } else if head == self.core.ne {
                    a != b
                } else if head == self.core.lt {
                    a < b
                } else if head == self.core.le {
                    a <= b
                } else if head == self.core.gt {
                    a > b
                } else if head == self.core.ge {
                    a >= b
                } else {
                    debug!("unknown arithmetic relation {}", goal.display(symbols));
                    false
                };
                (holds, self.core.arithmetic_relation)
            }
            _ => {
                let holds = if head == self.core.eq {
                    arg1 == arg2
                } else if head == self.core.ne {
                    arg1 != arg2
                } else {
                    debug!("unhandled relation {}", goal.display(symbols));
                    false
                };
                (holds, self.core.relation)
            }
        };
        if holds {
            vec![Proof {
                score: 1.0,
                fact: goal.clone(),
                bindings: Bindings::new(),
                rule: Term::Symbol(rule_sym),
                reasons: Vec::new(),
            }]
        } else {
            Vec::new()
        }
    }

    /// Ordinary goals: spatial oracle, stored facts, ad hoc facts, then
    /// backward chaining through the rule base. All sources contribute to
    /// the same answer set.
    fn prove_fact(
        &self,
        ts: Timestamp,
        range: Option<&TimeRange>,
        cx: ContextId,
        goal: &Term,
        extra: &[Term],
        depth: u32,
    ) -> Vec<Proof> {
        let symbols = self.symbols();
        let taxonomy = self.store.taxonomy();
        let unifier = self.unifier();
        let truth = Term::Symbol(self.core.truth);
        let spatial = self
            .spatial
            .read()
            .expect("prover lock poisoned")
            .as_ref()
            .map(Arc::clone);
        let head = goal.rel();
        let mut proofs = Vec::new();

        if let (Some(oracle), Some(h)) = (spatial.as_ref(), head) {
            if taxonomy.isa(self.core.location_of, h) {
                if let (Some(obj), Some(loc)) = (goal.arg(1), goal.arg(2)) {
                    if oracle.located_at(ts, range, obj, loc).is_some() {
                        proofs.push(Proof {
                            score: 1.0,
                            fact: goal.clone(),
                            bindings: Bindings::new(),
                            rule: truth.clone(),
                            reasons: Vec::new(),
                        });
                    }
                }
            }
            if taxonomy.isa(self.core.near, h) {
                if let (Some(a), Some(b)) = (goal.arg(1), goal.arg(2)) {
                    // Nearness is symmetric; accept either orientation.
                    if !oracle.find_near(ts, range, a, b).is_empty()
                        || !oracle.find_near(ts, range, b, a).is_empty()
                    {
                        proofs.push(Proof {
                            score: 1.0,
                            fact: goal.clone(),
                            bindings: Bindings::new(),
                            rule: truth.clone(),
                            reasons: Vec::new(),
                        });
                    }
                }
            }
        }

        // Stored facts. Each slot is widened downward in turn; the first
        // slot that produces matches settles the database answer.
        if goal.is_compound() {
            for slot in 0..goal.len() {
                let matches =
                    self.store
                        .retrieve_desc(ts, range, cx, goal, slot, false, self.store.widen_depth());
                if matches.is_empty() {
                    continue;
                }
                for fact in &matches {
                    let proposition = fact.proposition();
                    match unifier.unify(goal, &proposition, &Bindings::new()) {
                        Some(bindings) => proofs.push(Proof {
                            score: fact.score(),
                            fact: proposition,
                            bindings,
                            rule: truth.clone(),
                            reasons: Vec::new(),
                        }),
                        None => warn!(
                            "retrieved fact fails full unification: {}",
                            proposition.display(symbols)
                        ),
                    }
                }
                break;
            }
        }

        if let (Some(oracle), Some(h)) = (spatial.as_ref(), head) {
            if taxonomy.isa(self.core.near_audible, h) {
                if let (Some(listener), Some(source)) = (goal.arg(1), goal.arg(2)) {
                    if let Some(var) = listener.as_symbol().filter(|s| symbols.is_var(*s)) {
                        if let Some(class) = symbols.var_class(var) {
                            for found in oracle.find_near_audible(ts, range, class, source) {
                                let mut bindings = Bindings::new();
                                bindings.bind(var, found);
                                proofs.push(Proof {
                                    score: 1.0,
                                    fact: goal.clone(),
                                    bindings,
                                    rule: truth.clone(),
                                    reasons: Vec::new(),
                                });
                            }
                        }
                    }
                }
            }
        }

        for adhoc in extra {
            if let Some(bindings) = unifier.unify(adhoc, goal, &Bindings::new()) {
                proofs.push(Proof {
                    score: adhoc.trailing_weight().unwrap_or(1.0),
                    fact: goal.clone(),
                    bindings,
                    rule: truth.clone(),
                    reasons: Vec::new(),
                });
            }
        }

        let rules = self.rules.read().expect("prover lock poisoned").clone();
        for rule in &rules {
            let (Some(premise), Some(conclusion)) = (rule.element(1), rule.element(2)) else {
                continue;
            };
            let Some(bindings) = unifier.unify(conclusion, goal, &Bindings::new()) else {
                continue;
            };
            let instantiated = unifier.instantiate(premise, &bindings);
            let subproofs = self.prove_inner(ts, range, cx, &instantiated, extra, depth + 1);
            proofs.extend(add_level(
                rule.score(),
                Some(&bindings),
                goal,
                &rule.weighted_term(),
                subproofs,
            ));
        }

        proofs
    }
}

impl std::fmt::Debug for Prover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prover")
            .field("rules", &self.rule_count())
            .field(
                "spatial",
                &self.spatial.read().expect("prover lock poisoned").is_some(),
            )
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
