//! The multiple-inheritance taxonomy over symbols.
//!
//! Symbols form a directed acyclic graph where an edge `child -> parent`
//! records that the child is an instance or subclass of the parent. The graph
//! backs three operations the rest of the engine leans on constantly:
//!
//! - [`Taxonomy::isa`] — reachability from descendant to ancestor
//! - [`Taxonomy::isap`] — "is a permissible", the typed-membership test used
//!   by unification and slot restriction checks
//! - the widening traversals in [`traverse`]
//!
//! Uses petgraph's `DiGraph` guarded by an `RwLock`, with a dashmap side
//! index from symbol to node so lookups skip the lock entirely.

pub mod traverse;

use std::collections::{HashSet, VecDeque};
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::{DashMap, DashSet};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::{RekhResult, TaxonomyError};
use crate::symbol::{CoreSymbols, SymbolId, SymbolKind, SymbolTable};
use crate::term::Term;

/// The inheritance graph.
pub struct Taxonomy {
    graph: RwLock<DiGraph<SymbolId, ()>>,
    node_index: DashMap<SymbolId, NodeIndex>,
    barriers: DashSet<SymbolId>,
    core: CoreSymbols,
    max_isa_depth: u32,
    edge_count: AtomicUsize,
}

impl Taxonomy {
    pub fn new(core: CoreSymbols, max_isa_depth: u32) -> Self {
        Self {
            graph: RwLock::new(DiGraph::new()),
            node_index: DashMap::new(),
            barriers: DashSet::new(),
            core,
            max_isa_depth,
            edge_count: AtomicUsize::new(0),
        }
    }

    /// Get or create the graph node for a symbol.
    fn ensure_node(&self, sym: SymbolId) -> NodeIndex {
        if let Some(idx) = self.node_index.get(&sym) {
            return *idx;
        }
        let mut graph = self.graph.write().expect("taxonomy lock poisoned");
        // Double-check: another thread may have added it while we waited.
        if let Some(idx) = self.node_index.get(&sym) {
            return *idx;
        }
        let idx = graph.add_node(sym);
        self.node_index.insert(sym, idx);
        idx
    }

    /// Record that `child` is an instance or subclass of `parent`.
    ///
    /// Fails with [`TaxonomyError::RedundantIsa`] when the parent is already
    /// reachable (loaders treat that as a skippable warning) and with
    /// [`TaxonomyError::IsaCycle`] when the edge would close a cycle.
    pub fn add_isa(
        &self,
        symbols: &SymbolTable,
        child: SymbolId,
        parent: SymbolId,
    ) -> RekhResult<()> {
        if self.isa(parent, child) {
            tracing::debug!(
                child = %symbols.name(child),
                parent = %symbols.name(parent),
                "redundant isa edge"
            );
            return Err(TaxonomyError::RedundantIsa {
                child: symbols.name(child),
                parent: symbols.name(parent),
            }
            .into());
        }
        if self.isa(child, parent) {
            tracing::warn!(
                child = %symbols.name(child),
                parent = %symbols.name(parent),
                "isa edge rejected, would close a cycle"
            );
            return Err(TaxonomyError::IsaCycle {
                child: symbols.name(child),
                parent: symbols.name(parent),
            }
            .into());
        }
        let child_idx = self.ensure_node(child);
        let parent_idx = self.ensure_node(parent);
        let mut graph = self.graph.write().expect("taxonomy lock poisoned");
        graph.add_edge(child_idx, parent_idx, ());
        self.edge_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Whether `anc` is `des` itself or reachable from it through parents.
    ///
    /// Breadth-first so the shallowest occurrence of each node wins, with the
    /// ascent capped at `max_isa_depth` levels.
    pub fn isa(&self, anc: SymbolId, des: SymbolId) -> bool {
        if anc == des {
            return true;
        }
        let Some(start) = self.node_index.get(&des).map(|r| *r) else {
            return false;
        };
        let graph = self.graph.read().expect("taxonomy lock poisoned");
        let mut visited = HashSet::new();
        visited.insert(des);
        let mut queue = VecDeque::new();
        queue.push_back((start, 0u32));
        while let Some((idx, depth)) = queue.pop_front() {
            if depth >= self.max_isa_depth {
                continue;
            }
            for parent_idx in graph.neighbors_directed(idx, Direction::Outgoing) {
                let parent = graph[parent_idx];
                if parent == anc {
                    return true;
                }
                if visited.insert(parent) {
                    queue.push_back((parent_idx, depth + 1));
                }
            }
        }
        false
    }

    /// Typed-membership test: is `value` acceptable as an instance of `class`?
    ///
    /// Extends [`Taxonomy::isa`] to non-symbol terms. Numbers satisfy number
    /// classes, strings satisfy their class symbols, variables satisfy
    /// anything, `na` satisfies anything, and logical combinations (`and`,
    /// `or`, `not`) on the class side distribute over the test. Intension
    /// terms (determiner-headed or `such-that`) are judged by the concept
    /// they pick out.
    pub fn isap(&self, symbols: &SymbolTable, class: &Term, value: &Term) -> bool {
        let core = &self.core;
        // Determiner-headed intensions stand for their arg 1 concept.
        if let (Some(rel), Some(inner)) = (value.rel(), value.arg(1)) {
            if self.isa(core.determiner, rel) {
                return self.isap(symbols, class, inner);
            }
        }
        if let Term::Compound(elements) = class {
            let rest = elements.get(1..).unwrap_or(&[]);
            return match class.rel() {
                Some(rel) if rel == core.or => rest.iter().any(|c| self.isap(symbols, c, value)),
                Some(rel) if rel == core.and => rest.iter().all(|c| self.isap(symbols, c, value)),
                Some(rel) if rel == core.not => !rest.iter().any(|c| self.isap(symbols, c, value)),
                // Any other compound class accepts nothing.
                _ => false,
            };
        }
        if value.as_symbol() == Some(core.na) {
            return true;
        }
        if let Some(class_sym) = class.as_symbol() {
            if class_sym == core.nonhuman {
                return !self.isap(symbols, &Term::Symbol(core.human), value);
            }
            if class_sym == core.location {
                return self.isap(symbols, &Term::Symbol(core.physical_object), value)
                    || self.isap(symbols, &Term::Symbol(core.polity), value);
            }
        }
        if value.is_var(symbols) {
            return true;
        }
        if let Some(class_sym) = class.as_symbol() {
            if matches!(value, Term::Number(_)) && self.isa(core.number, class_sym) {
                return true;
            }
        }
        if let (Term::Number(c), Term::Number(v)) = (class, value) {
            return c == v;
        }
        if let Some(class_sym) = class.as_symbol() {
            if class_sym == core.list {
                return value.is_compound();
            }
            if class_sym == core.string {
                return matches!(value, Term::Str { .. });
            }
            if class_sym == core.time_range && matches!(value, Term::Range(_)) {
                return true;
            }
            if class_sym == core.concept {
                return true;
            }
        }
        if let Term::Compound(elements) = value {
            if value.rel() == Some(core.such_that) {
                return value
                    .arg(1)
                    .map(|v| self.isap(symbols, class, v))
                    .unwrap_or(false);
            }
            if value.rel() == Some(core.and) {
                let rest = elements.get(1..).unwrap_or(&[]);
                return rest.iter().any(|v| self.isap(symbols, class, v));
            }
            // A proposition is judged by its relation, so that an event
            // like [walk jim] counts as an action.
            return elements
                .first()
                .map(|head| self.isap(symbols, class, head))
                .unwrap_or(false);
        }
        if let (Some(class_sym), Term::Str { class: vclass, .. }) = (class.as_symbol(), value) {
            return self.isa(class_sym, *vclass);
        }
        if let (Some(class_sym), Some(value_sym)) = (class.as_symbol(), value.as_symbol()) {
            return self.isa(class_sym, value_sym);
        }
        false
    }

    /// Direct parents of a symbol.
    pub fn parents(&self, sym: SymbolId) -> Vec<SymbolId> {
        self.neighbors(sym, Direction::Outgoing)
    }

    /// Direct children of a symbol.
    pub fn children(&self, sym: SymbolId) -> Vec<SymbolId> {
        self.neighbors(sym, Direction::Incoming)
    }

    fn neighbors(&self, sym: SymbolId, dir: Direction) -> Vec<SymbolId> {
        let Some(idx) = self.node_index.get(&sym).map(|r| *r) else {
            return Vec::new();
        };
        let graph = self.graph.read().expect("taxonomy lock poisoned");
        graph.neighbors_directed(idx, dir).map(|i| graph[i]).collect()
    }

    /// Mark a symbol as an inheritance barrier.
    pub fn mark_barrier(&self, sym: SymbolId) {
        self.barriers.insert(sym);
    }

    /// Whether traversals should stop expanding at this symbol.
    ///
    /// Barriers are either marked explicitly (via `barrier-isa` assertions)
    /// or named as one: a `::` prefix or an embedded `/`.
    pub fn is_barrier(&self, symbols: &SymbolTable, sym: SymbolId) -> bool {
        if self.barriers.contains(&sym) {
            return true;
        }
        symbols
            .meta(sym)
            .map(|m| m.name.starts_with("::") || m.name.contains('/'))
            .unwrap_or(false)
    }

    /// Whether ancestor traversals should skip this parent.
    pub fn is_contrast(&self, symbols: &SymbolTable, sym: SymbolId) -> bool {
        symbols
            .meta(sym)
            .map(|m| m.kind == SymbolKind::AbstractContrast)
            .unwrap_or(false)
    }

    pub fn node_count(&self) -> usize {
        self.node_index.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for Taxonomy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Taxonomy")
            .field("nodes", &self.node_count())
            .field("edges", &self.edge_count())
            .finish()
    }
}
