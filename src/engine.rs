//! Engine facade: one value owning every subsystem.
//!
//! The `Engine` wires the symbol table, taxonomy, context tree, assertion
//! store, and prover together and routes assertions to the right places:
//! `isa`/`ako` propositions feed the taxonomy before they are stored,
//! `barrier-isa` marks inheritance barriers, and `ifthen` propositions are
//! registered with the prover's rule base. Multiple independent engines can
//! coexist in one process; nothing here is global.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::{ContextId, ContextTree};
use crate::error::{EngineError, RekhError, RekhResult, TaxonomyError};
use crate::loader::LoadStats;
use crate::parse::{self, ParsedLine};
use crate::prove::{Proof, ProveConfig, Prover, SpatialOracle};
use crate::store::{AssertHook, Fact, FactId, Store};
use crate::symbol::{CoreSymbols, CreatePolicy, SymbolId, SymbolTable};
use crate::taxonomy::Taxonomy;
use crate::temporal::{TimeRange, Timestamp};
use crate::term::Term;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunable limits for an engine instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum proof recursion depth.
    pub max_proof_depth: u32,
    /// Maximum upward steps for an ISA reachability check.
    pub max_isa_depth: u32,
    /// Taxonomy widening depth used by retrieval and the prover.
    pub retrieval_widen_depth: u32,
    /// Iterative-deepening bound for part-whole search.
    pub part_depth: u32,
    /// Whether asserts check selectional restrictions.
    pub validate_restrictions: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_proof_depth: 30,
            max_isa_depth: 30,
            retrieval_widen_depth: 5,
            part_depth: 5,
            validate_restrictions: true,
        }
    }
}

impl EngineConfig {
    /// Load a configuration from a TOML file. Missing fields default.
    pub fn from_toml_path(path: &Path) -> RekhResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|_| EngineError::ConfigFile {
            path: path.display().to_string(),
        })?;
        let config = toml::from_str(&text).map_err(|err| EngineError::InvalidConfig {
            message: err.to_string(),
        })?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The rekh knowledge engine.
pub struct Engine {
    config: EngineConfig,
    symbols: Arc<SymbolTable>,
    taxonomy: Arc<Taxonomy>,
    contexts: Arc<ContextTree>,
    store: Arc<Store>,
    prover: Prover,
    core: CoreSymbols,
}

impl Engine {
    /// Build an engine from `config`.
    pub fn new(config: EngineConfig) -> RekhResult<Self> {
        if config.max_proof_depth == 0 {
            return Err(EngineError::InvalidConfig {
                message: "max_proof_depth must be > 0".into(),
            }
            .into());
        }
        if config.max_isa_depth == 0 {
            return Err(EngineError::InvalidConfig {
                message: "max_isa_depth must be > 0".into(),
            }
            .into());
        }

        tracing::info!(
            proof_depth = config.max_proof_depth,
            isa_depth = config.max_isa_depth,
            widen_depth = config.retrieval_widen_depth,
            "initializing rekh engine"
        );

        let symbols = Arc::new(SymbolTable::new());
        let core = CoreSymbols::resolve(&symbols)?;
        let taxonomy = Arc::new(Taxonomy::new(core, config.max_isa_depth));
        let contexts = Arc::new(ContextTree::new());
        let store = Arc::new(
            Store::new(
                Arc::clone(&symbols),
                Arc::clone(&taxonomy),
                Arc::clone(&contexts),
            )?
            .with_limits(
                config.retrieval_widen_depth,
                config.part_depth,
                config.validate_restrictions,
            ),
        );
        for op in [core.eq, core.ne, core.lt, core.le, core.gt, core.ge] {
            taxonomy.add_isa(&symbols, op, core.arithmetic_relation)?;
        }
        let prover = Prover::new(
            Arc::clone(&store),
            ProveConfig {
                max_depth: config.max_proof_depth,
            },
        );

        Ok(Self {
            config,
            symbols,
            taxonomy,
            contexts,
            store,
            prover,
            core,
        })
    }

    /// Engine with the default configuration.
    pub fn with_defaults() -> RekhResult<Self> {
        Self::new(EngineConfig::default())
    }

    // -----------------------------------------------------------------------
    // Assertion
    // -----------------------------------------------------------------------

    /// Assert `term` over `range`, routing taxonomy and rule side effects.
    ///
    /// `isa`/`ako` terms with two ground symbol arguments insert a taxonomy
    /// edge first; a rejected cycle fails the whole assertion, while a
    /// redundant edge is ignored and the fact still stored. `barrier-isa`
    /// marks its argument, and `ifthen` facts join the prover's rule base.
    pub fn assert_term(&self, range: TimeRange, term: Term) -> RekhResult<FactId> {
        self.assert_full(range, term, None)
    }

    /// Assert with an explicit certainty weight.
    pub fn assert_weighted(&self, range: TimeRange, term: Term, weight: f64) -> RekhResult<FactId> {
        self.assert_full(range, term, Some(weight))
    }

    fn assert_full(&self, range: TimeRange, term: Term, weight: Option<f64>) -> RekhResult<FactId> {
        let head = term.rel();
        if head == Some(self.core.isa) || head == Some(self.core.ako) {
            let child = term.arg(1).and_then(Term::as_symbol);
            let parent = term.arg(2).and_then(Term::as_symbol);
            if let (Some(child), Some(parent)) = (child, parent) {
                if !self.symbols.is_var(child) && !self.symbols.is_var(parent) {
                    match self.taxonomy.add_isa(&self.symbols, child, parent) {
                        Ok(()) | Err(RekhError::Taxonomy(TaxonomyError::RedundantIsa { .. })) => {}
                        Err(err) => return Err(err),
                    }
                }
            }
        }
        if head == Some(self.core.barrier_isa) {
            if let Some(sym) = term.arg(1).and_then(Term::as_symbol) {
                self.taxonomy.mark_barrier(sym);
            }
        }
        let id = match weight {
            Some(w) => self.store.assert_weighted(range, term, w)?,
            None => self.store.assert_fact(range, term)?,
        };
        if head == Some(self.core.ifthen) {
            if let Some(fact) = self.store.fact(id) {
                self.prover.add_rule(fact);
            }
        }
        Ok(id)
    }

    /// Parse and assert one knowledge-file line in context `cx`.
    ///
    /// Lines without a `@range|` prefix hold from `default_ts` onward.
    /// Returns the asserted fact id, or `None` for blank/comment lines.
    pub fn assert_line(
        &self,
        line: &str,
        cx: ContextId,
        default_ts: Timestamp,
    ) -> RekhResult<Option<FactId>> {
        let Some(ParsedLine { range, term }) = parse::parse_line(&self.symbols, line, cx)? else {
            return Ok(None);
        };
        let range = range.unwrap_or(TimeRange::new(default_ts, Timestamp::PosInf, cx));
        self.assert_term(range, term).map(Some)
    }

    /// Stop facts matching `pattern` as of `ts`, viewed from `cx`.
    pub fn retract(&self, ts: Timestamp, cx: ContextId, pattern: &Term) -> Vec<Fact> {
        self.store.retract(ts, cx, pattern)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Exact-match retrieval at `ts` in `cx`.
    pub fn retrieve(&self, ts: Timestamp, cx: ContextId, pattern: &Term) -> Vec<Fact> {
        self.store.retrieve(ts, cx, pattern)
    }

    /// Retrieval over an interval.
    pub fn retrieve_overlapping(&self, range: &TimeRange, pattern: &Term) -> Vec<Fact> {
        self.store.retrieve_overlapping(range, pattern)
    }

    /// Full proof search for `goal`.
    pub fn prove(
        &self,
        ts: Timestamp,
        range: Option<&TimeRange>,
        cx: ContextId,
        goal: &Term,
        extra: &[Term],
    ) -> Vec<Proof> {
        self.prover.prove(ts, range, cx, goal, extra)
    }

    /// Prove `pattern` and return the instantiated matches, best first.
    pub fn query(
        &self,
        ts: Timestamp,
        range: Option<&TimeRange>,
        cx: ContextId,
        pattern: &Term,
    ) -> Vec<Term> {
        self.prover.prove_retrieve(ts, range, cx, pattern)
    }

    // -----------------------------------------------------------------------
    // Collaborator surface
    // -----------------------------------------------------------------------

    /// Intern `name` as an abstract symbol.
    pub fn intern(&self, name: &str) -> RekhResult<SymbolId> {
        self.symbols.intern(name, CreatePolicy::CreateAbstract)
    }

    /// Parse a term in this engine's symbol table.
    pub fn parse_term(&self, text: &str) -> RekhResult<Term> {
        parse::parse_term(&self.symbols, text)
    }

    /// Create a fresh concrete instance of `class`, ISA-linked to it.
    pub fn create_instance(&self, class: SymbolId) -> RekhResult<SymbolId> {
        let instance = self.symbols.create_instance(class)?;
        self.taxonomy.add_isa(&self.symbols, instance, class)?;
        Ok(instance)
    }

    /// Sprout a child context inheriting `parent`'s story time.
    pub fn sprout(&self, parent: ContextId) -> RekhResult<ContextId> {
        Ok(self.contexts.sprout(parent)?)
    }

    /// Register a hook fired after each successful new assertion.
    pub fn on_assert(&self, hook: AssertHook) {
        self.store.register_hook(hook);
    }

    /// Register the spatial oracle consulted for location goals.
    pub fn set_spatial(&self, oracle: Arc<dyn SpatialOracle>) {
        self.prover.set_spatial(oracle);
    }

    /// Load a knowledge file (plain or gzipped) into the root context.
    pub fn load(&self, path: &Path) -> RekhResult<LoadStats> {
        crate::loader::load_path(self, path)
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

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn prover(&self) -> &Prover {
        &self.prover
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn core(&self) -> &CoreSymbols {
        &self.core
    }

    /// Summary counts across the subsystems.
    pub fn info(&self) -> EngineInfo {
        EngineInfo {
            symbols: self.symbols.len(),
            facts: self.store.len(),
            taxonomy_nodes: self.taxonomy.node_count(),
            taxonomy_edges: self.taxonomy.edge_count(),
            contexts: self.contexts.len(),
            rules: self.prover.rule_count(),
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("facts", &self.store.len())
            .field("rules", &self.prover.rule_count())
            .finish_non_exhaustive()
    }
}

/// Summary information about an engine's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineInfo {
    pub symbols: usize,
    pub facts: usize,
    pub taxonomy_nodes: usize,
    pub taxonomy_edges: usize,
    pub contexts: usize,
    pub rules: usize,
}

impl std::fmt::Display for EngineInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "rekh engine info")?;
        writeln!(f, "  symbols:         {}", self.symbols)?;
        writeln!(f, "  facts:           {}", self.facts)?;
        writeln!(f, "  taxonomy nodes:  {}", self.taxonomy_nodes)?;
        writeln!(f, "  taxonomy edges:  {}", self.taxonomy_edges)?;
        writeln!(f, "  contexts:        {}", self.contexts)?;
        writeln!(f, "  rules:           {}", self.rules)?;
        Ok(())
    }
}
