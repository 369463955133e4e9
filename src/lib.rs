//! # rekh
//!
//! A temporal, context-aware commonsense knowledge engine: assertions are
//! scoped to time intervals and nested discourse contexts, retrieval widens
//! queries through a multiple-inheritance taxonomy, and a backward-chaining
//! prover returns scored proof trees.
//!
//! ## Architecture
//!
//! - **Symbols** (`symbol`): interned names with abstract/concrete kinds and
//!   `?class` variables
//! - **Taxonomy** (`taxonomy`): multiple-inheritance ISA graph with barriers
//!   and bounded traversal
//! - **Store** (`store`): five-way indexed fact table with temporal,
//!   context-visible retrieval, copy-on-write retraction, and part-whole
//!   search
//! - **Prover** (`prove`): backward chaining over facts and `ifthen` rules,
//!   producing scored proofs
//! - **Reader/loader** (`parse`, `loader`): bracket-syntax terms from
//!   line-oriented knowledge files, gzip transparent
//!
//! ## Library usage
//!
//! ```no_run
//! use rekh::engine::Engine;
//! use rekh::temporal::{TimeRange, Timestamp};
//!
//! let engine = Engine::with_defaults().unwrap();
//! let root = engine.contexts().root();
//! let always = TimeRange::always(root);
//!
//! let isa = engine.parse_term("[isa rex dog]").unwrap();
//! let rule = engine.parse_term("[ifthen [isa ?x dog] [barks ?x]]").unwrap();
//! engine.assert_term(always, isa).unwrap();
//! engine.assert_term(always, rule).unwrap();
//!
//! let goal = engine.parse_term("[barks rex]").unwrap();
//! let proofs = engine.prove(Timestamp::now(), None, root, &goal, &[]);
//! assert!(!proofs.is_empty());
//! ```

pub mod context;
pub mod engine;
pub mod error;
pub mod loader;
pub mod parse;
pub mod prove;
pub mod store;
pub mod symbol;
pub mod taxonomy;
pub mod temporal;
pub mod term;
pub mod unify;
