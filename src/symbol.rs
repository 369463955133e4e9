//! Core symbol types for the rekh engine.
//!
//! Symbols are the atomic units of the knowledge system. Every concept,
//! relation, and instance is identified by a [`SymbolId`] and described by
//! [`SymbolMeta`]. The [`SymbolTable`] interns names to IDs, thread-safe via
//! dashmap, so the rest of the engine can compare and hash plain `u32`s
//! instead of strings.
//!
//! Naming conventions carried by the table:
//! - names starting with `?` are variables, the bare `?` is the wildcard
//! - names starting with `:` (but not `::`) are contrast concepts, which
//!   taxonomy traversals treat as non-inheriting parents
//! - names starting with `::` or containing `/` are inheritance barriers

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::error::{RekhResult, SymbolError};

/// Unique, niche-optimized identifier for a symbol.
///
/// Uses `NonZeroU32` so that `Option<SymbolId>` is the same size as `SymbolId`
/// (the niche optimization lets the compiler use 0 as the `None` discriminant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct SymbolId(NonZeroU32);

impl SymbolId {
    /// Create a `SymbolId` from a raw `u32`.
    ///
    /// Returns `None` if `raw` is zero.
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(SymbolId)
    }

    /// Get the underlying `u32` value.
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl std::fmt::Display for SymbolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sym:{}", self.0)
    }
}

/// Classification of a symbol in the taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    /// An abstract concept or relation (class-level).
    Abstract,
    /// A concrete instance (a particular dog, a particular event).
    Concrete,
    /// A contrast concept grouping mutually exclusive alternatives.
    AbstractContrast,
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SymbolKind::Abstract => write!(f, "Abstract"),
            SymbolKind::Concrete => write!(f, "Concrete"),
            SymbolKind::AbstractContrast => write!(f, "AbstractContrast"),
        }
    }
}

/// What `intern` should do when a name has no existing symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatePolicy {
    /// Fail with [`SymbolError::Unknown`] on a miss.
    NoCreate,
    /// Create an abstract symbol on a miss.
    CreateAbstract,
    /// Create a concrete symbol on a miss.
    CreateConcrete,
    /// Create a contrast symbol on a miss.
    CreateContrast,
}

/// Metadata describing a symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolMeta {
    /// Unique identifier.
    pub id: SymbolId,
    /// What kind of symbol this is.
    pub kind: SymbolKind,
    /// Canonical (NFC-normalized) name.
    pub name: String,
    /// Whether the name starts with `?`.
    pub is_var: bool,
    /// Whether the name is exactly `?`.
    pub is_wild: bool,
}

/// Thread-safe interning table mapping names to symbol IDs.
pub struct SymbolTable {
    name_to_id: DashMap<String, SymbolId>,
    id_to_meta: DashMap<SymbolId, SymbolMeta>,
    next_id: AtomicU32,
    instance_counters: DashMap<SymbolId, u64>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            name_to_id: DashMap::new(),
            id_to_meta: DashMap::new(),
            next_id: AtomicU32::new(1),
            instance_counters: DashMap::new(),
        }
    }

    /// Intern `name`, returning its symbol ID.
    ///
    /// Names are NFC-normalized first, so visually identical names always map
    /// to the same symbol. On a miss the `policy` decides whether a new symbol
    /// is created and what kind it gets; names starting with a single `:`
    /// become contrast symbols regardless of the requested kind.
    ///
    /// # Arguments
    ///
    /// * `name` - The symbol name to intern.
    /// * `policy` - What to do when the name is not yet known.
    pub fn intern(&self, name: &str, policy: CreatePolicy) -> RekhResult<SymbolId> {
        let name: String = name.nfc().collect();
        if name.is_empty() {
            return Err(SymbolError::EmptyName.into());
        }
        if let Some(id) = self.name_to_id.get(&name) {
            return Ok(*id);
        }
        let requested = match policy {
            CreatePolicy::NoCreate => {
                return Err(SymbolError::Unknown { name }.into());
            }
            CreatePolicy::CreateAbstract => SymbolKind::Abstract,
            CreatePolicy::CreateConcrete => SymbolKind::Concrete,
            CreatePolicy::CreateContrast => SymbolKind::AbstractContrast,
        };
        let kind = if name.starts_with(':') && !name.starts_with("::") {
            SymbolKind::AbstractContrast
        } else {
            requested
        };
        // Entry API so that two threads interning the same new name race to a
        // single winner; the loser reads the winner's ID.
        let entry = self.name_to_id.entry(name.clone());
        match entry {
            dashmap::mapref::entry::Entry::Occupied(occ) => Ok(*occ.get()),
            dashmap::mapref::entry::Entry::Vacant(vac) => {
                let raw = self.next_id.fetch_add(1, Ordering::Relaxed);
                let id = SymbolId::new(raw).ok_or(SymbolError::AllocatorExhausted)?;
                let is_wild = name == "?";
                let meta = SymbolMeta {
                    id,
                    kind,
                    is_var: name.starts_with('?'),
                    is_wild,
                    name,
                };
                self.id_to_meta.insert(id, meta);
                vac.insert(id);
                Ok(id)
            }
        }
    }

    /// Look up a name without creating anything.
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        let name: String = name.nfc().collect();
        self.name_to_id.get(&name).map(|r| *r)
    }

    /// Fetch the metadata of a symbol.
    pub fn meta(&self, id: SymbolId) -> Option<SymbolMeta> {
        self.id_to_meta.get(&id).map(|r| r.clone())
    }

    /// Resolve a symbol's name, falling back to `sym:{id}` for unknown IDs.
    pub fn name(&self, id: SymbolId) -> String {
        self.id_to_meta
            .get(&id)
            .map(|r| r.name.clone())
            .unwrap_or_else(|| format!("sym:{}", id.get()))
    }

    /// Whether the symbol is a variable (`?x`, `?human`, or the bare `?`).
    pub fn is_var(&self, id: SymbolId) -> bool {
        self.id_to_meta.get(&id).map(|r| r.is_var).unwrap_or(false)
    }

    /// Whether the symbol is the wildcard variable `?`.
    pub fn is_wildcard(&self, id: SymbolId) -> bool {
        self.id_to_meta.get(&id).map(|r| r.is_wild).unwrap_or(false)
    }

    /// The class restriction of a typed variable, if any.
    ///
    /// `?human` restricts to the class `human` when such a symbol exists;
    /// the bare wildcard and variables naming no known class return `None`.
    pub fn var_class(&self, id: SymbolId) -> Option<SymbolId> {
        let meta = self.id_to_meta.get(&id)?;
        if !meta.is_var || meta.is_wild {
            return None;
        }
        self.lookup(&meta.name[1..])
    }

    /// Mint a fresh concrete instance of `class`, named `{class}{n}`.
    ///
    /// A per-class counter picks `n`; names already taken (for example loaded
    /// from a knowledge file) are skipped.
    pub fn create_instance(&self, class: SymbolId) -> RekhResult<SymbolId> {
        let base = self.name(class);
        let mut counter = self.instance_counters.entry(class).or_insert(0);
        loop {
            *counter += 1;
            let candidate = format!("{base}{}", *counter);
            if self.name_to_id.contains_key(&candidate) {
                continue;
            }
            return self.intern(&candidate, CreatePolicy::CreateConcrete);
        }
    }

    /// Number of interned symbols.
    pub fn len(&self) -> usize {
        self.id_to_meta.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_meta.is_empty()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SymbolTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolTable")
            .field("symbols", &self.id_to_meta.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Well-known symbols
// ---------------------------------------------------------------------------

/// The symbols the engine itself gives meaning to, resolved once at startup.
///
/// Holding these as plain IDs lets hot paths (unification, proving, widened
/// retrieval) compare against them without string lookups.
#[derive(Debug, Clone, Copy)]
pub struct CoreSymbols {
    /// The wildcard variable `?`.
    pub wildcard: SymbolId,
    /// The not-applicable sentinel `na`.
    pub na: SymbolId,
    /// Instance-of / subclass-of link `isa`.
    pub isa: SymbolId,
    /// Subclass-of link `ako`, treated identically to `isa`.
    pub ako: SymbolId,
    /// Logical conjunction head.
    pub and: SymbolId,
    /// Logical disjunction head.
    pub or: SymbolId,
    /// Negation head (proved by failure).
    pub not: SymbolId,
    /// Inference rule head `ifthen`.
    pub ifthen: SymbolId,
    /// Marker for proofs grounded directly in stored facts.
    pub truth: SymbolId,
    pub eq: SymbolId,
    pub ne: SymbolId,
    pub lt: SymbolId,
    pub le: SymbolId,
    pub gt: SymbolId,
    pub ge: SymbolId,
    /// Class of the numeric comparison relations.
    pub arithmetic_relation: SymbolId,
    /// Marker for proofs by structural object comparison.
    pub relation: SymbolId,
    /// Root concept every symbol descends from.
    pub concept: SymbolId,
    /// Class of numbers.
    pub number: SymbolId,
    /// Class of strings.
    pub string: SymbolId,
    /// Class of list values.
    pub list: SymbolId,
    /// Class of time-range values.
    pub time_range: SymbolId,
    pub human: SymbolId,
    pub nonhuman: SymbolId,
    pub location: SymbolId,
    pub physical_object: SymbolId,
    pub polity: SymbolId,
    /// Head of `such-that` intension terms.
    pub such_that: SymbolId,
    /// Class of determiner heads in intension terms.
    pub determiner: SymbolId,
    /// Relation marking a symbol as an inheritance barrier.
    pub barrier_isa: SymbolId,
    /// Concrete part-whole relation.
    pub cpart_of: SymbolId,
    /// Class-level part-whole relation.
    pub part_of: SymbolId,
    pub owner_of: SymbolId,
    pub residence_of: SymbolId,
    pub headquarters_of: SymbolId,
    pub unique_author_of: SymbolId,
    /// Slot restriction relations `r1` through `r4`.
    pub restrict_slots: [SymbolId; 4],
    pub location_of: SymbolId,
    pub near: SymbolId,
    pub near_audible: SymbolId,
}

impl CoreSymbols {
    /// Intern every well-known symbol in `symbols` and capture the IDs.
    pub fn resolve(symbols: &SymbolTable) -> RekhResult<Self> {
        let get = |name: &str| symbols.intern(name, CreatePolicy::CreateAbstract);
        Ok(Self {
            wildcard: get("?")?,
            na: get("na")?,
            isa: get("isa")?,
            ako: get("ako")?,
            and: get("and")?,
            or: get("or")?,
            not: get("not")?,
            ifthen: get("ifthen")?,
            truth: get("true")?,
            eq: get("eq")?,
            ne: get("ne")?,
            lt: get("lt")?,
            le: get("le")?,
            gt: get("gt")?,
            ge: get("ge")?,
            arithmetic_relation: get("arithmetic-relation")?,
            relation: get("relation")?,
            concept: get("concept")?,
            number: get("number")?,
            string: get("string")?,
            list: get("list")?,
            time_range: get("time-range")?,
            human: get("human")?,
            nonhuman: get("nonhuman")?,
            location: get("location")?,
            physical_object: get("physical-object")?,
            polity: get("polity")?,
            such_that: get("such-that")?,
            determiner: get("determiner")?,
            barrier_isa: get("barrier-isa")?,
            cpart_of: get("cpart-of")?,
            part_of: get("part-of")?,
            owner_of: get("owner-of")?,
            residence_of: get("residence-of")?,
            headquarters_of: get("headquarters-of")?,
            unique_author_of: get("unique-author-of")?,
            restrict_slots: [get("r1")?, get("r2")?, get("r3")?, get("r4")?],
            location_of: get("location-of")?,
            near: get("near")?,
            near_audible: get("near-audible")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_id_niche_optimization() {
        // Option<SymbolId> should be the same size as SymbolId thanks to NonZeroU32.
        assert_eq!(
            std::mem::size_of::<Option<SymbolId>>(),
            std::mem::size_of::<SymbolId>()
        );
    }

    #[test]
    fn symbol_id_zero_is_none() {
        assert!(SymbolId::new(0).is_none());
        assert!(SymbolId::new(1).is_some());
        assert_eq!(SymbolId::new(42).unwrap().get(), 42);
    }

    #[test]
    fn intern_is_idempotent() {
        let table = SymbolTable::new();
        let a = table.intern("dog", CreatePolicy::CreateAbstract).unwrap();
        let b = table.intern("dog", CreatePolicy::CreateAbstract).unwrap();
        assert_eq!(a, b);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn no_create_miss_fails() {
        let table = SymbolTable::new();
        let err = table.intern("ghost", CreatePolicy::NoCreate);
        assert!(err.is_err());
        assert!(table.lookup("ghost").is_none());
    }

    #[test]
    fn empty_name_rejected() {
        let table = SymbolTable::new();
        assert!(table.intern("", CreatePolicy::CreateAbstract).is_err());
    }

    #[test]
    fn nfc_normalization_unifies_names() {
        let table = SymbolTable::new();
        // "é" composed vs decomposed.
        let composed = table.intern("caf\u{e9}", CreatePolicy::CreateAbstract).unwrap();
        let decomposed = table
            .intern("cafe\u{301}", CreatePolicy::CreateAbstract)
            .unwrap();
        assert_eq!(composed, decomposed);
    }

    #[test]
    fn variable_detection() {
        let table = SymbolTable::new();
        let wild = table.intern("?", CreatePolicy::CreateAbstract).unwrap();
        let var = table.intern("?x", CreatePolicy::CreateAbstract).unwrap();
        let plain = table.intern("dog", CreatePolicy::CreateAbstract).unwrap();
        assert!(table.is_var(wild));
        assert!(table.is_wildcard(wild));
        assert!(table.is_var(var));
        assert!(!table.is_wildcard(var));
        assert!(!table.is_var(plain));
    }

    #[test]
    fn var_class_resolves_known_class() {
        let table = SymbolTable::new();
        let human = table.intern("human", CreatePolicy::CreateAbstract).unwrap();
        let var = table.intern("?human", CreatePolicy::CreateAbstract).unwrap();
        assert_eq!(table.var_class(var), Some(human));

        let untyped = table.intern("?x42", CreatePolicy::CreateAbstract).unwrap();
        assert_eq!(table.var_class(untyped), None);
    }

    #[test]
    fn contrast_prefix_overrides_kind() {
        let table = SymbolTable::new();
        let id = table
            .intern(":animate-contrast", CreatePolicy::CreateAbstract)
            .unwrap();
        assert_eq!(table.meta(id).unwrap().kind, SymbolKind::AbstractContrast);
    }

    #[test]
    fn create_instance_mints_fresh_names() {
        let table = SymbolTable::new();
        let ball = table.intern("ball", CreatePolicy::CreateAbstract).unwrap();
        // ball1 already taken, so minting must skip to ball2.
        table.intern("ball1", CreatePolicy::CreateConcrete).unwrap();
        let inst = table.create_instance(ball).unwrap();
        assert_eq!(table.name(inst), "ball2");
        assert_eq!(table.meta(inst).unwrap().kind, SymbolKind::Concrete);
        let next = table.create_instance(ball).unwrap();
        assert_eq!(table.name(next), "ball3");
    }

    #[test]
    fn core_symbols_resolve() {
        let table = SymbolTable::new();
        let core = CoreSymbols::resolve(&table).unwrap();
        assert_eq!(table.name(core.isa), "isa");
        assert_eq!(table.name(core.arithmetic_relation), "arithmetic-relation");
        assert!(table.is_wildcard(core.wildcard));
        assert_eq!(table.name(core.restrict_slots[0]), "r1");
    }

    #[test]
    fn unknown_id_name_falls_back() {
        let table = SymbolTable::new();
        let ghost = SymbolId::new(999).unwrap();
        assert_eq!(table.name(ghost), "sym:999");
    }
}
