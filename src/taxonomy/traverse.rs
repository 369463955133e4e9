//! Widening traversals over the taxonomy.
//!
//! Retrieval and proving do not walk the graph directly; they call these
//! functions to enumerate the ancestors or descendants a query slot should be
//! widened to. Two symbol conventions shape every walk:
//!
//! - contrast parents (`:`-prefixed) group alternatives and are never
//!   ascended into
//! - barriers (`::`-prefixed, `/`-containing, or marked via `barrier-isa`)
//!   are reported but not expanded past

use std::collections::{HashSet, VecDeque};

use crate::symbol::{SymbolId, SymbolTable};
use crate::taxonomy::Taxonomy;

/// Limits for a traversal.
#[derive(Debug, Clone, Copy)]
pub struct TraversalConfig {
    /// Maximum distance from the seed, in edges.
    pub max_depth: usize,
    /// Hard cap on collected symbols.
    pub max_results: usize,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            max_depth: 30,
            max_results: 10_000,
        }
    }
}

/// All ancestors of `seed`, nearest first, excluding the seed itself.
pub fn ancestors(
    tax: &Taxonomy,
    symbols: &SymbolTable,
    seed: SymbolId,
    config: &TraversalConfig,
) -> Vec<SymbolId> {
    let mut result = Vec::new();
    let mut visited = HashSet::from([seed]);
    let mut queue = VecDeque::from([(seed, 0usize)]);
    while let Some((node, depth)) = queue.pop_front() {
        if depth >= config.max_depth || result.len() >= config.max_results {
            continue;
        }
        for parent in tax.parents(node) {
            if tax.is_contrast(symbols, parent) {
                continue;
            }
            if !visited.insert(parent) {
                continue;
            }
            result.push(parent);
            if !tax.is_barrier(symbols, parent) {
                queue.push_back((parent, depth + 1));
            }
        }
    }
    result
}

/// All descendants of `seed`, including the seed itself, nearest first.
pub fn descendants(
    tax: &Taxonomy,
    symbols: &SymbolTable,
    seed: SymbolId,
    config: &TraversalConfig,
) -> Vec<SymbolId> {
    let mut result = vec![seed];
    let mut visited = HashSet::from([seed]);
    let mut queue = VecDeque::from([(seed, 0usize)]);
    while let Some((node, depth)) = queue.pop_front() {
        if depth >= config.max_depth || result.len() >= config.max_results {
            continue;
        }
        for child in tax.children(node) {
            if !visited.insert(child) {
                continue;
            }
            result.push(child);
            if !tax.is_barrier(symbols, child) {
                queue.push_back((child, depth + 1));
            }
        }
    }
    result
}

/// The most specific common ancestors of `a` and `b`.
///
/// Ascends from `a`; each branch stops at the first parent that is also an
/// ancestor of `b`. Barrier branches are skipped without discarding what
/// other branches have already collected.
pub fn common_ancestors(
    tax: &Taxonomy,
    symbols: &SymbolTable,
    a: SymbolId,
    b: SymbolId,
    max_depth: usize,
) -> Vec<SymbolId> {
    let mut result = Vec::new();
    let mut visited = HashSet::from([a]);
    collect_common(tax, symbols, a, b, max_depth, &mut visited, &mut result);
    result
}

fn collect_common(
    tax: &Taxonomy,
    symbols: &SymbolTable,
    node: SymbolId,
    b: SymbolId,
    depth: usize,
    visited: &mut HashSet<SymbolId>,
    result: &mut Vec<SymbolId>,
) {
    if depth == 0 {
        return;
    }
    for parent in tax.parents(node) {
        if !visited.insert(parent) {
            continue;
        }
        if tax.is_contrast(symbols, parent) || tax.is_barrier(symbols, parent) {
            continue;
        }
        if tax.isa(parent, b) {
            result.push(parent);
        } else {
            collect_common(tax, symbols, parent, b, depth - 1, visited, result);
        }
    }
}

/// Shortest undirected path between two symbols, or `None` if unreachable.
///
/// Paths run over isa edges in either direction, so siblings connect through
/// their common parent. `max_depth` bounds the path length in nodes. Barriers
/// block paths through them (but may terminate one).
pub fn shortest_path(
    tax: &Taxonomy,
    symbols: &SymbolTable,
    from: SymbolId,
    to: SymbolId,
    max_depth: usize,
) -> Option<Vec<SymbolId>> {
    if from == to {
        return Some(vec![from]);
    }
    if max_depth < 2 {
        return None;
    }
    let mut visited = HashSet::from([from]);
    let mut queue = VecDeque::from([vec![from]]);
    while let Some(path) = queue.pop_front() {
        let last = *path.last()?;
        if path.len() >= max_depth {
            continue;
        }
        let mut neighbors = tax.parents(last);
        neighbors.extend(tax.children(last));
        for next in neighbors {
            if visited.contains(&next) {
                continue;
            }
            let mut extended = path.clone();
            extended.push(next);
            if next == to {
                return Some(extended);
            }
            if tax.is_barrier(symbols, next) {
                continue;
            }
            visited.insert(next);
            queue.push_back(extended);
        }
    }
    None
}

/// Taxonomic distance in nodes, probing path lengths 2 through 5.
///
/// Returns `None` when the symbols are not within five nodes of each other,
/// which callers read as "unrelated".
pub fn shortest_path_len(
    tax: &Taxonomy,
    symbols: &SymbolTable,
    from: SymbolId,
    to: SymbolId,
) -> Option<usize> {
    if from == to {
        return Some(1);
    }
    (2..=5).find_map(|depth| shortest_path(tax, symbols, from, to, depth).map(|p| p.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{CoreSymbols, CreatePolicy};

    fn setup() -> (SymbolTable, Taxonomy) {
        let symbols = SymbolTable::new();
        let core = CoreSymbols::resolve(&symbols).unwrap();
        let tax = Taxonomy::new(core, 30);
        (symbols, tax)
    }

    fn sym(symbols: &SymbolTable, name: &str) -> SymbolId {
        symbols.intern(name, CreatePolicy::CreateAbstract).unwrap()
    }

    fn chain(symbols: &SymbolTable, tax: &Taxonomy, names: &[&str]) -> Vec<SymbolId> {
        let ids: Vec<SymbolId> = names.iter().map(|n| sym(symbols, n)).collect();
        for pair in ids.windows(2) {
            tax.add_isa(symbols, pair[0], pair[1]).unwrap();
        }
        ids
    }

    #[test]
    fn ancestors_are_nearest_first_and_exclude_seed() {
        let (symbols, tax) = setup();
        let ids = chain(&symbols, &tax, &["dog", "mammal", "animal"]);
        let config = TraversalConfig::default();
        assert_eq!(ancestors(&tax, &symbols, ids[0], &config), vec![ids[1], ids[2]]);
    }

    #[test]
    fn descendants_include_seed() {
        let (symbols, tax) = setup();
        let ids = chain(&symbols, &tax, &["dog", "mammal", "animal"]);
        let config = TraversalConfig::default();
        let descs = descendants(&tax, &symbols, ids[2], &config);
        assert_eq!(descs, vec![ids[2], ids[1], ids[0]]);
    }

    #[test]
    fn contrast_parents_are_not_ascended() {
        let (symbols, tax) = setup();
        let red = sym(&symbols, "red");
        let contrast = sym(&symbols, ":color-contrast");
        let color = sym(&symbols, "color");
        tax.add_isa(&symbols, red, contrast).unwrap();
        tax.add_isa(&symbols, red, color).unwrap();
        let config = TraversalConfig::default();
        assert_eq!(ancestors(&tax, &symbols, red, &config), vec![color]);
    }

    #[test]
    fn barriers_are_collected_but_not_expanded() {
        let (symbols, tax) = setup();
        let ids = chain(&symbols, &tax, &["dog", "::animal", "entity"]);
        let config = TraversalConfig::default();
        // The barrier itself appears; what lies beyond it does not.
        assert_eq!(ancestors(&tax, &symbols, ids[0], &config), vec![ids[1]]);
    }

    #[test]
    fn depth_limit_cuts_the_walk() {
        let (symbols, tax) = setup();
        let ids = chain(&symbols, &tax, &["a", "b", "c", "d"]);
        let config = TraversalConfig {
            max_depth: 2,
            ..Default::default()
        };
        assert_eq!(ancestors(&tax, &symbols, ids[0], &config), vec![ids[1], ids[2]]);
    }

    #[test]
    fn common_ancestors_in_a_diamond() {
        let (symbols, tax) = setup();
        let dog = sym(&symbols, "dog");
        let cat = sym(&symbols, "cat");
        let mammal = sym(&symbols, "mammal");
        let animal = sym(&symbols, "animal");
        tax.add_isa(&symbols, dog, mammal).unwrap();
        tax.add_isa(&symbols, cat, mammal).unwrap();
        tax.add_isa(&symbols, mammal, animal).unwrap();
        // The most specific common ancestor is mammal, not animal.
        assert_eq!(common_ancestors(&tax, &symbols, dog, cat, 10), vec![mammal]);
    }

    #[test]
    fn shortest_path_connects_siblings_through_parent() {
        let (symbols, tax) = setup();
        let dog = sym(&symbols, "dog");
        let cat = sym(&symbols, "cat");
        let mammal = sym(&symbols, "mammal");
        tax.add_isa(&symbols, dog, mammal).unwrap();
        tax.add_isa(&symbols, cat, mammal).unwrap();
        let path = shortest_path(&tax, &symbols, dog, cat, 5).unwrap();
        assert_eq!(path, vec![dog, mammal, cat]);
        assert_eq!(shortest_path_len(&tax, &symbols, dog, cat), Some(3));
    }

    #[test]
    fn unrelated_symbols_have_no_path() {
        let (symbols, tax) = setup();
        let dog = sym(&symbols, "dog");
        let quark = sym(&symbols, "quark");
        let mammal = sym(&symbols, "mammal");
        tax.add_isa(&symbols, dog, mammal).unwrap();
        assert!(shortest_path(&tax, &symbols, dog, quark, 5).is_none());
        assert_eq!(shortest_path_len(&tax, &symbols, dog, quark), None);
    }

    #[test]
    fn path_to_self_is_singleton() {
        let (symbols, tax) = setup();
        let dog = sym(&symbols, "dog");
        assert_eq!(shortest_path(&tax, &symbols, dog, dog, 5), Some(vec![dog]));
        assert_eq!(shortest_path_len(&tax, &symbols, dog, dog), Some(1));
    }
}
