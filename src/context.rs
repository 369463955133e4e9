//! Hypothetical-world contexts arranged in a tree.
//!
//! The root context holds baseline knowledge. Child contexts sprouted from it
//! hold alternative or hypothetical extensions: a fact asserted in a child is
//! visible there and in its descendants, never in siblings or ancestors.
//! Retraction uses the same tree to scope copy-on-write edits.
//!
//! Each context carries a story time, the "now" of the narrative being
//! processed in that context, which children inherit when sprouted.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::ContextError;
use crate::temporal::Timestamp;

/// Identifier of a context node.
///
/// IDs encode ancestry digit-wise where possible (the n-th child of context
/// 1 is usually 1n), which makes traces readable, but only the tree structure
/// is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ContextId(u64);

impl ContextId {
    /// The root context every tree starts with.
    pub const ROOT: ContextId = ContextId(1);

    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cx:{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct ContextNode {
    parent: Option<ContextId>,
    story_time: Timestamp,
    children: Vec<ContextId>,
}

/// The tree of contexts, thread-safe via dashmap.
pub struct ContextTree {
    nodes: DashMap<ContextId, ContextNode>,
}

impl ContextTree {
    /// Create a tree containing only the root context.
    pub fn new() -> Self {
        let nodes = DashMap::new();
        nodes.insert(
            ContextId::ROOT,
            ContextNode {
                parent: None,
                story_time: Timestamp::Na,
                children: Vec::new(),
            },
        );
        Self { nodes }
    }

    pub fn root(&self) -> ContextId {
        ContextId::ROOT
    }

    /// Sprout a fresh child of `parent`, inheriting its story time.
    pub fn sprout(&self, parent: ContextId) -> Result<ContextId, ContextError> {
        let (story_time, sibling_count) = {
            let node = self
                .nodes
                .get(&parent)
                .ok_or(ContextError::Unknown { id: parent.0 })?;
            (node.story_time, node.children.len() as u64)
        };
        // Digit-encoded id when free; bump past collisions from crowded
        // sibling sets (an 11th child of cx:1 would otherwise claim cx:20,
        // which a child of cx:2 could also want).
        let mut candidate = ContextId(parent.0 * 10 + sibling_count + 1);
        while self.nodes.contains_key(&candidate) {
            candidate = ContextId(candidate.0 + 1);
        }
        self.nodes.insert(
            candidate,
            ContextNode {
                parent: Some(parent),
                story_time,
                children: Vec::new(),
            },
        );
        if let Some(mut node) = self.nodes.get_mut(&parent) {
            node.children.push(candidate);
        }
        Ok(candidate)
    }

    /// Whether `anc` is `des` itself or one of its ancestors.
    pub fn is_ancestor(&self, anc: ContextId, des: ContextId) -> bool {
        let mut cursor = Some(des);
        while let Some(cx) = cursor {
            if cx == anc {
                return true;
            }
            cursor = self.nodes.get(&cx).and_then(|n| n.parent);
        }
        false
    }

    pub fn story_time(&self, cx: ContextId) -> Option<Timestamp> {
        self.nodes.get(&cx).map(|n| n.story_time)
    }

    pub fn set_story_time(&self, cx: ContextId, ts: Timestamp) -> Result<(), ContextError> {
        let mut node = self
            .nodes
            .get_mut(&cx)
            .ok_or(ContextError::Unknown { id: cx.0 })?;
        node.story_time = ts;
        Ok(())
    }

    pub fn parent_of(&self, cx: ContextId) -> Option<ContextId> {
        self.nodes.get(&cx).and_then(|n| n.parent)
    }

    pub fn children_of(&self, cx: ContextId) -> Vec<ContextId> {
        self.nodes
            .get(&cx)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// Number of contexts in the tree, including the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Default for ContextTree {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ContextTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextTree")
            .field("contexts", &self.nodes.len())
            .finish()
    }
}
