// Copyright (c) 2025 Felix Kahle.
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the
// "Software"), to deal in the Software without restriction, including
// without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to
// permit persons to whom the Software is furnished to do so, subject to
// the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE
// LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION
// WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! Tree topology connecting the cooperating nodes.
//!
//! Every node of the tree carries the unique identifier of one engine
//! process; parent/child edges define who exchanges candidate solutions with
//! whom. The topology is built once, then locked: locking repacks the levels
//! so that the deepest leaves sit at level 1 and the root at the maximum
//! observed depth, and freezes the structure against further mutation.

use std::collections::HashMap;

/// The error type for topology construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    /// The topology was locked and can no longer be changed.
    Locked,
    /// A root node has already been added.
    RootAlreadyExists,
    /// The fixed node limit has been reached.
    LimitReached { limit: usize },
    /// The referenced node identifier is not part of the topology.
    UnknownNode { id: usize },
    /// The node identifier has already been added.
    DuplicateNode { id: usize },
    /// A child was added before the root node.
    MissingRoot,
}

impl std::fmt::Display for TopologyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Locked => write!(f, "The topology is locked and cannot be changed"),
            Self::RootAlreadyExists => write!(f, "Root node already exists"),
            Self::LimitReached { limit } => {
                write!(f, "Topology limit of {} nodes reached", limit)
            }
            Self::UnknownNode { id } => write!(f, "Unknown node id {}", id),
            Self::DuplicateNode { id } => write!(f, "Node id {} already exists", id),
            Self::MissingRoot => write!(f, "A root node must be added first"),
        }
    }
}

impl std::error::Error for TopologyError {}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Node {
    id: usize,
    level: u32,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// An owned arena of tree nodes.
///
/// Mutations are allowed only while unlocked; [`Topology::lock`] packs the
/// levels and freezes the structure. All navigation queries work on node
/// identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    nodes: Vec<Node>,
    index_of: HashMap<usize, usize>,
    root: Option<usize>,
    limit: usize,
    root_level: u32,
    locked: bool,
}

impl Topology {
    /// Creates an empty topology with a fixed node limit.
    ///
    /// # Panics
    ///
    /// Panics if `limit` is zero.
    pub fn new(limit: usize) -> Self {
        assert!(limit > 0, "called `Topology::new` with a zero node limit");
        Self {
            nodes: Vec::with_capacity(limit),
            index_of: HashMap::with_capacity(limit),
            root: None,
            limit,
            root_level: 1,
            locked: false,
        }
    }

    /// Adds the root node.
    pub fn add_root_node(&mut self, id: usize) -> Result<&mut Self, TopologyError> {
        if self.locked {
            return Err(TopologyError::Locked);
        }
        if self.root.is_some() {
            return Err(TopologyError::RootAlreadyExists);
        }
        self.root_level = 1;
        self.index_of.insert(id, 0);
        self.nodes.push(Node {
            id,
            level: 1,
            parent: None,
            children: Vec::new(),
        });
        self.root = Some(0);
        Ok(self)
    }

    /// Adds a child node under `parent_id`.
    pub fn add_node(&mut self, id: usize, parent_id: usize) -> Result<&mut Self, TopologyError> {
        if self.locked {
            return Err(TopologyError::Locked);
        }
        if self.root.is_none() {
            return Err(TopologyError::MissingRoot);
        }
        if self.nodes.len() >= self.limit {
            return Err(TopologyError::LimitReached { limit: self.limit });
        }
        if self.index_of.contains_key(&id) {
            return Err(TopologyError::DuplicateNode { id });
        }
        let parent_idx = *self
            .index_of
            .get(&parent_id)
            .ok_or(TopologyError::UnknownNode { id: parent_id })?;
        let level = self.nodes[parent_idx].level + 1;
        if level > self.root_level {
            self.root_level = level;
        }
        let idx = self.nodes.len();
        self.nodes.push(Node {
            id,
            level,
            parent: Some(parent_idx),
            children: Vec::new(),
        });
        self.nodes[parent_idx].children.push(idx);
        self.index_of.insert(id, idx);
        Ok(self)
    }

    /// Locks the topology for any further change.
    ///
    /// Locking repacks the levels: the root receives the maximum observed
    /// depth and every child sits one level below its parent, so the deepest
    /// leaves end up at level 1. Locking is mandatory before the topology is
    /// used for navigation.
    pub fn lock(&mut self) {
        self.locked = true;
        if let Some(root) = self.root {
            if self.nodes[root].level != self.root_level {
                self.pack(root, self.root_level);
            }
        }
    }

    fn pack(&mut self, idx: usize, level: u32) {
        self.nodes[idx].level = level;
        let children = self.nodes[idx].children.clone();
        for child in children {
            self.pack(child, level - 1);
        }
    }

    /// Returns `true` once [`Topology::lock`] has been called.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Returns the identifier of the root node.
    pub fn root_id(&self) -> Result<usize, TopologyError> {
        self.root
            .map(|idx| self.nodes[idx].id)
            .ok_or(TopologyError::MissingRoot)
    }

    /// Returns the level of the root node (the maximum observed depth).
    #[inline]
    pub fn root_level(&self) -> u32 {
        self.root_level
    }

    /// Returns the number of nodes currently in the topology.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the topology has no nodes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn node(&self, id: usize) -> Result<&Node, TopologyError> {
        self.index_of
            .get(&id)
            .map(|&idx| &self.nodes[idx])
            .ok_or(TopologyError::UnknownNode { id })
    }

    /// Returns `true` if the topology contains `id`.
    #[inline]
    pub fn contains(&self, id: usize) -> bool {
        self.index_of.contains_key(&id)
    }

    /// Returns the level of node `id`.
    pub fn level(&self, id: usize) -> Result<u32, TopologyError> {
        Ok(self.node(id)?.level)
    }

    /// Returns the parent identifier of node `id`, or `None` for the root.
    pub fn parent_id(&self, id: usize) -> Result<Option<usize>, TopologyError> {
        Ok(self.node(id)?.parent.map(|idx| self.nodes[idx].id))
    }

    /// Returns the child identifiers of node `id` in insertion order.
    pub fn children_ids(&self, id: usize) -> Result<Vec<usize>, TopologyError> {
        Ok(self
            .node(id)?
            .children
            .iter()
            .map(|&idx| self.nodes[idx].id)
            .collect())
    }

    /// Returns `true` if node `id` has no children.
    pub fn is_leaf(&self, id: usize) -> Result<bool, TopologyError> {
        Ok(self.node(id)?.children.is_empty())
    }

    /// Returns `true` if node `id` is the root.
    pub fn is_root(&self, id: usize) -> Result<bool, TopologyError> {
        Ok(self.node(id)?.parent.is_none())
    }

    /// Returns the ancestry of `id` from the node itself up to, but not
    /// including, the root.
    pub fn ancestry(&self, id: usize) -> Result<Vec<usize>, TopologyError> {
        let mut chain = vec![self.node(id)?.id];
        let mut current = self.node(id)?.parent;
        while let Some(idx) = current {
            if self.nodes[idx].parent.is_none() {
                break;
            }
            chain.push(self.nodes[idx].id);
            current = self.nodes[idx].parent;
        }
        Ok(chain)
    }

    fn fmt_subtree(&self, idx: usize, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let node = &self.nodes[idx];
        write!(f, "[ {{{}, {}}} ", node.id, node.level)?;
        for &child in &node.children {
            self.fmt_subtree(child, f)?;
        }
        write!(f, "] ")
    }
}

impl std::fmt::Display for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.root {
            Some(root) => self.fmt_subtree(root, f),
            None => write!(f, "[ ]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The balanced 7-node binary tree used across the engine tests.
    pub fn balanced_seven() -> Topology {
        let mut tree = Topology::new(7);
        tree.add_root_node(0).unwrap();
        tree.add_node(1, 0).unwrap();
        tree.add_node(2, 0).unwrap();
        tree.add_node(3, 1).unwrap();
        tree.add_node(4, 1).unwrap();
        tree.add_node(5, 2).unwrap();
        tree.add_node(6, 2).unwrap();
        tree.lock();
        tree
    }

    #[test]
    fn test_lock_packs_levels() {
        let tree = balanced_seven();
        assert_eq!(tree.root_level(), 3);
        assert_eq!(tree.level(0).unwrap(), 3);
        for id in [1, 2] {
            assert_eq!(tree.level(id).unwrap(), 2);
        }
        for id in [3, 4, 5, 6] {
            assert_eq!(tree.level(id).unwrap(), 1, "leaf {} must sit at level 1", id);
            assert!(tree.is_leaf(id).unwrap());
        }
    }

    #[test]
    fn test_child_level_is_one_below_parent() {
        let tree = balanced_seven();
        for id in 1..7 {
            let parent = tree.parent_id(id).unwrap().unwrap();
            assert_eq!(tree.level(id).unwrap(), tree.level(parent).unwrap() - 1);
        }
    }

    #[test]
    fn test_unbalanced_chain_keeps_shallow_leaf_above_one() {
        // Root with one deep chain and one direct leaf.
        let mut tree = Topology::new(4);
        tree.add_root_node(0).unwrap();
        tree.add_node(1, 0).unwrap();
        tree.add_node(2, 1).unwrap();
        tree.add_node(3, 0).unwrap();
        tree.lock();
        assert_eq!(tree.root_level(), 3);
        assert_eq!(tree.level(2).unwrap(), 1);
        // The shallow leaf packs relative to its parent, not to depth 1.
        assert_eq!(tree.level(3).unwrap(), 2);
    }

    #[test]
    fn test_mutation_after_lock_fails() {
        let mut tree = Topology::new(3);
        tree.add_root_node(0).unwrap();
        tree.lock();
        assert_eq!(tree.add_node(1, 0).unwrap_err(), TopologyError::Locked);
    }

    #[test]
    fn test_limit_and_duplicate_checks() {
        let mut tree = Topology::new(2);
        tree.add_root_node(0).unwrap();
        tree.add_node(1, 0).unwrap();
        assert_eq!(
            tree.add_node(2, 0).unwrap_err(),
            TopologyError::LimitReached { limit: 2 }
        );

        let mut tree = Topology::new(3);
        tree.add_root_node(0).unwrap();
        tree.add_node(1, 0).unwrap();
        assert_eq!(
            tree.add_node(1, 0).unwrap_err(),
            TopologyError::DuplicateNode { id: 1 }
        );
        assert_eq!(
            tree.add_node(2, 9).unwrap_err(),
            TopologyError::UnknownNode { id: 9 }
        );
    }

    #[test]
    fn test_ancestry_excludes_root() {
        let tree = balanced_seven();
        assert_eq!(tree.ancestry(6).unwrap(), vec![6, 2]);
        assert_eq!(tree.ancestry(0).unwrap(), vec![0]);
    }

    #[test]
    fn test_children_in_insertion_order() {
        let tree = balanced_seven();
        assert_eq!(tree.children_ids(0).unwrap(), vec![1, 2]);
        assert_eq!(tree.children_ids(5).unwrap(), Vec::<usize>::new());
    }

    #[test]
    fn test_display_renders_nested_structure() {
        let mut tree = Topology::new(3);
        tree.add_root_node(0).unwrap();
        tree.add_node(1, 0).unwrap();
        tree.add_node(2, 0).unwrap();
        tree.lock();
        assert_eq!(format!("{}", tree), "[ {0, 2} [ {1, 1} ] [ {2, 1} ] ] ");
    }
}
