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

//! # Region Partitioner
//!
//! The region selection policy maps a node's position in the tree topology
//! to its "anchor" sub-region of the search space. [`GroupRegionSelection`]
//! splits the dimensions into contiguous groups sharing partition
//! boundaries; at every tree level the parent's region tiles into
//! `K^nGroups` equally-shaped children laid out row-major over an
//! `nGroups`-dimensional `K`-ary grid, and the walk from the root along a
//! node's ancestry picks one tile per level.

use cairn_core::num::SolverScalar;
use cairn_model::{
    iteration::IterationData,
    space::{Region, SearchSpace},
    tree::{Topology, TopologyError},
};
use smallvec::SmallVec;

/// The error type for region selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionSelectionError {
    /// The tree does not embed a `K^nGroups` fan-out at some level reached
    /// by the walk.
    InvalidTopology { node: usize, fan_out: usize },
    /// The dimension count cannot be split into the requested groups.
    InvalidGrouping { n_dims: usize, n_groups: usize },
    /// A navigation query failed on the topology.
    Topology(TopologyError),
}

impl std::fmt::Display for RegionSelectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTopology { node, fan_out } => write!(
                f,
                "Node {} exceeds the configured fan-out of {} children per node",
                node, fan_out
            ),
            Self::InvalidGrouping { n_dims, n_groups } => write!(
                f,
                "Cannot split {} dimensions into {} groups",
                n_dims, n_groups
            ),
            Self::Topology(e) => write!(f, "Topology error: {}", e),
        }
    }
}

impl std::error::Error for RegionSelectionError {}

impl From<TopologyError> for RegionSelectionError {
    fn from(e: TopologyError) -> Self {
        Self::Topology(e)
    }
}

/// Maps a node's tree coordinate to its anchor sub-region.
pub trait RegionSelection<T>: Send
where
    T: SolverScalar,
{
    /// Partitions `space` along the topology and returns the anchor
    /// sub-region of node `node_id`. The returned region is newly owned by
    /// the caller.
    fn apply(
        &self,
        space: &SearchSpace<T>,
        tree: &Topology,
        node_id: usize,
    ) -> Result<Region<T>, RegionSelectionError>;

    /// Recalculates the anchor at the top of an iteration.
    ///
    /// The default keeps the current anchor; implementers may replace it
    /// for dynamic region schedules. EXPERIMENTAL: dynamic anchors change
    /// the relocation dynamics substantially.
    fn recalculate(
        &self,
        _iteration: &IterationData<T>,
        _space: &SearchSpace<T>,
        current: Region<T>,
        _tree: &Topology,
        _node_id: usize,
    ) -> Region<T> {
        current
    }
}

/// Group-based region partitioner.
///
/// All dimensions inside one group are partitioned at the same proportional
/// boundaries. A child index `i` under its parent decodes into the group
/// coordinates `c_g = (i / K^g) mod K`; dimension group `g` then takes the
/// `c_g`-th of `K` equal segments of the parent's partition, with the last
/// segment keeping the parent's upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupRegionSelection {
    n_groups: usize,
    k: usize,
}

impl GroupRegionSelection {
    /// Creates a partitioner with `n_groups` dimension groups and `k`
    /// segments per group.
    ///
    /// `GroupRegionSelection::new(1, 1)` performs no partitioning: every
    /// node anchors on the full search space.
    ///
    /// # Panics
    ///
    /// Panics if `n_groups` or `k` is zero.
    pub fn new(n_groups: usize, k: usize) -> Self {
        assert!(
            n_groups > 0 && k > 0,
            "called `GroupRegionSelection::new` with a zero parameter: n_groups = {}, k = {}",
            n_groups,
            k
        );
        Self { n_groups, k }
    }

    /// Returns the number of dimension groups.
    #[inline]
    pub fn n_groups(&self) -> usize {
        self.n_groups
    }

    /// Returns the per-group segment count.
    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Decodes a child's position among its siblings into per-group grid
    /// coordinates.
    fn decode(&self, child_pos: usize) -> SmallVec<[usize; 8]> {
        let mut coord: SmallVec<[usize; 8]> = SmallVec::new();
        coord.resize(self.n_groups, 0);
        let mut pos = child_pos;
        for g in (0..self.n_groups).rev() {
            let base = self.k.pow(g as u32);
            if base <= pos {
                coord[g] = pos / base;
                pos %= base;
            }
        }
        coord
    }
}

impl<T> RegionSelection<T> for GroupRegionSelection
where
    T: SolverScalar,
{
    fn apply(
        &self,
        space: &SearchSpace<T>,
        tree: &Topology,
        node_id: usize,
    ) -> Result<Region<T>, RegionSelectionError> {
        let n_dims = space.n_dimensions();
        let dims_per_group = n_dims / self.n_groups;
        if dims_per_group == 0 {
            return Err(RegionSelectionError::InvalidGrouping {
                n_dims,
                n_groups: self.n_groups,
            });
        }

        // With one segment per group every tile equals the parent region, so
        // every node anchors on the full search space.
        if self.k == 1 {
            return Ok(space.region().clone());
        }

        // The node's parentage, top of the stack closest to the root.
        let mut hierarchy = tree.ancestry(node_id)?;
        let mut region = space.region().clone();
        let mut current = tree.root_id()?;

        while current != node_id {
            let children = tree.children_ids(current)?;
            let top = *hierarchy
                .last()
                .expect("ancestry cannot be exhausted before reaching the node");
            let child_pos = children
                .iter()
                .position(|&child| child == top)
                .ok_or(RegionSelectionError::Topology(TopologyError::UnknownNode {
                    id: top,
                }))?;

            let fan_out = self.k.pow(self.n_groups as u32);
            let coord = self.decode(child_pos);
            if child_pos >= fan_out || coord.iter().any(|&c| c >= self.k) {
                return Err(RegionSelectionError::InvalidTopology {
                    node: current,
                    fan_out,
                });
            }

            let mut group = 0;
            for d in 0..n_dims {
                let segment = region.partition(d).interval().segment(coord[group], self.k);
                region.narrow(d, segment);
                if (d + 1) % dims_per_group == 0 && group + 1 < self.n_groups {
                    group += 1;
                }
            }

            hierarchy.pop();
            current = top;
        }

        Ok(region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balanced_seven() -> Topology {
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
    fn test_no_partitioning_returns_full_space() {
        let space = SearchSpace::hypercube(3, -20.0, 20.0).unwrap();
        let tree = balanced_seven();
        let policy = GroupRegionSelection::new(1, 1);
        for id in 0..7 {
            let region = RegionSelection::<f64>::apply(&policy, &space, &tree, id).unwrap();
            for d in 0..3 {
                assert_eq!(region.partition(d).start(), -20.0);
                assert_eq!(region.partition(d).end(), 20.0);
            }
        }
    }

    #[test]
    fn test_binary_split_halves_per_level() {
        let space = SearchSpace::hypercube(2, -20.0, 20.0).unwrap();
        let tree = balanced_seven();
        let policy = GroupRegionSelection::new(1, 2);

        // Root anchors on the full space.
        let root = RegionSelection::<f64>::apply(&policy, &space, &tree, 0).unwrap();
        assert_eq!(root.partition(0).interval().length(), 40.0);

        // Mid-level nodes take one half each.
        let left = RegionSelection::<f64>::apply(&policy, &space, &tree, 1).unwrap();
        let right = RegionSelection::<f64>::apply(&policy, &space, &tree, 2).unwrap();
        assert_eq!(
            (left.partition(0).start(), left.partition(0).end()),
            (-20.0, 0.0)
        );
        assert_eq!(
            (right.partition(0).start(), right.partition(0).end()),
            (0.0, 20.0)
        );

        // Leaves take one quarter, tiled across the whole interval.
        let quarters: Vec<(f64, f64)> = [3, 4, 5, 6]
            .iter()
            .map(|&id| {
                let region = RegionSelection::<f64>::apply(&policy, &space, &tree, id).unwrap();
                (region.partition(0).start(), region.partition(0).end())
            })
            .collect();
        assert_eq!(
            quarters,
            vec![(-20.0, -10.0), (-10.0, 0.0), (0.0, 10.0), (10.0, 20.0)]
        );
    }

    #[test]
    fn test_partitions_stay_inside_dimensions() {
        let space = SearchSpace::hypercube(6, -7.5, 3.25).unwrap();
        let tree = balanced_seven();
        let policy = GroupRegionSelection::new(2, 2);

        // A 2-group binary grid supports fan-out 4, so the binary tree fits.
        for id in 0..7 {
            let region = RegionSelection::<f64>::apply(&policy, &space, &tree, id).unwrap();
            for d in 0..6 {
                assert!(region
                    .dimension(d)
                    .interval()
                    .contains_interval(region.partition(d).interval()));
            }
        }
    }

    #[test]
    fn test_groups_partition_independently() {
        let space = SearchSpace::hypercube(4, 0.0, 16.0).unwrap();
        let mut tree = Topology::new(5);
        tree.add_root_node(0).unwrap();
        for id in 1..5 {
            tree.add_node(id, 0).unwrap();
        }
        tree.lock();
        let policy = GroupRegionSelection::new(2, 2);

        // The last sibling (position 3) decodes to coordinates (1, 1).
        let region = RegionSelection::<f64>::apply(&policy, &space, &tree, 4).unwrap();
        for d in 0..4 {
            assert_eq!(
                (region.partition(d).start(), region.partition(d).end()),
                (8.0, 16.0)
            );
        }

        // Sibling position 1 decodes to (1, 0): first group upper half,
        // second group lower half.
        let region = RegionSelection::<f64>::apply(&policy, &space, &tree, 2).unwrap();
        assert_eq!(region.partition(0).start(), 8.0);
        assert_eq!(region.partition(1).start(), 8.0);
        assert_eq!(region.partition(2).end(), 8.0);
        assert_eq!(region.partition(3).end(), 8.0);
    }

    #[test]
    fn test_partitioner_is_idempotent() {
        let space = SearchSpace::hypercube(8, -20.0, 20.0).unwrap();
        let tree = balanced_seven();
        let policy = GroupRegionSelection::new(1, 2);
        for id in 0..7 {
            let first = RegionSelection::<f64>::apply(&policy, &space, &tree, id).unwrap();
            let second = RegionSelection::<f64>::apply(&policy, &space, &tree, id).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_excess_fan_out_is_invalid_topology() {
        let space = SearchSpace::hypercube(2, 0.0, 1.0).unwrap();
        let mut tree = Topology::new(4);
        tree.add_root_node(0).unwrap();
        for id in 1..4 {
            tree.add_node(id, 0).unwrap();
        }
        tree.lock();
        // K = 2, one group: only 2 children per node are representable.
        let policy = GroupRegionSelection::new(1, 2);
        let result = RegionSelection::<f64>::apply(&policy, &space, &tree, 3);
        assert_eq!(
            result.unwrap_err(),
            RegionSelectionError::InvalidTopology { node: 0, fan_out: 2 }
        );
    }

    #[test]
    fn test_more_groups_than_dimensions_is_rejected() {
        let space = SearchSpace::hypercube(2, 0.0, 1.0).unwrap();
        let tree = balanced_seven();
        let policy = GroupRegionSelection::new(4, 2);
        assert_eq!(
            RegionSelection::<f64>::apply(&policy, &space, &tree, 1).unwrap_err(),
            RegionSelectionError::InvalidGrouping {
                n_dims: 2,
                n_groups: 4
            }
        );
    }

    #[test]
    fn test_recalculate_defaults_to_identity() {
        let space = SearchSpace::hypercube(2, 0.0, 1.0).unwrap();
        let tree = balanced_seven();
        let policy = GroupRegionSelection::new(1, 2);
        let region = RegionSelection::<f64>::apply(&policy, &space, &tree, 3).unwrap();
        let population = vec![cairn_model::solution::Solution::<f64>::new(
            cairn_model::shape::Shape::scalar(2),
        )];
        let data = IterationData::new(&population, 0, 0, 10);
        let recalculated = policy.recalculate(&data, &space, region.clone(), &tree, 3);
        assert_eq!(recalculated, region);
    }
}
