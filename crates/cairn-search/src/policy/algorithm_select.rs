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

//! Algorithm-selection policies.
//!
//! A node may register several optimizers; before each iteration the
//! selection policy chooses which one runs, and after the iteration it
//! ranks the performance of the one that just finished. Selection works on
//! indices into the registered [`SearchScore`] list so that policies can
//! read the bookkeeping without holding borrows across the run.

use crate::score::SearchScore;
use cairn_core::num::SolverScalar;
use cairn_model::{solution::Fitness, tree::Topology};

/// Chooses the next optimizer to run and ranks the one that finished.
pub trait AlgorithmSelection<T>: Send
where
    T: SolverScalar,
{
    /// Returns the index of the next optimizer to execute.
    ///
    /// # Panics
    ///
    /// Panics if `algorithms` is empty.
    fn select(&mut self, node_id: usize, tree: &Topology, algorithms: &[SearchScore<T>]) -> usize;

    /// Ranks the optimizer at `selected` after its run.
    ///
    /// `fitness` is the best fitness the optimizer obtained, `current_evals`
    /// the evaluations it spent obtaining it, and `total_evals` the node's
    /// lifetime evaluation count.
    #[allow(clippy::too_many_arguments)]
    fn rank(
        &mut self,
        node_id: usize,
        tree: &Topology,
        algorithms: &mut [SearchScore<T>],
        selected: usize,
        fitness: &Fitness<T>,
        current_evals: u64,
        total_evals: u64,
    );
}

/// Cycles through the registered optimizers in order.
#[derive(Debug, Clone, Default)]
pub struct RoundRobinSelection {
    cursor: Option<usize>,
}

impl RoundRobinSelection {
    /// Creates a round-robin selection policy.
    #[inline]
    pub fn new() -> Self {
        Self { cursor: None }
    }
}

impl<T> AlgorithmSelection<T> for RoundRobinSelection
where
    T: SolverScalar,
{
    fn select(&mut self, _node_id: usize, _tree: &Topology, algorithms: &[SearchScore<T>]) -> usize {
        assert!(
            !algorithms.is_empty(),
            "called `RoundRobinSelection::select` with an empty algorithm list"
        );
        let next = match self.cursor {
            Some(cursor) => (cursor + 1) % algorithms.len(),
            None => 0,
        };
        self.cursor = Some(next);
        next
    }

    fn rank(
        &mut self,
        _node_id: usize,
        _tree: &Topology,
        algorithms: &mut [SearchScore<T>],
        selected: usize,
        _fitness: &Fitness<T>,
        _current_evals: u64,
        _total_evals: u64,
    ) {
        assert!(
            !algorithms.is_empty(),
            "called `RoundRobinSelection::rank` with an empty algorithm list"
        );
        algorithms[selected].set_score(1.0);
    }
}

/// Always runs the first registered optimizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleSelection;

impl SingleSelection {
    /// Creates a single-algorithm selection policy.
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl<T> AlgorithmSelection<T> for SingleSelection
where
    T: SolverScalar,
{
    fn select(&mut self, _node_id: usize, _tree: &Topology, algorithms: &[SearchScore<T>]) -> usize {
        assert!(
            !algorithms.is_empty(),
            "called `SingleSelection::select` with an empty algorithm list"
        );
        0
    }

    fn rank(
        &mut self,
        _node_id: usize,
        _tree: &Topology,
        algorithms: &mut [SearchScore<T>],
        _selected: usize,
        _fitness: &Fitness<T>,
        _current_evals: u64,
        _total_evals: u64,
    ) {
        assert!(
            !algorithms.is_empty(),
            "called `SingleSelection::rank` with an empty algorithm list"
        );
        algorithms[0].set_score(1.0);
    }
}
