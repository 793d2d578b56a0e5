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

//! # Optimizer Capability
//!
//! Any population-based optimizer integrates with Cairn by implementing
//! [`Search`]. The convergence controller owns the call discipline: one
//! [`Search::startup`] per engine iteration, then repeated
//! [`Search::next`] calls, each of which must run only until the next
//! improvement of the optimizer's current best (or a bounded number of
//! fruitless passes, or the evaluation budget), and one
//! [`Search::finalize`] for post-processing. Keeping `next` short is what
//! lets the controller collect improvement data and manage stagnation.
//!
//! The population is owned by the engine and threaded through every call as
//! a mutable slice; the optimizer keeps indices and counters, never borrows.

use crate::cost::CostPolicy;
use cairn_core::num::SolverScalar;
use cairn_model::{solution::Solution, space::SearchSpace};

/// The error type for optimizer startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    /// The installed population is empty.
    EmptyPopulation,
}

impl std::fmt::Display for SearchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyPopulation => {
                write!(f, "The population size must be greater than zero")
            }
        }
    }
}

impl std::error::Error for SearchError {}

/// Everything an optimizer call needs besides the population: the cost
/// capability and the full search space.
#[derive(Clone, Copy)]
pub struct SearchContext<'a, T>
where
    T: SolverScalar,
{
    /// The cost capability of the problem under optimization.
    pub cost: &'a dyn CostPolicy<T>,
    /// The full search space (boundary clamping happens against this, not
    /// against the node's anchor sub-region).
    pub space: &'a SearchSpace<T>,
}

impl<'a, T> SearchContext<'a, T>
where
    T: SolverScalar,
{
    /// Bundles a cost capability and a search space into a context.
    #[inline]
    pub fn new(cost: &'a dyn CostPolicy<T>, space: &'a SearchSpace<T>) -> Self {
        Self { cost, space }
    }
}

impl<'a, T> std::fmt::Debug for SearchContext<'a, T>
where
    T: SolverScalar,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchContext")
            .field("space", &self.space.n_dimensions())
            .finish()
    }
}

/// An incremental population-based optimizer.
pub trait Search<T>: Send
where
    T: SolverScalar,
{
    /// Returns the name of the optimization method, for tracking purposes.
    fn name(&self) -> &str;

    /// Returns the population size this optimizer prefers to operate on.
    ///
    /// The engine's population is sized to the maximum preferred size over
    /// all registered optimizers, so the actual slice handed to the calls
    /// below may be larger.
    fn preferred_population_size(&self) -> usize;

    /// Prepares the optimizer for a new run over `population`.
    ///
    /// Resets all counters and the stuck flag, draws fresh random state and
    /// computes the initial best index. The population arrives already
    /// evaluated.
    fn startup(
        &mut self,
        ctx: SearchContext<'_, T>,
        population: &mut [Solution<T>],
    ) -> Result<(), SearchError>;

    /// Advances the search until the next improvement of the current best.
    ///
    /// Returns when one improvement has been observed, when the configured
    /// number of consecutive no-improvement passes is reached (setting the
    /// stuck flag), or when the cumulative evaluation count reaches
    /// `budget`. The cumulative count must never exceed `budget`.
    fn next(&mut self, ctx: SearchContext<'_, T>, population: &mut [Solution<T>], budget: u64);

    /// Post-processing after the controller has finished with this call.
    fn finalize(&mut self, ctx: SearchContext<'_, T>, population: &mut [Solution<T>]);

    /// Returns `true` if the optimizer has detected strong stagnation.
    fn is_stuck(&self) -> bool;

    /// Returns the population index of the best individual found since the
    /// last [`Search::startup`].
    fn best_index(&self) -> usize;

    /// Returns the number of evaluations performed since the last
    /// [`Search::startup`].
    fn evals(&self) -> u64;

    /// Returns the best individual found since the last [`Search::startup`].
    ///
    /// The default reads the population at [`Search::best_index`];
    /// optimizers with private bookkeeping (e.g. personal bests) may return
    /// a better snapshot.
    fn best_individual<'a>(&'a self, population: &'a [Solution<T>]) -> &'a Solution<T> {
        &population[self.best_index()]
    }

    /// Returns the headline fitness of the current best.
    fn best_headline(&self, population: &[Solution<T>]) -> T {
        self.best_individual(population).fitness().headline()
    }
}

impl<T> std::fmt::Debug for dyn Search<T>
where
    T: SolverScalar,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Search({})", self.name())
    }
}
