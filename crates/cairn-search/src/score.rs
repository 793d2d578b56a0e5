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

use crate::search::Search;
use cairn_core::num::SolverScalar;

/// A registered optimizer together with its multi-arm selection bookkeeping.
///
/// The search group owns one `SearchScore` per registered optimizer; the
/// algorithm-selection policy reads and updates the bookkeeping fields when
/// choosing the next optimizer to run and when ranking the one that just
/// finished.
pub struct SearchScore<T>
where
    T: SolverScalar,
{
    algorithm: Box<dyn Search<T>>,
    weight: f64,
    score: f64,
    frequency: f64,
    deprecation: f64,
}

impl<T> SearchScore<T>
where
    T: SolverScalar,
{
    /// Wraps an optimizer with the given selection weight.
    pub fn new(algorithm: Box<dyn Search<T>>, weight: f64) -> Self {
        Self {
            algorithm,
            weight,
            score: 1.0,
            frequency: 1.0,
            deprecation: 1.0,
        }
    }

    /// Returns the wrapped optimizer.
    #[inline]
    pub fn algorithm(&self) -> &dyn Search<T> {
        self.algorithm.as_ref()
    }

    /// Returns the wrapped optimizer mutably.
    #[inline]
    pub fn algorithm_mut(&mut self) -> &mut (dyn Search<T> + 'static) {
        self.algorithm.as_mut()
    }

    /// Returns the weight of this optimizer in the scoring process.
    #[inline]
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Sets the weight of this optimizer in the scoring process.
    ///
    /// Changing the weight mid-run affects the scoring process; selection
    /// policies are the intended callers.
    #[inline]
    pub fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }

    /// Returns the current score.
    #[inline]
    pub fn score(&self) -> f64 {
        self.score
    }

    /// Sets the current score.
    #[inline]
    pub fn set_score(&mut self, score: f64) {
        self.score = score;
    }

    /// Returns how often this optimizer has been chosen.
    #[inline]
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Sets how often this optimizer has been chosen.
    #[inline]
    pub fn set_frequency(&mut self, frequency: f64) {
        self.frequency = frequency;
    }

    /// Returns for how long this optimizer has not been chosen.
    #[inline]
    pub fn deprecation(&self) -> f64 {
        self.deprecation
    }

    /// Sets for how long this optimizer has not been chosen.
    #[inline]
    pub fn set_deprecation(&mut self, deprecation: f64) {
        self.deprecation = deprecation;
    }
}

impl<T> std::fmt::Debug for SearchScore<T>
where
    T: SolverScalar,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchScore")
            .field("algorithm", &self.algorithm.name())
            .field("weight", &self.weight)
            .field("score", &self.score)
            .field("frequency", &self.frequency)
            .field("deprecation", &self.deprecation)
            .finish()
    }
}
