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

//! Best-list update policies.
//!
//! When a new candidate is offered to the best-list, the update policy
//! decides which slot it takes. Both shipped policies fill empty slots
//! first and only ever displace a solution the candidate beats; they differ
//! in which beaten slot goes: the convergent policy replaces the occupant
//! farthest from the candidate, collapsing the list around improving
//! points to speed up convergence, while the divergent policy replaces the
//! nearest occupant to keep the list spatially diverse.

use crate::cost::CostPolicy;
use cairn_core::num::SolverScalar;
use cairn_model::{best_list::BestList, solution::Solution};
use num_traits::ToPrimitive;

/// Squared-displacement distance between two solutions.
///
/// Per dimension the element differences are summed first and the sum is
/// squared; the distances are then accumulated over the dimensions. For
/// position widths above one this differs from the textbook Euclidean
/// distance, and the best-list replacement ordering depends on these exact
/// semantics.
///
/// # Panics
///
/// Panics if the solutions have different dimension counts.
pub fn solution_distance<T>(first: &Solution<T>, second: &Solution<T>) -> f64
where
    T: SolverScalar,
{
    assert!(
        first.n_dims() == second.n_dims(),
        "called `solution_distance` with incompatible dimension counts: {} != {}",
        first.n_dims(),
        second.n_dims()
    );
    let mut dist = 0.0;
    for d in 0..first.n_dims() {
        let a = first.position(d).values();
        let b = second.position(d).values();
        let mut delta = T::zero();
        for (x, y) in b.iter().zip(a.iter()) {
            delta = delta + (*x - *y);
        }
        let delta = delta.to_f64().unwrap_or(0.0);
        dist += delta * delta;
    }
    dist
}

/// Decides which best-list slot a new candidate occupies.
pub trait BestListUpdate<T>: Send
where
    T: SolverScalar,
{
    /// Offers `solution` to `best_list`, replacing a slot according to the
    /// policy. Candidates that beat no occupied slot are dropped once the
    /// list is full.
    fn apply(&self, best_list: &mut BestList<T>, solution: &Solution<T>, cost: &dyn CostPolicy<T>);
}

/// Replaces the beaten occupant with the *largest* distance to the
/// candidate, shrinking the list's diversity around improving points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvergentBestListUpdate;

impl ConvergentBestListUpdate {
    /// Creates the convergent update policy.
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl<T> BestListUpdate<T> for ConvergentBestListUpdate
where
    T: SolverScalar,
{
    fn apply(&self, best_list: &mut BestList<T>, solution: &Solution<T>, cost: &dyn CostPolicy<T>) {
        let mut target: Option<usize> = None;
        let mut largest_distance = -1.0_f64;
        for i in 0..best_list.len() {
            match best_list.get(i) {
                // Occupy the empty slots first.
                None => {
                    target = Some(i);
                    break;
                }
                Some(stored) => {
                    if cost.first_is_better(solution, stored) {
                        let distance = solution_distance(solution, stored);
                        if distance > largest_distance {
                            largest_distance = distance;
                            target = Some(i);
                        }
                    }
                }
            }
        }
        if let Some(i) = target {
            best_list.set(i, solution.clone());
        }
    }
}

/// Replaces the beaten occupant with the *smallest* distance to the
/// candidate, maximizing the list's spatial diversity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DivergentBestListUpdate;

impl DivergentBestListUpdate {
    /// Creates the divergent update policy.
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl<T> BestListUpdate<T> for DivergentBestListUpdate
where
    T: SolverScalar,
{
    fn apply(&self, best_list: &mut BestList<T>, solution: &Solution<T>, cost: &dyn CostPolicy<T>) {
        let mut target: Option<usize> = None;
        let mut smallest_distance = f64::MAX;
        for i in 0..best_list.len() {
            match best_list.get(i) {
                // Occupy the empty slots first.
                None => {
                    target = Some(i);
                    break;
                }
                Some(stored) => {
                    if cost.first_is_better(solution, stored) {
                        let distance = solution_distance(solution, stored);
                        if distance < smallest_distance {
                            smallest_distance = distance;
                            target = Some(i);
                        }
                    }
                }
            }
        }
        if let Some(i) = target {
            best_list.set(i, solution.clone());
        }
    }
}
