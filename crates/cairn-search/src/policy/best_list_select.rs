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

use crate::cost::CostPolicy;
use cairn_core::{num::SolverScalar, seed::SeedSource};
use cairn_model::{best_list::BestList, solution::Solution};
use rand::{rngs::StdRng, Rng};

/// Picks the solution a node forwards to its children.
pub trait BestListSelection<T>: Send
where
    T: SolverScalar,
{
    /// Returns a copy of the selected solution, or `None` if the entire
    /// list is empty.
    fn apply(&mut self, best_list: &BestList<T>, cost: &dyn CostPolicy<T>) -> Option<Solution<T>>;
}

/// Selects a uniformly-random slot; an empty pick falls forward to the
/// first occupied slot.
pub struct RandomBestListSelection {
    rng: StdRng,
}

impl RandomBestListSelection {
    /// Creates the policy with an entropy-backed generator.
    pub fn new() -> Self {
        Self::with_seed_source(&SeedSource::default())
    }

    /// Creates the policy drawing its seed from `seeds`.
    pub fn with_seed_source(seeds: &SeedSource) -> Self {
        Self { rng: seeds.rng() }
    }
}

impl Default for RandomBestListSelection {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> BestListSelection<T> for RandomBestListSelection
where
    T: SolverScalar,
{
    fn apply(&mut self, best_list: &BestList<T>, _cost: &dyn CostPolicy<T>) -> Option<Solution<T>> {
        let pick = self.rng.gen_range(0..best_list.len());
        if let Some(solution) = best_list.get(pick) {
            return Some(solution.clone());
        }
        // The picked slot was empty; fall forward to the first occupied one.
        best_list.iter().next().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::RosenbrockCost;
    use cairn_model::shape::Shape;

    fn solution(fitness: f64) -> Solution<f64> {
        let mut solution = Solution::new(Shape::scalar(1));
        solution.set_fitness(fitness);
        solution
    }

    #[test]
    fn test_empty_list_selects_nothing() {
        let cost = RosenbrockCost::new();
        let list = BestList::<f64>::new(4, 1);
        let mut policy = RandomBestListSelection::with_seed_source(&SeedSource::sequence(1));
        assert!(policy.apply(&list, &cost).is_none());
    }

    #[test]
    fn test_single_occupied_slot_is_always_found() {
        let cost = RosenbrockCost::new();
        let mut list = BestList::new(8, 1);
        list.set(5, solution(3.0));
        let mut policy = RandomBestListSelection::with_seed_source(&SeedSource::sequence(1));
        for _ in 0..32 {
            let selected = policy.apply(&list, &cost).unwrap();
            assert_eq!(selected.fitness().headline(), 3.0);
        }
    }

    #[test]
    fn test_full_list_selection_is_uniformly_spread() {
        let cost = RosenbrockCost::new();
        let mut list = BestList::new(3, 1);
        for i in 0..3 {
            list.set(i, solution(i as f64));
        }
        let mut policy = RandomBestListSelection::with_seed_source(&SeedSource::sequence(9));
        let mut seen = [false; 3];
        for _ in 0..64 {
            let selected = policy.apply(&list, &cost).unwrap();
            seen[selected.fitness().headline() as usize] = true;
        }
        assert!(seen.iter().all(|&hit| hit), "every slot should be selectable");
    }
}
