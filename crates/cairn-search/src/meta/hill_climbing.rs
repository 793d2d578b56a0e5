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

//! Classic hill climbing, split into the startup/next/finalize discipline
//! the convergence controller drives: `next` proposes per-dimension moves
//! until the first improvement of the current best, a bounded number of
//! fruitless sweeps, or the evaluation budget.

use crate::search::{Search, SearchContext, SearchError};
use cairn_core::{num::SolverScalar, seed::SeedSource};
use cairn_model::solution::Solution;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Consecutive fruitless sweeps after which the search reports stagnation.
const DEFAULT_MAX_NO_IMPROVE: u32 = 5;

/// Hill climbing over the population.
///
/// Per individual and per dimension, with probability `perc_move` a
/// candidate move of `step` times a uniform draw from the dimension's
/// bounds is proposed and accepted only if it strictly improves the
/// individual. An accepted move writes back the mutated dimension of the
/// individual only.
pub struct HillClimbing<T>
where
    T: SolverScalar,
{
    perc_move: f64,
    step: f64,
    preferred_population_size: usize,
    max_no_improve: u32,
    seeds: SeedSource,
    rng: StdRng,
    candidate: Option<Solution<T>>,
    n_evals: u64,
    gb: usize,
    stuck: bool,
}

impl<T> HillClimbing<T>
where
    T: SolverScalar,
{
    /// Creates a hill climber.
    ///
    /// # Panics
    ///
    /// Panics if `population_size` is zero.
    pub fn new(perc_move: f64, step: f64, population_size: usize) -> Self {
        assert!(
            population_size > 0,
            "called `HillClimbing::new` with a zero population size"
        );
        Self {
            perc_move,
            step,
            preferred_population_size: population_size,
            max_no_improve: DEFAULT_MAX_NO_IMPROVE,
            seeds: SeedSource::default(),
            rng: StdRng::seed_from_u64(0),
            candidate: None,
            n_evals: 0,
            gb: 0,
            stuck: false,
        }
    }

    /// Replaces the seed source (entropy by default).
    pub fn with_seed_source(mut self, seeds: SeedSource) -> Self {
        self.seeds = seeds;
        self
    }

    /// Replaces the stagnation threshold.
    pub fn with_max_no_improve(mut self, max_no_improve: u32) -> Self {
        self.max_no_improve = max_no_improve;
        self
    }
}

impl<T> Search<T> for HillClimbing<T>
where
    T: SolverScalar,
{
    fn name(&self) -> &str {
        "HillClimbing"
    }

    fn preferred_population_size(&self) -> usize {
        self.preferred_population_size
    }

    fn startup(
        &mut self,
        ctx: SearchContext<'_, T>,
        population: &mut [Solution<T>],
    ) -> Result<(), SearchError> {
        if population.is_empty() {
            return Err(SearchError::EmptyPopulation);
        }
        self.rng = self.seeds.rng();
        self.n_evals = 0;
        self.stuck = false;
        self.gb = 0;
        for i in 1..population.len() {
            if ctx.cost.first_is_better(&population[i], &population[self.gb]) {
                self.gb = i;
            }
        }
        self.candidate = Some(population[0].clone());
        Ok(())
    }

    fn next(&mut self, ctx: SearchContext<'_, T>, population: &mut [Solution<T>], budget: u64) {
        let n = ctx.space.n_dimensions();
        let mut candidate = self
            .candidate
            .take()
            .expect("`next` requires a completed `startup`");
        let mut no_improve = 0;
        let mut found = false;
        while !found && no_improve < self.max_no_improve && self.n_evals < budget {
            'sweep: for i in 0..population.len() {
                for d in 0..n {
                    if self.n_evals >= budget {
                        break 'sweep;
                    }
                    if self.rng.gen_range(0.0_f64..1.0_f64) > self.perc_move {
                        continue;
                    }
                    let dim = ctx.space.dimension(d);
                    candidate.assign(&population[i]);
                    let draw = self.rng.gen_range(dim.start()..=dim.end());
                    let step = T::from_f64(self.step).expect("step fits the scalar type");
                    candidate.position_mut(d).add_scalar(step * draw);
                    candidate.position_mut(d).clamp(dim.interval());
                    ctx.cost.evaluate(&mut candidate);
                    self.n_evals += 1;
                    if ctx.cost.first_is_better(&candidate, &population[i]) {
                        // Write back only the mutated dimension.
                        let improved = candidate.position(d).clone();
                        population[i].position_mut(d).assign(&improved);
                        if i != self.gb
                            && ctx.cost.first_is_better(&population[i], &population[self.gb])
                        {
                            found = true;
                            self.gb = i;
                        }
                    }
                }
            }
            if !found {
                no_improve += 1;
            }
        }
        if no_improve == self.max_no_improve {
            self.stuck = true;
        }
        self.candidate = Some(candidate);
    }

    fn finalize(&mut self, _ctx: SearchContext<'_, T>, _population: &mut [Solution<T>]) {}

    fn is_stuck(&self) -> bool {
        self.stuck
    }

    fn best_index(&self) -> usize {
        self.gb
    }

    fn evals(&self) -> u64 {
        self.n_evals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::RosenbrockCost;
    use cairn_model::{shape::Shape, space::SearchSpace};

    fn evaluated_population(ctx: SearchContext<'_, f64>, coords: &[f64]) -> Vec<Solution<f64>> {
        coords
            .iter()
            .map(|&x| {
                let mut solution = Solution::new(Shape::scalar(2));
                solution.load_positions(&[x, x]);
                ctx.cost.evaluate(&mut solution);
                solution
            })
            .collect()
    }

    #[test]
    fn test_startup_finds_initial_best() {
        let cost = RosenbrockCost::new();
        let space = SearchSpace::hypercube(2, -20.0, 20.0).unwrap();
        let ctx = SearchContext::new(&cost, &space);
        let mut population = evaluated_population(ctx, &[5.0, 1.0, -3.0]);
        let mut search =
            HillClimbing::new(0.5, 0.1, 3).with_seed_source(SeedSource::sequence(1));
        search.startup(ctx, &mut population).unwrap();
        assert_eq!(search.best_index(), 1);
        assert_eq!(search.evals(), 0);
        assert!(!search.is_stuck());
    }

    #[test]
    fn test_next_respects_budget() {
        let cost = RosenbrockCost::new();
        let space = SearchSpace::hypercube(2, -20.0, 20.0).unwrap();
        let ctx = SearchContext::new(&cost, &space);
        let mut population = evaluated_population(ctx, &[5.0, -4.0, 7.0, 2.0]);
        let mut search =
            HillClimbing::new(1.0, 0.1, 4).with_seed_source(SeedSource::sequence(2));
        search.startup(ctx, &mut population).unwrap();
        search.next(ctx, &mut population, 17);
        assert!(search.evals() <= 17);
    }

    #[test]
    fn test_accepted_move_keeps_stored_fitness() {
        // The hill climber writes back the improved position of the mutated
        // dimension but leaves the stored fitness of the individual alone.
        let cost = RosenbrockCost::new();
        let space = SearchSpace::hypercube(2, -20.0, 20.0).unwrap();
        let ctx = SearchContext::new(&cost, &space);
        let mut population = evaluated_population(ctx, &[5.0, -4.0]);
        let before: Vec<f64> = population
            .iter()
            .map(|s| s.fitness().headline())
            .collect();
        let mut search =
            HillClimbing::new(1.0, 0.1, 2).with_seed_source(SeedSource::sequence(3));
        search.startup(ctx, &mut population).unwrap();
        search.next(ctx, &mut population, 100);
        let after: Vec<f64> = population
            .iter()
            .map(|s| s.fitness().headline())
            .collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_stagnation_sets_stuck() {
        let cost = RosenbrockCost::new();
        let space = SearchSpace::hypercube(2, -20.0, 20.0).unwrap();
        let ctx = SearchContext::new(&cost, &space);
        // perc_move zero: no move is ever proposed, every sweep is fruitless.
        let mut population = evaluated_population(ctx, &[5.0, -4.0]);
        let mut search =
            HillClimbing::new(0.0, 0.1, 2).with_seed_source(SeedSource::sequence(4));
        search.startup(ctx, &mut population).unwrap();
        search.next(ctx, &mut population, 1_000);
        assert!(search.is_stuck());
        assert_eq!(search.evals(), 0);
    }

    #[test]
    fn test_empty_population_fails_startup() {
        let cost = RosenbrockCost::new();
        let space = SearchSpace::hypercube(2, -20.0, 20.0).unwrap();
        let ctx = SearchContext::new(&cost, &space);
        let mut search = HillClimbing::<f64>::new(0.5, 0.1, 2);
        assert_eq!(
            search.startup(ctx, &mut []),
            Err(SearchError::EmptyPopulation)
        );
    }
}
