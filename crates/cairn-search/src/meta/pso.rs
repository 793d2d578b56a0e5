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

//! Particle swarm optimization with linearly decreasing inertia.
//!
//! The swarm tracks a personal best per particle and a global best over the
//! personal bests. The inertia weight decays linearly to zero across the
//! evaluation budget of one controller call. `next` returns on the first
//! improvement of the global best or after a bounded number of fruitless
//! sweeps; `finalize` writes the personal bests back into the population so
//! the engine sees the refined swarm state.

use crate::search::{Search, SearchContext, SearchError};
use cairn_core::{num::SolverScalar, seed::SeedSource};
use cairn_model::solution::Solution;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Consecutive fruitless sweeps after which the search reports stagnation.
const DEFAULT_MAX_NO_IMPROVE: u32 = 5;

/// Particle swarm optimization.
pub struct Pso<T>
where
    T: SolverScalar,
{
    w: f64,
    c1: f64,
    c2: f64,
    preferred_population_size: usize,
    max_no_improve: u32,
    seeds: SeedSource,
    rng: StdRng,
    p_best: Vec<Solution<T>>,
    velocity: Vec<Solution<T>>,
    n_evals: u64,
    gb: usize,
    stuck: bool,
}

impl<T> Pso<T>
where
    T: SolverScalar,
{
    /// Creates a particle swarm with inertia `w` and the cognitive and
    /// social coefficients `c1` and `c2`.
    ///
    /// # Panics
    ///
    /// Panics if `population_size` is zero.
    pub fn new(w: f64, c1: f64, c2: f64, population_size: usize) -> Self {
        assert!(
            population_size > 0,
            "called `Pso::new` with a zero population size"
        );
        Self {
            w,
            c1,
            c2,
            preferred_population_size: population_size,
            max_no_improve: DEFAULT_MAX_NO_IMPROVE,
            seeds: SeedSource::default(),
            rng: StdRng::seed_from_u64(0),
            p_best: Vec::new(),
            velocity: Vec::new(),
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

impl<T> Search<T> for Pso<T>
where
    T: SolverScalar,
{
    fn name(&self) -> &str {
        "PSO"
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

        let shape = population[0].shape();
        self.p_best.resize(population.len(), Solution::new(shape));
        self.velocity.resize(population.len(), Solution::new(shape));

        let n = ctx.space.n_dimensions();
        for (i, individual) in population.iter().enumerate() {
            for j in 0..n {
                let spin = self.rng.gen_range(T::zero()..=T::one());
                self.velocity[i].position_mut(j).fill(spin);
            }
            self.p_best[i].assign(individual);
            if i != self.gb && ctx.cost.first_is_better(individual, &population[self.gb]) {
                self.gb = i;
            }
        }
        Ok(())
    }

    fn next(&mut self, ctx: SearchContext<'_, T>, population: &mut [Solution<T>], budget: u64) {
        let n = ctx.space.n_dimensions();
        let mut found = false;
        let mut no_improve = 0;
        let mut curr_w = self.w - (self.w / budget as f64) * self.n_evals as f64;
        while !found && self.n_evals < budget && no_improve < self.max_no_improve {
            for i in 0..population.len() {
                if self.n_evals >= budget {
                    break;
                }
                for j in 0..n {
                    let dim = ctx.space.dimension(j);
                    // c1 * U(0, 1) * (pBest[i][j] - x[i][j])
                    let mut cognitive = self.p_best[i].position(j).clone();
                    cognitive.sub(population[i].position(j));
                    cognitive.scale(
                        T::from_f64(self.c1 * self.rng.gen_range(0.0_f64..1.0_f64))
                            .expect("coefficient fits the scalar type"),
                    );
                    // c2 * U(0, 1) * (x[gb][j] - x[i][j])
                    let mut social = population[self.gb].position(j).clone();
                    social.sub(population[i].position(j));
                    social.scale(
                        T::from_f64(self.c2 * self.rng.gen_range(0.0_f64..1.0_f64))
                            .expect("coefficient fits the scalar type"),
                    );
                    social.add(&cognitive);

                    let mut velocity = self.velocity[i].position(j).clone();
                    velocity.scale(T::from_f64(curr_w).expect("inertia fits the scalar type"));
                    velocity.add(&social);

                    self.velocity[i].position_mut(j).assign(&velocity);
                    population[i].position_mut(j).add(&velocity);
                    population[i].position_mut(j).clamp(dim.interval());
                }
                ctx.cost.evaluate(&mut population[i]);
                self.n_evals += 1;
            }
            for i in 0..population.len() {
                if ctx.cost.first_is_better(&population[i], &self.p_best[i]) {
                    self.p_best[i].assign(&population[i]);
                    if i != self.gb
                        && ctx
                            .cost
                            .first_is_better(&self.p_best[i], &self.p_best[self.gb])
                    {
                        found = true;
                        self.gb = i;
                    }
                }
            }
            if !found {
                no_improve += 1;
            }
            curr_w -= self.w / budget as f64;
        }
        if no_improve == self.max_no_improve {
            self.stuck = true;
        }
    }

    fn finalize(&mut self, _ctx: SearchContext<'_, T>, population: &mut [Solution<T>]) {
        // Hand the refined swarm state back to the caller.
        for (individual, p_best) in population.iter_mut().zip(self.p_best.iter()) {
            individual.assign(p_best);
        }
    }

    fn is_stuck(&self) -> bool {
        self.stuck
    }

    fn best_index(&self) -> usize {
        self.gb
    }

    fn evals(&self) -> u64 {
        self.n_evals
    }

    fn best_individual<'a>(&'a self, _population: &'a [Solution<T>]) -> &'a Solution<T> {
        &self.p_best[self.gb]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::RosenbrockCost;
    use cairn_model::{shape::Shape, space::SearchSpace};
    use rand::SeedableRng;

    fn evaluated_population(
        ctx: SearchContext<'_, f64>,
        size: usize,
        seed: u64,
    ) -> Vec<Solution<f64>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..size)
            .map(|_| {
                let mut solution = Solution::new(Shape::scalar(2));
                let space_region = ctx.space.region().clone();
                solution.reset(&space_region, &mut rng);
                ctx.cost.evaluate(&mut solution);
                solution
            })
            .collect()
    }

    #[test]
    fn test_best_never_regresses_across_next_calls() {
        let cost = RosenbrockCost::new();
        let space = SearchSpace::hypercube(2, -20.0, 20.0).unwrap();
        let ctx = SearchContext::new(&cost, &space);
        let mut population = evaluated_population(ctx, 8, 17);
        let mut swarm = Pso::new(0.9, 0.7, 0.7, 8).with_seed_source(SeedSource::sequence(5));
        swarm.startup(ctx, &mut population).unwrap();
        let mut last = swarm.best_headline(&population);
        for _ in 0..16 {
            if swarm.is_stuck() || swarm.evals() >= 2000 {
                break;
            }
            swarm.next(ctx, &mut population, 2000);
            let best = swarm.best_headline(&population);
            assert!(best <= last, "global best regressed: {} > {}", best, last);
            last = best;
        }
    }

    #[test]
    fn test_next_improves_rosenbrock() {
        let cost = RosenbrockCost::new();
        let space = SearchSpace::hypercube(2, -20.0, 20.0).unwrap();
        let ctx = SearchContext::new(&cost, &space);
        let mut population = evaluated_population(ctx, 12, 23);
        let mut swarm = Pso::new(0.9, 0.7, 0.7, 12).with_seed_source(SeedSource::sequence(6));
        swarm.startup(ctx, &mut population).unwrap();
        let initial = swarm.best_headline(&population);
        for _ in 0..32 {
            if swarm.is_stuck() || swarm.evals() >= 4000 {
                break;
            }
            swarm.next(ctx, &mut population, 4000);
        }
        assert!(
            swarm.best_headline(&population) < initial,
            "the swarm should improve a random population"
        );
    }

    #[test]
    fn test_finalize_writes_personal_bests_back() {
        let cost = RosenbrockCost::new();
        let space = SearchSpace::hypercube(2, -20.0, 20.0).unwrap();
        let ctx = SearchContext::new(&cost, &space);
        let mut population = evaluated_population(ctx, 4, 31);
        let mut swarm = Pso::new(0.9, 0.7, 0.7, 4).with_seed_source(SeedSource::sequence(7));
        swarm.startup(ctx, &mut population).unwrap();
        swarm.next(ctx, &mut population, 500);
        swarm.finalize(ctx, &mut population);
        for (i, individual) in population.iter().enumerate() {
            assert_eq!(individual, &swarm.p_best[i]);
        }
    }

    #[test]
    fn test_next_respects_budget() {
        let cost = RosenbrockCost::new();
        let space = SearchSpace::hypercube(2, -20.0, 20.0).unwrap();
        let ctx = SearchContext::new(&cost, &space);
        let mut population = evaluated_population(ctx, 8, 41);
        let mut swarm = Pso::new(0.9, 0.7, 0.7, 8).with_seed_source(SeedSource::sequence(8));
        swarm.startup(ctx, &mut population).unwrap();
        swarm.next(ctx, &mut population, 13);
        assert!(swarm.evals() <= 13);
    }

    #[test]
    fn test_empty_population_fails_startup() {
        let cost = RosenbrockCost::new();
        let space = SearchSpace::hypercube(2, -20.0, 20.0).unwrap();
        let ctx = SearchContext::new(&cost, &space);
        let mut swarm = Pso::<f64>::new(0.9, 0.7, 0.7, 4);
        assert_eq!(
            swarm.startup(ctx, &mut []),
            Err(SearchError::EmptyPopulation)
        );
    }
}
