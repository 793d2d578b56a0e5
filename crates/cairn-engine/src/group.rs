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

//! The search group: a node's registered optimizers, their shared
//! population and the per-iteration optimization cycle.

use cairn_core::{num::SolverScalar, seed::SeedSource};
use cairn_model::{
    best_list::BestList, shape::Shape, solution::Solution, space::Region, tree::Topology,
};
use cairn_search::{
    convergence::ConvergenceControl,
    policy::{algorithm_select::AlgorithmSelection, best_list_update::BestListUpdate},
    search::{SearchContext, SearchError},
    SearchScore,
};
use log::debug;
use rand::{rngs::StdRng, Rng};

use crate::transport::NodeId;

/// Owns the optimizer roster and the shared population of one node.
///
/// One `run` performs a full group cycle: the algorithm-selection policy
/// picks an optimizer, the convergence controller drives it to its next
/// stabilised best, the best-list and the general best are updated and the
/// selection policy ranks the optimizer's performance.
pub struct SearchGroup<T>
where
    T: SolverScalar,
{
    id: NodeId,
    algorithms: Vec<SearchScore<T>>,
    selection: Box<dyn AlgorithmSelection<T>>,
    convergence: Box<dyn ConvergenceControl<T>>,
    population: Vec<Solution<T>>,
    iteration_best: Solution<T>,
    improved_general_best: bool,
    last_executed: Option<usize>,
    rng: StdRng,
}

impl<T> SearchGroup<T>
where
    T: SolverScalar,
{
    pub(crate) fn new(
        id: NodeId,
        algorithms: Vec<SearchScore<T>>,
        selection: Box<dyn AlgorithmSelection<T>>,
        convergence: Box<dyn ConvergenceControl<T>>,
        shape: Shape,
        population_size: usize,
        seeds: &SeedSource,
    ) -> Self {
        assert!(
            !algorithms.is_empty(),
            "called `SearchGroup::new` without search algorithms"
        );
        assert!(
            population_size > 0,
            "called `SearchGroup::new` with a zero population size"
        );
        Self {
            id,
            algorithms,
            selection,
            convergence,
            population: vec![Solution::new(shape); population_size],
            iteration_best: Solution::new(shape),
            improved_general_best: false,
            last_executed: None,
            rng: seeds.rng(),
        }
    }

    /// Performs a complete execution of the search group.
    ///
    /// Returns the number of evaluations spent by the selected optimizer.
    pub(crate) fn run(
        &mut self,
        ctx: SearchContext<'_, T>,
        tree: &Topology,
        best_list: &mut BestList<T>,
        general_best: &mut Solution<T>,
        update: &dyn BestListUpdate<T>,
        total_evals: u64,
    ) -> Result<u64, SearchError> {
        debug!("node {} executing search group", self.id);
        self.improved_general_best = false;

        let selected = self.selection.select(self.id, tree, &self.algorithms);
        self.convergence
            .run(self.algorithms[selected].algorithm_mut(), ctx, &mut self.population)?;

        let spent = self.algorithms[selected].algorithm().evals();
        let best = self.algorithms[selected]
            .algorithm()
            .best_individual(&self.population)
            .clone();
        self.iteration_best.assign(&best);
        update.apply(best_list, &self.iteration_best, ctx.cost);
        if ctx.cost.first_is_better(&self.iteration_best, general_best) {
            general_best.assign(&self.iteration_best);
            self.improved_general_best = true;
        }

        let fitness = self.iteration_best.fitness().clone();
        self.selection.rank(
            self.id,
            tree,
            &mut self.algorithms,
            selected,
            &fitness,
            spent,
            total_evals + spent,
        );
        self.last_executed = Some(selected);

        debug!(
            "node {} search group executed ({} evaluations)",
            self.id, spent
        );
        Ok(spent)
    }

    /// Resets the location of the population individuals and evaluates them.
    ///
    /// On the root node the first slots are overwritten by the provided
    /// startup solutions and, if a bias is configured, one slot is fixed to
    /// the bias while half of the remaining slots land in its Gaussian
    /// neighbourhood. Every other slot is placed uniformly inside the
    /// anchor sub-region. Returns the number of evaluations spent.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn reset_population(
        &mut self,
        ctx: SearchContext<'_, T>,
        region: &Region<T>,
        is_root: bool,
        startup_solutions: &[Solution<T>],
        bias: Option<&Solution<T>>,
        best_list: &mut BestList<T>,
        general_best: &mut Solution<T>,
        update: &dyn BestListUpdate<T>,
    ) -> u64 {
        let mut used_bias = false;
        for i in 0..self.population.len() {
            if is_root && i < startup_solutions.len() {
                self.population[i].assign(&startup_solutions[i]);
            } else if let Some(bias) = bias {
                if is_root && !used_bias {
                    used_bias = true;
                    self.population[i].assign(bias);
                } else if self.rng.gen_range(0.0_f64..1.0_f64) < 0.5 {
                    self.population[i].reset_biased(region, bias, &mut self.rng);
                } else {
                    self.population[i].reset(region, &mut self.rng);
                }
            } else {
                self.population[i].reset(region, &mut self.rng);
            }

            ctx.cost.evaluate(&mut self.population[i]);
            if i == 0 || ctx.cost.first_is_better(&self.population[i], &self.iteration_best) {
                self.iteration_best.assign(&self.population[i]);
            }
        }
        if ctx.cost.first_is_better(&self.iteration_best, general_best) {
            general_best.assign(&self.iteration_best);
        }
        update.apply(best_list, general_best, ctx.cost);
        self.population.len() as u64
    }

    /// Returns the shared population.
    #[inline]
    pub fn population(&self) -> &[Solution<T>] {
        &self.population
    }

    /// Returns the shared population mutably.
    #[inline]
    pub(crate) fn population_mut(&mut self) -> &mut [Solution<T>] {
        &mut self.population
    }

    /// Returns the population size.
    #[inline]
    pub fn population_size(&self) -> usize {
        self.population.len()
    }

    /// Returns the best solution of the current iteration.
    #[inline]
    pub fn iteration_best(&self) -> &Solution<T> {
        &self.iteration_best
    }

    /// Returns whether the last [`run`](Self::run) improved the general
    /// best solution.
    #[inline]
    pub fn improved_general_best(&self) -> bool {
        self.improved_general_best
    }

    /// Returns the evaluation budget of one convergence-controlled call.
    #[inline]
    pub fn convergence_budget(&self) -> u64 {
        self.convergence.budget()
    }

    /// Returns the name of the optimizer executed last, if any.
    pub fn last_executed_name(&self) -> Option<&str> {
        self.last_executed
            .map(|idx| self.algorithms[idx].algorithm().name())
    }
}

impl<T> std::fmt::Debug for SearchGroup<T>
where
    T: SolverScalar,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchGroup")
            .field("id", &self.id)
            .field("algorithms", &self.algorithms.len())
            .field("population_size", &self.population.len())
            .field("improved_general_best", &self.improved_general_best)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_model::space::SearchSpace;
    use cairn_search::{
        convergence::CsmOn,
        cost::{CostPolicy, RosenbrockCost},
        meta::pso::Pso,
        policy::{
            algorithm_select::RoundRobinSelection, best_list_update::ConvergentBestListUpdate,
        },
    };

    fn group(population_size: usize) -> SearchGroup<f64> {
        let seeds = SeedSource::sequence(11);
        let swarm = Pso::new(0.9, 0.7, 0.7, population_size).with_seed_source(seeds.clone());
        SearchGroup::new(
            0,
            vec![SearchScore::new(Box::new(swarm), 1.0)],
            Box::new(RoundRobinSelection::new()),
            Box::new(CsmOn::new(400, 0.2, 0.0)),
            Shape::scalar(3),
            population_size,
            &seeds,
        )
    }

    fn single_node_tree() -> Topology {
        let mut tree = Topology::new(1);
        tree.add_root_node(0).unwrap();
        tree.lock();
        tree
    }

    #[test]
    fn test_reset_population_seeds_everything() {
        let cost = RosenbrockCost::new();
        let space = SearchSpace::hypercube(3, -20.0, 20.0).unwrap();
        let ctx = SearchContext::new(&cost, &space);
        let mut group = group(6);
        let mut best_list = BestList::new(2, 3);
        let mut general_best = Solution::new(Shape::scalar(3));
        cost.set_worst_fitness(general_best.fitness_mut());
        let update = ConvergentBestListUpdate::new();

        let evals = group.reset_population(
            ctx,
            space.region(),
            true,
            &[],
            None,
            &mut best_list,
            &mut general_best,
            &update,
        );
        assert_eq!(evals, 6);
        // The general best picked up the best evaluated individual.
        assert!(general_best.fitness().headline() < f64::MAX);
        assert_eq!(best_list.occupied(), 1);
        for individual in group.population() {
            for d in 0..3 {
                assert!(space
                    .dimension(d)
                    .interval()
                    .contains(individual.position(d).first()));
            }
        }
    }

    #[test]
    fn test_reset_population_applies_startup_solutions_on_root() {
        let cost = RosenbrockCost::new();
        let space = SearchSpace::hypercube(3, -20.0, 20.0).unwrap();
        let ctx = SearchContext::new(&cost, &space);
        let mut group = group(4);
        let mut best_list = BestList::new(2, 3);
        let mut general_best = Solution::new(Shape::scalar(3));
        cost.set_worst_fitness(general_best.fitness_mut());
        let update = ConvergentBestListUpdate::new();

        let mut seed_solution = Solution::new(Shape::scalar(3));
        seed_solution.load_positions(&[1.0, 1.0, 1.0]);
        group.reset_population(
            ctx,
            space.region(),
            true,
            std::slice::from_ref(&seed_solution),
            None,
            &mut best_list,
            &mut general_best,
            &update,
        );
        assert_eq!(group.population()[0].flat_positions(), vec![1.0, 1.0, 1.0]);
        // The startup solution is the Rosenbrock optimum, so it wins.
        assert_eq!(general_best.fitness().headline(), 0.0);
    }

    #[test]
    fn test_group_run_improves_and_ranks() {
        let cost = RosenbrockCost::new();
        let space = SearchSpace::hypercube(3, -20.0, 20.0).unwrap();
        let ctx = SearchContext::new(&cost, &space);
        let tree = single_node_tree();
        let mut group = group(8);
        let mut best_list = BestList::new(2, 3);
        let mut general_best = Solution::new(Shape::scalar(3));
        cost.set_worst_fitness(general_best.fitness_mut());
        let update = ConvergentBestListUpdate::new();

        group.reset_population(
            ctx,
            space.region(),
            true,
            &[],
            None,
            &mut best_list,
            &mut general_best,
            &update,
        );
        let spent = group
            .run(ctx, &tree, &mut best_list, &mut general_best, &update, 8)
            .unwrap();
        assert!(spent > 0);
        assert!(spent <= 400);
        assert_eq!(group.last_executed_name(), Some("PSO"));
        // The first group run always improves on the sentinel-seeded best.
        assert!(!general_best.fitness().headline().is_nan());
        assert!(
            group.iteration_best().fitness().headline() >= 0.0,
            "Rosenbrock fitness is non-negative"
        );
    }
}
