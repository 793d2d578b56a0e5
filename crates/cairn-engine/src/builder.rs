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

//! # Engine Builder
//!
//! Pure configuration surface for one engine node. Setters are fluent and
//! consuming; [`Builder::build`] consumes the builder and returns the
//! engine, so the configuration can be used exactly once and ownership of
//! every wired capability transfers to the engine. Unspecified policies
//! receive the framework defaults: CSMOn convergence control, group region
//! selection without partitioning, a small hill climber for child-report
//! refinement, the convergent best-list update with random selection,
//! round-robin algorithm selection and the Beta relocation strategy.

use crate::{
    engine::Engine,
    group::SearchGroup,
    transport::{NodeId, NodeTransport, PeerStatus},
};
use cairn_core::{num::SolverScalar, seed::SeedSource};
use cairn_model::{
    best_list::BestList, iteration::IterationData, shape::Shape, solution::Solution,
    space::SearchSpace, tree::{Topology, TopologyError},
};
use cairn_search::{
    convergence::{ConvergenceControl, CsmOn},
    cost::CostPolicy,
    meta::hill_climbing::HillClimbing,
    policy::{
        algorithm_select::{AlgorithmSelection, RoundRobinSelection},
        best_list_select::{BestListSelection, RandomBestListSelection},
        best_list_update::{BestListUpdate, ConvergentBestListUpdate},
        region::{GroupRegionSelection, RegionSelection, RegionSelectionError},
        relocation::{BetaRelocation, BetaRelocationConfig, DisplacementMode, RelocationPolicy},
    },
    search::Search,
    SearchScore,
};
use std::time::Duration;

/// The error type for engine construction.
#[derive(Debug)]
pub enum BuildError {
    /// No tree topology was provided.
    MissingTree,
    /// No search space was provided.
    MissingSearchSpace,
    /// No cost capability was provided.
    MissingCostPolicy,
    /// No transport was provided.
    MissingTransport,
    /// Every budget cap is zero.
    NoBudgetConfigured,
    /// No search algorithm was registered.
    NoSearchAlgorithms,
    /// The registered algorithms prefer an empty population.
    EmptyPopulation,
    /// The best-list size must be at least one.
    InvalidBestListSize { size: usize },
    /// The transport's node identifier is not part of the topology.
    UnknownNodeId { id: NodeId },
    /// The configured shape does not match the search space.
    ShapeMismatch { shape_dims: usize, space_dims: usize },
    /// A navigation query failed on the topology.
    Topology(TopologyError),
    /// The region partitioner rejected the topology.
    Region(RegionSelectionError),
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingTree => write!(f, "The tree topology must be provided"),
            Self::MissingSearchSpace => write!(f, "The search space must be provided"),
            Self::MissingCostPolicy => write!(f, "The cost policy must be provided"),
            Self::MissingTransport => write!(f, "The transport must be provided"),
            Self::NoBudgetConfigured => write!(
                f,
                "At least one budget limit must be provided: [iterations, evaluations, seconds]"
            ),
            Self::NoSearchAlgorithms => {
                write!(f, "At least one search algorithm must be provided")
            }
            Self::EmptyPopulation => {
                write!(f, "The population size must be greater than zero")
            }
            Self::InvalidBestListSize { size } => {
                write!(f, "The best-list size {} is invalid", size)
            }
            Self::UnknownNodeId { id } => {
                write!(f, "Node {} is not part of the tree topology", id)
            }
            Self::ShapeMismatch {
                shape_dims,
                space_dims,
            } => write!(
                f,
                "The shape covers {} dimensions but the search space has {}",
                shape_dims, space_dims
            ),
            Self::Topology(e) => write!(f, "Topology error: {}", e),
            Self::Region(e) => write!(f, "Region selection error: {}", e),
        }
    }
}

impl std::error::Error for BuildError {}

impl From<TopologyError> for BuildError {
    fn from(e: TopologyError) -> Self {
        Self::Topology(e)
    }
}

impl From<RegionSelectionError> for BuildError {
    fn from(e: RegionSelectionError) -> Self {
        Self::Region(e)
    }
}

/// Configuration surface for one engine node.
pub struct Builder<T, B>
where
    T: SolverScalar,
    B: NodeTransport<T>,
{
    tree: Option<Topology>,
    space: Option<SearchSpace<T>>,
    shape: Option<Shape>,
    cost: Option<Box<dyn CostPolicy<T>>>,
    transport: Option<B>,
    convergence: Option<Box<dyn ConvergenceControl<T>>>,
    local_search: Option<Box<dyn Search<T>>>,
    best_list_update: Option<Box<dyn BestListUpdate<T>>>,
    best_list_selection: Option<Box<dyn BestListSelection<T>>>,
    algorithm_selection: Option<Box<dyn AlgorithmSelection<T>>>,
    region_selection: Option<Box<dyn RegionSelection<T>>>,
    relocation: Option<Box<dyn RelocationPolicy<T>>>,
    algorithms: Vec<SearchScore<T>>,
    bias: Option<Solution<T>>,
    startup_solutions: Vec<Solution<T>>,
    best_list_size: usize,
    max_iterations: u64,
    max_evaluations: u64,
    max_seconds: u64,
    seeds: SeedSource,
    residual_poll: Duration,
}

impl<T, B> Builder<T, B>
where
    T: SolverScalar,
    B: NodeTransport<T>,
{
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self {
            tree: None,
            space: None,
            shape: None,
            cost: None,
            transport: None,
            convergence: None,
            local_search: None,
            best_list_update: None,
            best_list_selection: None,
            algorithm_selection: None,
            region_selection: None,
            relocation: None,
            algorithms: Vec::new(),
            bias: None,
            startup_solutions: Vec::new(),
            best_list_size: 1,
            max_iterations: 0,
            max_evaluations: 0,
            max_seconds: 0,
            seeds: SeedSource::default(),
            residual_poll: Duration::from_secs(1),
        }
    }

    /// Sets the tree topology; it is locked at build time.
    pub fn tree(mut self, tree: Topology) -> Self {
        self.tree = Some(tree);
        self
    }

    /// Sets the full search space.
    pub fn search_space(mut self, space: SearchSpace<T>) -> Self {
        self.space = Some(space);
        self
    }

    /// Overrides the solution shape (scalar widths over the search space's
    /// dimension count by default).
    pub fn shape(mut self, shape: Shape) -> Self {
        self.shape = Some(shape);
        self
    }

    /// Sets the cost capability of the problem under optimization.
    pub fn cost_policy(mut self, cost: Box<dyn CostPolicy<T>>) -> Self {
        self.cost = Some(cost);
        self
    }

    /// Sets the transport connecting this node to its tree neighbours.
    pub fn transport(mut self, transport: B) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the convergence controller (CSMOn by default).
    pub fn convergence_control(mut self, convergence: Box<dyn ConvergenceControl<T>>) -> Self {
        self.convergence = Some(convergence);
        self
    }

    /// Sets the local refinement optimizer applied to child reports
    /// (a small hill climber by default).
    pub fn local_search(mut self, local_search: Box<dyn Search<T>>) -> Self {
        self.local_search = Some(local_search);
        self
    }

    /// Sets the best-list update policy (convergent by default).
    pub fn best_list_update(mut self, update: Box<dyn BestListUpdate<T>>) -> Self {
        self.best_list_update = Some(update);
        self
    }

    /// Sets the best-list selection policy (uniformly random by default).
    pub fn best_list_selection(mut self, selection: Box<dyn BestListSelection<T>>) -> Self {
        self.best_list_selection = Some(selection);
        self
    }

    /// Sets the algorithm-selection policy (round-robin by default).
    pub fn algorithm_selection(mut self, selection: Box<dyn AlgorithmSelection<T>>) -> Self {
        self.algorithm_selection = Some(selection);
        self
    }

    /// Sets the region selection policy (no partitioning by default).
    pub fn region_selection(mut self, selection: Box<dyn RegionSelection<T>>) -> Self {
        self.region_selection = Some(selection);
        self
    }

    /// Sets the relocation strategy (Beta relocation, linear displacement,
    /// by default).
    pub fn relocation_policy(mut self, relocation: Box<dyn RelocationPolicy<T>>) -> Self {
        self.relocation = Some(relocation);
        self
    }

    /// Registers a search algorithm with the given selection weight.
    pub fn add_search_algorithm(mut self, algorithm: Box<dyn Search<T>>, weight: f64) -> Self {
        self.algorithms.push(SearchScore::new(algorithm, weight));
        self
    }

    /// Sets a bias solution guiding part of the root's population.
    ///
    /// Academic benchmark problems rarely involve a bias, but on real-world
    /// problems a known good region is valuable steering information.
    pub fn bias(mut self, bias: Solution<T>) -> Self {
        self.bias = Some(bias);
        self
    }

    /// Sets the startup solutions overriding the root's first population
    /// slots.
    pub fn startup_solutions(mut self, solutions: Vec<Solution<T>>) -> Self {
        self.startup_solutions = solutions;
        self
    }

    /// Sets the best-list size (1 by default).
    pub fn best_list_size(mut self, size: usize) -> Self {
        self.best_list_size = size;
        self
    }

    /// Sets the maximum number of engine iterations (0 = unlimited).
    pub fn max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the maximum number of fitness evaluations (0 = unlimited).
    pub fn max_evaluations(mut self, max_evaluations: u64) -> Self {
        self.max_evaluations = max_evaluations;
        self
    }

    /// Sets the maximum wall-clock run time in seconds (0 = unlimited).
    pub fn max_seconds(mut self, max_seconds: u64) -> Self {
        self.max_seconds = max_seconds;
        self
    }

    /// Sets the seed source feeding every random decision of this node.
    pub fn seed_source(mut self, seeds: SeedSource) -> Self {
        self.seeds = seeds;
        self
    }

    /// Sets the poll interval of the residual and finalize wait loops
    /// (one second by default).
    pub fn residual_poll_interval(mut self, interval: Duration) -> Self {
        self.residual_poll = interval;
        self
    }

    /// Builds the engine, consuming the builder.
    pub fn build(self) -> Result<Engine<T, B>, BuildError> {
        let mut tree = self.tree.ok_or(BuildError::MissingTree)?;
        let space = self.space.ok_or(BuildError::MissingSearchSpace)?;
        let cost = self.cost.ok_or(BuildError::MissingCostPolicy)?;
        let transport = self.transport.ok_or(BuildError::MissingTransport)?;
        if self.max_iterations == 0 && self.max_evaluations == 0 && self.max_seconds == 0 {
            return Err(BuildError::NoBudgetConfigured);
        }
        if self.algorithms.is_empty() {
            return Err(BuildError::NoSearchAlgorithms);
        }
        if self.best_list_size == 0 {
            return Err(BuildError::InvalidBestListSize { size: 0 });
        }

        let shape = self.shape.unwrap_or(Shape::scalar(space.n_dimensions()));
        if shape.n_dims != space.n_dimensions() {
            return Err(BuildError::ShapeMismatch {
                shape_dims: shape.n_dims,
                space_dims: space.n_dimensions(),
            });
        }

        // Freeze the topology before any navigation happens.
        tree.lock();
        let id = transport.node_id();
        if !tree.contains(id) {
            return Err(BuildError::UnknownNodeId { id });
        }
        let level = tree.level(id)?;
        let parent = tree.parent_id(id)?;
        let children = tree.children_ids(id)?;
        let children_status = vec![PeerStatus::NotStarted; children.len()];

        // The engine's population is sized after the most demanding
        // registered optimizer.
        let population_size = self
            .algorithms
            .iter()
            .map(|score| score.algorithm().preferred_population_size())
            .max()
            .unwrap_or(0);
        if population_size == 0 {
            return Err(BuildError::EmptyPopulation);
        }

        // Install the defaults for everything left unspecified.
        let seeds = self.seeds;
        let convergence = self.convergence.unwrap_or_else(|| {
            Box::new(CsmOn::new(3_000, 0.2, cost.min_estimated_fitness()))
        });
        let local_search = self.local_search.unwrap_or_else(|| {
            Box::new(HillClimbing::new(0.05, 1e-3, 1).with_seed_source(seeds.clone()))
        });
        let best_list_update = self
            .best_list_update
            .unwrap_or_else(|| Box::new(ConvergentBestListUpdate::new()));
        let best_list_selection = self
            .best_list_selection
            .unwrap_or_else(|| Box::new(RandomBestListSelection::with_seed_source(&seeds)));
        let algorithm_selection = self
            .algorithm_selection
            .unwrap_or_else(|| Box::new(RoundRobinSelection::new()));
        let region_selection = self
            .region_selection
            .unwrap_or_else(|| Box::new(GroupRegionSelection::new(1, 1)));
        let relocation = self.relocation.unwrap_or_else(|| {
            Box::new(BetaRelocation::with_seed_source(
                BetaRelocationConfig::default(),
                DisplacementMode::Linear,
                &seeds,
            ))
        });

        // Partition the search space and select this node's anchor.
        let anchor = region_selection.apply(&space, &tree, id)?;

        let group = SearchGroup::new(
            id,
            self.algorithms,
            algorithm_selection,
            convergence,
            shape,
            population_size,
            &seeds,
        );

        let best_list = BestList::new(self.best_list_size, shape.n_dims);
        let mut general_best = Solution::new(shape);
        // Seed the general best with the worst sentinel so the first real
        // candidate always improves it.
        cost.set_worst_fitness(general_best.fitness_mut());
        let parent_best = Solution::new(shape);
        let iteration_data = IterationData::new(
            group.population(),
            self.max_seconds,
            self.max_evaluations,
            self.max_iterations,
        );

        Ok(Engine {
            id,
            level,
            parent,
            children,
            children_status,
            tree,
            space,
            anchor,
            shape,
            cost,
            local_search,
            best_list_update,
            best_list_selection,
            region_selection,
            relocation,
            group,
            best_list,
            general_best,
            parent_best,
            iteration_data,
            // Only the root node carries the bias.
            bias: if parent.is_none() { self.bias } else { None },
            startup_solutions: self.startup_solutions,
            max_iterations: self.max_iterations,
            max_evaluations: self.max_evaluations,
            max_seconds: self.max_seconds,
            n_evals: 0,
            elapsed_seconds: 0.0,
            residual_poll: self.residual_poll,
            rng: seeds.rng(),
            transport,
            executed: false,
        })
    }
}

impl<T, B> Default for Builder<T, B>
where
    T: SolverScalar,
    B: NodeTransport<T>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, B> std::fmt::Debug for Builder<T, B>
where
    T: SolverScalar,
    B: NodeTransport<T>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("algorithms", &self.algorithms.len())
            .field("best_list_size", &self.best_list_size)
            .field("max_iterations", &self.max_iterations)
            .field("max_evaluations", &self.max_evaluations)
            .field("max_seconds", &self.max_seconds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelGrid;
    use cairn_search::{cost::RosenbrockCost, meta::pso::Pso};

    fn single_node_tree() -> Topology {
        let mut tree = Topology::new(1);
        tree.add_root_node(0).unwrap();
        tree
    }

    fn grid_for(tree: &Topology) -> ChannelGrid<f64> {
        let mut locked = tree.clone();
        locked.lock();
        ChannelGrid::new(&locked)
    }

    fn base_builder() -> Builder<f64, crate::channel::ChannelTransport<f64>> {
        let tree = single_node_tree();
        let mut grid = grid_for(&tree);
        Builder::new()
            .tree(tree)
            .search_space(SearchSpace::hypercube(4, -20.0, 20.0).unwrap())
            .cost_policy(Box::new(RosenbrockCost::new()))
            .transport(grid.take(0).unwrap())
            .add_search_algorithm(Box::new(Pso::new(0.9, 0.7, 0.7, 8)), 1.0)
            .max_iterations(2)
    }

    #[test]
    fn test_build_installs_defaults() {
        let engine = base_builder().build().unwrap();
        assert_eq!(engine.id(), 0);
        assert_eq!(engine.level(), 1);
        assert!(engine.parent_id().is_none());
        assert_eq!(engine.anchor().n_dimensions(), 4);
        // No partitioning by default: the anchor covers the full space.
        assert_eq!(engine.anchor().partition(0).start(), -20.0);
        assert_eq!(engine.anchor().partition(0).end(), 20.0);
        assert!(engine.best_solution().is_none());
        assert!(engine.best_list().is_none());
    }

    #[test]
    fn test_build_requires_every_capability() {
        let tree = single_node_tree();
        let mut grid = grid_for(&tree);

        let missing_tree: Builder<f64, crate::channel::ChannelTransport<f64>> = Builder::new()
            .search_space(SearchSpace::hypercube(2, -1.0, 1.0).unwrap())
            .cost_policy(Box::new(RosenbrockCost::new()))
            .transport(grid.take(0).unwrap())
            .max_iterations(1);
        assert!(matches!(missing_tree.build(), Err(BuildError::MissingTree)));

        let missing_space: Builder<f64, crate::channel::ChannelTransport<f64>> =
            Builder::new().tree(single_node_tree()).max_iterations(1);
        assert!(matches!(
            missing_space.build(),
            Err(BuildError::MissingSearchSpace)
        ));
    }

    #[test]
    fn test_build_rejects_zero_budgets() {
        let builder = base_builder().max_iterations(0);
        assert!(matches!(builder.build(), Err(BuildError::NoBudgetConfigured)));
    }

    #[test]
    fn test_build_rejects_missing_algorithms() {
        let tree = single_node_tree();
        let mut grid = grid_for(&tree);
        let builder: Builder<f64, crate::channel::ChannelTransport<f64>> = Builder::new()
            .tree(tree)
            .search_space(SearchSpace::hypercube(4, -20.0, 20.0).unwrap())
            .cost_policy(Box::new(RosenbrockCost::new()))
            .transport(grid.take(0).unwrap())
            .max_iterations(1);
        assert!(matches!(builder.build(), Err(BuildError::NoSearchAlgorithms)));
    }

    #[test]
    fn test_build_rejects_shape_space_mismatch() {
        let builder = base_builder().shape(Shape::scalar(3));
        assert!(matches!(
            builder.build(),
            Err(BuildError::ShapeMismatch {
                shape_dims: 3,
                space_dims: 4
            })
        ));
    }

    #[test]
    fn test_build_rejects_foreign_node_id() {
        // The transport claims node 1, the tree only contains node 0.
        let mut two = Topology::new(2);
        two.add_root_node(0).unwrap();
        two.add_node(1, 0).unwrap();
        let mut grid = grid_for(&two);
        let builder: Builder<f64, crate::channel::ChannelTransport<f64>> = Builder::new()
            .tree(single_node_tree())
            .search_space(SearchSpace::hypercube(4, -20.0, 20.0).unwrap())
            .cost_policy(Box::new(RosenbrockCost::new()))
            .transport(grid.take(1).unwrap())
            .add_search_algorithm(Box::new(Pso::new(0.9, 0.7, 0.7, 8)), 1.0)
            .max_iterations(1);
        assert!(matches!(
            builder.build(),
            Err(BuildError::UnknownNodeId { id: 1 })
        ));
    }
}
