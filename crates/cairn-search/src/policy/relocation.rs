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

//! # Population Relocation
//!
//! At the end of every engine iteration the unfilled population slots are
//! repositioned for the next one. [`BetaRelocation`] first scatters each
//! individual uniformly inside the node's anchor sub-region, then pulls it
//! toward the parent's best solution by a factor drawn from a Beta
//! distribution shaped by the run's displacement rate: a low rate
//! concentrates the draw near one, snapping individuals onto the parent's
//! guidance, while a rate close to one concentrates the draw near zero and
//! leaves the population scattered across its anchor.
//!
//! The displacement rate comes from one of two sub-modes: the linear mode
//! reads the fraction of the runtime budget already spent, while the
//! iterative-partitioning mode evolves an attraction coefficient from the
//! observed stagnation of the general best, boosted by one of three decay
//! profiles.

use cairn_core::{num::SolverScalar, seed::SeedSource};
use cairn_model::{iteration::IterationData, solution::Solution, space::Region};
use num_traits::ToPrimitive;
use rand::{rngs::StdRng, Rng};
use rand_distr::{Beta, Distribution};

/// Repositions population individuals between engine iterations.
pub trait RelocationPolicy<T>: Send
where
    T: SolverScalar,
{
    /// Relocates `slots` inside `region`, guided by the iteration snapshot.
    fn apply(&mut self, iteration: &IterationData<T>, region: &Region<T>, slots: &mut [Solution<T>]);
}

/// Boost profiles of the iterative-partitioning displacement mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoostFunction {
    /// `-Br * step + Br`
    Linear,
    /// `Br / (1 + exp(12 * Br * step - 6 * Br))`
    Sigmoid,
    /// `Br / exp(12 * Br * step)`
    Exponential,
}

impl BoostFunction {
    fn eval(&self, boost_rate: f64, step: f64) -> f64 {
        match self {
            Self::Linear => -boost_rate * step + boost_rate,
            Self::Sigmoid => boost_rate / (1.0 + (12.0 * boost_rate * step - 6.0 * boost_rate).exp()),
            Self::Exponential => boost_rate / (12.0 * boost_rate * step).exp(),
        }
    }

    fn max_k(&self, boost_rate: f64, step: f64) -> f64 {
        self.eval(boost_rate, step).min(1.0)
    }
}

/// How the displacement rate feeding the Beta shape is derived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DisplacementMode {
    /// The fraction of the runtime budget already spent.
    Linear,
    /// Attraction coefficient evolved from general-best stagnation.
    IterativePartitioning {
        boost: BoostFunction,
        boost_rate: f64,
        max_tries: u32,
    },
}

impl DisplacementMode {
    /// The iterative-partitioning mode with its default configuration.
    pub fn iterative_partitioning() -> Self {
        Self::IterativePartitioning {
            boost: BoostFunction::Exponential,
            boost_rate: 1.0,
            max_tries: 3,
        }
    }
}

/// Shape parameters of the Beta pull toward the parent best.
///
/// The Beta shape is `a = beta_max - betaProb, b = betaProb` with
/// `betaProb = beta_starting_perc * beta_max * displacementRate ^
/// beta_acceleration_coef`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BetaRelocationConfig {
    /// Starting percentage of the Beta mass.
    pub beta_starting_perc: f64,
    /// Upper bound of the Beta mass.
    pub beta_max: f64,
    /// Exponent applied to the displacement rate.
    pub beta_acceleration_coef: f64,
}

impl Default for BetaRelocationConfig {
    fn default() -> Self {
        Self {
            beta_starting_perc: 0.99,
            beta_max: 1.0,
            beta_acceleration_coef: 1.0,
        }
    }
}

/// The Beta-distribution relocation strategy.
pub struct BetaRelocation {
    config: BetaRelocationConfig,
    mode: DisplacementMode,
    rng: StdRng,
    displacement_rate: f64,
    // Iterative-partitioning state.
    k: f64,
    max_k: f64,
    n_tries: u32,
    prev_best: f64,
    first_pass: bool,
}

impl BetaRelocation {
    /// Creates the strategy in linear displacement mode with default shape
    /// parameters and an entropy-backed generator.
    pub fn new() -> Self {
        Self::with_config(BetaRelocationConfig::default(), DisplacementMode::Linear)
    }

    /// Creates the strategy from explicit shape parameters and mode.
    pub fn with_config(config: BetaRelocationConfig, mode: DisplacementMode) -> Self {
        Self::with_seed_source(config, mode, &SeedSource::default())
    }

    /// Creates the strategy drawing its seed from `seeds`.
    pub fn with_seed_source(
        config: BetaRelocationConfig,
        mode: DisplacementMode,
        seeds: &SeedSource,
    ) -> Self {
        Self {
            config,
            mode,
            rng: seeds.rng(),
            displacement_rate: 1.0,
            k: -1.0,
            max_k: 0.0,
            n_tries: 0,
            prev_best: 0.0,
            first_pass: true,
        }
    }

    /// Returns the displacement rate of the most recent [`apply`] call.
    ///
    /// [`apply`]: RelocationPolicy::apply
    #[inline]
    pub fn displacement_rate(&self) -> f64 {
        self.displacement_rate
    }

    fn track_prev_best(&mut self, best: f64) -> f64 {
        if self.first_pass {
            self.first_pass = false;
        }
        self.prev_best = best;
        self.prev_best
    }

    /// Evolves the iterative-partitioning attraction coefficient.
    ///
    /// An underflowing coefficient re-invokes the decision once; the nested
    /// result is discarded and only its state mutations stick.
    fn attraction(&mut self, step: f64, curr_gb: f64, prev_gb: f64) -> f64 {
        self.attraction_pass(step, curr_gb, prev_gb, true);
        self.k
    }

    fn attraction_pass(&mut self, step: f64, curr_gb: f64, prev_gb: f64, allow_retry: bool) {
        let (boost, boost_rate, max_tries) = match self.mode {
            DisplacementMode::IterativePartitioning {
                boost,
                boost_rate,
                max_tries,
            } => (boost, boost_rate, max_tries),
            DisplacementMode::Linear => return,
        };
        let kr = 1.0 / max_tries as f64;
        if self.k <= 0.0 {
            self.max_k = boost.max_k(boost_rate, 0.0);
            self.k = self.max_k;
        } else if 1.0 - curr_gb / prev_gb < 5e-5 {
            // Stalled: compare through the 1e4 fixed-point truncation.
            if (self.k * 1e4) as i64 <= (self.max_k * kr * 1e4) as i64 {
                self.n_tries += 1;
                if self.n_tries == max_tries {
                    self.max_k = boost.max_k(boost_rate, 0.0);
                    self.n_tries = 0;
                } else {
                    self.max_k = boost.max_k(boost_rate, step);
                }
                self.k = self.max_k;
            } else {
                self.k -= self.max_k * kr;
            }
            if self.k < 1e-30 && allow_retry {
                self.attraction_pass(step, curr_gb, prev_gb, false);
            }
        } else {
            self.n_tries = 0;
        }
    }
}

impl Default for BetaRelocation {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BetaRelocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BetaRelocation")
            .field("config", &self.config)
            .field("mode", &self.mode)
            .field("displacement_rate", &self.displacement_rate)
            .finish()
    }
}

impl<T> RelocationPolicy<T> for BetaRelocation
where
    T: SolverScalar,
{
    fn apply(
        &mut self,
        iteration: &IterationData<T>,
        region: &Region<T>,
        slots: &mut [Solution<T>],
    ) {
        if slots.is_empty() {
            return;
        }

        let rate = match self.mode {
            DisplacementMode::Linear => iteration.percentage_runtime(),
            DisplacementMode::IterativePartitioning { .. } => {
                let best = iteration
                    .general_best()
                    .fitness()
                    .headline()
                    .to_f64()
                    .unwrap_or(0.0);
                let prev = self.track_prev_best(best);
                self.attraction(iteration.percentage_runtime(), best, prev)
            }
        };
        self.displacement_rate = rate;

        let beta_prob = self.config.beta_starting_perc
            * self.config.beta_max
            * rate.max(1e-5).powf(self.config.beta_acceleration_coef);
        let alpha = (self.config.beta_max - beta_prob).max(f64::EPSILON);
        let beta = Beta::new(alpha, beta_prob.max(f64::EPSILON))
            .expect("Beta shape parameters are clamped positive");

        let parent_best = iteration.parent_best();
        let n = region.n_dimensions();
        for solution in slots.iter_mut() {
            solution.reset(region, &mut self.rng);
            for d in 0..n {
                let pull = T::from_f64(beta.sample(&mut self.rng))
                    .expect("Beta sample fits the scalar type");
                let mut offset = solution.position(d).clone();
                offset.sub(parent_best.position(d));
                offset.scale(pull);
                let position = solution.position_mut(d);
                position.sub(&offset);
                // Clamp against the dimension, not the partition: the pull
                // may legitimately leave the anchor sub-region.
                position.clamp(region.dimension(d).interval());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_model::{shape::Shape, space::SearchSpace};

    fn iteration_data(parent_at: f64, evals: u64, max_evals: u64) -> IterationData<f64> {
        let population = vec![Solution::new(Shape::scalar(4)); 2];
        let mut data = IterationData::new(&population, 0, max_evals, 0);
        let mut parent = Solution::new(Shape::scalar(4));
        parent.load_positions(&[parent_at; 4]);
        data.set_parent_best(&parent);
        let mut general = Solution::new(Shape::scalar(4));
        general.set_fitness(5.0);
        data.set_general_best(&general);
        data.set_curr_evaluations(evals);
        data
    }

    fn relocation() -> BetaRelocation {
        BetaRelocation::with_seed_source(
            BetaRelocationConfig::default(),
            DisplacementMode::Linear,
            &SeedSource::sequence(3),
        )
    }

    #[test]
    fn test_relocated_individuals_stay_inside_dimensions() {
        let space = SearchSpace::hypercube(4, -20.0, 20.0).unwrap();
        let mut region = space.region().clone();
        for d in 0..4 {
            region.narrow(d, cairn_core::math::interval::ClosedInterval::new(0.0, 10.0));
        }
        let mut policy = relocation();
        let mut slots = vec![Solution::new(Shape::scalar(4)); 6];
        // A parent best outside the anchor pulls individuals out of it.
        let data = iteration_data(-15.0, 900, 1000);
        for _ in 0..16 {
            RelocationPolicy::<f64>::apply(&mut policy, &data, &region, &mut slots);
            for solution in &slots {
                for d in 0..4 {
                    let value = solution.position(d).first();
                    assert!(
                        region.dimension(d).interval().contains(value),
                        "relocated coordinate {} escaped dimension {}",
                        value,
                        d
                    );
                }
            }
        }
    }

    #[test]
    fn test_low_displacement_rate_snaps_onto_parent_best() {
        let space = SearchSpace::hypercube(4, -20.0, 20.0).unwrap();
        let mut region = space.region().clone();
        for d in 0..4 {
            region.narrow(d, cairn_core::math::interval::ClosedInterval::new(10.0, 20.0));
        }
        let parent_at = -20.0;

        let mut early_policy = relocation();
        let mut late_policy = relocation();
        let mut early = vec![Solution::new(Shape::scalar(4)); 32];
        let mut late = vec![Solution::new(Shape::scalar(4)); 32];
        RelocationPolicy::<f64>::apply(
            &mut early_policy,
            &iteration_data(parent_at, 1, 1000),
            &region,
            &mut early,
        );
        RelocationPolicy::<f64>::apply(
            &mut late_policy,
            &iteration_data(parent_at, 999, 1000),
            &region,
            &mut late,
        );

        let mean = |slots: &[Solution<f64>]| {
            slots
                .iter()
                .map(|s| s.position(0).first())
                .sum::<f64>()
                / slots.len() as f64
        };
        // A low rate draws pull factors near one (full snap to the parent);
        // a rate near one leaves individuals scattered inside the anchor.
        assert!(
            mean(&early) < mean(&late),
            "low-rate populations must sit closer to the parent best"
        );
    }

    #[test]
    fn test_displacement_rate_tracks_runtime_in_linear_mode() {
        let space = SearchSpace::hypercube(4, -20.0, 20.0).unwrap();
        let region = space.region().clone();
        let mut policy = relocation();
        let mut slots = vec![Solution::new(Shape::scalar(4)); 2];
        RelocationPolicy::<f64>::apply(
            &mut policy,
            &iteration_data(0.0, 250, 1000),
            &region,
            &mut slots,
        );
        assert_eq!(policy.displacement_rate(), 0.25);
    }

    #[test]
    fn test_ip_mode_initialises_attraction_from_boost() {
        let space = SearchSpace::hypercube(4, -20.0, 20.0).unwrap();
        let region = space.region().clone();
        let mut policy = BetaRelocation::with_seed_source(
            BetaRelocationConfig::default(),
            DisplacementMode::iterative_partitioning(),
            &SeedSource::sequence(7),
        );
        let mut slots = vec![Solution::new(Shape::scalar(4)); 2];
        RelocationPolicy::<f64>::apply(
            &mut policy,
            &iteration_data(0.0, 10, 1000),
            &region,
            &mut slots,
        );
        // First pass: K <= 0 seeds K = MAX_K(0) = min(1 / exp(0), 1) = 1.
        assert_eq!(policy.displacement_rate(), 1.0);
    }

    #[test]
    fn test_ip_mode_decays_attraction_under_stagnation() {
        let space = SearchSpace::hypercube(4, -20.0, 20.0).unwrap();
        let region = space.region().clone();
        let mut policy = BetaRelocation::with_seed_source(
            BetaRelocationConfig::default(),
            DisplacementMode::iterative_partitioning(),
            &SeedSource::sequence(7),
        );
        let mut slots = vec![Solution::new(Shape::scalar(4)); 2];
        let data = iteration_data(0.0, 10, 1000);
        RelocationPolicy::<f64>::apply(&mut policy, &data, &region, &mut slots);
        let first = policy.displacement_rate();
        // The tracked previous best equals the current best, so the strategy
        // sees stagnation and walks the attraction down.
        RelocationPolicy::<f64>::apply(&mut policy, &data, &region, &mut slots);
        let second = policy.displacement_rate();
        assert!(second < first, "{} should decay below {}", second, first);
    }

    #[test]
    fn test_boost_functions_match_their_profiles() {
        let linear = BoostFunction::Linear;
        assert_eq!(linear.eval(1.0, 0.0), 1.0);
        assert_eq!(linear.eval(1.0, 1.0), 0.0);

        let exponential = BoostFunction::Exponential;
        assert_eq!(exponential.eval(1.0, 0.0), 1.0);
        assert!(exponential.eval(1.0, 1.0) < 1e-5);

        let sigmoid = BoostFunction::Sigmoid;
        assert!(sigmoid.eval(1.0, 0.0) > 0.99);
        assert!(sigmoid.eval(1.0, 1.0) < 0.01);
        assert!((sigmoid.eval(1.0, 0.5) - 0.5).abs() < 1e-9);
    }
}
