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

//! # Cost Capability
//!
//! Every problem optimized by Cairn provides one implementation of
//! [`CostPolicy`]; the framework trusts this single seam for everything it
//! needs to know about the problem: evaluating a candidate, totally ordering
//! any two candidates or fitness vectors, producing best/worst sentinel
//! fitness values, and estimating the smallest reachable headline fitness
//! for the convergence controller.
//!
//! The crate ships [`RosenbrockCost`], the classic banana-valley benchmark,
//! as the reference implementation used by the tests and benches.

use cairn_core::num::SolverScalar;
use cairn_model::solution::{Fitness, Solution};

/// The capability that evaluates and orders candidate solutions.
///
/// Optimizers MUST use this policy for every evaluation and every ordering
/// decision; it is the only place where the problem semantics live.
pub trait CostPolicy<T>: Send + Sync
where
    T: SolverScalar,
{
    /// Calculates the fitness of `solution`, writing it in place.
    fn evaluate(&self, solution: &mut Solution<T>);

    /// Returns `true` if `first` is strictly better than `second`.
    fn first_is_better(&self, first: &Solution<T>, second: &Solution<T>) -> bool;

    /// Returns `true` if the fitness `first` is strictly better than `second`.
    fn first_fitness_is_better(&self, first: &Fitness<T>, second: &Fitness<T>) -> bool;

    /// Overwrites `fitness` with the worst estimated fitness.
    fn set_worst_fitness(&self, fitness: &mut Fitness<T>);

    /// Overwrites `fitness` with the best estimated fitness.
    fn set_best_fitness(&self, fitness: &mut Fitness<T>);

    /// Returns the minimum estimated headline fitness of the problem.
    ///
    /// If the true minimum is unknown, a best guess is preferred over an
    /// arbitrary sentinel; the convergence controller uses this value to
    /// normalize its decay estimates.
    fn min_estimated_fitness(&self) -> f64;

    /// Ordering over possibly-absent solutions.
    ///
    /// An absent candidate never beats anything; a present candidate beats
    /// an absent one.
    fn first_is_better_opt(
        &self,
        first: Option<&Solution<T>>,
        second: Option<&Solution<T>>,
    ) -> bool {
        match (first, second) {
            (Some(first), Some(second)) => self.first_is_better(first, second),
            (Some(_), None) => true,
            _ => false,
        }
    }
}

impl<T> std::fmt::Debug for dyn CostPolicy<T>
where
    T: SolverScalar,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CostPolicy")
    }
}

/// The Rosenbrock function, minimized at `f(1, …, 1) = 0`.
///
/// The headline fitness is the classic sum over consecutive dimension pairs
/// of `(1 - x_i)^2 + 100 (x_{i+1} - x_i^2)^2`, using the first scalar of
/// each position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RosenbrockCost;

impl RosenbrockCost {
    /// Creates a new Rosenbrock cost capability.
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl<T> CostPolicy<T> for RosenbrockCost
where
    T: SolverScalar,
{
    fn evaluate(&self, solution: &mut Solution<T>) {
        let hundred = T::from_f64(100.0).expect("constant fits the scalar type");
        let mut fitness = T::zero();
        for i in 0..solution.n_dims() - 1 {
            let x1 = solution.position(i).first();
            let x2 = solution.position(i + 1).first();
            let a = T::one() - x1;
            let b = x2 - x1 * x1;
            fitness = fitness + a * a + hundred * b * b;
        }
        solution.set_fitness(fitness);
    }

    fn first_is_better(&self, first: &Solution<T>, second: &Solution<T>) -> bool {
        first.fitness().headline() < second.fitness().headline()
    }

    fn first_fitness_is_better(&self, first: &Fitness<T>, second: &Fitness<T>) -> bool {
        first.headline() < second.headline()
    }

    fn set_worst_fitness(&self, fitness: &mut Fitness<T>) {
        fitness.fill(T::max_value());
    }

    fn set_best_fitness(&self, fitness: &mut Fitness<T>) {
        fitness.fill(T::zero());
    }

    fn min_estimated_fitness(&self) -> f64 {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_model::shape::Shape;

    #[test]
    fn test_rosenbrock_minimum_is_zero() {
        let cost = RosenbrockCost::new();
        let mut solution = Solution::new(Shape::scalar(5));
        solution.load_positions(&[1.0; 5]);
        cost.evaluate(&mut solution);
        assert_eq!(solution.fitness().headline(), 0.0);
    }

    #[test]
    fn test_rosenbrock_known_value() {
        let cost = RosenbrockCost::new();
        let mut solution = Solution::new(Shape::scalar(2));
        solution.load_positions(&[0.0, 0.0]);
        cost.evaluate(&mut solution);
        // (1 - 0)^2 + 100 * (0 - 0)^2 = 1
        assert_eq!(solution.fitness().headline(), 1.0);
    }

    #[test]
    fn test_ordering_is_minimization() {
        let cost = RosenbrockCost::new();
        let mut good = Solution::new(Shape::scalar(2));
        good.set_fitness(1.0);
        let mut bad = Solution::new(Shape::scalar(2));
        bad.set_fitness(2.0);
        assert!(CostPolicy::<f64>::first_is_better(&cost, &good, &bad));
        assert!(!CostPolicy::<f64>::first_is_better(&cost, &bad, &good));
        assert!(!CostPolicy::<f64>::first_is_better(&cost, &good, &good));
    }

    #[test]
    fn test_optional_ordering_semantics() {
        let cost = RosenbrockCost::new();
        let mut good = Solution::new(Shape::scalar(2));
        good.set_fitness(1.0);
        assert!(CostPolicy::<f64>::first_is_better_opt(&cost, Some(&good), None));
        assert!(!CostPolicy::<f64>::first_is_better_opt(&cost, None, Some(&good)));
        assert!(!CostPolicy::<f64>::first_is_better_opt(&cost, None, None));
    }

    #[test]
    fn test_sentinel_fitness_values() {
        let cost = RosenbrockCost::new();
        let mut fitness = Fitness::<f64>::zeros(1);
        cost.set_worst_fitness(&mut fitness);
        assert_eq!(fitness.headline(), f64::MAX);
        cost.set_best_fitness(&mut fitness);
        assert_eq!(fitness.headline(), 0.0);
    }
}
