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

//! Candidate-solution containers.
//!
//! A [`Solution`] is one population individual: a candidate point (one
//! [`Position`] per dimension), its scored [`Fitness`] and the constraints it
//! violated. A position within one dimension may be represented by multiple
//! scalars (interval- or Fourier-style encodings), so all three containers
//! are fixed-width vectors whose widths are part of the solution's
//! [`Shape`](crate::shape::Shape). Operations that mix incompatible widths
//! panic; they indicate a wiring bug, not a runtime condition.

use crate::{shape::Shape, space::Region};
use cairn_core::{math::interval::ClosedInterval, num::SolverScalar};
use rand::Rng;
use rand_distr::{Distribution, Normal};

#[inline]
fn assert_same_width(what: &str, left: usize, right: usize) {
    assert!(
        left == right,
        "called `{}` with incompatible widths: {} != {}",
        what,
        left,
        right
    );
}

/// One location within one dimension of the search space.
///
/// A position is an ordered, fixed-width list of scalars. It supports the
/// element-wise arithmetic the optimizers and the relocation strategy need,
/// plus clamping against interval bounds.
#[derive(Clone, PartialEq, Debug)]
pub struct Position<T>
where
    T: SolverScalar,
{
    values: Vec<T>,
}

impl<T> Position<T>
where
    T: SolverScalar,
{
    /// Creates a zero-filled position of the given width.
    ///
    /// # Panics
    ///
    /// Panics if `width` is zero.
    #[inline]
    pub fn zeros(width: usize) -> Self {
        assert!(width > 0, "called `Position::zeros` with width zero");
        Self {
            values: vec![T::zero(); width],
        }
    }

    /// Creates a position with every element set to `value`.
    #[inline]
    pub fn splat(width: usize, value: T) -> Self {
        assert!(width > 0, "called `Position::splat` with width zero");
        Self {
            values: vec![value; width],
        }
    }

    /// Returns the number of scalars representing this position.
    #[inline]
    pub fn width(&self) -> usize {
        self.values.len()
    }

    /// Returns the scalars of this position.
    #[inline]
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Assigns `value` to every element.
    #[inline]
    pub fn fill(&mut self, value: T) {
        self.values.fill(value);
    }

    /// Overwrites this position with the contents of `other`.
    #[inline]
    pub fn assign(&mut self, other: &Self) {
        assert_same_width("Position::assign", self.width(), other.width());
        self.values.copy_from_slice(&other.values);
    }

    /// Overwrites this position from a flat buffer.
    #[inline]
    pub fn assign_slice(&mut self, buffer: &[T]) {
        assert_same_width("Position::assign_slice", self.width(), buffer.len());
        self.values.copy_from_slice(buffer);
    }

    /// Copies this position into a flat buffer.
    #[inline]
    pub fn copy_into(&self, buffer: &mut [T]) {
        assert_same_width("Position::copy_into", self.width(), buffer.len());
        buffer.copy_from_slice(&self.values);
    }

    /// Adds `value` to every element.
    #[inline]
    pub fn add_scalar(&mut self, value: T) {
        for x in &mut self.values {
            *x = *x + value;
        }
    }

    /// Element-wise addition with `other`.
    #[inline]
    pub fn add(&mut self, other: &Self) {
        assert_same_width("Position::add", self.width(), other.width());
        for (x, y) in self.values.iter_mut().zip(other.values.iter()) {
            *x = *x + *y;
        }
    }

    /// Element-wise subtraction of `other`.
    #[inline]
    pub fn sub(&mut self, other: &Self) {
        assert_same_width("Position::sub", self.width(), other.width());
        for (x, y) in self.values.iter_mut().zip(other.values.iter()) {
            *x = *x - *y;
        }
    }

    /// Multiplies every element by `factor`.
    #[inline]
    pub fn scale(&mut self, factor: T) {
        for x in &mut self.values {
            *x = *x * factor;
        }
    }

    /// Element-wise multiplication with `other`.
    #[inline]
    pub fn mul(&mut self, other: &Self) {
        assert_same_width("Position::mul", self.width(), other.width());
        for (x, y) in self.values.iter_mut().zip(other.values.iter()) {
            *x = *x * *y;
        }
    }

    /// Limits every element to at most `max`.
    #[inline]
    pub fn clamp_upper(&mut self, max: T) {
        for x in &mut self.values {
            if *x > max {
                *x = max;
            }
        }
    }

    /// Limits every element to at least `min`.
    #[inline]
    pub fn clamp_lower(&mut self, min: T) {
        for x in &mut self.values {
            if *x < min {
                *x = min;
            }
        }
    }

    /// Clamps every element into `interval`.
    #[inline]
    pub fn clamp(&mut self, interval: &ClosedInterval<T>) {
        self.clamp_upper(interval.end());
        self.clamp_lower(interval.start());
    }

    /// Returns the first element. Useful for single-scalar dimensions.
    #[inline]
    pub fn first(&self) -> T {
        self.values[0]
    }

    /// Returns the smallest element.
    pub fn lower(&self) -> T {
        self.values
            .iter()
            .copied()
            .fold(self.values[0], |acc, x| if x < acc { x } else { acc })
    }

    /// Returns the largest element.
    pub fn upper(&self) -> T {
        self.values
            .iter()
            .copied()
            .fold(self.values[0], |acc, x| if x > acc { x } else { acc })
    }

    /// Returns the sum of all elements. Useful for composite encodings.
    #[inline]
    pub fn element_sum(&self) -> T {
        self.values.iter().copied().fold(T::zero(), |acc, x| acc + x)
    }
}

/// The fitness (or cost) of one solution.
///
/// A fitness can be represented by multiple values (multi-objective scores,
/// histories); the first element is the headline value used whenever a
/// single number is required.
#[derive(Clone, PartialEq, Debug)]
pub struct Fitness<T>
where
    T: SolverScalar,
{
    values: Vec<T>,
}

impl<T> Fitness<T>
where
    T: SolverScalar,
{
    /// Creates a zero-filled fitness of the given width.
    #[inline]
    pub fn zeros(width: usize) -> Self {
        assert!(width > 0, "called `Fitness::zeros` with width zero");
        Self {
            values: vec![T::zero(); width],
        }
    }

    /// Returns the number of values representing this fitness.
    #[inline]
    pub fn width(&self) -> usize {
        self.values.len()
    }

    /// Returns the values of this fitness.
    #[inline]
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Returns the headline value.
    #[inline]
    pub fn headline(&self) -> T {
        self.values[0]
    }

    /// Assigns `value` to every element.
    #[inline]
    pub fn fill(&mut self, value: T) {
        self.values.fill(value);
    }

    /// Overwrites this fitness with the contents of `other`.
    #[inline]
    pub fn assign(&mut self, other: &Self) {
        assert_same_width("Fitness::assign", self.width(), other.width());
        self.values.copy_from_slice(&other.values);
    }

    /// Overwrites this fitness from a flat buffer.
    #[inline]
    pub fn assign_slice(&mut self, buffer: &[T]) {
        assert_same_width("Fitness::assign_slice", self.width(), buffer.len());
        self.values.copy_from_slice(buffer);
    }

    /// Copies this fitness into a flat buffer.
    #[inline]
    pub fn copy_into(&self, buffer: &mut [T]) {
        assert_same_width("Fitness::copy_into", self.width(), buffer.len());
        buffer.copy_from_slice(&self.values);
    }
}

/// The constraints violated by one solution, same shape semantics as
/// [`Fitness`].
#[derive(Clone, PartialEq, Debug)]
pub struct Violation<T>
where
    T: SolverScalar,
{
    values: Vec<T>,
}

impl<T> Violation<T>
where
    T: SolverScalar,
{
    /// Creates a zero-filled violation record of the given width.
    #[inline]
    pub fn zeros(width: usize) -> Self {
        assert!(width > 0, "called `Violation::zeros` with width zero");
        Self {
            values: vec![T::zero(); width],
        }
    }

    /// Returns the number of values in this record.
    #[inline]
    pub fn width(&self) -> usize {
        self.values.len()
    }

    /// Returns the values of this record.
    #[inline]
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Assigns `value` to every element.
    #[inline]
    pub fn fill(&mut self, value: T) {
        self.values.fill(value);
    }

    /// Overwrites this record with the contents of `other`.
    #[inline]
    pub fn assign(&mut self, other: &Self) {
        assert_same_width("Violation::assign", self.width(), other.width());
        self.values.copy_from_slice(&other.values);
    }
}

/// One population individual: a candidate point, its fitness and the
/// constraints it violated.
#[derive(Clone, PartialEq, Debug)]
pub struct Solution<T>
where
    T: SolverScalar,
{
    positions: Vec<Position<T>>,
    fitness: Fitness<T>,
    violation: Violation<T>,
    shape: Shape,
}

impl<T> Solution<T>
where
    T: SolverScalar,
{
    /// Creates a zero-filled solution of the given shape.
    pub fn new(shape: Shape) -> Self {
        let positions = (0..shape.n_dims)
            .map(|_| Position::zeros(shape.p_width))
            .collect();
        Self {
            positions,
            fitness: Fitness::zeros(shape.f_width),
            violation: Violation::zeros(shape.v_width),
            shape,
        }
    }

    /// Returns the shape of this solution.
    #[inline]
    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// Returns the number of dimensions of this solution.
    #[inline]
    pub fn n_dims(&self) -> usize {
        self.shape.n_dims
    }

    /// Returns the position of dimension `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of bounds.
    #[inline]
    pub fn position(&self, i: usize) -> &Position<T> {
        &self.positions[i]
    }

    /// Returns the mutable position of dimension `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of bounds.
    #[inline]
    pub fn position_mut(&mut self, i: usize) -> &mut Position<T> {
        &mut self.positions[i]
    }

    /// Returns the fitness of this solution.
    #[inline]
    pub fn fitness(&self) -> &Fitness<T> {
        &self.fitness
    }

    /// Returns the mutable fitness of this solution.
    #[inline]
    pub fn fitness_mut(&mut self) -> &mut Fitness<T> {
        &mut self.fitness
    }

    /// Returns the constraint-violation record of this solution.
    #[inline]
    pub fn violation(&self) -> &Violation<T> {
        &self.violation
    }

    /// Returns the mutable constraint-violation record of this solution.
    #[inline]
    pub fn violation_mut(&mut self) -> &mut Violation<T> {
        &mut self.violation
    }

    /// Overwrites positions, fitness and violation with the contents of
    /// `other`.
    ///
    /// # Panics
    ///
    /// Panics if the shapes differ.
    pub fn assign(&mut self, other: &Self) {
        assert!(
            self.shape == other.shape,
            "called `Solution::assign` with incompatible shapes: {} != {}",
            self.shape,
            other.shape
        );
        for (dst, src) in self.positions.iter_mut().zip(other.positions.iter()) {
            dst.assign(src);
        }
        self.fitness.assign(&other.fitness);
        self.violation.assign(&other.violation);
    }

    /// Flattens all positions into `buffer`, dimension by dimension.
    ///
    /// # Panics
    ///
    /// Panics if `buffer` is not exactly `n_dims * p_width` long.
    pub fn copy_positions_into(&self, buffer: &mut [T]) {
        assert_same_width(
            "Solution::copy_positions_into",
            self.shape.flat_position_len(),
            buffer.len(),
        );
        for (i, pos) in self.positions.iter().enumerate() {
            let offset = i * self.shape.p_width;
            pos.copy_into(&mut buffer[offset..offset + self.shape.p_width]);
        }
    }

    /// Returns all positions flattened into a freshly allocated vector.
    pub fn flat_positions(&self) -> Vec<T> {
        let mut buffer = vec![T::zero(); self.shape.flat_position_len()];
        self.copy_positions_into(&mut buffer);
        buffer
    }

    /// Overwrites all positions from a flat buffer, dimension by dimension.
    ///
    /// # Panics
    ///
    /// Panics if `buffer` is not exactly `n_dims * p_width` long.
    pub fn load_positions(&mut self, buffer: &[T]) {
        assert_same_width(
            "Solution::load_positions",
            self.shape.flat_position_len(),
            buffer.len(),
        );
        for (i, pos) in self.positions.iter_mut().enumerate() {
            let offset = i * self.shape.p_width;
            pos.assign_slice(&buffer[offset..offset + self.shape.p_width]);
        }
    }

    /// Overwrites the fitness from a flat buffer.
    #[inline]
    pub fn load_fitness(&mut self, buffer: &[T]) {
        self.fitness.assign_slice(buffer);
    }

    /// Sets every fitness element to `value`.
    #[inline]
    pub fn set_fitness(&mut self, value: T) {
        self.fitness.fill(value);
    }

    /// Repositions this solution uniformly inside the region's partitions.
    ///
    /// Each dimension draws a single uniform value inside its partition and
    /// assigns it to every scalar of that dimension's position, then clamps
    /// against the partition bounds.
    ///
    /// # Panics
    ///
    /// Panics if the region's dimension count differs from this solution's.
    pub fn reset<R>(&mut self, region: &Region<T>, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        assert_same_width("Solution::reset", self.n_dims(), region.n_dimensions());
        for (i, pos) in self.positions.iter_mut().enumerate() {
            let interval = region.partition(i).interval();
            let value = if interval.start() == interval.end() {
                interval.start()
            } else {
                rng.gen_range(interval.start()..=interval.end())
            };
            pos.fill(value);
            pos.clamp(interval);
        }
    }

    /// Repositions this solution guided by a bias solution.
    ///
    /// Per dimension, with probability one half the position is drawn from a
    /// Gaussian neighbourhood of the bias (a band one percent below its
    /// lowest and one percent above its highest scalar); otherwise it is
    /// copied from the bias exactly. The result is clamped against the
    /// region's partition bounds.
    ///
    /// # Panics
    ///
    /// Panics if the shapes of `self`, `bias` and `region` are incompatible.
    pub fn reset_biased<R>(&mut self, region: &Region<T>, bias: &Self, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        assert_same_width("Solution::reset_biased", self.n_dims(), region.n_dimensions());
        assert!(
            self.shape == bias.shape,
            "called `Solution::reset_biased` with incompatible shapes: {} != {}",
            self.shape,
            bias.shape
        );
        let band = Normal::new(0.5_f64, 1.0_f64).expect("fixed Gaussian parameters are valid");
        for (i, pos) in self.positions.iter_mut().enumerate() {
            let anchor = bias.position(i);
            if rng.gen_range(0.0_f64..1.0_f64) < 0.5 {
                let a = anchor.lower() * T::from_f64(0.99).expect("constant fits the scalar type");
                let b = anchor.upper() * T::from_f64(1.01).expect("constant fits the scalar type");
                let value = if a == b {
                    a
                } else {
                    let sample = band.sample(rng).clamp(0.0, 1.1);
                    a + T::from_f64(sample).expect("sample fits the scalar type") * (b - a)
                };
                pos.fill(value);
            } else {
                pos.assign(anchor);
            }
            pos.clamp(region.partition(i).interval());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::SearchSpace;
    use rand::{rngs::StdRng, SeedableRng};

    fn shape2() -> Shape {
        Shape::scalar(2)
    }

    #[test]
    fn test_position_arithmetic() {
        let mut a = Position::splat(3, 2.0);
        let b = Position::splat(3, 0.5);
        a.sub(&b);
        assert_eq!(a.values(), &[1.5, 1.5, 1.5]);
        a.scale(2.0);
        assert_eq!(a.values(), &[3.0, 3.0, 3.0]);
        a.add_scalar(-1.0);
        assert_eq!(a.element_sum(), 6.0);
        a.mul(&b);
        assert_eq!(a.values(), &[1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_position_clamp() {
        let mut pos = Position::splat(2, 5.0);
        pos.clamp_upper(3.0);
        assert_eq!(pos.values(), &[3.0, 3.0]);
        pos.clamp_lower(4.0);
        assert_eq!(pos.values(), &[4.0, 4.0]);
    }

    #[test]
    fn test_position_lower_upper() {
        let mut pos = Position::zeros(3);
        pos.assign_slice(&[2.0, -1.0, 7.0]);
        assert_eq!(pos.lower(), -1.0);
        assert_eq!(pos.upper(), 7.0);
        assert_eq!(pos.first(), 2.0);
    }

    #[test]
    #[should_panic(expected = "called `Position::add` with incompatible widths")]
    fn test_position_width_mismatch_panics() {
        let mut a = Position::<f64>::zeros(2);
        let b = Position::<f64>::zeros(3);
        a.add(&b);
    }

    #[test]
    fn test_solution_flat_round_trip() {
        let mut solution = Solution::new(Shape::new(2, 1, 1, 3));
        let buffer: Vec<f64> = (0..6).map(|x| x as f64).collect();
        solution.load_positions(&buffer);
        assert_eq!(solution.position(1).values(), &[2.0, 3.0]);
        assert_eq!(solution.flat_positions(), buffer);
    }

    #[test]
    fn test_solution_assign_copies_everything() {
        let mut a = Solution::new(shape2());
        let mut b = Solution::new(shape2());
        b.load_positions(&[1.0, 2.0]);
        b.set_fitness(42.0);
        a.assign(&b);
        assert_eq!(a, b);
    }

    #[test]
    #[should_panic(expected = "called `Solution::assign` with incompatible shapes")]
    fn test_solution_assign_shape_mismatch_panics() {
        let mut a = Solution::<f64>::new(Shape::scalar(2));
        let b = Solution::<f64>::new(Shape::scalar(3));
        a.assign(&b);
    }

    #[test]
    fn test_reset_stays_inside_partitions() {
        let space = SearchSpace::hypercube(8, -20.0, 20.0).unwrap();
        let mut region = space.region().clone();
        region.narrow(
            3,
            cairn_core::math::interval::ClosedInterval::new(-5.0, -2.5),
        );
        let mut rng = StdRng::seed_from_u64(11);
        let mut solution = Solution::new(Shape::scalar(8));
        for _ in 0..32 {
            solution.reset(&region, &mut rng);
            for d in 0..8 {
                let interval = region.partition(d).interval();
                let value = solution.position(d).first();
                assert!(
                    interval.contains(value),
                    "dimension {} escaped its partition: {} not in {}",
                    d,
                    value,
                    interval
                );
            }
        }
    }

    #[test]
    fn test_reset_biased_stays_inside_partitions() {
        let space = SearchSpace::hypercube(4, -20.0, 20.0).unwrap();
        let region = space.region().clone();
        let mut rng = StdRng::seed_from_u64(5);
        let mut bias = Solution::new(Shape::scalar(4));
        bias.load_positions(&[1.0, -3.0, 0.0, 19.5]);
        let mut solution = Solution::new(Shape::scalar(4));
        for _ in 0..64 {
            solution.reset_biased(&region, &bias, &mut rng);
            for d in 0..4 {
                let interval = region.partition(d).interval();
                assert!(interval.contains(solution.position(d).first()));
            }
        }
    }
}
