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

//! Bounded product search space and its sub-regions.
//!
//! A search space is a sequence of bounded dimensions. A region narrows every
//! dimension to a partition, a sub-interval chosen within the dimension's
//! boundaries. Dimensions are stored in an arena ordered by their sequential
//! identifier, with the partitions in a parallel vector, so the original
//! dimension-to-partition mapping degenerates to an index lookup.

use cairn_core::{math::interval::ClosedInterval, num::SolverScalar};

/// The error type for region construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionError {
    /// A region needs at least one dimension.
    Empty,
    /// The dimension and partition arenas have different lengths.
    MismatchedLengths { dimensions: usize, partitions: usize },
    /// A dimension's identifier does not equal its arena position.
    MisplacedDimension { index: usize, id: usize },
    /// A partition interval leaves its dimension's boundaries.
    PartitionOutOfBounds { dimension: usize },
}

impl std::fmt::Display for RegionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "A region requires at least one dimension"),
            Self::MismatchedLengths {
                dimensions,
                partitions,
            } => write!(
                f,
                "Dimension and partition counts differ: {} dimensions, {} partitions",
                dimensions, partitions
            ),
            Self::MisplacedDimension { index, id } => write!(
                f,
                "Dimension with id {} stored at arena position {}",
                id, index
            ),
            Self::PartitionOutOfBounds { dimension } => write!(
                f,
                "Partition of dimension {} leaves the dimension's boundaries",
                dimension
            ),
        }
    }
}

impl std::error::Error for RegionError {}

/// The boundaries of one dimension of the search space.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Dimension<T>
where
    T: SolverScalar,
{
    id: usize,
    interval: ClosedInterval<T>,
}

impl<T> Dimension<T>
where
    T: SolverScalar,
{
    /// Creates a new dimension with the inclusive bounds `[start, end]`.
    ///
    /// # Panics
    ///
    /// Panics if `start > end` or either bound is not finite.
    #[inline]
    pub fn new(id: usize, start: T, end: T) -> Self {
        Self {
            id,
            interval: ClosedInterval::new(start, end),
        }
    }

    /// Returns the sequential identifier of this dimension.
    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Returns the boundary interval of this dimension.
    #[inline]
    pub fn interval(&self) -> &ClosedInterval<T> {
        &self.interval
    }

    /// Returns the inclusive lower bound.
    #[inline]
    pub fn start(&self) -> T {
        self.interval.start()
    }

    /// Returns the inclusive upper bound.
    #[inline]
    pub fn end(&self) -> T {
        self.interval.end()
    }
}

/// A sub-interval chosen within one dimension's boundaries.
///
/// Partitions are ordered by identifier only; the interval plays no part in
/// comparisons.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Partition<T>
where
    T: SolverScalar,
{
    id: usize,
    interval: ClosedInterval<T>,
}

impl<T> Partition<T>
where
    T: SolverScalar,
{
    /// Creates a new partition with the inclusive bounds `[start, end]`.
    ///
    /// # Panics
    ///
    /// Panics if `start > end` or either bound is not finite.
    #[inline]
    pub fn new(id: usize, start: T, end: T) -> Self {
        Self {
            id,
            interval: ClosedInterval::new(start, end),
        }
    }

    /// Returns the identifier of the dimension this partition narrows.
    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Returns the sub-interval covered by this partition.
    #[inline]
    pub fn interval(&self) -> &ClosedInterval<T> {
        &self.interval
    }

    /// Returns the inclusive lower bound.
    #[inline]
    pub fn start(&self) -> T {
        self.interval.start()
    }

    /// Returns the inclusive upper bound.
    #[inline]
    pub fn end(&self) -> T {
        self.interval.end()
    }
}

impl<T> PartialOrd for Partition<T>
where
    T: SolverScalar,
{
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.id.partial_cmp(&other.id)
    }
}

/// A region of the search space.
///
/// A region keeps the full set of dimensions (the entire search space) plus
/// one partition per dimension describing the sub-rectangle the region
/// covers. The partitioner narrows partitions while leaving the dimensions
/// untouched, so boundary clamping against the full space stays available.
///
/// # Invariants
/// Dimension `i` is stored at arena position `i`, partition `i` narrows
/// dimension `i`, and every partition interval lies inside its dimension
/// interval.
#[derive(Clone, PartialEq, Debug)]
pub struct Region<T>
where
    T: SolverScalar,
{
    dimensions: Vec<Dimension<T>>,
    partitions: Vec<Partition<T>>,
}

impl<T> Region<T>
where
    T: SolverScalar,
{
    /// Creates a region from parallel dimension and partition arenas.
    pub fn from_parts(
        dimensions: Vec<Dimension<T>>,
        partitions: Vec<Partition<T>>,
    ) -> Result<Self, RegionError> {
        if dimensions.is_empty() {
            return Err(RegionError::Empty);
        }
        if dimensions.len() != partitions.len() {
            return Err(RegionError::MismatchedLengths {
                dimensions: dimensions.len(),
                partitions: partitions.len(),
            });
        }
        for (index, dim) in dimensions.iter().enumerate() {
            if dim.id() != index {
                return Err(RegionError::MisplacedDimension {
                    index,
                    id: dim.id(),
                });
            }
            if !dim.interval().contains_interval(partitions[index].interval()) {
                return Err(RegionError::PartitionOutOfBounds { dimension: index });
            }
        }
        Ok(Self {
            dimensions,
            partitions,
        })
    }

    /// Returns the number of dimensions of this region.
    #[inline]
    pub fn n_dimensions(&self) -> usize {
        self.dimensions.len()
    }

    /// Returns the full-space dimension at sequential position `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of bounds.
    #[inline]
    pub fn dimension(&self, i: usize) -> &Dimension<T> {
        &self.dimensions[i]
    }

    /// Returns the partition narrowing dimension `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of bounds.
    #[inline]
    pub fn partition(&self, i: usize) -> &Partition<T> {
        &self.partitions[i]
    }

    /// Returns all dimensions in sequential order.
    #[inline]
    pub fn dimensions(&self) -> &[Dimension<T>] {
        &self.dimensions
    }

    /// Returns all partitions in sequential order.
    #[inline]
    pub fn partitions(&self) -> &[Partition<T>] {
        &self.partitions
    }

    /// Replaces the partition of dimension `i` with `interval`.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of bounds or the interval leaves the dimension's
    /// boundaries.
    pub fn narrow(&mut self, i: usize, interval: ClosedInterval<T>) {
        assert!(
            self.dimensions[i].interval().contains_interval(&interval),
            "called `Region::narrow` with an interval outside dimension {}: {} is not contained in {}",
            i,
            interval,
            self.dimensions[i].interval()
        );
        self.partitions[i] = Partition {
            id: i,
            interval,
        };
    }
}

impl<T> std::fmt::Display for Region<T>
where
    T: SolverScalar,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Region {{")?;
        for (dim, part) in self.dimensions.iter().zip(self.partitions.iter()) {
            writeln!(
                f,
                "   {}: {} within {}",
                dim.id(),
                part.interval(),
                dim.interval()
            )?;
        }
        write!(f, "}}")
    }
}

/// The entire search space: a region whose partitions coincide with the
/// dimension boundaries.
#[derive(Clone, PartialEq, Debug)]
pub struct SearchSpace<T>
where
    T: SolverScalar,
{
    region: Region<T>,
}

impl<T> SearchSpace<T>
where
    T: SolverScalar,
{
    /// Creates a search space from the boundary interval of every dimension.
    ///
    /// Dimensions receive sequential identifiers in the order given.
    pub fn new(bounds: Vec<ClosedInterval<T>>) -> Result<Self, RegionError> {
        let dimensions: Vec<Dimension<T>> = bounds
            .iter()
            .enumerate()
            .map(|(id, iv)| Dimension { id, interval: *iv })
            .collect();
        let partitions: Vec<Partition<T>> = bounds
            .iter()
            .enumerate()
            .map(|(id, iv)| Partition { id, interval: *iv })
            .collect();
        let region = Region::from_parts(dimensions, partitions)?;
        Ok(Self { region })
    }

    /// Creates a hypercube search space: `n_dims` dimensions sharing the
    /// bounds `[start, end]`.
    pub fn hypercube(n_dims: usize, start: T, end: T) -> Result<Self, RegionError> {
        Self::new(vec![ClosedInterval::new(start, end); n_dims])
    }

    /// Returns the underlying region.
    #[inline]
    pub fn region(&self) -> &Region<T> {
        &self.region
    }

    /// Returns the number of dimensions of the search space.
    #[inline]
    pub fn n_dimensions(&self) -> usize {
        self.region.n_dimensions()
    }

    /// Returns the dimension at sequential position `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of bounds.
    #[inline]
    pub fn dimension(&self, i: usize) -> &Dimension<T> {
        self.region.dimension(i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_space_partitions_coincide_with_dimensions() {
        let space = SearchSpace::hypercube(4, -20.0, 20.0).unwrap();
        assert_eq!(space.n_dimensions(), 4);
        for i in 0..4 {
            let region = space.region();
            assert_eq!(region.dimension(i).interval(), region.partition(i).interval());
        }
    }

    #[test]
    fn test_narrow_keeps_dimension_bounds() {
        let space = SearchSpace::hypercube(2, 0.0, 10.0).unwrap();
        let mut region = space.region().clone();
        region.narrow(1, ClosedInterval::new(2.5, 5.0));
        assert_eq!(region.partition(1).start(), 2.5);
        assert_eq!(region.partition(1).end(), 5.0);
        // The dimension itself keeps the original boundaries.
        assert_eq!(region.dimension(1).start(), 0.0);
        assert_eq!(region.dimension(1).end(), 10.0);
    }

    #[test]
    #[should_panic(expected = "called `Region::narrow`")]
    fn test_narrow_rejects_escape_from_dimension() {
        let space = SearchSpace::hypercube(1, 0.0, 1.0).unwrap();
        let mut region = space.region().clone();
        region.narrow(0, ClosedInterval::new(0.5, 2.0));
    }

    #[test]
    fn test_from_parts_rejects_out_of_bounds_partition() {
        let dims = vec![Dimension::new(0, 0.0, 1.0)];
        let parts = vec![Partition::new(0, 0.0, 2.0)];
        assert_eq!(
            Region::from_parts(dims, parts),
            Err(RegionError::PartitionOutOfBounds { dimension: 0 })
        );
    }

    #[test]
    fn test_from_parts_rejects_misplaced_dimension() {
        let dims = vec![Dimension::new(1, 0.0, 1.0)];
        let parts = vec![Partition::new(1, 0.0, 1.0)];
        assert!(matches!(
            Region::from_parts(dims, parts),
            Err(RegionError::MisplacedDimension { index: 0, id: 1 })
        ));
    }

    #[test]
    fn test_partition_order_ignores_interval() {
        let a = Partition::new(1, 5.0, 6.0);
        let b = Partition::new(2, 0.0, 1.0);
        assert!(a < b);
    }

    #[test]
    fn test_empty_space_is_rejected() {
        assert_eq!(
            SearchSpace::<f64>::new(Vec::new()).unwrap_err(),
            RegionError::Empty
        );
    }
}
