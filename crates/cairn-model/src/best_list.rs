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

use crate::solution::Solution;
use cairn_core::num::SolverScalar;

/// Bounded memory of good candidate solutions.
///
/// A best-list holds at most `len` solutions in indexed, possibly-empty
/// slots. Update policies decide which occupied slot a new candidate
/// replaces; selection policies decide which slot is forwarded to peers.
/// The list owns its solutions.
#[derive(Clone, PartialEq, Debug)]
pub struct BestList<T>
where
    T: SolverScalar,
{
    slots: Vec<Option<Solution<T>>>,
    n_dims: usize,
}

impl<T> BestList<T>
where
    T: SolverScalar,
{
    /// Creates an empty best-list.
    ///
    /// # Panics
    ///
    /// Panics if `len` is zero.
    pub fn new(len: usize, n_dims: usize) -> Self {
        assert!(len > 0, "called `BestList::new` with length zero");
        Self {
            slots: vec![None; len],
            n_dims,
        }
    }

    /// Returns the number of slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if no slot is occupied.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|slot| slot.is_none())
    }

    /// Returns the number of dimensions of the stored solutions.
    #[inline]
    pub fn n_dimensions(&self) -> usize {
        self.n_dims
    }

    /// Returns the solution in slot `idx`, if any.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is out of bounds.
    #[inline]
    pub fn get(&self, idx: usize) -> Option<&Solution<T>> {
        self.slots[idx].as_ref()
    }

    /// Stores `solution` in slot `idx`, dropping the previous occupant.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is out of bounds.
    #[inline]
    pub fn set(&mut self, idx: usize, solution: Solution<T>) {
        self.slots[idx] = Some(solution);
    }

    /// Returns the number of occupied slots.
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Iterates over the occupied slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = &Solution<T>> {
        self.slots.iter().filter_map(|slot| slot.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Shape;

    #[test]
    fn test_new_list_is_empty() {
        let list = BestList::<f64>::new(3, 5);
        assert_eq!(list.len(), 3);
        assert!(list.is_empty());
        assert_eq!(list.occupied(), 0);
        assert_eq!(list.n_dimensions(), 5);
    }

    #[test]
    fn test_set_and_get() {
        let mut list = BestList::new(2, 1);
        assert!(list.get(1).is_none());
        let mut solution = Solution::new(Shape::scalar(1));
        solution.set_fitness(3.5);
        list.set(1, solution.clone());
        assert_eq!(list.get(1), Some(&solution));
        assert_eq!(list.occupied(), 1);
        assert!(!list.is_empty());
    }

    #[test]
    fn test_iter_skips_empty_slots() {
        let mut list = BestList::<f64>::new(4, 1);
        list.set(2, Solution::new(Shape::scalar(1)));
        assert_eq!(list.iter().count(), 1);
    }

    #[test]
    #[should_panic(expected = "called `BestList::new` with length zero")]
    fn test_zero_length_panics() {
        let _ = BestList::<f64>::new(0, 1);
    }
}
