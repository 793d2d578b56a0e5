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

/// The static shape of a candidate solution.
///
/// A solution owns one position per dimension, one fitness vector and one
/// constraint-violation vector; each of those is a fixed-width list of
/// scalars. The widths are fixed for an entire optimization run and shape
/// equality is a precondition on every operation that combines two
/// solutions. Mixing shapes is a programmer error and panics.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Shape {
    /// Number of scalars representing one coordinate in one dimension.
    pub p_width: usize,
    /// Number of scalars in a fitness vector.
    pub f_width: usize,
    /// Number of scalars in a constraint-violation vector.
    pub v_width: usize,
    /// Number of dimensions of the problem.
    pub n_dims: usize,
}

impl Shape {
    /// Creates a new `Shape`.
    ///
    /// # Panics
    ///
    /// Panics if any width or the dimension count is zero.
    #[inline]
    pub fn new(p_width: usize, f_width: usize, v_width: usize, n_dims: usize) -> Self {
        assert!(
            p_width > 0 && f_width > 0 && v_width > 0 && n_dims > 0,
            "called `Shape::new` with a zero extent: p_width = {}, f_width = {}, v_width = {}, n_dims = {}",
            p_width,
            f_width,
            v_width,
            n_dims
        );
        Self {
            p_width,
            f_width,
            v_width,
            n_dims,
        }
    }

    /// Creates the common all-scalar shape: every width is one.
    #[inline]
    pub fn scalar(n_dims: usize) -> Self {
        Self::new(1, 1, 1, n_dims)
    }

    /// Total number of scalars needed to flatten all positions of a solution.
    #[inline]
    pub fn flat_position_len(&self) -> usize {
        self.n_dims * self.p_width
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Shape(p: {}, f: {}, v: {}, dims: {})",
            self.p_width, self.f_width, self.v_width, self.n_dims
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_shape() {
        let shape = Shape::scalar(1000);
        assert_eq!(shape.p_width, 1);
        assert_eq!(shape.f_width, 1);
        assert_eq!(shape.v_width, 1);
        assert_eq!(shape.n_dims, 1000);
        assert_eq!(shape.flat_position_len(), 1000);
    }

    #[test]
    fn test_flat_position_len_accounts_for_width() {
        let shape = Shape::new(3, 2, 1, 4);
        assert_eq!(shape.flat_position_len(), 12);
    }

    #[test]
    #[should_panic(expected = "called `Shape::new` with a zero extent")]
    fn test_zero_dims_panics() {
        let _ = Shape::new(1, 1, 1, 0);
    }
}
