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

use num_traits::Float;

/// A closed interval `[start, end]` over a floating point scalar.
///
/// This is the basic geometric primitive of the search space model: every
/// dimension of the search space is a closed interval, and every sub-region
/// is described by one (smaller) closed interval per dimension. The type
/// supports containment and clamping queries plus the equal-width
/// segmentation used by the region partitioner.
///
/// # Invariants
/// `start` must always be less than or equal to `end`, and both endpoints
/// must be finite.
#[derive(Clone, Copy, PartialEq, PartialOrd, Debug)]
pub struct ClosedInterval<T>
where
    T: Float,
{
    start: T,
    end: T,
}

impl<T> ClosedInterval<T>
where
    T: Float,
{
    /// Creates a new `ClosedInterval`.
    ///
    /// # Panics
    ///
    /// Panics if `start > end` or either endpoint is not finite.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use cairn_core::math::interval::ClosedInterval;
    ///
    /// let iv = ClosedInterval::new(-20.0, 20.0);
    /// assert_eq!(iv.length(), 40.0);
    /// ```
    #[inline]
    pub fn new(start: T, end: T) -> Self {
        assert!(
            start <= end,
            "Invalid interval: start must be less than or equal to end"
        );
        assert!(
            start.is_finite() && end.is_finite(),
            "Invalid interval: endpoints must be finite"
        );
        Self { start, end }
    }

    /// Creates a new `ClosedInterval` if the inputs are valid.
    ///
    /// Returns `None` if `start > end` or either endpoint is not finite.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use cairn_core::math::interval::ClosedInterval;
    ///
    /// assert!(ClosedInterval::try_new(0.0, 10.0).is_some());
    /// assert!(ClosedInterval::try_new(10.0, 0.0).is_none());
    /// ```
    #[inline]
    pub fn try_new(start: T, end: T) -> Option<Self> {
        if start <= end && start.is_finite() && end.is_finite() {
            Some(Self { start, end })
        } else {
            None
        }
    }

    /// Returns the inclusive lower endpoint.
    #[inline]
    pub fn start(&self) -> T {
        self.start
    }

    /// Returns the inclusive upper endpoint.
    #[inline]
    pub fn end(&self) -> T {
        self.end
    }

    /// Returns the width `end - start` of the interval.
    #[inline]
    pub fn length(&self) -> T {
        self.end - self.start
    }

    /// Returns `true` if `value` lies inside the interval (endpoints included).
    #[inline]
    pub fn contains(&self, value: T) -> bool {
        value >= self.start && value <= self.end
    }

    /// Returns `true` if `other` lies entirely inside this interval.
    #[inline]
    pub fn contains_interval(&self, other: &Self) -> bool {
        other.start >= self.start && other.end <= self.end
    }

    /// Clamps `value` into the interval.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use cairn_core::math::interval::ClosedInterval;
    ///
    /// let iv = ClosedInterval::new(0.0, 1.0);
    /// assert_eq!(iv.clamp(2.5), 1.0);
    /// assert_eq!(iv.clamp(-0.5), 0.0);
    /// assert_eq!(iv.clamp(0.25), 0.25);
    /// ```
    #[inline]
    pub fn clamp(&self, value: T) -> T {
        if value < self.start {
            self.start
        } else if value > self.end {
            self.end
        } else {
            value
        }
    }

    /// Returns the `k`-th of `pieces` equal-width sub-intervals.
    ///
    /// The last piece keeps this interval's upper endpoint instead of
    /// `start + (k + 1) * delta`, which eliminates floating point drift at
    /// the outer boundary when an interval is partitioned recursively.
    ///
    /// # Panics
    ///
    /// Panics if `pieces` is zero or `k >= pieces`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use cairn_core::math::interval::ClosedInterval;
    ///
    /// let iv = ClosedInterval::new(-20.0, 20.0);
    /// let lower = iv.segment(0, 2);
    /// let upper = iv.segment(1, 2);
    /// assert_eq!((lower.start(), lower.end()), (-20.0, 0.0));
    /// assert_eq!((upper.start(), upper.end()), (0.0, 20.0));
    /// ```
    pub fn segment(&self, k: usize, pieces: usize) -> Self {
        assert!(
            pieces > 0 && k < pieces,
            "called `ClosedInterval::segment` with invalid piece index: the piece count is {} but the index is {}",
            pieces,
            k
        );
        let delta = self.length() / T::from(pieces).expect("piece count must fit the scalar type");
        let start = self.start + T::from(k).expect("piece index must fit the scalar type") * delta;
        let end = if k == pieces - 1 {
            self.end
        } else {
            start + delta
        };
        Self { start, end }
    }
}

impl<T> std::fmt::Display for ClosedInterval<T>
where
    T: Float + std::fmt::Display,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}
