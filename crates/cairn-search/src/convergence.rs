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

//! # Convergence Control
//!
//! A convergence controller runs one optimizer call and decides when it has
//! stabilised. [`CsmOn`] implements the stop-condition estimator for swarm
//! based stochastic metaheuristics: it records the best fitness after every
//! improvement the optimizer reports, watches two decay measures against a
//! relaxation level that tightens geometrically towards a configured floor,
//! fits a linear-exponential slope to detect the transition out of the
//! exponential convergence phase, and then fits log-log slopes until the
//! power-law tail stops improving. The controller never moves past its
//! evaluation budget and treats a stuck optimizer as an early return.

use crate::search::{Search, SearchContext, SearchError};
use cairn_core::num::SolverScalar;
use cairn_model::solution::Solution;
use num_traits::ToPrimitive;

/// Runs, monitors and limits one optimizer call per engine iteration.
pub trait ConvergenceControl<T>: Send
where
    T: SolverScalar,
{
    /// Returns the maximum number of fitness evaluations allowed per call.
    fn budget(&self) -> u64;

    /// Runs `search` over `population` until it has stabilised.
    fn run(
        &mut self,
        search: &mut dyn Search<T>,
        ctx: SearchContext<'_, T>,
        population: &mut [Solution<T>],
    ) -> Result<(), SearchError>;
}

impl<T> std::fmt::Debug for dyn ConvergenceControl<T>
where
    T: SolverScalar,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ConvergenceControl(budget: {})", self.budget())
    }
}

/// One observed best point: cumulative evaluations and headline fitness.
#[derive(Clone, Copy, PartialEq, Debug)]
struct GbPoint {
    x: u64,
    y: f64,
}

/// The CSMOn convergence controller.
///
/// Parameters: the evaluation budget `M` for one call, the relaxation
/// factor `R` in `(0, 1)` regulating how eagerly stabilisation is accepted
/// (larger stops sooner), and the minimum estimated headline fitness of the
/// problem.
pub struct CsmOn {
    budget: u64,
    relaxation: f64,
    min_estimated: f64,
    history: Vec<GbPoint>,
}

impl CsmOn {
    /// Creates a CSMOn controller.
    ///
    /// # Panics
    ///
    /// Panics if `budget` is zero or `relaxation` is outside `(0, 1)`.
    pub fn new(budget: u64, relaxation: f64, min_estimated: f64) -> Self {
        assert!(budget > 0, "called `CsmOn::new` with a zero budget");
        assert!(
            relaxation > 0.0 && relaxation < 1.0,
            "called `CsmOn::new` with invalid relaxation: {}. Must be in (0.0, 1.0)",
            relaxation
        );
        Self {
            budget,
            relaxation,
            min_estimated,
            history: Vec::new(),
        }
    }

    /// Returns the recorded `(evaluations, best fitness)` history of the
    /// last run.
    pub fn history(&self) -> impl Iterator<Item = (u64, f64)> + '_ {
        self.history.iter().map(|point| (point.x, point.y))
    }

    /// Pulls up to `n_best` further improvements out of the optimizer,
    /// recording one history point per improvement.
    fn pull<T>(
        &mut self,
        search: &mut dyn Search<T>,
        ctx: SearchContext<'_, T>,
        population: &mut [Solution<T>],
        n_best: usize,
    ) where
        T: SolverScalar,
    {
        for _ in 0..n_best {
            if search.evals() >= self.budget || search.is_stuck() {
                break;
            }
            search.next(ctx, population, self.budget);
            let y = search
                .best_headline(population)
                .to_f64()
                .unwrap_or(f64::INFINITY);
            self.history.push(GbPoint {
                x: search.evals(),
                y,
            });
        }
    }

    fn decay_exp(&self) -> f64 {
        let s = self.history.len() - 1;
        let curr = self.history[s].y - self.min_estimated;
        let prev = self.history[s - 1].y - self.min_estimated;
        (1.0 - curr / prev).abs()
    }

    fn decay_linear(&self) -> f64 {
        let s = self.history.len() - 1;
        let num = self.history[s].y - self.history[s - 1].y;
        let den = self.history[s - 1].y - self.history[s - 2].y;
        (1.0 - num / den).abs()
    }

    /// Semi-log slope estimator over the window `[p1, p2]`.
    ///
    /// The returned expression is the intercept-like combination of the
    /// original estimator (`Σ ln y` enters the numerator, not the slope);
    /// it is kept verbatim because the phase-transition detection depends
    /// on its behavior.
    fn alpha_exp(&self, p1: usize, p2: usize) -> f64 {
        let n = (p2 - p1 + 1) as f64;
        let mut x_sum = 0.0;
        let mut y_sum_ln = 0.0;
        for point in &self.history[p1..=p2] {
            x_sum += point.x as f64;
            y_sum_ln += point.y.ln();
        }
        let x_avg = x_sum / n;
        let y_avg_ln = y_sum_ln / n;
        let mut s1 = 0.0;
        let mut s2 = 0.0;
        for point in &self.history[p1..=p2] {
            let aux = point.x as f64 - x_avg;
            s1 += aux * (point.y - y_avg_ln);
            s2 += aux * aux;
        }
        (y_sum_ln - (s1 / s2) * x_sum) / n
    }

    /// Log-log slope estimator over the window `[p1, p2]`.
    fn alpha_log(&self, p1: usize, p2: usize) -> f64 {
        let n = (p2 - p1 + 1) as f64;
        let mut x_sum_log = 0.0;
        let mut y_sum_log = 0.0;
        for point in &self.history[p1..=p2] {
            x_sum_log += (point.x as f64).log10();
            y_sum_log += point.y.log10();
        }
        let x_avg_log = x_sum_log / n;
        let y_avg_log = y_sum_log / n;
        let mut s1 = 0.0;
        let mut s2 = 0.0;
        for point in &self.history[p1..=p2] {
            let aux = (point.x as f64).log10() - x_avg_log;
            s1 += aux * (point.y.log10() - y_avg_log);
            s2 += aux * aux;
        }
        (y_sum_log - (s1 / s2) * x_sum_log) / n
    }

    /// Phase 1: keep pulling improvements until both decays stabilise below
    /// `r` and the fitted slope starts shrinking. Returns the exponential
    /// transition index, or -1 if none was found within the budget.
    fn adjust_exp<T>(
        &mut self,
        search: &mut dyn Search<T>,
        ctx: SearchContext<'_, T>,
        population: &mut [Solution<T>],
        r: f64,
    ) -> i64
    where
        T: SolverScalar,
    {
        let s_prev = self.history.len();
        self.pull(search, ctx, population, 2);
        if self.history.len() - s_prev < 2 {
            return -1;
        }
        let mut anchor: i64 = -1;
        let mut alpha2 = 0.0;
        while search.evals() < self.budget && !search.is_stuck() {
            if self.decay_exp() < r && self.decay_linear() < r {
                let s = self.history.len() - 1;
                if anchor == -1 {
                    anchor = (s - 2) as i64;
                    alpha2 = self.alpha_exp(s - 2, s);
                } else {
                    let alpha1 = alpha2;
                    alpha2 = self.alpha_exp(anchor as usize, s);
                    if alpha2 < alpha1 {
                        return s as i64;
                    }
                }
            } else {
                anchor = -1;
            }
            self.pull(search, ctx, population, 1);
        }
        -1
    }

    /// Phase 2: fit log-log slopes from the transition index until the
    /// slope stops decreasing. Returns the stabilisation index, or -1 if
    /// the decays broke the relaxation bound and the phase must be retried.
    fn adjust_log<T>(
        &mut self,
        search: &mut dyn Search<T>,
        ctx: SearchContext<'_, T>,
        population: &mut [Solution<T>],
        r: f64,
        p_t: usize,
    ) -> i64
    where
        T: SolverScalar,
    {
        let s_prev = self.history.len();
        self.pull(search, ctx, population, 3);
        if self.history.len() - s_prev < 3 {
            return -1;
        }
        let mut alpha1 = self.alpha_log(p_t, self.history.len() - 2);
        let mut alpha2 = self.alpha_log(p_t, self.history.len() - 1);
        while alpha2 >= alpha1 && search.evals() < self.budget && !search.is_stuck() {
            if self.decay_exp() >= r || self.decay_linear() >= r {
                return -1;
            }
            self.pull(search, ctx, population, 1);
            alpha1 = alpha2;
            alpha2 = self.alpha_log(p_t, self.history.len() - 1);
        }
        (self.history.len() - 1) as i64
    }
}

impl std::fmt::Display for CsmOn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "CsmOn(budget: {}, relaxation: {}, min estimated: {})",
            self.budget, self.relaxation, self.min_estimated
        )
    }
}

impl<T> ConvergenceControl<T> for CsmOn
where
    T: SolverScalar,
{
    fn budget(&self) -> u64 {
        self.budget
    }

    fn run(
        &mut self,
        search: &mut dyn Search<T>,
        ctx: SearchContext<'_, T>,
        population: &mut [Solution<T>],
    ) -> Result<(), SearchError> {
        self.history.clear();
        search.startup(ctx, population)?;

        let mut p_t: i64 = -1;
        let mut p_s: i64 = -1;
        let mut r = 0.99_f64;
        self.pull(search, ctx, population, 1);
        loop {
            r = (r * r).max(self.relaxation);
            if p_s == -1 {
                p_t = self.adjust_exp(search, ctx, population, r);
            }
            if p_t > 0 {
                p_s = self.adjust_log(search, ctx, population, r, p_t as usize);
            }
            let keep_running = search.evals() < self.budget
                && (r > self.relaxation || p_s == -1)
                && !search.is_stuck();
            if !keep_running {
                break;
            }
        }

        search.finalize(ctx, population);
        Ok(())
    }
}
