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

use cairn_core::seed::SeedSource;
use cairn_model::{shape::Shape, solution::Solution, space::SearchSpace};
use cairn_search::{
    convergence::{ConvergenceControl, CsmOn},
    cost::{CostPolicy, RosenbrockCost},
    meta::pso::Pso,
    search::SearchContext,
};
use criterion::{criterion_group, criterion_main, Criterion};
use rand::{rngs::StdRng, SeedableRng};

fn controlled_swarm_benchmark(c: &mut Criterion) {
    let cost = RosenbrockCost::new();
    let space = SearchSpace::hypercube(16, -20.0, 20.0).expect("valid hypercube bounds");
    let ctx = SearchContext::new(&cost, &space);

    c.bench_function("csmon_pso_rosenbrock_16d", |b| {
        b.iter(|| {
            let mut rng = StdRng::seed_from_u64(99);
            let mut population: Vec<Solution<f64>> = (0..12)
                .map(|_| {
                    let mut solution = Solution::new(Shape::scalar(16));
                    solution.reset(space.region(), &mut rng);
                    cost.evaluate(&mut solution);
                    solution
                })
                .collect();
            let mut swarm =
                Pso::new(0.9, 0.7, 0.7, 12).with_seed_source(SeedSource::sequence(99));
            let mut controller = CsmOn::new(3_000, 0.2, 0.0);
            controller
                .run(&mut swarm, ctx, &mut population)
                .expect("non-empty population");
            population[0].fitness().headline()
        })
    });
}

criterion_group!(benches, controlled_swarm_benchmark);
criterion_main!(benches);
