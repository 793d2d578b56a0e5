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

//! Search capabilities and policies of the Cairn optimization framework.
//!
//! The crate defines the seams an engine node is assembled from: the cost
//! capability evaluating and ordering candidate solutions, the optimizer
//! capability driving an incremental local search, the convergence
//! controller deciding when one optimizer call has stabilised, the
//! best-list update/selection policies, the multi-optimizer selection
//! policies, the region partitioner mapping tree coordinates to sub-regions,
//! and the relocation strategies repositioning stalled individuals. Two
//! reference optimizers (hill climbing and particle swarm) live in
//! [`meta`].

pub mod convergence;
pub mod cost;
pub mod meta;
pub mod policy;
pub mod score;
pub mod search;

pub use convergence::{ConvergenceControl, CsmOn};
pub use cost::{CostPolicy, RosenbrockCost};
pub use score::SearchScore;
pub use search::{Search, SearchContext, SearchError};
