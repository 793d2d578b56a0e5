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

//! Data model of the Cairn optimization framework.
//!
//! This crate holds everything a cooperating node reasons about but that
//! carries no search behavior of its own: the bounded product search space
//! and its sub-regions, the candidate-solution containers (positions,
//! fitness, constraint violations), the bounded best-list memory, the tree
//! topology connecting the nodes, and the per-iteration data snapshot
//! consumed by the relocation strategies.

pub mod best_list;
pub mod iteration;
pub mod shape;
pub mod solution;
pub mod space;
pub mod tree;

pub use best_list::BestList;
pub use iteration::IterationData;
pub use shape::Shape;
pub use solution::{Fitness, Position, Solution, Violation};
pub use space::{Dimension, Partition, Region, SearchSpace};
pub use tree::Topology;
