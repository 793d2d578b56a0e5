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

//! Exchangeable policies steering a node's search behavior.

pub mod algorithm_select;
pub mod best_list_select;
pub mod best_list_update;
pub mod region;
pub mod relocation;

pub use algorithm_select::{AlgorithmSelection, RoundRobinSelection, SingleSelection};
pub use best_list_select::{BestListSelection, RandomBestListSelection};
pub use best_list_update::{
    solution_distance, BestListUpdate, ConvergentBestListUpdate, DivergentBestListUpdate,
};
pub use region::{GroupRegionSelection, RegionSelection, RegionSelectionError};
pub use relocation::{
    BetaRelocation, BetaRelocationConfig, BoostFunction, DisplacementMode, RelocationPolicy,
};
