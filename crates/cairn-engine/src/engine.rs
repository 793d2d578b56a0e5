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

//! # Iteration Engine
//!
//! One `Engine` drives one node of the cooperating tree. Its `run` loop
//! cycles optimizer selection, convergence-controlled search, best-list
//! maintenance, asynchronous parent/child exchanges and population
//! relocation until the node's budget is exhausted; a bounded
//! residual-communication phase then drains in-flight improvements, and the
//! FINALIZE handshake shuts the whole tree down from the root outward.
//!
//! The engine is single-threaded and cooperative: all exchanges in the
//! iteration body are non-blocking probes of the transport, and the only
//! suspension points are the startup barrier, the one-second polls of the
//! residual phase and the FINALIZE exchanges.

use crate::{
    group::SearchGroup,
    transport::{BestReport, Guidance, NodeId, NodeTransport, PeerStatus, TransportError},
};
use cairn_core::num::SolverScalar;
use cairn_model::{
    best_list::BestList, iteration::IterationData, shape::Shape, solution::Solution,
    space::{Region, SearchSpace}, tree::Topology,
};
use cairn_search::{
    cost::CostPolicy,
    policy::{
        best_list_select::BestListSelection, best_list_update::BestListUpdate,
        region::RegionSelection, relocation::RelocationPolicy,
    },
    search::{Search, SearchContext, SearchError},
};
use log::{debug, info};
use rand::rngs::StdRng;
use std::time::{Duration, Instant};

/// The error type for a running engine node.
///
/// Every variant is fatal for the node: the engine aborts rather than
/// produce silently wrong optima.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// An optimizer rejected its startup.
    Search(SearchError),
    /// The message bus reported a failure.
    Transport(TransportError),
    /// The best-list produced no selectable solution.
    EmptyBestList,
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Search(e) => write!(f, "Search error: {}", e),
            Self::Transport(e) => write!(f, "Transport failure: {}", e),
            Self::EmptyBestList => write!(f, "The best-list is empty"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<SearchError> for EngineError {
    fn from(e: SearchError) -> Self {
        Self::Search(e)
    }
}

impl From<TransportError> for EngineError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

/// One node of the cooperating optimization tree.
///
/// Built by [`crate::builder::Builder`]; the engine owns every wired
/// capability and frees them on drop. Solutions handed out by
/// [`Engine::best_solution`] and [`Engine::best_list`] are newly allocated
/// copies owned by the caller.
pub struct Engine<T, B>
where
    T: SolverScalar,
    B: NodeTransport<T>,
{
    pub(crate) id: NodeId,
    pub(crate) level: u32,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) children_status: Vec<PeerStatus>,
    pub(crate) tree: Topology,
    pub(crate) space: SearchSpace<T>,
    pub(crate) anchor: Region<T>,
    pub(crate) shape: Shape,

    pub(crate) cost: Box<dyn CostPolicy<T>>,
    pub(crate) local_search: Box<dyn Search<T>>,
    pub(crate) best_list_update: Box<dyn BestListUpdate<T>>,
    pub(crate) best_list_selection: Box<dyn BestListSelection<T>>,
    pub(crate) region_selection: Box<dyn RegionSelection<T>>,
    pub(crate) relocation: Box<dyn RelocationPolicy<T>>,
    pub(crate) group: SearchGroup<T>,

    pub(crate) best_list: BestList<T>,
    pub(crate) general_best: Solution<T>,
    pub(crate) parent_best: Solution<T>,
    pub(crate) iteration_data: IterationData<T>,
    pub(crate) bias: Option<Solution<T>>,
    pub(crate) startup_solutions: Vec<Solution<T>>,

    pub(crate) max_iterations: u64,
    pub(crate) max_evaluations: u64,
    pub(crate) max_seconds: u64,
    pub(crate) n_evals: u64,
    pub(crate) elapsed_seconds: f64,
    pub(crate) residual_poll: Duration,
    pub(crate) rng: StdRng,
    pub(crate) transport: B,
    pub(crate) executed: bool,
}

impl<T, B> Engine<T, B>
where
    T: SolverScalar,
    B: NodeTransport<T>,
{
    /// Returns this node's identifier in the tree and processing grid.
    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Returns this node's level after topology packing (leaves at 1).
    #[inline]
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Returns the parent node, or `None` on the root.
    #[inline]
    pub fn parent_id(&self) -> Option<NodeId> {
        self.parent
    }

    /// Returns the node's anchor sub-region.
    #[inline]
    pub fn anchor(&self) -> &Region<T> {
        &self.anchor
    }

    /// Returns the total number of fitness evaluations performed.
    #[inline]
    pub fn n_evals(&self) -> u64 {
        self.n_evals
    }

    /// Returns the wall-clock seconds spent inside [`Engine::run`].
    #[inline]
    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed_seconds
    }

    /// Returns a copy of the best solution ever observed at this node.
    ///
    /// Returns `None` before [`Engine::run`] has completed.
    pub fn best_solution(&self) -> Option<Solution<T>> {
        if self.executed {
            Some(self.general_best.clone())
        } else {
            None
        }
    }

    /// Returns a copy of the node's best-list.
    ///
    /// Returns `None` before [`Engine::run`] has completed.
    pub fn best_list(&self) -> Option<BestList<T>> {
        if self.executed {
            Some(self.best_list.clone())
        } else {
            None
        }
    }

    /// Runs the node: startup barrier, iteration loop, residual drain and
    /// the FINALIZE handshake.
    pub fn run(&mut self) -> Result<(), EngineError> {
        debug!("running node {} at level {}", self.id, self.level);

        // ---------------
        // Startup barrier.
        // ---------------
        // Leaves unlock the search; every internal node blocks until all of
        // its children have signalled, then forwards one signal upward. No
        // node evaluates before its subtree is ready.
        if self.tree.len() > 1 {
            if self.children.is_empty() {
                let parent = self.parent.expect("a leaf in a tree of size > 1 has a parent");
                self.transport.send_startup(parent)?;
                debug!("node {} sent startup signal to parent {}", self.id, parent);
            } else {
                for i in 0..self.children.len() {
                    let child = self.children[i];
                    self.transport.recv_startup(child)?;
                    self.children_status[i] = PeerStatus::Active;
                    debug!("node {} received startup signal from child {}", self.id, child);
                }
                if let Some(parent) = self.parent {
                    self.transport.send_startup(parent)?;
                    debug!("node {} sent startup signal to parent {}", self.id, parent);
                }
            }
        }

        let start_time = Instant::now();

        // -------------------
        // Initial population.
        // -------------------
        let is_root = self.parent.is_none();
        if is_root {
            if let Some(bias) = self.bias.as_mut() {
                let ctx = SearchContext::new(self.cost.as_ref(), &self.space);
                ctx.cost.evaluate(bias);
                self.best_list_update.apply(&mut self.best_list, bias, ctx.cost);
                self.n_evals += 1;
                info!(
                    "node {} bias was set with fitness {}",
                    self.id,
                    bias.fitness().headline()
                );
            }
        }
        {
            let ctx = SearchContext::new(self.cost.as_ref(), &self.space);
            let spent = self.group.reset_population(
                ctx,
                &self.anchor,
                is_root,
                &self.startup_solutions,
                if is_root { self.bias.as_ref() } else { None },
                &mut self.best_list,
                &mut self.general_best,
                self.best_list_update.as_ref(),
            );
            self.n_evals += spent;
        }

        self.iterate(start_time)?;
        self.residual_phase()?;
        self.finalize_phase()?;

        self.elapsed_seconds = start_time.elapsed().as_secs_f64();
        self.executed = true;
        debug!("node {} execution finished", self.id);
        Ok(())
    }

    /// The main iteration loop.
    fn iterate(&mut self, start_time: Instant) -> Result<(), EngineError> {
        let id = self.id;
        let population_size = self.group.population_size();
        let refine_budget = (self.group.convergence_budget() / 100).max(1);

        let mut child_best = Solution::new(self.shape);
        let mut selected = {
            let ctx = SearchContext::new(self.cost.as_ref(), &self.space);
            self.best_list_selection
                .apply(&self.best_list, ctx.cost)
                .ok_or(EngineError::EmptyBestList)?
        };

        let mut t: u64 = 1;
        let mut has_children_improved = false;

        loop {
            // ------------------
            // Search group run.
            // ------------------
            {
                let ctx = SearchContext::new(self.cost.as_ref(), &self.space);
                let spent = self.group.run(
                    ctx,
                    &self.tree,
                    &mut self.best_list,
                    &mut self.general_best,
                    self.best_list_update.as_ref(),
                    self.n_evals,
                )?;
                self.n_evals += spent;
            }

            // -------------------------------
            // Send the global best upward.
            // -------------------------------
            if let Some(parent) = self.parent {
                if self.group.improved_general_best() || has_children_improved {
                    let report =
                        BestReport::from_solution(&self.general_best, PeerStatus::Active);
                    if self.transport.try_send_report(parent, &report)? {
                        debug!("node {} sent best value to parent {}", id, parent);
                    } else {
                        // Coalescing: the previous package is still in
                        // flight, only the newest-still-unsent one counts.
                        debug!("node {} skipped send to busy parent {}", id, parent);
                    }
                } else {
                    debug!("node {} has no improvement to send to parent {}", id, parent);
                }
            }

            // Slot 0 keeps the iteration's own best.
            {
                let best = self.group.iteration_best().clone();
                self.group.population_mut()[0].assign(&best);
            }
            has_children_improved = false;
            let mut pop_seq: usize = 1;

            // ---------------------------------------
            // Read the children's bests, refine them.
            // ---------------------------------------
            for i in 0..self.children.len() {
                if pop_seq >= population_size {
                    break;
                }
                if self.children_status[i].is_done() {
                    continue;
                }
                let child = self.children[i];
                let Some(report) = self.transport.try_recv_report_latest(child)? else {
                    continue;
                };
                self.children_status[i] = report.status;
                debug!(
                    "node {} obtained best value from child {} whose status is now {}",
                    id, child, report.status
                );
                if report.status == PeerStatus::NotStarted {
                    continue;
                }

                report.write_into(&mut child_best);
                {
                    let ctx = SearchContext::new(self.cost.as_ref(), &self.space);
                    let slot = std::slice::from_mut(&mut child_best);
                    self.local_search.startup(ctx, slot)?;
                    self.local_search.next(ctx, slot, refine_budget);
                    self.n_evals += self.local_search.evals();
                    let refined = self.local_search.best_individual(slot).clone();
                    child_best.assign(&refined);
                }
                debug!(
                    "node {} refined child {} report to fitness {}",
                    id,
                    child,
                    child_best.fitness().headline()
                );

                if self.cost.first_is_better(&child_best, &self.general_best) {
                    self.general_best.assign(&child_best);
                    has_children_improved = true;
                }
                self.best_list_update
                    .apply(&mut self.best_list, &child_best, self.cost.as_ref());

                // Flush the communication data into a population member.
                self.group.population_mut()[pop_seq].assign(&child_best);
                pop_seq += 1;
            }

            // --------------------------------------------
            // Select from the best-list, send downward.
            // --------------------------------------------
            if !self.children.is_empty() {
                if let Some(pick) = self
                    .best_list_selection
                    .apply(&self.best_list, self.cost.as_ref())
                {
                    selected.assign(&pick);
                }
                let guidance = Guidance::from_solution(&selected);
                for i in 0..self.children.len() {
                    if !self.children_status[i].accepts_guidance() {
                        continue;
                    }
                    let child = self.children[i];
                    if self.transport.try_send_guidance(child, &guidance)? {
                        debug!("node {} sent best-list selection to child {}", id, child);
                    }
                }
            }

            // ----------------------
            // Read the parent best.
            // ----------------------
            if let Some(parent) = self.parent {
                if t > 1 {
                    match self.transport.try_recv_guidance_latest(parent)? {
                        Some(guidance) => {
                            guidance.write_into(&mut self.parent_best);
                            debug!("node {} received parent best from {}", id, parent);
                        }
                        None => self.parent_best.assign(&self.general_best),
                    }
                } else {
                    self.parent_best.assign(&self.general_best);
                }
            } else {
                self.parent_best.assign(&self.general_best);
            }

            // ----------------
            // Bias insertion.
            // ----------------
            if let Some(bias) = self.bias.as_ref() {
                if pop_seq < population_size {
                    let anchor = &self.anchor;
                    self.group.population_mut()[pop_seq].reset_biased(anchor, bias, &mut self.rng);
                    pop_seq += 1;
                }
            }

            // --------------------------------------------
            // Budget check and population relocation.
            // --------------------------------------------
            self.elapsed_seconds = start_time.elapsed().as_secs_f64();
            let run_next_iteration = (self.max_iterations == 0 || t < self.max_iterations)
                && (self.max_evaluations == 0 || self.n_evals < self.max_evaluations)
                && (self.max_seconds == 0 || self.elapsed_seconds < self.max_seconds as f64);

            if run_next_iteration {
                self.iteration_data.set_curr_iteration(t);
                self.iteration_data.set_curr_evaluations(self.n_evals);
                self.iteration_data.set_curr_seconds(self.elapsed_seconds);
                self.iteration_data.set_population(self.group.population());
                self.iteration_data.set_general_best(&self.general_best);
                self.iteration_data.set_parent_best(&self.parent_best);
                self.iteration_data
                    .set_iteration_best(self.group.iteration_best());

                if pop_seq < population_size {
                    self.anchor = self.region_selection.recalculate(
                        &self.iteration_data,
                        &self.space,
                        self.anchor.clone(),
                        &self.tree,
                        id,
                    );
                    self.relocation.apply(
                        &self.iteration_data,
                        &self.anchor,
                        &mut self.group.population_mut()[pop_seq..],
                    );
                    for slot in &mut self.group.population_mut()[pop_seq..] {
                        self.cost.evaluate(slot);
                        self.n_evals += 1;
                    }
                    debug!("node {} relocated {} individuals", id, population_size - pop_seq);
                }
            }

            info!(
                "node {} current best: [alg={}, it={}, evals={}, sec={:.1}, fit={}], iteration best fit={}",
                id,
                self.group.last_executed_name().unwrap_or("?"),
                t,
                self.n_evals,
                self.elapsed_seconds,
                self.general_best.fitness().headline(),
                self.group.iteration_best().fitness().headline()
            );

            t += 1;
            if !run_next_iteration {
                break;
            }
        }
        debug!("node {} search phase completed", id);
        Ok(())
    }

    /// Residual communication: drain in-flight data without dropping
    /// improvements after the budget is exhausted.
    fn residual_phase(&mut self) -> Result<(), EngineError> {
        let id = self.id;
        let refine_budget = (self.group.convergence_budget() / 100).max(1);

        if let Some(parent) = self.parent {
            // Discard guidance that did not arrive in time; from here on
            // this subtree focuses on search intensification only.
            while self.transport.try_recv_guidance_latest(parent)?.is_some() {
                debug!("node {} discarded late parent guidance", id);
            }
            // Tell the parent this node entered residual communication.
            let report = BestReport::from_solution(&self.general_best, PeerStatus::Residual);
            if self.transport.try_send_report(parent, &report)? {
                debug!("node {} sent residual best to parent {}", id, parent);
            }
        }

        if self.children.is_empty() {
            return Ok(());
        }

        // Send the global best to every still-active child.
        let guidance = Guidance::from_solution(&self.general_best);
        for i in 0..self.children.len() {
            if !self.children_status[i].accepts_guidance() {
                continue;
            }
            self.transport.try_send_guidance(self.children[i], &guidance)?;
        }

        let mut child_best = Solution::new(self.shape);
        loop {
            std::thread::sleep(self.residual_poll);
            let mut inactive = 0;
            for i in 0..self.children.len() {
                if self.children_status[i].is_done() {
                    inactive += 1;
                    continue;
                }
                let child = self.children[i];
                let report = match self.transport.try_recv_report_latest(child)? {
                    Some(report) => report,
                    None => continue,
                };
                self.children_status[i] = report.status;
                if self.children_status[i].is_done() {
                    inactive += 1;
                    debug!("node {}'s child {} is now inactive", id, child);
                }

                report.write_into(&mut child_best);
                {
                    let ctx = SearchContext::new(self.cost.as_ref(), &self.space);
                    let slot = std::slice::from_mut(&mut child_best);
                    self.local_search.startup(ctx, slot)?;
                    self.local_search.next(ctx, slot, refine_budget);
                    self.n_evals += self.local_search.evals();
                    let refined = self.local_search.best_individual(slot).clone();
                    child_best.assign(&refined);
                }

                if self.cost.first_is_better(&child_best, &self.general_best) {
                    debug!(
                        "node {} obtained better residual information [{}] from child {}",
                        id,
                        child_best.fitness().headline(),
                        child
                    );
                    self.general_best.assign(&child_best);

                    // Redirect the improvement to the parent.
                    if let Some(parent) = self.parent {
                        let report =
                            BestReport::from_solution(&self.general_best, PeerStatus::Residual);
                        self.transport.try_send_report(parent, &report)?;
                    }
                    // And to every other still-active child.
                    let guidance = Guidance::from_solution(&self.general_best);
                    for j in 0..self.children.len() {
                        if j == i || !self.children_status[j].accepts_guidance() {
                            continue;
                        }
                        self.transport.try_send_guidance(self.children[j], &guidance)?;
                    }
                }
            }
            if inactive == self.children.len() {
                break;
            }
        }
        debug!("node {}'s children finished, finishing as well", id);
        Ok(())
    }

    /// Final best propagation and the FINALIZE handshake.
    fn finalize_phase(&mut self) -> Result<(), EngineError> {
        let id = self.id;

        // Send the final global best to the parent once it has read every
        // package sent so far.
        if let Some(parent) = self.parent {
            while !self.transport.reports_drained(parent)? {
                debug!("node {} waiting for parent {} to read the last package", id, parent);
                std::thread::sleep(self.residual_poll);
            }
            let report = BestReport::from_solution(&self.general_best, PeerStatus::Done);
            self.transport.try_send_report(parent, &report)?;
            debug!("node {} sent final best to parent {}", id, parent);
        }

        // Wait until every child has read all packages sent to it.
        for &child in &self.children {
            while !self.transport.guidance_drained(child)? {
                std::thread::sleep(self.residual_poll);
            }
            debug!("node {}'s child {} read all packages", id, child);
        }

        // Wait for the parent's finalization signal, draining residual
        // traffic so the guidance channel empties (leaves first in effect).
        if let Some(parent) = self.parent {
            loop {
                while self.transport.try_recv_guidance_latest(parent)?.is_some() {
                    debug!("node {} discarded residual parent traffic", id);
                }
                if self.transport.try_recv_finalize(parent)? {
                    debug!("node {} received finalization signal from parent {}", id, parent);
                    break;
                }
                std::thread::sleep(self.residual_poll);
            }
        }

        // Broadcast the finalization signal downward.
        for &child in &self.children {
            self.transport.send_finalize(child)?;
            debug!("node {} sent finalization signal to child {}", id, child);
        }

        // The confirmation walks back up: leaves reply immediately,
        // internal nodes wait for every child before replying.
        if self.tree.len() > 1 {
            if self.children.is_empty() {
                let parent = self.parent.expect("a leaf in a tree of size > 1 has a parent");
                self.transport.send_finalize(parent)?;
                debug!("node {} confirmed finalization to parent {}", id, parent);
            } else {
                for &child in &self.children {
                    self.transport.recv_finalize(child)?;
                    debug!("node {} received finalization confirmation from child {}", id, child);
                }
                if let Some(parent) = self.parent {
                    self.transport.send_finalize(parent)?;
                    debug!("node {} confirmed finalization to parent {}", id, parent);
                }
            }
        }
        Ok(())
    }
}

impl<T, B> std::fmt::Debug for Engine<T, B>
where
    T: SolverScalar,
    B: NodeTransport<T>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("id", &self.id)
            .field("level", &self.level)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("n_evals", &self.n_evals)
            .field("executed", &self.executed)
            .finish()
    }
}
