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

//! In-memory channel bus.
//!
//! [`ChannelGrid`] wires one [`ChannelTransport`] per tree node, connecting
//! parent and child endpoints through bounded single-slot channels, one
//! channel per `(edge, tag, direction)`. A full channel means the previous
//! send has not been consumed (`try_send_*` skips), draining reads keep the
//! newest message, and an empty sender side means the peer consumed the
//! last send, which reproduces the posted-send/probe discipline of an MPI
//! style bus without any in-flight bookkeeping.

use crate::transport::{
    BestReport, Guidance, NodeId, NodeTransport, TransportError,
};
use cairn_core::num::SolverScalar;
use cairn_model::tree::Topology;
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use std::collections::HashMap;

struct PeerEndpoint<T>
where
    T: SolverScalar,
{
    startup_tx: Sender<()>,
    startup_rx: Receiver<()>,
    report_tx: Sender<BestReport<T>>,
    report_rx: Receiver<BestReport<T>>,
    guidance_tx: Sender<Guidance<T>>,
    guidance_rx: Receiver<Guidance<T>>,
    finalize_tx: Sender<()>,
    finalize_rx: Receiver<()>,
}

/// One node's endpoint of the in-memory bus.
pub struct ChannelTransport<T>
where
    T: SolverScalar,
{
    id: NodeId,
    peers: HashMap<NodeId, PeerEndpoint<T>>,
}

impl<T> ChannelTransport<T>
where
    T: SolverScalar,
{
    fn peer(&self, peer: NodeId) -> Result<&PeerEndpoint<T>, TransportError> {
        self.peers
            .get(&peer)
            .ok_or(TransportError::UnknownPeer { peer })
    }
}

impl<T> std::fmt::Debug for ChannelTransport<T>
where
    T: SolverScalar,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut peers: Vec<NodeId> = self.peers.keys().copied().collect();
        peers.sort_unstable();
        f.debug_struct("ChannelTransport")
            .field("id", &self.id)
            .field("peers", &peers)
            .finish()
    }
}

fn map_try_send<M>(result: Result<(), TrySendError<M>>, peer: NodeId) -> Result<bool, TransportError> {
    match result {
        Ok(()) => Ok(true),
        Err(TrySendError::Full(_)) => Ok(false),
        Err(TrySendError::Disconnected(_)) => Err(TransportError::Disconnected { peer }),
    }
}

fn drain_latest<M>(rx: &Receiver<M>, peer: NodeId) -> Result<Option<M>, TransportError> {
    let mut latest = None;
    loop {
        match rx.try_recv() {
            Ok(message) => latest = Some(message),
            Err(TryRecvError::Empty) => return Ok(latest),
            Err(TryRecvError::Disconnected) => {
                if latest.is_some() {
                    return Ok(latest);
                }
                return Err(TransportError::Disconnected { peer });
            }
        }
    }
}

impl<T> NodeTransport<T> for ChannelTransport<T>
where
    T: SolverScalar,
{
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn send_startup(&mut self, to: NodeId) -> Result<(), TransportError> {
        self.peer(to)?
            .startup_tx
            .send(())
            .map_err(|_| TransportError::Disconnected { peer: to })
    }

    fn recv_startup(&mut self, from: NodeId) -> Result<(), TransportError> {
        self.peer(from)?
            .startup_rx
            .recv()
            .map_err(|_| TransportError::Disconnected { peer: from })
    }

    fn try_send_report(
        &mut self,
        to: NodeId,
        report: &BestReport<T>,
    ) -> Result<bool, TransportError> {
        map_try_send(self.peer(to)?.report_tx.try_send(report.clone()), to)
    }

    fn try_recv_report_latest(
        &mut self,
        from: NodeId,
    ) -> Result<Option<BestReport<T>>, TransportError> {
        drain_latest(&self.peer(from)?.report_rx, from)
    }

    fn reports_drained(&mut self, to: NodeId) -> Result<bool, TransportError> {
        Ok(self.peer(to)?.report_tx.is_empty())
    }

    fn try_send_guidance(
        &mut self,
        to: NodeId,
        guidance: &Guidance<T>,
    ) -> Result<bool, TransportError> {
        map_try_send(self.peer(to)?.guidance_tx.try_send(guidance.clone()), to)
    }

    fn try_recv_guidance_latest(
        &mut self,
        from: NodeId,
    ) -> Result<Option<Guidance<T>>, TransportError> {
        drain_latest(&self.peer(from)?.guidance_rx, from)
    }

    fn guidance_drained(&mut self, to: NodeId) -> Result<bool, TransportError> {
        Ok(self.peer(to)?.guidance_tx.is_empty())
    }

    fn send_finalize(&mut self, to: NodeId) -> Result<(), TransportError> {
        self.peer(to)?
            .finalize_tx
            .send(())
            .map_err(|_| TransportError::Disconnected { peer: to })
    }

    fn try_recv_finalize(&mut self, from: NodeId) -> Result<bool, TransportError> {
        match self.peer(from)?.finalize_rx.try_recv() {
            Ok(()) => Ok(true),
            Err(TryRecvError::Empty) => Ok(false),
            Err(TryRecvError::Disconnected) => Err(TransportError::Disconnected { peer: from }),
        }
    }

    fn recv_finalize(&mut self, from: NodeId) -> Result<(), TransportError> {
        self.peer(from)?
            .finalize_rx
            .recv()
            .map_err(|_| TransportError::Disconnected { peer: from })
    }
}

/// Builds the fully wired set of endpoints for a locked topology.
///
/// Every parent/child edge receives one single-slot channel per tag and
/// direction. Endpoints are taken out once, typically one per thread or
/// process stand-in.
pub struct ChannelGrid<T>
where
    T: SolverScalar,
{
    endpoints: HashMap<NodeId, ChannelTransport<T>>,
}

impl<T> ChannelGrid<T>
where
    T: SolverScalar,
{
    /// Wires endpoints for every node of `tree`.
    ///
    /// # Panics
    ///
    /// Panics if the topology has no root.
    pub fn new(tree: &Topology) -> Self {
        let root = tree
            .root_id()
            .expect("called `ChannelGrid::new` on a topology without a root");
        let mut endpoints: HashMap<NodeId, ChannelTransport<T>> = HashMap::new();
        let mut pending = vec![root];
        while let Some(id) = pending.pop() {
            endpoints.entry(id).or_insert_with(|| ChannelTransport {
                id,
                peers: HashMap::new(),
            });
            let children = tree
                .children_ids(id)
                .expect("the visited node belongs to the topology");
            for child in children {
                endpoints.entry(child).or_insert_with(|| ChannelTransport {
                    id: child,
                    peers: HashMap::new(),
                });
                Self::wire(&mut endpoints, id, child);
                pending.push(child);
            }
        }
        Self { endpoints }
    }

    fn wire(endpoints: &mut HashMap<NodeId, ChannelTransport<T>>, parent: NodeId, child: NodeId) {
        let (startup_tx, startup_rx) = bounded(1);
        let (report_tx, report_rx) = bounded(1);
        let (guidance_tx, guidance_rx) = bounded(1);
        let (finalize_down_tx, finalize_down_rx) = bounded(1);
        let (finalize_up_tx, finalize_up_rx) = bounded(1);
        // The protocol never sends startup downward, reports downward or
        // guidance upward; those slots hold paired channels that are never
        // exercised, keeping both endpoints structurally symmetric.
        let (dead_startup_tx, dead_startup_rx) = bounded(1);
        let (dead_report_tx, dead_report_rx) = bounded(1);
        let (dead_guidance_tx, dead_guidance_rx) = bounded(1);

        let parent_side = PeerEndpoint {
            startup_tx: dead_startup_tx,
            startup_rx,
            report_tx: dead_report_tx,
            report_rx,
            guidance_tx,
            guidance_rx: dead_guidance_rx,
            finalize_tx: finalize_down_tx,
            finalize_rx: finalize_up_rx,
        };
        let child_side = PeerEndpoint {
            startup_tx,
            startup_rx: dead_startup_rx,
            report_tx,
            report_rx: dead_report_rx,
            guidance_tx: dead_guidance_tx,
            guidance_rx,
            finalize_tx: finalize_up_tx,
            finalize_rx: finalize_down_rx,
        };
        endpoints
            .get_mut(&parent)
            .expect("parent endpoint exists")
            .peers
            .insert(child, parent_side);
        endpoints
            .get_mut(&child)
            .expect("child endpoint exists")
            .peers
            .insert(parent, child_side);
    }

    /// Takes the endpoint of node `id` out of the grid.
    pub fn take(&mut self, id: NodeId) -> Option<ChannelTransport<T>> {
        self.endpoints.remove(&id)
    }

    /// Returns the number of endpoints still in the grid.
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Returns `true` if every endpoint has been taken.
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::PeerStatus;
    use cairn_model::{shape::Shape, solution::Solution};

    fn two_node_grid() -> (ChannelTransport<f64>, ChannelTransport<f64>) {
        let mut tree = Topology::new(2);
        tree.add_root_node(0).unwrap();
        tree.add_node(1, 0).unwrap();
        tree.lock();
        let mut grid = ChannelGrid::new(&tree);
        let parent = grid.take(0).unwrap();
        let child = grid.take(1).unwrap();
        assert!(grid.is_empty());
        (parent, child)
    }

    fn report(value: f64, status: PeerStatus) -> BestReport<f64> {
        let mut solution = Solution::new(Shape::scalar(2));
        solution.load_positions(&[value, value]);
        solution.set_fitness(value);
        BestReport::from_solution(&solution, status)
    }

    #[test]
    fn test_send_skips_while_in_flight() {
        let (mut parent, mut child) = two_node_grid();
        assert!(child.try_send_report(0, &report(1.0, PeerStatus::Active)).unwrap());
        // The parent has not consumed the first report yet.
        assert!(!child.try_send_report(0, &report(2.0, PeerStatus::Active)).unwrap());
        assert!(!child.reports_drained(0).unwrap());

        let received = parent.try_recv_report_latest(1).unwrap().unwrap();
        assert_eq!(received.fitness[0], 1.0);
        assert!(child.reports_drained(0).unwrap());
        assert!(child.try_send_report(0, &report(3.0, PeerStatus::Active)).unwrap());
    }

    #[test]
    fn test_recv_latest_keeps_newest() {
        let (mut parent, mut child) = two_node_grid();
        assert!(child.try_send_report(0, &report(1.0, PeerStatus::Active)).unwrap());
        // Nothing read yet: the second send is skipped, so the newest
        // still-unsent package wins once the parent finally reads.
        assert!(!child.try_send_report(0, &report(2.0, PeerStatus::Active)).unwrap());
        let received = parent.try_recv_report_latest(1).unwrap().unwrap();
        assert_eq!(received.fitness[0], 1.0);
        assert!(parent.try_recv_report_latest(1).unwrap().is_none());
    }

    #[test]
    fn test_startup_and_finalize_round_trip() {
        let (mut parent, mut child) = two_node_grid();
        child.send_startup(0).unwrap();
        parent.recv_startup(1).unwrap();

        assert!(!child.try_recv_finalize(0).unwrap());
        parent.send_finalize(1).unwrap();
        assert!(child.try_recv_finalize(0).unwrap());

        // The confirmation travels the opposite direction on its own
        // sub-channel.
        child.send_finalize(0).unwrap();
        parent.recv_finalize(1).unwrap();
    }

    #[test]
    fn test_guidance_flows_downward() {
        let (mut parent, mut child) = two_node_grid();
        let mut solution = Solution::<f64>::new(Shape::scalar(2));
        solution.load_positions(&[4.0, 5.0]);
        let guidance = Guidance::from_solution(&solution);
        assert!(parent.try_send_guidance(1, &guidance).unwrap());
        assert!(!parent.guidance_drained(1).unwrap());
        let received = child.try_recv_guidance_latest(0).unwrap().unwrap();
        assert_eq!(received.positions, vec![4.0, 5.0]);
        assert!(parent.guidance_drained(1).unwrap());
    }

    #[test]
    fn test_unknown_peer_is_reported() {
        let (mut parent, _child) = two_node_grid();
        assert_eq!(
            parent.send_finalize(9).unwrap_err(),
            TransportError::UnknownPeer { peer: 9 }
        );
    }
}
