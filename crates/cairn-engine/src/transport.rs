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

//! # Node Transport Interface
//!
//! The engine talks to its parent and children through an abstract tagged,
//! connection-oriented message bus with per-peer typed sub-channels. Four
//! tags exist: STARTUP (the leaf-to-root start barrier), CHILD2PARENT
//! (best reports flowing upward), PARENT2CHILD (guidance flowing downward)
//! and FINALIZE (the shutdown handshake). For every `(peer, tag, direction)`
//! the transport keeps one buffer and one in-flight slot.
//!
//! All exchange operations are non-blocking probes:
//! - `try_send_*` returns `Ok(false)` when the previous send to that peer
//!   has not been consumed yet; the caller skips this round and only the
//!   newest still-unsent package eventually reaches the peer.
//! - `try_recv_*_latest` drains the inbound sub-channel and keeps only the
//!   most recent completed message; coalescing lives inside the transport,
//!   never in the engine.
//! - `*_drained` reports whether the peer has consumed the last send.
//!
//! Only the startup barrier and the final confirmation reads block.

use cairn_core::num::SolverScalar;
use cairn_model::solution::Solution;

/// Identifier of one engine node in the processing grid; equals the node's
/// identifier in the tree topology.
pub type NodeId = usize;

/// Liveness of a child as observed by its parent.
///
/// ```text
/// NotStarted ──first msg──▶ Active ──status −1──▶ Residual ──status −2──▶ Done
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(i8)]
pub enum PeerStatus {
    /// The child has not sent anything yet.
    NotStarted = 0,
    /// The child is iterating.
    Active = 1,
    /// The child exhausted its budget and drains in-flight data.
    Residual = -1,
    /// The child has shut down.
    Done = -2,
}

impl PeerStatus {
    /// Returns `true` once the peer has shut down.
    #[inline]
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns `true` while the peer still reads guidance (`status >= 0`).
    #[inline]
    pub fn accepts_guidance(&self) -> bool {
        matches!(self, Self::NotStarted | Self::Active)
    }
}

impl std::fmt::Display for PeerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not-started"),
            Self::Active => write!(f, "active"),
            Self::Residual => write!(f, "residual"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// A best-solution report flowing from a child to its parent.
#[derive(Clone, PartialEq, Debug)]
pub struct BestReport<T>
where
    T: SolverScalar,
{
    /// Flattened positions, dimension by dimension.
    pub positions: Vec<T>,
    /// Fitness vector of the reported solution.
    pub fitness: Vec<T>,
    /// Liveness the child reports alongside the solution.
    pub status: PeerStatus,
}

impl<T> BestReport<T>
where
    T: SolverScalar,
{
    /// Packages `solution` with `status` for the wire.
    pub fn from_solution(solution: &Solution<T>, status: PeerStatus) -> Self {
        Self {
            positions: solution.flat_positions(),
            fitness: solution.fitness().values().to_vec(),
            status,
        }
    }

    /// Unpacks this report into `solution`.
    ///
    /// # Panics
    ///
    /// Panics if the buffer lengths do not match the solution's shape.
    pub fn write_into(&self, solution: &mut Solution<T>) {
        solution.load_positions(&self.positions);
        solution.load_fitness(&self.fitness);
    }
}

/// A guidance solution flowing from a parent to a child.
#[derive(Clone, PartialEq, Debug)]
pub struct Guidance<T>
where
    T: SolverScalar,
{
    /// Flattened positions, dimension by dimension.
    pub positions: Vec<T>,
    /// Fitness vector of the forwarded solution.
    pub fitness: Vec<T>,
}

impl<T> Guidance<T>
where
    T: SolverScalar,
{
    /// Packages `solution` for the wire.
    pub fn from_solution(solution: &Solution<T>) -> Self {
        Self {
            positions: solution.flat_positions(),
            fitness: solution.fitness().values().to_vec(),
        }
    }

    /// Unpacks this guidance into `solution`.
    ///
    /// # Panics
    ///
    /// Panics if the buffer lengths do not match the solution's shape.
    pub fn write_into(&self, solution: &mut Solution<T>) {
        solution.load_positions(&self.positions);
        solution.load_fitness(&self.fitness);
    }
}

/// The error type for transport operations.
///
/// Every transport failure is fatal: the engine is not designed to recover
/// a dropped peer and aborts the whole node rather than produce silently
/// wrong optima.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The addressed peer is not connected to this transport endpoint.
    UnknownPeer { peer: NodeId },
    /// The peer's endpoint has gone away.
    Disconnected { peer: NodeId },
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownPeer { peer } => write!(f, "Peer {} is not connected", peer),
            Self::Disconnected { peer } => write!(f, "Peer {} disconnected", peer),
        }
    }
}

impl std::error::Error for TransportError {}

/// The abstract tagged message bus one engine node communicates through.
///
/// Implementations connect a node to exactly the peers adjacent to it in
/// the tree topology. The reference implementation lives in
/// [`crate::channel`]; any bus offering these primitives (e.g. an MPI
/// binding with a Cartesian communicator) suffices.
pub trait NodeTransport<T>: Send
where
    T: SolverScalar,
{
    /// Returns this node's identifier in the processing grid.
    fn node_id(&self) -> NodeId;

    /// Sends the startup-barrier signal to `to`. Blocking.
    fn send_startup(&mut self, to: NodeId) -> Result<(), TransportError>;

    /// Waits for the startup-barrier signal from `from`. Blocking.
    fn recv_startup(&mut self, from: NodeId) -> Result<(), TransportError>;

    /// Posts a best report to `to` unless the previous one is still in
    /// flight. Returns whether the report was posted.
    fn try_send_report(&mut self, to: NodeId, report: &BestReport<T>)
        -> Result<bool, TransportError>;

    /// Drains the report sub-channel from `from`, returning the most recent
    /// completed report, if any.
    fn try_recv_report_latest(&mut self, from: NodeId)
        -> Result<Option<BestReport<T>>, TransportError>;

    /// Returns whether `to` has consumed the last posted report.
    fn reports_drained(&mut self, to: NodeId) -> Result<bool, TransportError>;

    /// Posts guidance to `to` unless the previous one is still in flight.
    /// Returns whether the guidance was posted.
    fn try_send_guidance(&mut self, to: NodeId, guidance: &Guidance<T>)
        -> Result<bool, TransportError>;

    /// Drains the guidance sub-channel from `from`, returning the most
    /// recent completed guidance, if any.
    fn try_recv_guidance_latest(&mut self, from: NodeId)
        -> Result<Option<Guidance<T>>, TransportError>;

    /// Returns whether `to` has consumed the last posted guidance.
    fn guidance_drained(&mut self, to: NodeId) -> Result<bool, TransportError>;

    /// Sends a FINALIZE signal (or its confirmation) to `to`.
    fn send_finalize(&mut self, to: NodeId) -> Result<(), TransportError>;

    /// Probes for a FINALIZE signal from `from` without blocking.
    fn try_recv_finalize(&mut self, from: NodeId) -> Result<bool, TransportError>;

    /// Waits for a FINALIZE signal (or its confirmation) from `from`.
    /// Blocking.
    fn recv_finalize(&mut self, from: NodeId) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_model::shape::Shape;

    #[test]
    fn test_report_round_trip() {
        let mut solution = Solution::new(Shape::scalar(3));
        solution.load_positions(&[1.0, 2.0, 3.0]);
        solution.set_fitness(7.5);
        let report = BestReport::from_solution(&solution, PeerStatus::Active);
        let mut decoded = Solution::new(Shape::scalar(3));
        report.write_into(&mut decoded);
        assert_eq!(decoded.flat_positions(), vec![1.0, 2.0, 3.0]);
        assert_eq!(decoded.fitness().headline(), 7.5);
    }

    #[test]
    fn test_status_transitions_and_predicates() {
        assert!(PeerStatus::NotStarted.accepts_guidance());
        assert!(PeerStatus::Active.accepts_guidance());
        assert!(!PeerStatus::Residual.accepts_guidance());
        assert!(!PeerStatus::Done.accepts_guidance());
        assert!(PeerStatus::Done.is_done());
        assert!(!PeerStatus::Residual.is_done());
    }
}
