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

//! Tree-distributed cooperative iteration engine.
//!
//! One [`Engine`] instance drives one node of the topology: it runs its own
//! population-based optimizers over its anchor sub-region and exchanges
//! best-known candidate solutions with its parent and children over an
//! abstract tagged message bus, driving joint convergence without a central
//! coordinator. The [`Builder`] wires all capabilities and policies, fills
//! in defaults, and hands out the engine as a one-shot move.
//!
//! The bus is the [`transport::NodeTransport`] trait; the in-repo reference
//! implementation is the in-memory [`channel::ChannelGrid`], which connects
//! one engine per thread through bounded rendezvous channels.

pub mod builder;
pub mod channel;
pub mod engine;
pub mod group;
pub mod transport;

pub use builder::{BuildError, Builder};
pub use channel::{ChannelGrid, ChannelTransport};
pub use engine::{Engine, EngineError};
pub use transport::{BestReport, Guidance, NodeId, NodeTransport, PeerStatus, TransportError};
