//! Reactive dataflow graph.
//!
//! Nodes wrap a target computation. Each node has reactive input ports (one
//! per positional parameter), passive input ports (one per keyword parameter)
//! and one output port. A value arriving on a reactive port triggers an
//! invocation with the latest value of every slot; a value arriving on a
//! passive port is only cached. Results are published to every subscriber of
//! the output port.
//!
//! # Architecture
//!
//! ```text
//! [source] ──► OutputPort ──► InputPort(0) ─┐
//!                        └──► InputPort(k) ─┤
//!                                           ▼
//!                                   [node] ─► Worker ─► OutputPort ──► ...
//! ```
//!
//! # Design
//!
//! - **Arena ownership**: the [`Graph`] owns every node; ports hold a
//!   [`NodeHandle`] (weak arena reference + id), so cycles are allowed.
//! - **Worker per node**: inline ([`WorkerStrategy::Sync`]) or a pool of
//!   thread-like or process-like executors.
//! - **Dynamic values**: slot values and results are `serde_json::Value`;
//!   `Null` is the unset sentinel.
//!
//! [`WorkerStrategy::Sync`]: crate::worker::WorkerStrategy::Sync

pub mod error;
pub mod graph;
pub mod id;
pub mod invocable;
pub mod node;
pub mod port;

pub use error::{PipelineError, PipelineResult};
pub use graph::{Graph, NodeFactory, NodeHandle};
pub use id::NodeId;
pub use invocable::{Invocable, Invocation, InvokeResult, Parameter, Signature, Target};
pub use node::{Node, NodeBuilder, ValueStore};
pub use port::{Destination, InputPort, OutputPort, PortKind};
