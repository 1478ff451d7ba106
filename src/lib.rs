//! # Colony: a reactive dataflow engine
//!
//! Computations are wrapped in nodes and wired into a graph through
//! publish/subscribe ports. Updating a node's reactive input re-runs its
//! target with the latest value of every input and fans the result out to
//! every subscriber. Cycles are allowed and are the way to accumulate state.
//!
//! ## Architecture
//!
//! - **Observer**: minimal pub-sub primitive ([`observer`])
//! - **Pipeline**: nodes, ports and the owning graph ([`pipeline`])
//! - **Workers**: inline execution or fixed pools of thread-like or
//!   process-like executors fed through crossbeam channels ([`worker`])
//! - **Persistence**: file-backed node values and the dictionary node
//!   ([`persistence`])
//!
//! ## Example
//!
//! ```no_run
//! use colony::{Graph, NodeBuilder, RecordingObserver};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! fn main() -> colony::Result<()> {
//!     let graph = Graph::new();
//!     let square = graph.add_node(NodeBuilder::new().function(|call| {
//!         let x = call.arg(0).as_i64().unwrap_or(0);
//!         Ok(json!(x * x))
//!     }))?;
//!
//!     let recorder = Arc::new(RecordingObserver::new());
//!     square.subscribe(recorder.clone())?;
//!
//!     graph.start()?;
//!     for i in 1..=3 {
//!         square.notify(json!(i), 0)?;
//!     }
//!     graph.stop()?;
//!
//!     assert_eq!(recorder.calls(), vec![json!(1), json!(4), json!(9)]);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod observer;
pub mod persistence;
pub mod pipeline;
pub mod worker;

// Re-export commonly used types
pub use config::EngineConfig;
pub use error::{ColonyError, Result};
pub use observer::{Observable, Observer, RecordingObserver};
pub use persistence::{DictionaryNode, DictionaryNodeBuilder, PersistentVariable};
pub use pipeline::{
    Destination, Graph, Invocable, Invocation, InvokeResult, Node, NodeBuilder, NodeId,
    PipelineError, PortKind, Signature, Target,
};
pub use worker::{ExecutorKind, WorkerStrategy, DEFAULT_POOL_SIZE};
