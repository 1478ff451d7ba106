//! Worker strategies
//!
//! A worker decides where a node's target computation runs. Every node owns
//! exactly one worker, chosen at construction:
//!
//! - [`SyncWorker`]: invokes inline on the caller's thread and publishes the
//!   result before returning. Failures propagate to the caller.
//! - [`PoolWorker`]: a fixed pool of executors pulling from a shared FIFO
//!   work queue and pushing to a result queue that a single distribution
//!   thread drains. Executors are either thread-like (sharing the graph's
//!   memory) or process-like (private target instance, serialized traffic).
//!
//! # Shutdown
//!
//! Pools stop cooperatively: one poison pill per executor on the work queue,
//! join every executor, and only then a poison pill on the result queue so no
//! result pushed by an exiting executor is skipped.

pub mod pool;
pub mod sync;

pub use pool::PoolWorker;
pub use sync::SyncWorker;

use crate::error::Result;
use crate::pipeline::graph::NodeHandle;
use crate::pipeline::invocable::{Invocation, Target};
use crate::pipeline::node::Node;
use crate::pipeline::{NodeId, PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};

/// Default number of executors in a concurrent pool.
pub const DEFAULT_POOL_SIZE: usize = 10;

/// The kind of executor backing a concurrent pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    /// Executors share the target and the graph's memory.
    #[default]
    Thread,
    /// Executors own a private target instance and exchange only serialized
    /// payloads with the graph side.
    ///
    /// Only [`Target::Class`] targets are private: a [`Target::Function`] is
    /// one shared closure, so state it captures is visible to every executor.
    /// Use a class when each executor needs its own state.
    Process,
}

impl std::fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutorKind::Thread => write!(f, "thread"),
            ExecutorKind::Process => write!(f, "process"),
        }
    }
}

/// Worker selection for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerStrategy {
    #[default]
    Sync,
    Pool { kind: ExecutorKind, size: usize },
}

impl WorkerStrategy {
    pub fn thread_pool(size: usize) -> Self {
        WorkerStrategy::Pool {
            kind: ExecutorKind::Thread,
            size,
        }
    }

    pub fn process_pool(size: usize) -> Self {
        WorkerStrategy::Pool {
            kind: ExecutorKind::Process,
            size,
        }
    }
}

/// The worker bound to one node.
pub enum Worker {
    Sync(SyncWorker),
    Pool(PoolWorker),
}

impl Worker {
    pub fn new(strategy: WorkerStrategy, target: Target, node_id: NodeId) -> PipelineResult<Self> {
        match strategy {
            WorkerStrategy::Sync => Ok(Worker::Sync(SyncWorker::new(&target))),
            WorkerStrategy::Pool { size: 0, .. } => Err(PipelineError::ZeroPoolSize),
            WorkerStrategy::Pool { kind, size } => {
                Ok(Worker::Pool(PoolWorker::new(node_id, kind, size, target)))
            }
        }
    }

    /// Run (or schedule) one invocation of the node's target.
    pub fn execute(&self, node: &Node, call: Invocation) -> Result<()> {
        match self {
            Worker::Sync(w) => w.execute(node, call),
            Worker::Pool(w) => w.execute(call),
        }
    }

    pub fn start(&self, node: NodeHandle) -> Result<()> {
        match self {
            Worker::Sync(_) => Ok(()),
            Worker::Pool(w) => w.start(node),
        }
    }

    pub fn stop(&self) -> Result<()> {
        match self {
            Worker::Sync(_) => Ok(()),
            Worker::Pool(w) => w.stop(),
        }
    }

    pub fn is_running(&self) -> bool {
        match self {
            Worker::Sync(_) => true,
            Worker::Pool(w) => w.is_running(),
        }
    }

    pub fn strategy(&self) -> WorkerStrategy {
        match self {
            Worker::Sync(_) => WorkerStrategy::Sync,
            Worker::Pool(w) => WorkerStrategy::Pool {
                kind: w.kind(),
                size: w.size(),
            },
        }
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("strategy", &self.strategy())
            .field("running", &self.is_running())
            .finish()
    }
}
