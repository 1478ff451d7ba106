//! Pipeline-specific error types.

use crate::pipeline::id::NodeId;
use thiserror::Error;

/// Configuration and usage errors raised by the graph core.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Provide exactly one of a target function or a target class")]
    MissingTarget,

    #[error("Both a target function and a target class were provided")]
    ConflictingTargets,

    #[error("Expected {expected} reactive input ports, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    #[error("Expected {expected} default reactive values, got {actual}")]
    DefaultsMismatch { expected: usize, actual: usize },

    #[error("Input requires exactly one of a slot index or a keyword")]
    MissingDestination,

    #[error("Input names both slot index {index} and keyword '{key}'")]
    AmbiguousDestination { index: usize, key: String },

    #[error("Node {node_id:?} has no reactive slot {index}")]
    UnknownSlot { node_id: NodeId, index: usize },

    #[error("Node {node_id:?} has no passive slot '{key}'")]
    UnknownKeyword { node_id: NodeId, key: String },

    #[error("Batch size must be at least 1")]
    ZeroBatchSize,

    #[error("Pool size must be at least 1")]
    ZeroPoolSize,

    #[error("Port expected {expected}, got {actual}")]
    PortMismatch {
        expected: &'static str,
        actual: String,
    },

    #[error("Action '{0}' not recognised")]
    UnknownAction(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Node {0:?} worker is not running")]
    WorkerNotStarted(NodeId),

    #[error("Graph cannot hold more nodes")]
    GraphFull,

    #[error("Failed to spawn executor thread: {0}")]
    Spawn(#[from] std::io::Error),
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
