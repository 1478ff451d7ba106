//! Input and output ports.
//!
//! An [`OutputPort`] broadcasts a node's result to every subscribed
//! [`InputPort`]. An input port knows its owning node (by arena id) and the
//! slot it writes: a positional index for reactive ports, a keyword for
//! passive ones. Reactive ports can also fan a single value out into several
//! deliveries:
//!
//! - [`PortKind::Arg`]: deliver the value as-is.
//! - [`PortKind::MappingArg`]: deliver each element separately.
//! - [`PortKind::BatchArg`]: deliver contiguous chunks of `batch_size`.

use crate::error::Result;
use crate::observer::{Observable, Observer};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::graph::NodeHandle;
use crate::pipeline::id::NodeId;
use serde_json::Value;
use std::sync::Arc;

/// Which slot of a node an input writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Reactive (positional) slot.
    Index(usize),
    /// Passive (keyword) slot.
    Key(String),
}

impl Destination {
    /// Build a destination from optional parts. Exactly one must be set.
    pub fn from_parts(index: Option<usize>, key: Option<&str>) -> PipelineResult<Self> {
        match (index, key) {
            (Some(index), None) => Ok(Destination::Index(index)),
            (None, Some(key)) => Ok(Destination::Key(key.to_string())),
            (Some(index), Some(key)) => Err(PipelineError::AmbiguousDestination {
                index,
                key: key.to_string(),
            }),
            (None, None) => Err(PipelineError::MissingDestination),
        }
    }

    pub fn is_reactive(&self) -> bool {
        matches!(self, Destination::Index(_))
    }
}

/// How a reactive port turns one incoming value into deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PortKind {
    #[default]
    Arg,
    MappingArg,
    BatchArg { batch_size: usize },
}

impl PortKind {
    pub fn batch(batch_size: usize) -> PipelineResult<Self> {
        if batch_size == 0 {
            return Err(PipelineError::ZeroBatchSize);
        }
        Ok(PortKind::BatchArg { batch_size })
    }

    pub(crate) fn validate(self) -> PipelineResult<Self> {
        match self {
            PortKind::BatchArg { batch_size: 0 } => Err(PipelineError::ZeroBatchSize),
            kind => Ok(kind),
        }
    }
}

fn type_name(value: &Value) -> String {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
    .to_string()
}

/// Split an iterable value into its elements.
///
/// Arrays yield their elements, objects their keys, strings their characters.
pub fn iterate(value: &Value) -> PipelineResult<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items.clone()),
        Value::Object(map) => Ok(map.keys().cloned().map(Value::String).collect()),
        Value::String(s) => Ok(s.chars().map(|c| Value::String(c.to_string())).collect()),
        other => Err(PipelineError::PortMismatch {
            expected: "an iterable",
            actual: type_name(other),
        }),
    }
}

/// Split a sequence into contiguous chunks of `batch_size`; the last chunk may
/// be shorter.
pub fn chunks(value: &Value, batch_size: usize) -> PipelineResult<Vec<Value>> {
    if batch_size == 0 {
        return Err(PipelineError::ZeroBatchSize);
    }
    match value {
        Value::Array(items) => Ok(items
            .chunks(batch_size)
            .map(|chunk| Value::Array(chunk.to_vec()))
            .collect()),
        Value::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(chars
                .chunks(batch_size)
                .map(|chunk| Value::String(chunk.iter().collect()))
                .collect())
        }
        other => Err(PipelineError::PortMismatch {
            expected: "a sequence",
            actual: type_name(other),
        }),
    }
}

/// Receives values and forwards them to the owning node.
#[derive(Debug, Clone)]
pub struct InputPort {
    node: NodeHandle,
    destination: Destination,
    kind: PortKind,
}

impl InputPort {
    pub fn new(node: NodeHandle, destination: Destination, kind: PortKind) -> Self {
        Self {
            node,
            destination,
            kind,
        }
    }

    pub fn arg(node: NodeHandle, index: usize) -> Self {
        Self::new(node, Destination::Index(index), PortKind::Arg)
    }

    pub fn mapping_arg(node: NodeHandle, index: usize) -> Self {
        Self::new(node, Destination::Index(index), PortKind::MappingArg)
    }

    pub fn batch_arg(node: NodeHandle, index: usize, batch_size: usize) -> PipelineResult<Self> {
        Ok(Self::new(
            node,
            Destination::Index(index),
            PortKind::batch(batch_size)?,
        ))
    }

    pub fn kwarg(node: NodeHandle, key: impl Into<String>) -> Self {
        Self::new(node, Destination::Key(key.into()), PortKind::Arg)
    }

    pub fn node_id(&self) -> NodeId {
        self.node.id()
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    pub fn kind(&self) -> PortKind {
        self.kind
    }

    fn deliver(&self, value: Value) -> Result<()> {
        match self.node.upgrade() {
            Some(node) => node.handle_input(value, self.destination.clone()),
            None => {
                tracing::debug!(
                    "Dropping value for {:?}: graph no longer exists",
                    self.node.id()
                );
                Ok(())
            }
        }
    }
}

impl Observer for InputPort {
    fn notify(&self, value: &Value) -> Result<()> {
        match self.kind {
            PortKind::Arg => self.deliver(value.clone()),
            PortKind::MappingArg => {
                for item in iterate(value)? {
                    self.deliver(item)?;
                }
                Ok(())
            }
            PortKind::BatchArg { batch_size } => {
                for chunk in chunks(value, batch_size)? {
                    self.deliver(chunk)?;
                }
                Ok(())
            }
        }
    }
}

/// Publishes a node's results to subscribed input ports.
#[derive(Debug, Default)]
pub struct OutputPort {
    observable: Observable,
}

impl OutputPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe any observer (another node's input port, a recorder, ...).
    pub fn register_observer(&self, observer: Arc<dyn Observer>) -> Result<()> {
        self.observable.register_observer(observer)
    }

    pub fn deregister_observer(&self, observer: &Arc<dyn Observer>) -> Result<bool> {
        self.observable.deregister_observer(observer)
    }

    pub fn subscriber_count(&self) -> usize {
        self.observable.observer_count()
    }

    pub fn notify(&self, value: &Value) -> Result<()> {
        self.observable.notify_observers(value)
    }
}
