//! Persistent mapping node.
//!
//! The node takes one reactive input, an `[action, payload]` pair:
//!
//! - `["update", {..}]` merges the payload object into the stored mapping.
//! - `["delete", "key"]` or `["delete", ["a", "b"]]` removes keys if present.
//!
//! Any other action fails the invocation. The resulting mapping becomes the
//! node's value and is flushed to disk before it is published. Deliveries
//! from several upstream nodes are applied one at a time.

use crate::config::default_persistence_folder;
use crate::error::{ColonyError, Result};
use crate::persistence::PersistentVariable;
use crate::pipeline::graph::{Graph, NodeFactory, NodeHandle};
use crate::pipeline::invocable::Signature;
use crate::pipeline::node::{Node, NodeBuilder};
use crate::pipeline::PipelineError;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// A parsed dictionary message.
#[derive(Debug, Clone, PartialEq)]
pub enum DictionaryAction {
    Update(Map<String, Value>),
    Delete(Vec<String>),
}

impl DictionaryAction {
    /// Parse an `[action, payload]` message.
    pub fn parse(message: &Value) -> std::result::Result<Self, PipelineError> {
        let (action, payload) = match message.as_array().map(Vec::as_slice) {
            Some([action, payload]) => (action, payload),
            _ => {
                return Err(PipelineError::InvalidPayload(format!(
                    "expected [action, payload], got {}",
                    message
                )))
            }
        };

        match action.as_str() {
            Some("update") => match payload {
                Value::Object(map) => Ok(DictionaryAction::Update(map.clone())),
                other => Err(PipelineError::InvalidPayload(format!(
                    "update expects an object, got {}",
                    other
                ))),
            },
            Some("delete") => {
                let keys = match payload {
                    Value::Array(items) => items.iter().map(key_of).collect::<Option<Vec<_>>>(),
                    single => key_of(single).map(|k| vec![k]),
                };
                keys.map(DictionaryAction::Delete).ok_or_else(|| {
                    PipelineError::InvalidPayload(format!(
                        "delete expects a key or a list of keys, got {}",
                        payload
                    ))
                })
            }
            Some(other) => Err(PipelineError::UnknownAction(other.to_string())),
            None => Err(PipelineError::UnknownAction(action.to_string())),
        }
    }

    /// Apply to `map` in place.
    pub fn apply(self, map: &mut Map<String, Value>) {
        match self {
            DictionaryAction::Update(entries) => {
                for (key, value) in entries {
                    map.insert(key, value);
                }
            }
            DictionaryAction::Delete(keys) => {
                for key in keys {
                    map.remove(&key);
                }
            }
        }
    }
}

fn key_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Builds the node backing a [`DictionaryNode`].
#[derive(Debug, Clone)]
pub struct DictionaryNodeBuilder {
    name: String,
    folder: PathBuf,
}

impl DictionaryNodeBuilder {
    pub fn new(name: impl Into<String>, folder: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            folder: folder.into(),
        }
    }

    /// A dictionary stored in the default persistence folder.
    pub fn in_default_folder(name: impl Into<String>) -> Self {
        Self::new(name, default_persistence_folder())
    }
}

impl NodeFactory for DictionaryNodeBuilder {
    fn build(self, handle: NodeHandle) -> Result<Node> {
        let mut variable = PersistentVariable::new(self.name.clone(), self.folder)?;
        let needs_reset = match variable.get() {
            Some(Value::Object(existing)) => {
                tracing::debug!("Dictionary {} loaded {} entries", self.name, existing.len());
                false
            }
            Some(other) => {
                tracing::warn!(
                    "Dictionary {} held a non-object value {}, resetting",
                    self.name,
                    other
                );
                true
            }
            None => true,
        };
        if needs_reset {
            variable.commit(json!({}))?;
        }

        let state = Arc::new(Mutex::new(variable));
        let current = state.clone();
        NodeBuilder::new()
            .name(self.name)
            .signature(Signature::new(1))
            .function(move |call| {
                let action = DictionaryAction::parse(call.arg(0))?;
                // Read, apply and flush under one lock so concurrent
                // upstream deliveries never lose an update.
                let mut variable = current
                    .lock()
                    .map_err(|e| anyhow::anyhow!("dictionary state poisoned: {}", e))?;
                let mut map = variable
                    .get()
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                action.apply(&mut map);
                let value = Value::Object(map);
                // A failed flush leaves the previous mapping current.
                variable.commit(value.clone())?;
                Ok(value)
            })
            .managed_store(state)
            .build(handle)
    }
}

/// A persistent mapping registered in a graph.
#[derive(Debug, Clone)]
pub struct DictionaryNode {
    node: Arc<Node>,
}

impl DictionaryNode {
    /// Register a dictionary named `name` stored under `folder`.
    pub fn new(graph: &Graph, name: impl Into<String>, folder: impl Into<PathBuf>) -> Result<Self> {
        let node = graph.add(DictionaryNodeBuilder::new(name, folder))?;
        Ok(Self { node })
    }

    /// Register a dictionary stored in the default persistence folder.
    pub fn in_default_folder(graph: &Graph, name: impl Into<String>) -> Result<Self> {
        let node = graph.add(DictionaryNodeBuilder::in_default_folder(name))?;
        Ok(Self { node })
    }

    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    /// Merge `entries` into the mapping.
    pub fn update(&self, entries: Map<String, Value>) -> Result<()> {
        self.node.notify(json!(["update", entries]), 0)
    }

    /// Remove every key in `keys` that is present.
    pub fn delete<I, K>(&self, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        self.node.notify(json!(["delete", keys]), 0)
    }

    /// Current mapping.
    pub fn value(&self) -> Result<Map<String, Value>> {
        match self.node.value() {
            Some(Value::Object(map)) => Ok(map),
            Some(other) => Err(ColonyError::Persistence(format!(
                "Dictionary {} holds a non-object value {}",
                self.node.label(),
                other
            ))),
            None => Ok(Map::new()),
        }
    }
}
