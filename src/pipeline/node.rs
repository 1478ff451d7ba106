//! Node abstraction for the graph.
//!
//! A node caches one value per reactive (positional) slot and per passive
//! (keyword) slot. Writing a reactive slot snapshots every slot and hands the
//! snapshot to the node's [`Worker`]; writing a passive slot only updates the
//! cache. Results are stored as the node's current value and published on its
//! [`OutputPort`].
//!
//! Nodes are created through a [`NodeBuilder`] registered with a
//! [`Graph`](crate::pipeline::Graph), which owns them. Ports address nodes by
//! id, so a node may feed its own inputs.

use crate::config::default_persistence_folder;
use crate::error::{ColonyError, Result};
use crate::observer::Observer;
use crate::persistence::PersistentVariable;
use crate::pipeline::error::PipelineError;
use crate::pipeline::graph::{NodeFactory, NodeHandle};
use crate::pipeline::id::NodeId;
use crate::pipeline::invocable::{Invocable, Invocation, Signature, Target};
use crate::pipeline::port::{Destination, InputPort, OutputPort, PortKind};
use crate::worker::{Worker, WorkerStrategy};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

/// Where a node keeps its current value.
pub enum ValueStore {
    Memory(RwLock<Option<Value>>),
    /// Backed by a file; survives restarts.
    Persistent(Arc<Mutex<PersistentVariable>>),
    /// Backed by a file the target writes itself while computing the result;
    /// results are only published.
    Managed(Arc<Mutex<PersistentVariable>>),
}

impl ValueStore {
    fn get(&self) -> Option<Value> {
        match self {
            ValueStore::Memory(value) => value.read().ok().and_then(|v| v.clone()),
            ValueStore::Persistent(var) | ValueStore::Managed(var) => {
                var.lock().ok().and_then(|v| v.get().cloned())
            }
        }
    }

    fn set(&self, value: Value) -> Result<()> {
        match self {
            ValueStore::Memory(slot) => {
                *slot
                    .write()
                    .map_err(|e| ColonyError::poisoned("node value", e))? = Some(value);
                Ok(())
            }
            ValueStore::Persistent(var) | ValueStore::Managed(var) => var
                .lock()
                .map_err(|e| ColonyError::poisoned("persistent value", e))?
                .commit(value),
        }
    }

    fn record(&self, result: Value) -> Result<()> {
        match self {
            ValueStore::Managed(_) => Ok(()),
            _ => self.set(result),
        }
    }
}

/// A computation unit in the graph.
pub struct Node {
    id: NodeId,
    name: Option<String>,
    handle: NodeHandle,
    signature: Signature,
    reactive_ports: Vec<Arc<InputPort>>,
    passive_ports: BTreeMap<String, Arc<InputPort>>,
    slots: RwLock<Invocation>,
    output: OutputPort,
    store: ValueStore,
    worker: Worker,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name if set, otherwise the id; used in logs and errors.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{:?}", self.id),
        }
    }

    pub fn handle(&self) -> &NodeHandle {
        &self.handle
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn worker(&self) -> &Worker {
        &self.worker
    }

    pub fn is_persistent(&self) -> bool {
        !matches!(self.store, ValueStore::Memory(_))
    }

    pub fn reactive_ports(&self) -> &[Arc<InputPort>] {
        &self.reactive_ports
    }

    pub fn reactive_port(&self, index: usize) -> Result<&Arc<InputPort>> {
        self.reactive_ports.get(index).ok_or_else(|| {
            PipelineError::UnknownSlot {
                node_id: self.id,
                index,
            }
            .into()
        })
    }

    pub fn passive_ports(&self) -> &BTreeMap<String, Arc<InputPort>> {
        &self.passive_ports
    }

    pub fn passive_port(&self, key: &str) -> Result<&Arc<InputPort>> {
        self.passive_ports.get(key).ok_or_else(|| {
            PipelineError::UnknownKeyword {
                node_id: self.id,
                key: key.to_string(),
            }
            .into()
        })
    }

    pub fn output_port(&self) -> &OutputPort {
        &self.output
    }

    /// Subscribe an observer to this node's results.
    pub fn subscribe(&self, observer: Arc<dyn Observer>) -> Result<()> {
        self.output.register_observer(observer)
    }

    /// Feed this node's results into `downstream`'s reactive slot `slot`.
    pub fn pipe_to(&self, downstream: &Node, slot: usize) -> Result<()> {
        let port = downstream.reactive_port(slot)?.clone();
        self.output.register_observer(port)
    }

    /// Feed this node's results into `downstream`'s passive slot `key`.
    pub fn pipe_to_kwarg(&self, downstream: &Node, key: &str) -> Result<()> {
        let port = downstream.passive_port(key)?.clone();
        self.output.register_observer(port)
    }

    /// Drive reactive port `slot` from outside the graph.
    pub fn notify(&self, value: Value, slot: usize) -> Result<()> {
        self.reactive_port(slot)?.notify(&value)
    }

    /// Notify reactive port `slot` once per item.
    pub fn notify_items<I>(&self, items: I, slot: usize) -> Result<()>
    where
        I: IntoIterator<Item = Value>,
    {
        let port = self.reactive_port(slot)?;
        for item in items {
            port.notify(&item)?;
        }
        Ok(())
    }

    /// Core dispatch: write a slot and, for reactive slots, invoke the target
    /// with a snapshot of every slot.
    ///
    /// A reactive write to a pool node that is not running fails with
    /// [`PipelineError::WorkerNotStarted`] and leaves the slot unchanged.
    pub fn handle_input(&self, value: Value, destination: Destination) -> Result<()> {
        if matches!(destination, Destination::Index(_)) && !self.worker.is_running() {
            return Err(PipelineError::WorkerNotStarted(self.id).into());
        }
        let call = {
            let mut slots = self
                .slots
                .write()
                .map_err(|e| ColonyError::poisoned("node slots", e))?;
            match destination {
                Destination::Index(index) => {
                    let slot = slots.args.get_mut(index).ok_or(PipelineError::UnknownSlot {
                        node_id: self.id,
                        index,
                    })?;
                    *slot = value;
                    slots.clone()
                }
                Destination::Key(key) => {
                    let slot = slots
                        .kwargs
                        .get_mut(&key)
                        .ok_or(PipelineError::UnknownKeyword {
                            node_id: self.id,
                            key: key.clone(),
                        })?;
                    *slot = value;
                    return Ok(());
                }
            }
        };
        self.worker.execute(self, call)
    }

    /// Dispatch with the destination given as optional parts; exactly one of
    /// `index` and `key` must be set.
    pub fn dispatch(&self, value: Value, index: Option<usize>, key: Option<&str>) -> Result<()> {
        let destination = Destination::from_parts(index, key)?;
        self.handle_input(value, destination)
    }

    /// Store `value` as the current value and publish it.
    pub fn handle_result(&self, value: Value) -> Result<()> {
        tracing::trace!("{} result {}", self.label(), value);
        self.store.record(value.clone())?;
        self.output.notify(&value)
    }

    /// Current value, if any result has been produced (or loaded).
    pub fn value(&self) -> Option<Value> {
        self.store.get()
    }

    /// Overwrite the current value without publishing it; persisted values
    /// are written through.
    pub fn set_value(&self, value: Value) -> Result<()> {
        self.store.set(value)
    }

    /// Snapshot of the cached slot values.
    pub fn slots(&self) -> Invocation {
        self.slots.read().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn start(&self) -> Result<()> {
        self.worker.start(self.handle.clone())
    }

    pub fn stop(&self) -> Result<()> {
        self.worker.stop()
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("reactive", &self.reactive_ports.len())
            .field("passive", &self.passive_ports.keys().collect::<Vec<_>>())
            .field("worker", &self.worker)
            .finish()
    }
}

enum StoreKind {
    Memory,
    Folder(PathBuf),
    Managed(Arc<Mutex<PersistentVariable>>),
}

/// Construction parameters for a [`Node`].
///
/// Exactly one of [`function`](Self::function) or [`class`](Self::class)
/// must be given. Without an explicit [`signature`](Self::signature) the
/// target is assumed to take one positional argument and no keywords.
pub struct NodeBuilder {
    function: Option<Target>,
    class: Option<Target>,
    signature: Option<Signature>,
    reactive_ports: Option<Vec<PortKind>>,
    default_values: Option<Vec<Value>>,
    upstream_args: Vec<Arc<Node>>,
    upstream_kwargs: Vec<(String, Arc<Node>)>,
    name: Option<String>,
    worker: WorkerStrategy,
    store: StoreKind,
}

impl Default for NodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeBuilder {
    pub fn new() -> Self {
        Self {
            function: None,
            class: None,
            signature: None,
            reactive_ports: None,
            default_values: None,
            upstream_args: Vec::new(),
            upstream_kwargs: Vec::new(),
            name: None,
            worker: WorkerStrategy::Sync,
            store: StoreKind::Memory,
        }
    }

    /// Use a stateless function as the target.
    pub fn function<F>(mut self, f: F) -> Self
    where
        F: Fn(&Invocation) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.function = Some(Target::function(f));
        self
    }

    /// Use a stateful target; `factory` builds one instance per executor.
    pub fn class<T, F>(mut self, factory: F) -> Self
    where
        T: Invocable + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.class = Some(Target::class(factory));
        self
    }

    pub fn signature(mut self, signature: Signature) -> Self {
        self.signature = Some(signature);
        self
    }

    /// Explicit reactive ports; the count must match the signature.
    pub fn reactive_ports(mut self, ports: Vec<PortKind>) -> Self {
        self.reactive_ports = Some(ports);
        self
    }

    /// Shorthand for a single explicit reactive port.
    pub fn reactive_port(self, port: PortKind) -> Self {
        self.reactive_ports(vec![port])
    }

    /// Initial values of the reactive slots.
    pub fn default_values(mut self, values: Vec<Value>) -> Self {
        self.default_values = Some(values);
        self
    }

    /// Bind `upstream`'s output to the next positional slot.
    pub fn arg_node(mut self, upstream: &Arc<Node>) -> Self {
        self.upstream_args.push(upstream.clone());
        self
    }

    /// Bind `upstream`'s output to the passive slot `key`.
    pub fn kwarg_node(mut self, key: impl Into<String>, upstream: &Arc<Node>) -> Self {
        self.upstream_kwargs.push((key.into(), upstream.clone()));
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn worker(mut self, strategy: WorkerStrategy) -> Self {
        self.worker = strategy;
        self
    }

    pub fn thread_pool(self, size: usize) -> Self {
        self.worker(WorkerStrategy::thread_pool(size))
    }

    pub fn process_pool(self, size: usize) -> Self {
        self.worker(WorkerStrategy::process_pool(size))
    }

    /// Name the node and keep its value in `folder/<name>` so it survives
    /// restarts.
    pub fn persistent(mut self, name: impl Into<String>, folder: impl Into<PathBuf>) -> Self {
        self.name = Some(name.into());
        self.store = StoreKind::Folder(folder.into());
        self
    }

    /// Like [`persistent`](Self::persistent), in the default persistence
    /// folder.
    pub fn persistent_default(self, name: impl Into<String>) -> Self {
        self.persistent(name, default_persistence_folder())
    }

    pub(crate) fn managed_store(mut self, variable: Arc<Mutex<PersistentVariable>>) -> Self {
        self.store = StoreKind::Managed(variable);
        self
    }

    fn take_target(&mut self) -> std::result::Result<Target, PipelineError> {
        match (self.function.take(), self.class.take()) {
            (Some(target), None) | (None, Some(target)) => Ok(target),
            (None, None) => Err(PipelineError::MissingTarget),
            (Some(_), Some(_)) => Err(PipelineError::ConflictingTargets),
        }
    }
}

impl NodeFactory for NodeBuilder {
    fn build(mut self, handle: NodeHandle) -> Result<Node> {
        let target = self.take_target()?;
        let signature = self.signature.take().unwrap_or_else(|| Signature::new(1));
        let id = handle.id();

        let kinds = match self.reactive_ports.take() {
            Some(kinds) if kinds.len() != signature.required => {
                return Err(PipelineError::ArityMismatch {
                    expected: signature.required,
                    actual: kinds.len(),
                }
                .into());
            }
            Some(kinds) => kinds
                .into_iter()
                .map(PortKind::validate)
                .collect::<std::result::Result<Vec<_>, _>>()?,
            None => vec![PortKind::Arg; signature.required],
        };

        let reactive_ports: Vec<Arc<InputPort>> = kinds
            .into_iter()
            .enumerate()
            .map(|(index, kind)| {
                Arc::new(InputPort::new(handle.clone(), Destination::Index(index), kind))
            })
            .collect();

        let args = match self.default_values.take() {
            Some(values) if values.len() != signature.required => {
                return Err(PipelineError::DefaultsMismatch {
                    expected: signature.required,
                    actual: values.len(),
                }
                .into());
            }
            Some(values) => values,
            None => vec![Value::Null; signature.required],
        };

        let mut passive_ports = BTreeMap::new();
        let mut kwargs = BTreeMap::new();
        for param in &signature.optional {
            passive_ports.insert(
                param.name.clone(),
                Arc::new(InputPort::kwarg(handle.clone(), param.name.clone())),
            );
            kwargs.insert(param.name.clone(), param.default.clone());
        }

        let store = match self.store {
            StoreKind::Memory => ValueStore::Memory(RwLock::new(None)),
            StoreKind::Managed(variable) => ValueStore::Managed(variable),
            StoreKind::Folder(folder) => {
                let name = self.name.clone().unwrap_or_default();
                let variable = PersistentVariable::new(name, folder)?;
                ValueStore::Persistent(Arc::new(Mutex::new(variable)))
            }
        };

        let worker = Worker::new(self.worker, target, id)?;

        let node = Node {
            id,
            name: self.name,
            handle,
            signature,
            reactive_ports,
            passive_ports,
            slots: RwLock::new(Invocation { args, kwargs }),
            output: OutputPort::new(),
            store,
            worker,
        };

        // A failed build must not leave ports subscribed upstream.
        if self.upstream_args.len() > node.reactive_ports.len() {
            return Err(PipelineError::UnknownSlot {
                node_id: id,
                index: node.reactive_ports.len(),
            }
            .into());
        }
        for (key, _) in &self.upstream_kwargs {
            node.passive_port(key)?;
        }
        for (index, upstream) in self.upstream_args.iter().enumerate() {
            upstream.pipe_to(&node, index)?;
        }
        for (key, upstream) in &self.upstream_kwargs {
            upstream.pipe_to_kwarg(&node, key)?;
        }

        tracing::debug!(
            "Built node {} ({} reactive, {} passive, {:?})",
            node.label(),
            node.reactive_ports.len(),
            node.passive_ports.len(),
            node.worker.strategy()
        );
        Ok(node)
    }
}
