//! The graph: owner of every node.
//!
//! Nodes live in an arena indexed by [`NodeId`]. Everything else (input
//! ports, pool distribution threads) refers to a node through a
//! [`NodeHandle`], a weak reference into the arena plus the id, so cyclic
//! wiring never forms an ownership cycle.

use crate::config::{EngineConfig, WorkerConfig};
use crate::error::{ColonyError, Result};
use crate::pipeline::error::PipelineError;
use crate::pipeline::id::NodeId;
use crate::pipeline::node::{Node, NodeBuilder};
use std::sync::{Arc, RwLock, Weak};

/// Anything that can turn itself into a [`Node`] once its id is known.
pub trait NodeFactory {
    fn build(self, handle: NodeHandle) -> Result<Node>;
}

#[derive(Default)]
pub(crate) struct NodeArena {
    nodes: RwLock<Vec<Arc<Node>>>,
}

/// Non-owning reference to a node registered with a [`Graph`].
#[derive(Clone)]
pub struct NodeHandle {
    id: NodeId,
    arena: Weak<NodeArena>,
}

impl NodeHandle {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The node, if the graph is still alive and the node was registered.
    pub fn upgrade(&self) -> Option<Arc<Node>> {
        let arena = self.arena.upgrade()?;
        let nodes = arena.nodes.read().ok()?;
        nodes.get(self.id.index()).cloned()
    }
}

impl std::fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeHandle")
            .field("id", &self.id)
            .field("alive", &(self.arena.strong_count() > 0))
            .finish()
    }
}

/// A set of wired nodes with a shared lifecycle.
///
/// Dropping the graph stops every concurrent worker.
#[derive(Default)]
pub struct Graph {
    arena: Arc<NodeArena>,
    workers: WorkerConfig,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// A graph whose pool nodes default to the `[workers]` section of `config`.
    pub fn with_config(config: &EngineConfig) -> Self {
        Self {
            arena: Arc::default(),
            workers: config.workers.clone(),
        }
    }

    /// Pool shape used by [`add_pool_node`](Self::add_pool_node).
    pub fn worker_defaults(&self) -> &WorkerConfig {
        &self.workers
    }

    /// Register a node. Ids are assigned in registration order.
    pub fn add<F: NodeFactory>(&self, factory: F) -> Result<Arc<Node>> {
        let mut nodes = self
            .arena
            .nodes
            .write()
            .map_err(|e| ColonyError::poisoned("graph arena", e))?;
        let id = NodeId::from_index(nodes.len()).ok_or(PipelineError::GraphFull)?;
        let handle = NodeHandle {
            id,
            arena: Arc::downgrade(&self.arena),
        };
        let node = Arc::new(factory.build(handle)?);
        nodes.push(node.clone());
        Ok(node)
    }

    pub fn add_node(&self, builder: NodeBuilder) -> Result<Arc<Node>> {
        self.add(builder)
    }

    pub fn add_thread_node(&self, builder: NodeBuilder, size: usize) -> Result<Arc<Node>> {
        self.add(builder.thread_pool(size))
    }

    pub fn add_process_node(&self, builder: NodeBuilder, size: usize) -> Result<Arc<Node>> {
        self.add(builder.process_pool(size))
    }

    /// Register `builder` on a pool of the configured kind and size.
    pub fn add_pool_node(&self, builder: NodeBuilder) -> Result<Arc<Node>> {
        self.add(builder.worker(self.workers.strategy()))
    }

    pub fn get(&self, id: NodeId) -> Option<Arc<Node>> {
        self.arena
            .nodes
            .read()
            .ok()
            .and_then(|nodes| nodes.get(id.index()).cloned())
    }

    /// First node registered under `name`.
    pub fn find(&self, name: &str) -> Option<Arc<Node>> {
        self.nodes().into_iter().find(|n| n.name() == Some(name))
    }

    pub fn len(&self) -> usize {
        self.arena.nodes.read().map(|n| n.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every node in registration order.
    pub fn nodes(&self) -> Vec<Arc<Node>> {
        self.arena
            .nodes
            .read()
            .map(|n| n.clone())
            .unwrap_or_default()
    }

    pub fn iter(&self) -> std::vec::IntoIter<Arc<Node>> {
        self.nodes().into_iter()
    }

    /// Start every concurrent worker in registration order.
    pub fn start(&self) -> Result<()> {
        // Snapshot first: distribution threads read the arena.
        for node in self.nodes() {
            node.start()?;
        }
        tracing::info!("Graph started ({} nodes)", self.len());
        Ok(())
    }

    /// Stop every concurrent worker in registration order.
    ///
    /// Every node is stopped even if an earlier one fails; the first error is
    /// returned.
    pub fn stop(&self) -> Result<()> {
        let mut first_err = None;
        for node in self.nodes() {
            if let Err(e) = node.stop() {
                tracing::error!("Failed to stop node {}: {}", node.label(), e);
                first_err.get_or_insert(e);
            }
        }
        tracing::info!("Graph stopped");
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for Graph {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph").field("nodes", &self.nodes()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::invocable::Signature;
    use crate::worker::{ExecutorKind, WorkerStrategy};
    use serde_json::json;

    fn identity() -> NodeBuilder {
        NodeBuilder::new().function(|call| Ok(call.arg(0).clone()))
    }

    #[test]
    fn test_ids_follow_registration_order() {
        let graph = Graph::new();
        let a = graph.add_node(identity().name("a")).unwrap();
        let b = graph.add_node(identity().name("b")).unwrap();

        assert_eq!(a.id(), NodeId(0));
        assert_eq!(b.id(), NodeId(1));
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.get(NodeId(1)).unwrap().name(), Some("b"));
        assert_eq!(graph.find("a").unwrap().id(), NodeId(0));
        assert!(graph.get(NodeId(7)).is_none());
    }

    #[test]
    fn test_failed_build_registers_nothing() {
        let graph = Graph::new();
        let err = graph
            .add_node(identity().signature(Signature::new(2)).default_values(vec![json!(1)]))
            .unwrap_err();
        assert!(err.to_string().contains("default"));
        assert!(graph.is_empty());
    }

    #[test]
    fn test_pool_nodes_follow_config() {
        let mut config = EngineConfig::default();
        config.workers.pool_size = 3;
        config.workers.kind = ExecutorKind::Process;
        let graph = Graph::with_config(&config);

        let pooled = graph.add_pool_node(identity()).unwrap();
        assert_eq!(pooled.worker().strategy(), WorkerStrategy::process_pool(3));

        let explicit = graph.add_thread_node(identity(), 2).unwrap();
        assert_eq!(explicit.worker().strategy(), WorkerStrategy::thread_pool(2));

        let default_graph = Graph::new();
        let node = default_graph.add_pool_node(identity()).unwrap();
        assert_eq!(
            node.worker().strategy(),
            WorkerStrategy::thread_pool(crate::worker::DEFAULT_POOL_SIZE)
        );
    }

    #[test]
    fn test_handle_outlives_graph() {
        let graph = Graph::new();
        let node = graph.add_node(identity()).unwrap();
        let handle = node.handle().clone();
        assert!(handle.upgrade().is_some());

        drop(graph);
        assert!(handle.upgrade().is_none());
        // Writes through a dangling port are dropped, not errors.
        node.notify(json!(1), 0).unwrap();
    }
}
