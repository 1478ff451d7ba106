//! Concurrent worker pool.
//!
//! `execute` pushes the invocation onto an unbounded crossbeam work queue and
//! returns immediately. `size` executors pull from that queue; successful
//! results go to a result queue drained by one distribution thread, which is
//! the only place results are handed back to the node. Failed invocations
//! (errors or panics) are logged and dropped, the executor keeps going.
//!
//! Process-like executors build their own target instance and all traffic
//! with them is serialized to JSON bytes, so no slot or result value is
//! shared with the graph. Function targets are still one shared closure.

use crate::error::{ColonyError, Result};
use crate::pipeline::graph::NodeHandle;
use crate::pipeline::invocable::{Invocation, Target};
use crate::pipeline::{NodeId, PipelineError};
use crate::worker::ExecutorKind;
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};

/// Queue message: a payload or the shutdown sentinel.
enum Envelope<T> {
    Item(T),
    PoisonPill,
}

/// A value as it travels across the executor boundary.
enum Payload<T> {
    Inline(T),
    Marshalled(Vec<u8>),
}

impl<T: Serialize + DeserializeOwned> Payload<T> {
    fn pack(kind: ExecutorKind, value: T) -> serde_json::Result<Self> {
        match kind {
            ExecutorKind::Thread => Ok(Payload::Inline(value)),
            ExecutorKind::Process => serde_json::to_vec(&value).map(Payload::Marshalled),
        }
    }

    fn unpack(self) -> serde_json::Result<T> {
        match self {
            Payload::Inline(value) => Ok(value),
            Payload::Marshalled(bytes) => serde_json::from_slice(&bytes),
        }
    }
}

type WorkItem = Envelope<Payload<Invocation>>;
type ResultItem = Envelope<Payload<Value>>;

struct RunningPool {
    work_tx: Sender<WorkItem>,
    result_tx: Sender<ResultItem>,
    executors: Vec<JoinHandle<()>>,
    distributor: JoinHandle<()>,
}

/// Fixed-size pool of thread-like or process-like executors.
pub struct PoolWorker {
    node_id: NodeId,
    kind: ExecutorKind,
    size: usize,
    target: Target,
    running: Mutex<Option<RunningPool>>,
}

impl PoolWorker {
    pub fn new(node_id: NodeId, kind: ExecutorKind, size: usize, target: Target) -> Self {
        Self {
            node_id,
            kind,
            size,
            target,
            running: Mutex::new(None),
        }
    }

    pub fn kind(&self) -> ExecutorKind {
        self.kind
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().map(|r| r.is_some()).unwrap_or(false)
    }

    /// Spawn the executors and the distribution thread. No-op when running.
    pub fn start(&self, node: NodeHandle) -> Result<()> {
        let mut running = self
            .running
            .lock()
            .map_err(|e| ColonyError::poisoned("pool state", e))?;
        if running.is_some() {
            tracing::debug!("{:?} pool already running", self.node_id);
            return Ok(());
        }

        let (work_tx, work_rx) = unbounded::<WorkItem>();
        let (result_tx, result_rx) = unbounded::<ResultItem>();

        let mut executors = Vec::with_capacity(self.size);
        for index in 0..self.size {
            let ctx = ExecutorContext {
                node_id: self.node_id,
                index,
                kind: self.kind,
                target: self.target.clone(),
                work_rx: work_rx.clone(),
                result_tx: result_tx.clone(),
            };
            let handle = thread::Builder::new()
                .name(format!("colony-{}-{}-{}", self.kind, self.node_id.0, index))
                .spawn(move || ctx.run())
                .map_err(PipelineError::Spawn)?;
            executors.push(handle);
        }

        let node_id = self.node_id;
        let distributor = thread::Builder::new()
            .name(format!("colony-dist-{}", self.node_id.0))
            .spawn(move || distribute(node_id, node, result_rx))
            .map_err(PipelineError::Spawn)?;

        tracing::info!(
            "{:?} started {} {} executor(s)",
            self.node_id,
            self.size,
            self.kind
        );

        *running = Some(RunningPool {
            work_tx,
            result_tx,
            executors,
            distributor,
        });
        Ok(())
    }

    /// Queue one invocation and return immediately.
    pub fn execute(&self, call: Invocation) -> Result<()> {
        let work_tx = self
            .running
            .lock()
            .map_err(|e| ColonyError::poisoned("pool state", e))?
            .as_ref()
            .map(|pool| pool.work_tx.clone())
            .ok_or(PipelineError::WorkerNotStarted(self.node_id))?;

        let payload = Payload::pack(self.kind, call)?;
        work_tx
            .send(Envelope::Item(payload))
            .map_err(|_| PipelineError::WorkerNotStarted(self.node_id))?;
        Ok(())
    }

    /// Drain and join every executor, then the distributor. No-op when stopped.
    pub fn stop(&self) -> Result<()> {
        // Taken out of the lock first: the distributor may re-enter `execute`
        // through cyclic wiring while we join.
        let pool = self
            .running
            .lock()
            .map_err(|e| ColonyError::poisoned("pool state", e))?
            .take();
        let Some(pool) = pool else {
            return Ok(());
        };

        for _ in 0..pool.executors.len() {
            let _ = pool.work_tx.send(Envelope::PoisonPill);
        }
        for handle in pool.executors {
            if handle.join().is_err() {
                tracing::warn!("{:?} executor thread panicked during shutdown", self.node_id);
            }
        }

        // Every executor has exited, so every result it produced is queued
        // ahead of this pill.
        let _ = pool.result_tx.send(Envelope::PoisonPill);
        if pool.distributor.join().is_err() {
            tracing::warn!("{:?} distribution thread panicked", self.node_id);
        }

        tracing::info!("{:?} pool stopped", self.node_id);
        Ok(())
    }
}

struct ExecutorContext {
    node_id: NodeId,
    index: usize,
    kind: ExecutorKind,
    target: Target,
    work_rx: Receiver<WorkItem>,
    result_tx: Sender<ResultItem>,
}

impl ExecutorContext {
    fn run(self) {
        let mut target = self.target.instantiate();
        tracing::debug!("{:?} executor {} ready", self.node_id, self.index);

        loop {
            let payload = match self.work_rx.recv() {
                Ok(Envelope::Item(payload)) => payload,
                // Disconnected means the pool was dropped without `stop`.
                Ok(Envelope::PoisonPill) | Err(_) => break,
            };

            let call = match payload.unpack() {
                Ok(call) => call,
                Err(e) => {
                    tracing::warn!("{:?} executor {} bad work item: {}", self.node_id, self.index, e);
                    continue;
                }
            };

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| target.invoke(&call)));
            let value = match outcome {
                Ok(Ok(value)) => value,
                Ok(Err(e)) => {
                    tracing::warn!(
                        "{:?} executor {} discarded failed invocation: {:#}",
                        self.node_id,
                        self.index,
                        e
                    );
                    continue;
                }
                Err(_) => {
                    tracing::warn!(
                        "{:?} executor {} discarded panicking invocation",
                        self.node_id,
                        self.index
                    );
                    continue;
                }
            };

            match Payload::pack(self.kind, value) {
                Ok(payload) => {
                    if self.result_tx.send(Envelope::Item(payload)).is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!(
                    "{:?} executor {} could not marshal result: {}",
                    self.node_id,
                    self.index,
                    e
                ),
            }
        }

        tracing::debug!("{:?} executor {} exiting", self.node_id, self.index);
    }
}

fn distribute(node_id: NodeId, node: NodeHandle, result_rx: Receiver<ResultItem>) {
    loop {
        let payload = match result_rx.recv() {
            Ok(Envelope::Item(payload)) => payload,
            Ok(Envelope::PoisonPill) | Err(_) => break,
        };

        let value = match payload.unpack() {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("{:?} could not unmarshal result: {}", node_id, e);
                continue;
            }
        };

        let Some(node) = node.upgrade() else {
            tracing::debug!("{:?} no longer registered, dropping result", node_id);
            continue;
        };
        if let Err(e) = node.handle_result(value) {
            tracing::warn!("{:?} failed to publish result: {}", node_id, e);
        }
    }
    tracing::debug!("{:?} distribution thread exiting", node_id);
}
