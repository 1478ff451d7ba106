//! Inline worker: the target runs on the caller's thread.

use crate::error::{ColonyError, Result};
use crate::pipeline::invocable::{Invocable, Invocation, Target};
use crate::pipeline::node::Node;
use std::sync::Mutex;

/// Invokes the target immediately and publishes before returning.
pub struct SyncWorker {
    target: Mutex<Box<dyn Invocable>>,
}

impl SyncWorker {
    pub fn new(target: &Target) -> Self {
        Self {
            target: Mutex::new(target.instantiate()),
        }
    }

    pub fn execute(&self, node: &Node, call: Invocation) -> Result<()> {
        // The guard is released before publishing so cyclic wiring can
        // re-enter this worker.
        let outcome = {
            let mut target = self
                .target
                .lock()
                .map_err(|e| ColonyError::poisoned("sync target", e))?;
            target.invoke(&call)
        };

        match outcome {
            Ok(value) => node.handle_result(value),
            Err(source) => Err(ColonyError::Invocation {
                node: node.label(),
                source,
            }),
        }
    }
}
