//! Minimal publish/subscribe primitive.
//!
//! An [`Observable`] holds a list of [`Observer`]s and broadcasts a value to
//! each of them. Output ports are built on top of it, and input ports are
//! observers. [`RecordingObserver`] captures everything it is notified with
//! and lets callers block until a number of values has arrived, which is how
//! concurrent graphs are observed without sleeping.

use crate::error::{ColonyError, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde_json::Value;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

/// Something that can be notified with a value.
#[cfg_attr(test, mockall::automock)]
pub trait Observer: Send + Sync {
    fn notify(&self, value: &Value) -> Result<()>;
}

/// Holds subscribers and broadcasts values to them.
#[derive(Default)]
pub struct Observable {
    observers: RwLock<Vec<Arc<dyn Observer>>>,
}

fn same_observer(a: &Arc<dyn Observer>, b: &Arc<dyn Observer>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

impl Observable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer. Registering the same observer twice is a no-op.
    pub fn register_observer(&self, observer: Arc<dyn Observer>) -> Result<()> {
        let mut observers = self
            .observers
            .write()
            .map_err(|e| ColonyError::poisoned("observer list", e))?;
        if !observers.iter().any(|o| same_observer(o, &observer)) {
            observers.push(observer);
        }
        Ok(())
    }

    /// Remove an observer. Returns `true` if it was registered.
    pub fn deregister_observer(&self, observer: &Arc<dyn Observer>) -> Result<bool> {
        let mut observers = self
            .observers
            .write()
            .map_err(|e| ColonyError::poisoned("observer list", e))?;
        let before = observers.len();
        observers.retain(|o| !same_observer(o, observer));
        Ok(observers.len() != before)
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().map(|o| o.len()).unwrap_or(0)
    }

    /// Notify every registered observer with `value`.
    ///
    /// The subscriber list is snapshotted first so observers may publish back
    /// into this observable (cyclic graphs) without holding the lock.
    pub fn notify_observers(&self, value: &Value) -> Result<()> {
        let observers: Vec<Arc<dyn Observer>> = self
            .observers
            .read()
            .map_err(|e| ColonyError::poisoned("observer list", e))?
            .clone();
        for observer in observers {
            observer.notify(value)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Observable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observable")
            .field("observers", &self.observer_count())
            .finish()
    }
}

/// Observer that remembers every value it receives.
pub struct RecordingObserver {
    calls: Mutex<Vec<Value>>,
    signal_tx: Sender<()>,
    signal_rx: Receiver<()>,
}

impl Default for RecordingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingObserver {
    pub fn new() -> Self {
        let (signal_tx, signal_rx) = unbounded();
        Self {
            calls: Mutex::new(Vec::new()),
            signal_tx,
            signal_rx,
        }
    }

    /// Values received so far, in arrival order.
    pub fn calls(&self) -> Vec<Value> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Block until at least `count` values have arrived or `timeout` expires.
    /// Returns whether the count was reached.
    pub fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.len() >= count {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || self.signal_rx.recv_timeout(remaining).is_err() {
                return self.len() >= count;
            }
        }
    }
}

impl Observer for RecordingObserver {
    fn notify(&self, value: &Value) -> Result<()> {
        self.calls
            .lock()
            .map_err(|e| ColonyError::poisoned("recorded calls", e))?
            .push(value.clone());
        let _ = self.signal_tx.send(());
        Ok(())
    }
}
