//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod targets;

use colony::{Node, RecordingObserver};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// How long to wait for concurrent results before failing
pub fn test_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Subscribe a fresh recorder to `node`'s output
pub fn record(node: &Node) -> Arc<RecordingObserver> {
    let recorder = Arc::new(RecordingObserver::new());
    node.subscribe(recorder.clone())
        .expect("failed to subscribe recorder");
    recorder
}

/// Sort values by their JSON text so unordered results can be compared
pub fn sorted(mut values: Vec<Value>) -> Vec<Value> {
    values.sort_by_key(|v| v.to_string());
    values
}

/// Assert two value lists are equal as multisets
pub fn assert_same_multiset(actual: Vec<Value>, expected: Vec<Value>) {
    assert_eq!(
        sorted(actual),
        sorted(expected),
        "results differ as multisets"
    );
}
