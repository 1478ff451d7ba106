//! Integration tests for concurrent worker pools
//!
//! These tests validate the pool lifecycle end to end:
//! - Fan-out ports feeding a pool
//! - Failure and panic isolation inside executors
//! - Shutdown draining and post-stop behaviour
//! - Process-like executors with private target instances

mod common;

use colony::{ColonyError, Graph, NodeBuilder, PipelineError, PortKind, Signature};
use common::builders::{batched_square, mapped_square, pass_through, square};
use common::targets::{FailOnce, InstanceCounter, PanicOnNegative, Slow};
use common::{assert_same_multiset, record, test_timeout};
use serde_json::json;
use std::time::Duration;

#[test]
fn test_mapping_port_single_worker() {
    let graph = Graph::new();
    let node = graph.add_thread_node(mapped_square(), 1).unwrap();
    let recorder = record(&node);

    graph.start().unwrap();
    node.notify(json!([1, 2, 3]), 0).unwrap();
    node.notify(json!([3, 4, 5]), 0).unwrap();
    graph.stop().unwrap();

    assert_same_multiset(
        recorder.calls(),
        vec![json!(1), json!(4), json!(9), json!(9), json!(16), json!(25)],
    );
}

#[test]
fn test_batch_port_single_worker() {
    let graph = Graph::new();
    let node = graph.add_thread_node(batched_square(2), 1).unwrap();
    let recorder = record(&node);

    graph.start().unwrap();
    node.notify(json!([1, 2, 3]), 0).unwrap();
    node.notify(json!([3, 4, 5]), 0).unwrap();
    graph.stop().unwrap();

    assert_same_multiset(
        recorder.calls(),
        vec![json!([1, 4]), json!([9]), json!([9, 16]), json!([25])],
    );
}

#[test]
fn test_single_worker_keeps_order() {
    let graph = Graph::new();
    let node = graph.add_thread_node(square(), 1).unwrap();
    let recorder = record(&node);

    graph.start().unwrap();
    node.notify_items((1..=5).map(|i| json!(i)), 0).unwrap();
    graph.stop().unwrap();

    assert_eq!(
        recorder.calls(),
        vec![json!(1), json!(4), json!(9), json!(16), json!(25)]
    );
}

#[test]
fn test_many_workers_deliver_everything() {
    let graph = Graph::new();
    let node = graph
        .add_thread_node(
            NodeBuilder::new().class(|| Slow {
                delay: Duration::from_millis(5),
            }),
            4,
        )
        .unwrap();
    let recorder = record(&node);

    graph.start().unwrap();
    node.notify_items((0..20).map(|i| json!(i)), 0).unwrap();
    assert!(recorder.wait_for(20, test_timeout()));
    graph.stop().unwrap();

    assert_same_multiset(recorder.calls(), (0..20).map(|i| json!(i)).collect());
}

#[test]
fn test_no_results_after_stop() {
    let graph = Graph::new();
    let node = graph.add_thread_node(square(), 2).unwrap();
    let recorder = record(&node);

    graph.start().unwrap();
    node.notify(json!(3), 0).unwrap();
    graph.stop().unwrap();
    assert_eq!(recorder.calls(), vec![json!(9)]);

    let err = node.notify(json!(4), 0).unwrap_err();
    assert!(matches!(
        err,
        ColonyError::Pipeline(PipelineError::WorkerNotStarted(_))
    ));
    assert!(!recorder.wait_for(2, Duration::from_millis(50)));
    assert_eq!(node.value(), Some(json!(9)));
}

#[test]
fn test_queued_invocations_keep_their_snapshot() {
    let graph = Graph::new();
    let node = graph
        .add_thread_node(
            NodeBuilder::new()
                .signature(Signature::new(1).with_optional("k", json!(0)))
                .function(|call| {
                    std::thread::sleep(Duration::from_millis(50));
                    Ok(json!([call.arg(0), call.kwarg("k")]))
                }),
            1,
        )
        .unwrap();
    let recorder = record(&node);

    graph.start().unwrap();
    node.notify(json!(1), 0).unwrap();
    node.notify(json!(2), 0).unwrap();
    node.dispatch(json!(9), None, Some("k")).unwrap();
    assert!(recorder.wait_for(2, test_timeout()));

    node.notify(json!(3), 0).unwrap();
    graph.stop().unwrap();

    assert_eq!(
        recorder.calls(),
        vec![json!([1, 0]), json!([2, 0]), json!([3, 9])]
    );
}

#[test]
fn test_execute_before_start_is_an_error() {
    let graph = Graph::new();
    let node = graph.add_process_node(square(), 1).unwrap();
    assert!(!node.is_running());
    assert!(node.notify(json!(1), 0).is_err());
}

#[test]
fn test_start_and_stop_are_idempotent() {
    let graph = Graph::new();
    let node = graph.add_thread_node(square(), 2).unwrap();
    let recorder = record(&node);

    graph.start().unwrap();
    graph.start().unwrap();
    assert!(node.is_running());
    node.notify(json!(2), 0).unwrap();
    graph.stop().unwrap();
    graph.stop().unwrap();
    assert!(!node.is_running());

    // A stopped pool can be started again.
    graph.start().unwrap();
    node.notify(json!(5), 0).unwrap();
    graph.stop().unwrap();

    assert_eq!(recorder.calls(), vec![json!(4), json!(25)]);
}

#[test]
fn test_failed_invocation_is_discarded() {
    for pool in [
        NodeBuilder::new().class(FailOnce::default).thread_pool(1),
        NodeBuilder::new().class(FailOnce::default).process_pool(1),
    ] {
        let graph = Graph::new();
        let node = graph.add(pool).unwrap();
        let recorder = record(&node);

        graph.start().unwrap();
        node.notify(json!(2), 0).unwrap();
        node.notify(json!(3), 0).unwrap();
        graph.stop().unwrap();

        assert_eq!(recorder.calls(), vec![json!(9)]);
        assert_eq!(node.value(), Some(json!(9)));
    }
}

#[test]
fn test_panicking_invocation_is_discarded() {
    let graph = Graph::new();
    let node = graph
        .add_thread_node(NodeBuilder::new().class(|| PanicOnNegative), 1)
        .unwrap();
    let recorder = record(&node);

    graph.start().unwrap();
    node.notify_items(vec![json!(1), json!(-1), json!(2)], 0)
        .unwrap();
    graph.stop().unwrap();

    assert_eq!(recorder.calls(), vec![json!(1), json!(2)]);
}

#[test]
fn test_process_pool_results() {
    let graph = Graph::new();
    let node = graph.add_process_node(square(), 3).unwrap();
    let recorder = record(&node);

    graph.start().unwrap();
    node.notify_items((1..=5).map(|i| json!(i)), 0).unwrap();
    graph.stop().unwrap();

    assert_same_multiset(
        recorder.calls(),
        vec![json!(1), json!(4), json!(9), json!(16), json!(25)],
    );
}

#[test]
fn test_class_instance_lives_for_executor() {
    let graph = Graph::new();
    let node = graph
        .add_process_node(NodeBuilder::new().class(InstanceCounter::default), 1)
        .unwrap();
    let recorder = record(&node);

    graph.start().unwrap();
    node.notify_items((0..3).map(|_| json!(null)), 0).unwrap();
    graph.stop().unwrap();

    assert_eq!(recorder.calls(), vec![json!(1), json!(2), json!(3)]);
}

#[test]
fn test_pool_feeding_sync_node() {
    let graph = Graph::new();
    let producer = graph.add_process_node(square(), 2).unwrap();
    let consumer = graph.add_node(pass_through().arg_node(&producer)).unwrap();
    let recorder = record(&consumer);

    graph.start().unwrap();
    producer
        .notify_items(vec![json!(1), json!(2), json!(3)], 0)
        .unwrap();
    graph.stop().unwrap();

    assert_same_multiset(recorder.calls(), vec![json!(1), json!(4), json!(9)]);
}

#[test]
fn test_feedback_through_pool() {
    let graph = Graph::new();
    let countdown = graph
        .add_thread_node(
            NodeBuilder::new()
                .reactive_port(PortKind::MappingArg)
                .function(|call| {
                    let x = call.arg(0).as_i64().unwrap_or(0);
                    if x > 0 {
                        Ok(json!([x - 1]))
                    } else {
                        Ok(json!([]))
                    }
                }),
            1,
        )
        .unwrap();
    let recorder = record(&countdown);
    countdown.pipe_to(&countdown, 0).unwrap();

    graph.start().unwrap();
    countdown.notify(json!([3]), 0).unwrap();
    assert!(recorder.wait_for(4, test_timeout()));
    graph.stop().unwrap();

    assert_eq!(
        recorder.calls(),
        vec![json!([2]), json!([1]), json!([0]), json!([])]
    );
}
