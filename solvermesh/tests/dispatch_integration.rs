//! Integration tests for request queueing and worker-pool dispatch.
//!
//! These tests exercise the dispatcher through the full endpoint: queueing
//! behind a busy worker, strict time-order service, and out-of-order solution
//! publication when a later request solves faster on another worker.

mod common;

use common::Harness;
use serde_json::json;

/// Builds an injectable execution context whose solve takes `solve_ms`.
fn timed_request(timestamp: u64, solve_ms: u64) -> serde_json::Value {
    json!({
        "Timestamp": timestamp,
        "ExecutionContext": {"load": 1.0, "solve_ms": solve_ms},
        "DeploySolution": true
    })
}

async fn harness_with_problem(workers: usize) -> Harness {
    let harness = Harness::start(workers);
    harness.publish_problem();
    harness.settle().await;
    harness
}

#[tokio::test]
async fn test_single_worker_queues_second_request() {
    let mut harness = harness_with_problem(1).await;
    let context_topic = harness.topics.exec_context.clone();

    // The first request holds the only worker; the second must queue and be
    // re-dispatched when the first solution frees the worker.
    harness.publish(&context_topic, timed_request(1000, 200));
    harness.publish(&context_topic, timed_request(2000, 0));

    let first = harness.next_solution().await;
    let second = harness.next_solution().await;
    assert_eq!(first["Timestamp"], 1000);
    assert_eq!(second["Timestamp"], 2000);

    harness.stop().await;
}

#[tokio::test]
async fn test_queued_requests_serve_in_timestamp_order() {
    let mut harness = harness_with_problem(1).await;
    let context_topic = harness.topics.exec_context.clone();

    // Hold the worker, then queue requests out of timestamp order.
    harness.publish(&context_topic, timed_request(500, 200));
    harness.settle().await;
    harness.publish(&context_topic, timed_request(3000, 0));
    harness.publish(&context_topic, timed_request(1000, 0));
    harness.publish(&context_topic, timed_request(2000, 0));

    assert_eq!(harness.next_solution().await["Timestamp"], 500);
    assert_eq!(harness.next_solution().await["Timestamp"], 1000);
    assert_eq!(harness.next_solution().await["Timestamp"], 2000);
    assert_eq!(harness.next_solution().await["Timestamp"], 3000);

    harness.stop().await;
}

#[tokio::test]
async fn test_fast_later_request_may_finish_first_on_second_worker() {
    let mut harness = harness_with_problem(2).await;
    let context_topic = harness.topics.exec_context.clone();

    // Earlier request solves slowly, later one quickly on the other worker.
    // Dispatch order is by timestamp; publication order is by completion.
    harness.publish(&context_topic, timed_request(1000, 300));
    harness.publish(&context_topic, timed_request(2000, 10));

    let first_published = harness.next_solution().await;
    let second_published = harness.next_solution().await;
    assert_eq!(first_published["Timestamp"], 2000);
    assert_eq!(second_published["Timestamp"], 1000);

    harness.stop().await;
}

#[tokio::test]
async fn test_every_queued_request_gets_exactly_one_solution() {
    let mut harness = harness_with_problem(2).await;
    let context_topic = harness.topics.exec_context.clone();

    for index in 0..6u64 {
        harness.publish(&context_topic, timed_request(1000 + index, 10));
    }

    let mut seen = Vec::new();
    for _ in 0..6 {
        let solution = harness.next_solution().await;
        seen.push(solution["Timestamp"].as_u64().unwrap());
    }
    seen.sort_unstable();
    assert_eq!(seen, vec![1000, 1001, 1002, 1003, 1004, 1005]);

    harness.stop().await;
}

#[tokio::test]
async fn test_requests_before_problem_definition_are_dropped() {
    let mut harness = Harness::start(1);
    let context_topic = harness.topics.exec_context.clone();

    // No problem posted yet: the worker drops the request silently and the
    // pool keeps serving once a problem arrives.
    harness.publish(&context_topic, timed_request(1000, 0));
    harness
        .expect_no_solution(std::time::Duration::from_millis(200))
        .await;

    harness.publish_problem();
    harness.settle().await;
    harness.publish(&context_topic, timed_request(2000, 0));
    assert_eq!(harness.next_solution().await["Timestamp"], 2000);

    harness.stop().await;
}
