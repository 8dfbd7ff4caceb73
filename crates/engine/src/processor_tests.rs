// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::health::{HealthSettings, HealthSupervisor, HealthTransition};
use pw_adapters::{FakeDatastoreAdapter, FakeMutationAdapter};
use pw_core::{FakeClock, OperationKind, Payload};

type TestProcessor = WriteProcessor<FakeMutationAdapter, FakeClock>;

fn processor(max_retries: u32) -> (Arc<TestProcessor>, FakeMutationAdapter) {
    let queue = Arc::new(WriteAheadQueue::new(100, max_retries, FakeClock::new()));
    let mutations = FakeMutationAdapter::new();
    let processor = WriteProcessor::new(queue, mutations.clone(), Duration::from_secs(5));
    (Arc::new(processor), mutations)
}

fn progress(position: i64) -> Payload {
    let mut p = Payload::new();
    p.insert("position".to_string(), serde_json::json!(position));
    p
}

async fn wait_for_calls(mutations: &FakeMutationAdapter, count: usize) {
    let waited = tokio::time::timeout(Duration::from_secs(2), async {
        while mutations.calls().len() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(
        waited.is_ok(),
        "expected {count} applies, saw {}",
        mutations.calls().len()
    );
}

#[tokio::test]
async fn process_all_now_drains_queue() {
    let (processor, mutations) = processor(3);
    for target in 0..3 {
        processor
            .queue()
            .enqueue(OperationKind::AddToLibrary, 1, target, Payload::new())
            .unwrap();
    }

    let report = processor.process_all_now().await;

    assert_eq!(report.processed, 3);
    assert_eq!(report.failed, 0);
    assert_eq!(mutations.calls().len(), 3);
    assert!(processor.queue().is_empty());
}

#[tokio::test]
async fn reconnect_replays_outage_backlog_in_fifo_order() {
    let (processor, mutations) = processor(3);
    let datastore = FakeDatastoreAdapter::new();
    let health = HealthSupervisor::new(
        datastore.clone(),
        FakeClock::new(),
        HealthSettings {
            check_interval: Duration::from_secs(60),
            ping_timeout: Duration::from_millis(50),
            failure_threshold: 1,
            reconnect_timeout: Duration::from_secs(1),
        },
    );
    health.set_on_reconnect(processor.clone());

    datastore.set_reachable(false);
    assert_eq!(health.check_now().await, HealthTransition::BecameUnhealthy);

    let ids: Vec<String> = (1..=3)
        .map(|n| {
            processor
                .queue()
                .enqueue(OperationKind::UpdateProgress, 7, 100, progress(n))
                .unwrap()
        })
        .collect();

    datastore.set_reachable(true);
    assert_eq!(health.check_now().await, HealthTransition::Recovered);

    wait_for_calls(&mutations, 3).await;
    let positions: Vec<_> = mutations
        .calls()
        .into_iter()
        .map(|op| op.payload["position"].clone())
        .collect();
    assert_eq!(
        positions,
        vec![
            serde_json::json!(1),
            serde_json::json!(2),
            serde_json::json!(3)
        ]
    );
    assert_eq!(mutations.call_ids(), ids);
    assert!(processor.queue().is_empty());
}

#[tokio::test]
async fn periodic_loop_drains_backlog() {
    let (processor, mutations) = processor(3);
    processor
        .queue()
        .enqueue(OperationKind::MarkRead, 2, 5, Payload::new())
        .unwrap();

    let task = processor.start_processing(Duration::from_millis(10));
    wait_for_calls(&mutations, 1).await;
    processor.stop();
    task.await.unwrap();

    assert!(processor.queue().is_empty());
}

#[tokio::test]
async fn periodic_loop_waits_while_unhealthy() {
    let queue = Arc::new(WriteAheadQueue::new(100, 3, FakeClock::new()));
    let mutations = FakeMutationAdapter::new();
    let datastore = FakeDatastoreAdapter::new();
    let health = HealthSupervisor::new(
        datastore.clone(),
        FakeClock::new(),
        HealthSettings {
            check_interval: Duration::from_secs(60),
            ping_timeout: Duration::from_millis(50),
            failure_threshold: 1,
            reconnect_timeout: Duration::from_secs(1),
        },
    );
    let processor = Arc::new(
        WriteProcessor::new(queue.clone(), mutations.clone(), Duration::from_secs(5))
            .with_health(health.handle()),
    );

    datastore.set_reachable(false);
    health.check_now().await;
    queue
        .enqueue(OperationKind::CreateReview, 3, 9, Payload::new())
        .unwrap();

    let task = processor.start_processing(Duration::from_millis(5));
    tokio::time::sleep(Duration::from_millis(50)).await;
    processor.stop();
    task.await.unwrap();

    // No retries burned during the outage
    assert!(mutations.calls().is_empty());
    assert_eq!(queue.len(), 1);
}

#[tokio::test]
async fn flush_retries_a_transient_failure_in_the_same_drain() {
    let (processor, mutations) = processor(3);
    processor
        .queue()
        .enqueue(OperationKind::UpdateReview, 4, 8, Payload::new())
        .unwrap();
    mutations.fail_next(1);

    let report = processor.process_all_now().await;

    assert_eq!(report.processed, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(mutations.calls().len(), 2);
    assert!(processor.queue().is_empty());
}

#[tokio::test]
async fn flush_drops_an_operation_that_never_applies() {
    let (processor, mutations) = processor(3);
    processor
        .queue()
        .enqueue(OperationKind::UpdateReview, 4, 8, Payload::new())
        .unwrap();
    mutations.set_failing(true);

    let report = processor.process_all_now().await;

    assert_eq!(report.processed, 0);
    assert_eq!(report.failed, 4);
    assert_eq!(report.dropped, 1);
    assert!(processor.queue().is_empty());
    assert!(!report.deadline_hit);
}

#[tokio::test]
async fn on_reconnect_succeeds_with_empty_queue() {
    let (processor, mutations) = processor(3);
    processor.on_reconnect().await.unwrap();
    assert!(mutations.calls().is_empty());
}

#[tokio::test]
async fn processing_restarts_after_stop() {
    let (processor, mutations) = processor(3);
    processor.stop();

    let task = processor.start_processing(Duration::from_millis(10));
    processor
        .queue()
        .enqueue(OperationKind::MarkRead, 2, 6, Payload::new())
        .unwrap();
    wait_for_calls(&mutations, 1).await;
    processor.stop();
    task.await.unwrap();

    assert!(processor.queue().is_empty());
}
