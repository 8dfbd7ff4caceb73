// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Writes made during a datastore outage are replayed on recovery

use crate::prelude::*;
use pw_core::OperationKind;
use pw_engine::HealthTransition;

#[tokio::test]
async fn writes_buffered_during_outage_replay_in_order_on_recovery() {
    let h = Harness::start().await;

    h.datastore.set_reachable(false);
    assert_eq!(
        h.daemon.health.check_now().await,
        HealthTransition::BecameUnhealthy
    );

    let ids = vec![
        h.enqueue(OperationKind::AddToLibrary, ALICE, 100).await,
        h.enqueue(OperationKind::UpdateProgress, ALICE, 100).await,
        h.enqueue(OperationKind::MarkRead, ALICE, 100).await,
    ];
    assert_eq!(h.queue_len().await, 3);
    assert!(h.mutations.calls().is_empty());

    h.datastore.set_reachable(true);
    assert_eq!(h.daemon.health.check_now().await, HealthTransition::Recovered);

    let queue = std::sync::Arc::clone(&h.daemon.queue);
    wait_for("queue to drain", || queue.is_empty()).await;
    assert_eq!(h.mutations.call_ids(), ids);

    h.stop().await;
}

#[tokio::test]
async fn status_reports_unhealthy_while_datastore_is_down() {
    let h = Harness::start().await;
    h.datastore.set_reachable(false);
    h.daemon.health.check_now().await;

    match h.control(pw_daemon::Request::Status).await {
        pw_daemon::Response::Status { healthy, .. } => assert!(!healthy),
        other => panic!("unexpected {other:?}"),
    }

    h.stop().await;
}

#[tokio::test]
async fn full_queue_refuses_new_writes() {
    let h = Harness::with_config(|c| c.queue.max_size = 2).await;
    h.enqueue(OperationKind::MarkRead, ALICE, 1).await;
    h.enqueue(OperationKind::MarkRead, ALICE, 2).await;

    let response = h
        .control(pw_daemon::Request::Enqueue {
            kind: OperationKind::MarkRead,
            actor_id: ALICE,
            target_id: 3,
            payload: Default::default(),
        })
        .await;

    match response {
        pw_daemon::Response::Error { message } => assert!(message.contains("full"), "{message}"),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(h.queue_len().await, 2);

    h.stop().await;
}
