// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Manual flush over the control socket

use crate::prelude::*;
use pw_core::OperationKind;
use pw_daemon::{Request, Response};

#[tokio::test]
async fn flush_applies_everything_queued() {
    let h = Harness::start().await;
    let first = h.enqueue(OperationKind::CreateReview, BOB_ID, 5).await;
    let second = h.enqueue(OperationKind::UpdateReview, BOB_ID, 5).await;

    assert_eq!(
        h.control(Request::Flush).await,
        Response::Flushed {
            processed: 2,
            failed: 0
        }
    );
    assert_eq!(h.mutations.call_ids(), vec![first, second]);
    assert_eq!(h.queue_len().await, 0);

    h.stop().await;
}

#[tokio::test]
async fn failed_write_is_retried_within_the_same_flush() {
    let h = Harness::start().await;
    h.mutations.fail_next(1);
    let first = h.enqueue(OperationKind::AddToLibrary, ALICE, 1).await;
    let second = h.enqueue(OperationKind::AddToLibrary, ALICE, 2).await;

    assert_eq!(
        h.control(Request::Flush).await,
        Response::Flushed {
            processed: 2,
            failed: 1
        }
    );
    assert_eq!(h.mutations.call_ids(), vec![first.clone(), second, first]);
    assert_eq!(h.queue_len().await, 0);

    h.stop().await;
}

#[tokio::test]
async fn write_failing_every_attempt_is_dropped_after_its_retries() {
    let h = Harness::with_config(|c| c.queue.max_retries = 2).await;
    h.mutations.set_failing(true);
    h.enqueue(OperationKind::DeleteReview, ALICE, 9).await;

    assert_eq!(
        h.control(Request::Flush).await,
        Response::Flushed {
            processed: 0,
            failed: 3
        }
    );
    assert_eq!(h.queue_len().await, 0);
    assert_eq!(h.mutations.calls().len(), 3);
    assert_eq!(h.daemon.queue.stats().dropped, 1);

    h.stop().await;
}
