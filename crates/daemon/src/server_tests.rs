// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::lifecycle::{startup_with, Adapters};
use pw_adapters::{FakeAuthAdapter, FakeDatastoreAdapter, FakeMutationAdapter};
use pw_core::{Config, OperationKind};
use serde_json::json;
use tempfile::TempDir;

type TestDaemon = DaemonState<FakeMutationAdapter, FakeDatastoreAdapter, FakeAuthAdapter>;

struct Harness {
    daemon: TestDaemon,
    mutations: FakeMutationAdapter,
    _dir: TempDir,
}

async fn harness(max_queue: usize) -> Harness {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.queue.max_size = max_queue;
    config.broadcast.listen_addr = "127.0.0.1:0".parse().unwrap();
    config.notify.listen_addr = "127.0.0.1:0".parse().unwrap();
    config.daemon.control_socket = dir.path().join("control.sock");

    let mutations = FakeMutationAdapter::new();
    let daemon = startup_with(
        &config,
        Adapters {
            mutations: mutations.clone(),
            datastore: FakeDatastoreAdapter::new(),
            auth: FakeAuthAdapter::new(),
        },
    )
    .await
    .unwrap();

    Harness {
        daemon,
        mutations,
        _dir: dir,
    }
}

fn enqueue(kind: OperationKind) -> Request {
    Request::Enqueue {
        kind,
        actor_id: 7,
        target_id: 100,
        payload: Default::default(),
    }
}

#[tokio::test]
async fn ping_and_hello() {
    let h = harness(10).await;

    assert_eq!(handle_request(&h.daemon, Request::Ping).await, Response::Pong);
    assert_eq!(
        handle_request(
            &h.daemon,
            Request::Hello {
                version: "0.0.0".into()
            }
        )
        .await,
        Response::Hello {
            version: PROTOCOL_VERSION.to_string()
        }
    );
    h.daemon.shutdown().await;
}

#[tokio::test]
async fn enqueue_then_flush_applies_in_order() {
    let h = harness(10).await;

    let mut ids = Vec::new();
    for _ in 0..3 {
        match handle_request(&h.daemon, enqueue(OperationKind::UpdateProgress)).await {
            Response::Enqueued { id } => ids.push(id),
            other => panic!("unexpected {other:?}"),
        }
    }

    let response = handle_request(&h.daemon, Request::Flush).await;

    assert_eq!(
        response,
        Response::Flushed {
            processed: 3,
            failed: 0
        }
    );
    assert_eq!(h.mutations.call_ids(), ids);
    h.daemon.shutdown().await;
}

#[tokio::test]
async fn full_queue_is_reported_as_error() {
    let h = harness(1).await;
    handle_request(&h.daemon, enqueue(OperationKind::MarkRead)).await;

    let response = handle_request(&h.daemon, enqueue(OperationKind::MarkRead)).await;

    assert!(matches!(response, Response::Error { message } if message.contains("full")));
    h.daemon.shutdown().await;
}

#[tokio::test]
async fn status_reports_components() {
    let h = harness(10).await;
    handle_request(&h.daemon, enqueue(OperationKind::CreateReview)).await;

    let response = handle_request(&h.daemon, Request::Status).await;

    match response {
        Response::Status {
            healthy,
            queue_len,
            peers,
            clients,
            ..
        } => {
            assert!(healthy);
            assert_eq!(queue_len, 1);
            assert_eq!(peers, 0);
            assert_eq!(clients, 0);
        }
        other => panic!("unexpected {other:?}"),
    }
    h.daemon.shutdown().await;
}

#[tokio::test]
async fn broadcast_and_notify_without_audience_succeed() {
    let h = harness(10).await;

    let broadcast = handle_request(
        &h.daemon,
        Request::BroadcastProgress {
            user_id: 1,
            entity_id: 2,
            position: 3.0,
            sub_position_id: None,
        },
    )
    .await;
    assert_eq!(broadcast, Response::Broadcast { delivered: 0 });

    let extra = match json!({"chapter": 4}) {
        serde_json::Value::Object(map) => map,
        _ => unreachable!(),
    };
    let notified = handle_request(
        &h.daemon,
        Request::NotifyTopic {
            topic_id: 42,
            name: "chapter-released".into(),
            extra,
        },
    )
    .await;
    assert_eq!(
        notified,
        Response::Notified { recipients: 0 }
    );
    h.daemon.shutdown().await;
}

#[tokio::test]
async fn shutdown_request_is_acknowledged_before_cancelling() {
    let h = harness(10).await;
    let (client, server) = UnixStream::pair().unwrap();

    let (mut reader, mut writer) = client.into_split();
    let data = protocol::encode(&Request::Shutdown).unwrap();
    protocol::write_message(&mut writer, &data).await.unwrap();

    handle_connection(&h.daemon, server).await.unwrap();

    let reply = protocol::read_message(&mut reader).await.unwrap();
    let response: Response = protocol::decode(&reply).unwrap();
    assert_eq!(response, Response::ShuttingDown);
    assert!(h.daemon.shutdown_requested());
    h.daemon.shutdown().await;
}

#[tokio::test]
async fn closed_connection_is_not_an_error() {
    let h = harness(10).await;
    let (client, server) = UnixStream::pair().unwrap();
    drop(client);

    assert!(handle_connection(&h.daemon, server).await.is_ok());
    h.daemon.shutdown().await;
}
