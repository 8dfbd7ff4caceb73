// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control socket status and shutdown

use crate::prelude::*;
use pw_core::packet::RegisterPayload;
use pw_daemon::protocol::PROTOCOL_VERSION;
use pw_daemon::{Request, Response};

#[tokio::test]
async fn hello_reports_the_daemon_version() {
    let h = Harness::start().await;

    let response = h
        .control(Request::Hello {
            version: "0.0.0".into(),
        })
        .await;

    assert_eq!(
        response,
        Response::Hello {
            version: PROTOCOL_VERSION.to_string()
        }
    );
    h.stop().await;
}

#[tokio::test]
async fn status_counts_connected_peers_and_clients() {
    let h = Harness::start().await;
    let _ws = h.follow(ALICE_PHONE).await;
    let _udp = h
        .listen(RegisterPayload {
            user_id: Some(BOB_ID),
            all_topics: true,
            ..Default::default()
        })
        .await;

    match h.control(Request::Status).await {
        Response::Status {
            healthy,
            queue_len,
            peers,
            clients,
            ..
        } => {
            assert!(healthy);
            assert_eq!(queue_len, 0);
            assert_eq!(peers, 1);
            assert_eq!(clients, 1);
        }
        other => panic!("unexpected {other:?}"),
    }
    h.stop().await;
}

#[tokio::test]
async fn shutdown_is_acknowledged_then_stops_the_daemon() {
    let h = Harness::start().await;
    let socket = h.daemon.config.daemon.control_socket.clone();

    assert_eq!(h.control(Request::Shutdown).await, Response::ShuttingDown);

    let daemon = std::sync::Arc::clone(&h.daemon);
    wait_for("shutdown request", || daemon.shutdown_requested()).await;
    h.stop().await;
    assert!(!socket.exists());
}
