// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reading progress pushed over WebSocket

use std::time::Duration;

use crate::prelude::*;
use futures_util::SinkExt;
use pw_core::packet::ProgressPayload;
use pw_core::{Packet, PacketType};
use pw_daemon::{Request, Response};
use tokio_tungstenite::tungstenite::Message;

#[tokio::test]
async fn progress_reaches_every_device_of_the_user_only() {
    let h = Harness::start().await;
    let mut phone = h.follow(ALICE_PHONE).await;
    let mut tablet = h.follow(ALICE_TABLET).await;
    let mut bob = h.follow(BOB).await;

    let response = h
        .control(Request::BroadcastProgress {
            user_id: ALICE,
            entity_id: 55,
            position: 10.5,
            sub_position_id: Some(3),
        })
        .await;
    assert_eq!(response, Response::Broadcast { delivered: 2 });

    for ws in [&mut phone, &mut tablet] {
        let progress: ProgressPayload = next_packet(ws, PacketType::Progress)
            .await
            .payload_as()
            .unwrap();
        assert_eq!(progress.user_id, ALICE);
        assert_eq!(progress.entity_id, 55);
        assert_eq!(progress.position, 10.5);
        assert_eq!(progress.sub_position_id, Some(3));
    }
    assert!(!receives(&mut bob, PacketType::Progress, Duration::from_millis(200)).await);

    h.stop().await;
}

#[tokio::test]
async fn device_progress_is_relayed_to_the_other_devices() {
    let h = Harness::start().await;
    let mut phone = h.follow(ALICE_PHONE).await;
    let mut tablet = h.follow(ALICE_TABLET).await;

    // Claims to be bob; relayed as the authenticated user
    let update = Packet::new(
        PacketType::Progress,
        &json!({"userID": BOB_ID, "entityID": 12, "position": 4.0, "updatedAt": "2026-01-01T00:00:00Z"}),
    )
    .unwrap();
    phone
        .send(Message::text(update.to_text().unwrap()))
        .await
        .unwrap();

    let relayed: ProgressPayload = next_packet(&mut tablet, PacketType::Progress)
        .await
        .payload_as()
        .unwrap();
    assert_eq!(relayed.user_id, ALICE);
    assert_eq!(relayed.entity_id, 12);
    assert!(!receives(&mut phone, PacketType::Progress, Duration::from_millis(200)).await);

    h.stop().await;
}

#[tokio::test]
async fn unknown_token_is_refused() {
    let h = Harness::start().await;
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}", h.daemon.broadcast_addr))
        .await
        .unwrap();
    let auth = Packet::new(PacketType::Auth, &json!({"token": "forged"})).unwrap();
    ws.send(Message::text(auth.to_text().unwrap())).await.unwrap();

    let reply = next_packet(&mut ws, PacketType::AuthResponse).await;
    assert_eq!(reply.payload["success"], json!(false));

    h.stop().await;
}

#[tokio::test]
async fn disconnected_devices_leave_the_peer_count() {
    let h = Harness::start().await;
    let phone = h.follow(ALICE_PHONE).await;
    assert_eq!(h.daemon.hub.peer_count(), 1);

    drop(phone);

    let hub = std::sync::Arc::clone(&h.daemon.hub);
    wait_for("peer removal", || hub.peer_count() == 0).await;
    h.stop().await;
}
