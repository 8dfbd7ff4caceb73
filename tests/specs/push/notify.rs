// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Content-release notifications over UDP

use std::time::Duration;

use crate::prelude::*;
use pw_core::packet::{NotificationPayload, RegisterPayload, UnregisterPayload};
use pw_core::{Packet, PacketType};
use pw_daemon::{Request, Response};

fn subscribe(user_id: i64, topics: &[i64], all_topics: bool) -> RegisterPayload {
    RegisterPayload {
        user_id: Some(user_id),
        topic_ids: topics.to_vec(),
        all_topics,
        ..Default::default()
    }
}

fn notified(recipients: usize) -> Response {
    Response::Notified { recipients }
}

#[tokio::test]
async fn topic_release_reaches_topic_and_all_topic_subscribers() {
    let h = Harness::start().await;
    let follower = h.listen(subscribe(ALICE, &[42], false)).await;
    let everything = h.listen(subscribe(BOB_ID, &[], true)).await;
    let elsewhere = h.listen(subscribe(9, &[7], false)).await;

    let mut extra = serde_json::Map::new();
    extra.insert("chapter".into(), json!(1100));
    let response = h
        .control(Request::NotifyTopic {
            topic_id: 42,
            name: "chapter-released".into(),
            extra,
        })
        .await;
    assert_eq!(response, notified(2));

    for socket in [&follower, &everything] {
        let packet = recv_datagram(socket).await.unwrap();
        assert_eq!(packet.kind, PacketType::Notification);
        let notification: NotificationPayload = packet.payload_as().unwrap();
        assert_eq!(notification.topic_id, Some(42));
        assert_eq!(notification.name, "chapter-released");
        assert_eq!(notification.extra.get("chapter"), Some(&json!(1100)));
    }
    assert!(recv_datagram_within(&elsewhere, Duration::from_millis(200))
        .await
        .is_none());

    h.stop().await;
}

#[tokio::test]
async fn user_notification_reaches_each_registered_device() {
    let h = Harness::start().await;
    let phone = h.listen(subscribe(ALICE, &[], false)).await;
    let tablet = h
        .listen(RegisterPayload {
            token: Some(ALICE_TABLET.into()),
            ..Default::default()
        })
        .await;

    let response = h
        .control(Request::NotifyUser {
            user_id: ALICE,
            name: "library-updated".into(),
            extra: Default::default(),
        })
        .await;
    assert_eq!(response, notified(2));

    for socket in [&phone, &tablet] {
        let notification: NotificationPayload =
            recv_datagram(socket).await.unwrap().payload_as().unwrap();
        assert_eq!(notification.topic_id, None);
    }

    h.stop().await;
}

#[tokio::test]
async fn unregistered_client_stops_receiving() {
    let h = Harness::start().await;
    let socket = h.listen(subscribe(ALICE, &[42], false)).await;

    let unregister = Packet::new(
        PacketType::Unregister,
        &UnregisterPayload {
            user_id: Some(ALICE),
            token: None,
        },
    )
    .unwrap();
    socket
        .send_to(&unregister.encode().unwrap(), h.daemon.notify_addr)
        .await
        .unwrap();
    assert_eq!(
        recv_datagram(&socket).await.unwrap().kind,
        PacketType::Confirm
    );

    let response = h
        .control(Request::NotifyTopic {
            topic_id: 42,
            name: "chapter-released".into(),
            extra: Default::default(),
        })
        .await;
    assert_eq!(response, notified(0));

    h.stop().await;
}

#[tokio::test]
async fn registrations_beyond_capacity_are_refused() {
    let h = Harness::with_config(|c| c.notify.max_clients = 1).await;
    let _first = h.listen(subscribe(ALICE, &[], true)).await;

    let second = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let packet = Packet::new(PacketType::Register, &subscribe(BOB_ID, &[], true)).unwrap();
    second
        .send_to(&packet.encode().unwrap(), h.daemon.notify_addr)
        .await
        .unwrap();

    let reply = recv_datagram(&second).await.unwrap();
    assert_eq!(reply.kind, PacketType::Error);
    assert_eq!(reply.payload["code"], json!("server_capacity"));
    assert_eq!(h.daemon.notify.client_count(), 1);

    h.stop().await;
}
