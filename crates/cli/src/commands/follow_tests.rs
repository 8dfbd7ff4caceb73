// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;
use futures_util::stream;
use pw_core::ErrorCode;

type Frames = stream::Iter<std::vec::IntoIter<Result<Message, tungstenite::Error>>>;

fn frames(packets: Vec<Message>) -> Frames {
    stream::iter(packets.into_iter().map(Ok).collect::<Vec<_>>())
}

fn text(packet: &Packet) -> Message {
    Message::text(packet.to_text().unwrap())
}

fn auth_response(success: bool, user_id: Option<i64>) -> Message {
    text(&Packet::new(PacketType::AuthResponse, &AuthResponsePayload { success, user_id }).unwrap())
}

#[tokio::test]
async fn successful_auth_yields_user() {
    let mut frames = frames(vec![auth_response(true, Some(7))]);
    assert_eq!(await_auth(&mut frames, Duration::from_secs(1)).await.unwrap(), 7);
}

#[tokio::test]
async fn rejected_auth_fails() {
    let mut frames = frames(vec![auth_response(false, None)]);
    let err = await_auth(&mut frames, Duration::from_secs(1)).await.unwrap_err();
    assert!(err.to_string().contains("authentication failed"), "{err}");
}

#[tokio::test]
async fn auth_timeout_error_packet_is_reported() {
    let mut frames = frames(vec![text(&Packet::error(
        ErrorCode::AuthTimeout,
        "authentication timed out",
    ))]);
    let err = await_auth(&mut frames, Duration::from_secs(1)).await.unwrap_err();
    assert!(err.to_string().contains("auth_timeout"), "{err}");
}

#[tokio::test]
async fn bad_frames_and_pings_are_skipped() {
    let mut frames = frames(vec![
        Message::text("not json"),
        Message::Ping(Default::default()),
        auth_response(true, Some(3)),
    ]);
    assert_eq!(await_auth(&mut frames, Duration::from_secs(1)).await.unwrap(), 3);
}

#[tokio::test]
async fn close_before_auth_is_an_error() {
    let mut frames = frames(vec![Message::Close(None)]);
    assert!(await_auth(&mut frames, Duration::from_secs(1)).await.is_err());
}

#[test]
fn progress_renders_position_and_sub_position() {
    let view = ProgressView {
        progress: ProgressPayload {
            user_id: 1,
            entity_id: 55,
            position: 10.5,
            sub_position_id: Some(3),
            updated_at: chrono::Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
        },
    };

    assert_eq!(
        view.to_string(),
        "entity 55 at 10.5 (sub 3) [2026-01-02T03:04:05+00:00]"
    );
}
