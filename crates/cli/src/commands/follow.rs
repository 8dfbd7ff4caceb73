// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `pw follow` - Authenticate with the broadcast server and print progress pushes

use std::fmt;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use futures_util::{SinkExt, Stream, StreamExt};
use pw_core::packet::{AuthPayload, AuthResponsePayload, ErrorPayload, ProgressPayload};
use pw_core::{Packet, PacketType};
use serde::Serialize;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};

use crate::client::timeout_ipc;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct FollowArgs {
    /// Broadcast server URL (e.g. ws://127.0.0.1:9000)
    #[arg(long)]
    pub server: String,

    /// Session token to authenticate with
    #[arg(long)]
    pub token: String,
}

/// A received progress update, as printed
#[derive(Debug, Serialize)]
pub struct ProgressView {
    #[serde(flatten)]
    pub progress: ProgressPayload,
}

impl fmt::Display for ProgressView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = &self.progress;
        write!(f, "entity {} at {}", p.entity_id, p.position)?;
        if let Some(sub) = p.sub_position_id {
            write!(f, " (sub {sub})")?;
        }
        write!(f, " [{}]", p.updated_at.to_rfc3339())
    }
}

/// Read frames until one decodes as a packet
pub async fn next_packet<S>(frames: &mut S) -> Result<Option<Packet>>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(frame) = frames.next().await {
        let bytes = match frame? {
            Message::Text(text) => text.as_bytes().to_vec(),
            Message::Binary(data) => data.to_vec(),
            Message::Close(_) => return Ok(None),
            _ => continue,
        };
        match Packet::decode(&bytes) {
            Ok(packet) => return Ok(Some(packet)),
            Err(e) => eprintln!("ignoring bad frame: {e}"),
        }
    }
    Ok(None)
}

/// Wait for the server's answer to our auth packet
pub async fn await_auth<S>(frames: &mut S, timeout: Duration) -> Result<i64>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    let packet = tokio::time::timeout(timeout, next_packet(frames))
        .await
        .context("no auth response from broadcast server")??
        .context("connection closed before authentication")?;
    match packet.kind {
        PacketType::AuthResponse => {
            let response: AuthResponsePayload = packet.payload_as()?;
            match (response.success, response.user_id) {
                (true, Some(user_id)) => Ok(user_id),
                _ => bail!("authentication failed"),
            }
        }
        PacketType::Error => {
            let error: ErrorPayload = packet.payload_as()?;
            bail!("server refused: {} ({})", error.message, error.code)
        }
        other => bail!("unexpected {} packet before authentication", other.as_str()),
    }
}

pub async fn handle(args: FollowArgs, format: OutputFormat) -> Result<()> {
    let (ws, _) = connect_async(args.server.as_str())
        .await
        .with_context(|| format!("failed to connect to {}", args.server))?;
    let (mut sink, mut frames) = ws.split();

    let auth = Packet::new(
        PacketType::Auth,
        &AuthPayload {
            token: args.token.clone(),
        },
    )?;
    sink.send(Message::text(auth.to_text()?)).await?;
    let user_id = await_auth(&mut frames, timeout_ipc()).await?;
    eprintln!("Following progress for user {user_id}");

    loop {
        tokio::select! {
            packet = next_packet(&mut frames) => {
                let Some(packet) = packet? else {
                    eprintln!("Connection closed by server");
                    break;
                };
                match packet.kind {
                    PacketType::Progress => {
                        let progress = packet.payload_as()?;
                        output::print(&ProgressView { progress }, format);
                    }
                    PacketType::Error => eprintln!("server error: {}", packet.error),
                    _ => {}
                }
            }

            _ = tokio::signal::ctrl_c() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "follow_tests.rs"]
mod tests;
