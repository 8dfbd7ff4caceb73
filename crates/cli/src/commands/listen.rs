// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `pw listen` - Register with the notification server and print what arrives

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use pw_core::packet::{
    ConfirmPayload, ErrorPayload, NotificationPayload, RegisterPayload, UnregisterPayload,
    MAX_DATAGRAM_SIZE,
};
use pw_core::{Packet, PacketType};
use serde::Serialize;
use tokio::net::UdpSocket;

use crate::client::timeout_ipc;
use crate::output::{self, OutputFormat};

#[derive(Args)]
#[command(group(clap::ArgGroup::new("identity").required(true).args(["user", "token"])))]
pub struct ListenArgs {
    /// Notification server address (host:port)
    #[arg(long)]
    pub server: SocketAddr,

    /// Register as this user
    #[arg(long)]
    pub user: Option<i64>,

    /// Register with a session token
    #[arg(long)]
    pub token: Option<String>,

    /// Topic to subscribe to (repeatable)
    #[arg(long = "topic")]
    pub topics: Vec<i64>,

    /// Subscribe to every topic
    #[arg(long)]
    pub all: bool,

    /// Device label reported to the server
    #[arg(long)]
    pub device: Option<String>,

    /// Seconds between re-registrations, which keep the entry from going stale
    #[arg(long, default_value_t = 300)]
    pub refresh_secs: u64,
}

impl ListenArgs {
    pub fn register_payload(&self) -> RegisterPayload {
        RegisterPayload {
            user_id: self.user,
            token: self.token.clone(),
            topic_ids: self.topics.clone(),
            all_topics: self.all,
            device_id: self.device.clone(),
        }
    }

    fn unregister_payload(&self) -> UnregisterPayload {
        UnregisterPayload {
            user_id: self.user,
            token: self.token.clone(),
        }
    }
}

/// A received notification, as printed
#[derive(Debug, Serialize)]
pub struct NotificationView {
    #[serde(flatten)]
    pub notification: NotificationPayload,
}

impl fmt::Display for NotificationView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = &self.notification;
        match n.topic_id {
            Some(topic) => write!(f, "[topic {topic}] {}", n.name)?,
            None => write!(f, "[direct] {}", n.name)?,
        }
        if !n.extra.is_empty() {
            write!(f, " {}", serde_json::Value::Object(n.extra.clone()))?;
        }
        Ok(())
    }
}

/// Turn a server reply into a confirmation or the server's error message
pub fn expect_confirm(packet: &Packet) -> Result<ConfirmPayload> {
    match packet.kind {
        PacketType::Confirm => Ok(packet.payload_as()?),
        PacketType::Error => {
            let error: ErrorPayload = packet.payload_as()?;
            bail!("server refused: {} ({})", error.message, error.code)
        }
        other => bail!("unexpected {} packet", other.as_str()),
    }
}

/// Send `packet` and wait for the server's answer
pub async fn request(
    socket: &UdpSocket,
    server: SocketAddr,
    packet: &Packet,
    timeout: Duration,
) -> Result<Packet> {
    socket.send_to(&packet.encode()?, server).await?;
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    loop {
        let (n, from) = tokio::time::timeout(timeout, socket.recv_from(&mut buf))
            .await
            .context("no reply from notification server")??;
        if from == server {
            return Ok(Packet::decode(&buf[..n])?);
        }
    }
}

pub async fn handle(args: ListenArgs, format: OutputFormat) -> Result<()> {
    let local: SocketAddr = if args.server.is_ipv4() {
        ([0, 0, 0, 0], 0).into()
    } else {
        ([0u16; 8], 0).into()
    };
    let socket = UdpSocket::bind(local).await?;
    let register = Packet::new(PacketType::Register, &args.register_payload())?;

    let reply = request(&socket, args.server, &register, timeout_ipc()).await?;
    let confirm = expect_confirm(&reply)?;
    eprintln!(
        "Registered as user {} (topics: {:?}, all: {})",
        confirm.user_id.unwrap_or_default(),
        confirm.topic_ids,
        confirm.all_topics
    );

    let mut refresh = tokio::time::interval(Duration::from_secs(args.refresh_secs.max(1)));
    refresh.tick().await;
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

    loop {
        tokio::select! {
            received = socket.recv_from(&mut buf) => {
                let (n, from) = received?;
                if from != args.server {
                    continue;
                }
                let packet = match Packet::decode(&buf[..n]) {
                    Ok(p) => p,
                    Err(e) => {
                        eprintln!("ignoring bad datagram: {e}");
                        continue;
                    }
                };
                match packet.kind {
                    PacketType::Notification => {
                        let notification = packet.payload_as()?;
                        output::print(&NotificationView { notification }, format);
                    }
                    PacketType::Error => eprintln!("server error: {}", packet.error),
                    _ => {}
                }
            }

            _ = refresh.tick() => {
                socket.send_to(&register.encode()?, args.server).await?;
            }

            _ = tokio::signal::ctrl_c() => break,
        }
    }

    let unregister = Packet::new(PacketType::Unregister, &args.unregister_payload())?;
    if let Err(e) = socket.send_to(&unregister.encode()?, args.server).await {
        eprintln!("failed to unregister: {e}");
    }
    Ok(())
}

#[cfg(test)]
#[path = "listen_tests.rs"]
mod tests;
