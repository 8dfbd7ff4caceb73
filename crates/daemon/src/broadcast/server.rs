// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket accept loop and per-connection sessions

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use pw_adapters::{AuthAdapter, AuthError};
use pw_core::config::BroadcastConfig;
use pw_core::packet::{AuthPayload, AuthResponsePayload, ProgressPayload};
use pw_core::{ErrorCode, IdGen, Packet, PacketType};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{BroadcastError, BroadcastHub};

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

#[derive(Debug, Clone, Copy)]
pub struct BroadcastSettings {
    /// Time allowed for the WebSocket upgrade plus the `auth` packet
    pub auth_timeout: Duration,
    pub heartbeat_interval: Duration,
}

impl From<&BroadcastConfig> for BroadcastSettings {
    fn from(config: &BroadcastConfig) -> Self {
        Self {
            auth_timeout: config.auth_timeout,
            heartbeat_interval: config.heartbeat_interval,
        }
    }
}

/// Per-connection state
struct Session {
    conn_id: String,
    user_id: Option<i64>,
}

pub struct BroadcastServer<A, I> {
    hub: Arc<BroadcastHub>,
    auth: A,
    id_gen: I,
    settings: BroadcastSettings,
}

impl<A: AuthAdapter, I: IdGen> BroadcastServer<A, I> {
    pub fn new(hub: Arc<BroadcastHub>, auth: A, id_gen: I, settings: BroadcastSettings) -> Self {
        Self {
            hub,
            auth,
            id_gen,
            settings,
        }
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub async fn bind(addr: SocketAddr) -> Result<TcpListener, BroadcastError> {
        TcpListener::bind(addr)
            .await
            .map_err(|source| BroadcastError::Bind { addr, source })
    }

    /// Accept connections until cancelled
    ///
    /// An accept error ends the loop with `Err` so the caller's supervisor
    /// can rebind after its backoff.
    pub async fn serve(
        self: Arc<Self>,
        listener: TcpListener,
        cancel: CancellationToken,
    ) -> Result<(), BroadcastError> {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "broadcast server listening");
        }

        loop {
            let (stream, peer_addr) = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                accepted = listener.accept() => accepted.map_err(BroadcastError::Accept)?,
            };

            let server = Arc::clone(&self);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                server.handle_connection(stream, peer_addr, cancel).await;
            });
        }
    }

    async fn handle_connection(
        self: Arc<Self>,
        stream: TcpStream,
        peer_addr: SocketAddr,
        cancel: CancellationToken,
    ) {
        let ws = match tokio::time::timeout(
            self.settings.auth_timeout,
            tokio_tungstenite::accept_async(stream),
        )
        .await
        {
            Ok(Ok(ws)) => ws,
            Ok(Err(e)) => {
                debug!(%peer_addr, error = %e, "websocket upgrade failed");
                return;
            }
            Err(_) => {
                debug!(%peer_addr, "websocket upgrade timed out");
                return;
            }
        };

        let mut session = Session {
            conn_id: self.id_gen.next(),
            user_id: None,
        };
        let mut outbox = self.hub.register(&session.conn_id);
        debug!(conn_id = %session.conn_id, %peer_addr, "peer connected");

        let (mut sink, mut frames) = ws.split();
        let auth_deadline = tokio::time::sleep(self.settings.auth_timeout);
        tokio::pin!(auth_deadline);
        let period = self.settings.heartbeat_interval;
        let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);

        loop {
            let outgoing = tokio::select! {
                _ = cancel.cancelled() => break,
                _ = &mut auth_deadline, if session.user_id.is_none() => {
                    let timeout = Packet::error(ErrorCode::AuthTimeout, "authentication timed out");
                    let _ = send(&mut sink, &timeout).await;
                    debug!(conn_id = %session.conn_id, "closing unauthenticated peer");
                    break;
                }
                Some(packet) = outbox.recv() => Some(packet),
                _ = heartbeat.tick() => Some(Packet::bare(PacketType::Heartbeat)),
                frame = frames.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.handle_frame(&mut session, text.as_bytes()).await,
                    Some(Ok(Message::Binary(data))) => self.handle_frame(&mut session, &data).await,
                    Some(Ok(Message::Close(_))) | None => break,
                    // Ping/pong are answered by tungstenite itself
                    Some(Ok(_)) => None,
                    Some(Err(e)) => {
                        debug!(conn_id = %session.conn_id, error = %e, "read failed");
                        break;
                    }
                },
            };

            if let Some(packet) = outgoing {
                if let Err(e) = send(&mut sink, &packet).await {
                    debug!(conn_id = %session.conn_id, error = %e, "write failed, dropping peer");
                    break;
                }
            }
        }

        self.hub.unregister(&session.conn_id);
        let _ = sink.close().await;
        debug!(conn_id = %session.conn_id, user_id = ?session.user_id, "peer disconnected");
    }

    /// Handle one inbound frame, returning the reply to send (if any)
    async fn handle_frame(&self, session: &mut Session, bytes: &[u8]) -> Option<Packet> {
        let packet = match Packet::decode(bytes) {
            Ok(packet) => packet,
            Err(e) => return Some(Packet::error(ErrorCode::for_codec_error(&e), e.to_string())),
        };

        match packet.kind {
            PacketType::Auth => Some(self.authenticate(session, &packet).await),
            PacketType::Heartbeat => Some(Packet::bare(PacketType::Heartbeat)),
            PacketType::Progress => self.relay_progress(session, &packet),
            other => Some(Packet::error(
                ErrorCode::UnknownType,
                format!("{other} is not accepted on this connection"),
            )),
        }
    }

    async fn authenticate(&self, session: &mut Session, packet: &Packet) -> Packet {
        let auth: AuthPayload = match packet.payload_as() {
            Ok(auth) => auth,
            Err(e) => return Packet::error(ErrorCode::InvalidPayload, e.to_string()),
        };

        let (success, user_id) = match self.auth.validate_token(&auth.token).await {
            Ok(user_id) => {
                self.hub.authenticate(&session.conn_id, user_id);
                session.user_id = Some(user_id);
                info!(conn_id = %session.conn_id, user_id, "peer authenticated");
                (true, Some(user_id))
            }
            Err(AuthError::InvalidToken) => (false, None),
            Err(e) => {
                warn!(conn_id = %session.conn_id, error = %e, "token validation unavailable");
                return Packet::error(ErrorCode::Unauthorized, "authentication unavailable");
            }
        };

        Packet::new(
            PacketType::AuthResponse,
            &AuthResponsePayload { success, user_id },
        )
        .unwrap_or_else(|e| Packet::error(ErrorCode::InvalidPacket, e.to_string()))
    }

    /// Forward a device's progress to the same user's other devices
    fn relay_progress(&self, session: &Session, packet: &Packet) -> Option<Packet> {
        let Some(user_id) = session.user_id else {
            return Some(Packet::error(
                ErrorCode::NotAuthenticated,
                "authenticate before sending progress",
            ));
        };
        let mut progress: ProgressPayload = match packet.payload_as() {
            Ok(progress) => progress,
            Err(e) => return Some(Packet::error(ErrorCode::InvalidPayload, e.to_string())),
        };
        // A peer only ever speaks for its own user
        progress.user_id = user_id;

        match Packet::new(PacketType::Progress, &progress) {
            Ok(relay) => {
                self.hub
                    .send_to_user_except(user_id, &relay, Some(&session.conn_id));
                None
            }
            Err(e) => Some(Packet::error(ErrorCode::InvalidPayload, e.to_string())),
        }
    }
}

async fn send(sink: &mut WsSink, packet: &Packet) -> Result<(), BroadcastError> {
    let text = packet.to_text()?;
    sink.send(Message::text(text)).await?;
    Ok(())
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
