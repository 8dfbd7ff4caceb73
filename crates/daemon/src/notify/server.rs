// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Datagram handling and notification fan-out

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use pw_adapters::{AuthAdapter, AuthError};
use pw_core::config::NotifyConfig;
use pw_core::packet::{
    ConfirmPayload, NotificationPayload, RegisterPayload, UnregisterPayload, MAX_DATAGRAM_SIZE,
};
use pw_core::{Clock, ErrorCode, Packet, PacketType};
use serde_json::{Map, Value};
use tokio::net::UdpSocket;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    send_with_retry, ClientRegistry, DatagramTransport, NotifyError, RegistryFull, RetryPolicy,
};

/// Sends in flight at once during a fan-out
const FANOUT_CONCURRENCY: usize = 64;

/// Datagrams handled at once; the receive loop waits for a slot past this
const MAX_INFLIGHT_DATAGRAMS: usize = 256;

/// Who a fan-out is addressed to, for logging
#[derive(Debug, Clone, Copy)]
enum Audience {
    Topic(i64),
    User(i64),
}

impl Audience {
    fn topic_id(self) -> Option<i64> {
        match self {
            Audience::Topic(topic_id) => Some(topic_id),
            Audience::User(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NotifySettings {
    pub retry: RetryPolicy,
    pub sweep_interval: Duration,
}

impl From<&NotifyConfig> for NotifySettings {
    fn from(config: &NotifyConfig) -> Self {
        Self {
            retry: RetryPolicy {
                attempts: config.send_attempts,
                backoff: config.retry_backoff,
            },
            sweep_interval: config.sweep_interval,
        }
    }
}

/// Outcome of one fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub recipients: usize,
    pub delivered: usize,
    pub failed: usize,
}

pub struct NotifyServer<A, T, C: Clock> {
    registry: ClientRegistry<C>,
    auth: A,
    transport: Arc<T>,
    settings: NotifySettings,
}

impl<A, T, C> NotifyServer<A, T, C>
where
    A: AuthAdapter,
    T: DatagramTransport,
    C: Clock,
{
    pub fn new(
        registry: ClientRegistry<C>,
        auth: A,
        transport: Arc<T>,
        settings: NotifySettings,
    ) -> Self {
        Self {
            registry,
            auth,
            transport,
            settings,
        }
    }

    pub async fn bind(addr: SocketAddr) -> Result<UdpSocket, NotifyError> {
        UdpSocket::bind(addr)
            .await
            .map_err(|source| NotifyError::Bind { addr, source })
    }

    pub fn registry(&self) -> &ClientRegistry<C> {
        &self.registry
    }

    pub fn client_count(&self) -> usize {
        self.registry.len()
    }

    /// Receive datagrams until cancelled, answering each one
    ///
    /// Each datagram is handled on its own task, so a slow token check for
    /// one client never holds up the others. A receive error ends the loop
    /// with `Err` for the caller's supervisor.
    pub async fn serve(
        self: Arc<Self>,
        socket: Arc<UdpSocket>,
        cancel: CancellationToken,
    ) -> Result<(), NotifyError> {
        if let Ok(addr) = socket.local_addr() {
            info!(%addr, "notification server listening");
        }

        let slots = Arc::new(Semaphore::new(MAX_INFLIGHT_DATAGRAMS));
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        loop {
            let (len, from) = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                received = socket.recv_from(&mut buf) => received.map_err(NotifyError::Receive)?,
            };

            let permit = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                permit = Arc::clone(&slots).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return Ok(()),
                },
            };
            let datagram = buf[..len].to_vec();
            let server = Arc::clone(&self);
            let socket = Arc::clone(&socket);
            tokio::spawn(async move {
                server.answer(&socket, &datagram, from).await;
                drop(permit);
            });
        }
    }

    async fn answer(&self, socket: &UdpSocket, datagram: &[u8], from: SocketAddr) {
        let reply = self.handle_datagram(datagram, from).await;
        let bytes = match reply.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(%from, error = %e, "failed to encode reply");
                return;
            }
        };
        if let Err(e) = send_with_retry(socket, from, &bytes, self.settings.retry).await {
            warn!(%from, error = %e, "failed to send reply");
        }
    }

    /// Handle one inbound datagram and return the reply
    ///
    /// Every datagram is answered with either `confirm` or `error`.
    pub async fn handle_datagram(&self, bytes: &[u8], from: SocketAddr) -> Packet {
        let packet = match Packet::decode(bytes) {
            Ok(packet) => packet,
            Err(e) => {
                debug!(%from, error = %e, "rejecting datagram");
                return Packet::error(ErrorCode::for_codec_error(&e), e.to_string());
            }
        };

        let result = match packet.kind {
            PacketType::Register => match packet.payload_as::<RegisterPayload>() {
                Ok(payload) => self.register(payload, from).await,
                Err(e) => Err(Packet::error(ErrorCode::InvalidPayload, e.to_string())),
            },
            PacketType::Unregister => match packet.payload_as::<UnregisterPayload>() {
                Ok(payload) => self.unregister(payload, from).await,
                Err(e) => Err(Packet::error(ErrorCode::InvalidPayload, e.to_string())),
            },
            other => Err(Packet::error(
                ErrorCode::UnknownType,
                format!("{other} is not accepted by the notification server"),
            )),
        };

        result.unwrap_or_else(|error| error)
    }

    async fn register(&self, payload: RegisterPayload, from: SocketAddr) -> Result<Packet, Packet> {
        let user_id = match self
            .resolve_user(payload.user_id, payload.token.as_deref())
            .await?
        {
            Some(user_id) => user_id,
            None => {
                return Err(Packet::error(
                    ErrorCode::InvalidPayload,
                    "register requires userID or token",
                ))
            }
        };

        let mut topic_ids = payload.topic_ids;
        topic_ids.sort_unstable();
        topic_ids.dedup();

        match self.registry.register(
            from,
            user_id,
            topic_ids.iter().copied(),
            payload.all_topics,
            payload.device_id,
        ) {
            Ok(outcome) => {
                debug!(%from, user_id, ?outcome, topics = topic_ids.len(), all_topics = payload.all_topics, "client registered");
            }
            Err(RegistryFull { max_clients }) => {
                warn!(%from, user_id, max_clients, "registration refused, server at capacity");
                return Err(Packet::error(
                    ErrorCode::ServerCapacity,
                    format!("server is at capacity ({max_clients} clients)"),
                ));
            }
        }

        confirm(ConfirmPayload {
            action: "registered".to_string(),
            user_id: Some(user_id),
            topic_ids,
            all_topics: payload.all_topics,
            removed: 0,
        })
    }

    async fn unregister(
        &self,
        payload: UnregisterPayload,
        from: SocketAddr,
    ) -> Result<Packet, Packet> {
        let user_id = self
            .resolve_user(payload.user_id, payload.token.as_deref())
            .await?;

        let removed = match user_id {
            Some(user_id) => usize::from(self.registry.unregister(from, user_id)),
            None => self.registry.unregister_address(from),
        };
        debug!(%from, ?user_id, removed, "client unregistered");

        confirm(ConfirmPayload {
            action: "unregistered".to_string(),
            user_id,
            topic_ids: Vec::new(),
            all_topics: false,
            removed,
        })
    }

    /// A token, when present, wins over a bare userID
    async fn resolve_user(
        &self,
        user_id: Option<i64>,
        token: Option<&str>,
    ) -> Result<Option<i64>, Packet> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Ok(user_id);
        };
        match self.auth.validate_token(token).await {
            Ok(user_id) => Ok(Some(user_id)),
            Err(AuthError::InvalidToken) => {
                Err(Packet::error(ErrorCode::Unauthorized, "invalid token"))
            }
            Err(e) => {
                warn!(error = %e, "token validation unavailable");
                Err(Packet::error(
                    ErrorCode::Unauthorized,
                    "authentication unavailable",
                ))
            }
        }
    }

    /// Notify every client following `topic_id` or all topics
    pub async fn notify_topic(
        &self,
        topic_id: i64,
        name: &str,
        extra: Map<String, Value>,
    ) -> FanoutReport {
        let recipients = self.registry.topic_recipients(topic_id);
        self.deliver(Audience::Topic(topic_id), recipients, name, extra)
            .await
    }

    /// Notify every registered device of one user
    pub async fn notify_user(
        &self,
        user_id: i64,
        name: &str,
        extra: Map<String, Value>,
    ) -> FanoutReport {
        let recipients = self.registry.user_recipients(user_id);
        self.deliver(Audience::User(user_id), recipients, name, extra)
            .await
    }

    /// Snapshot a topic's recipients and deliver in the background
    ///
    /// Returns the recipient count; the outcome is only logged.
    pub fn spawn_notify_topic(
        self: &Arc<Self>,
        topic_id: i64,
        name: String,
        extra: Map<String, Value>,
    ) -> usize {
        let recipients = self.registry.topic_recipients(topic_id);
        self.spawn_delivery(Audience::Topic(topic_id), recipients, name, extra)
    }

    /// Snapshot a user's devices and deliver in the background
    pub fn spawn_notify_user(
        self: &Arc<Self>,
        user_id: i64,
        name: String,
        extra: Map<String, Value>,
    ) -> usize {
        let recipients = self.registry.user_recipients(user_id);
        self.spawn_delivery(Audience::User(user_id), recipients, name, extra)
    }

    fn spawn_delivery(
        self: &Arc<Self>,
        audience: Audience,
        recipients: Vec<SocketAddr>,
        name: String,
        extra: Map<String, Value>,
    ) -> usize {
        let count = recipients.len();
        let server = Arc::clone(self);
        tokio::spawn(async move {
            server.deliver(audience, recipients, &name, extra).await;
        });
        count
    }

    async fn deliver(
        &self,
        audience: Audience,
        recipients: Vec<SocketAddr>,
        name: &str,
        extra: Map<String, Value>,
    ) -> FanoutReport {
        let report = self.fan_out(recipients, audience.topic_id(), name, extra).await;
        match audience {
            Audience::Topic(topic_id) => info!(
                topic_id,
                name,
                recipients = report.recipients,
                delivered = report.delivered,
                failed = report.failed,
                "topic notification sent"
            ),
            Audience::User(user_id) => info!(
                user_id,
                name,
                recipients = report.recipients,
                delivered = report.delivered,
                failed = report.failed,
                "user notification sent"
            ),
        }
        report
    }

    async fn fan_out(
        &self,
        recipients: Vec<SocketAddr>,
        topic_id: Option<i64>,
        name: &str,
        extra: Map<String, Value>,
    ) -> FanoutReport {
        let mut report = FanoutReport {
            recipients: recipients.len(),
            ..FanoutReport::default()
        };
        if recipients.is_empty() {
            return report;
        }

        let payload = NotificationPayload {
            topic_id,
            name: name.to_string(),
            extra,
            sent_at: self.registry.clock().utc_now(),
        };
        let bytes = match Packet::new(PacketType::Notification, &payload).and_then(|p| p.encode())
        {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(name, error = %e, "failed to encode notification");
                report.failed = report.recipients;
                return report;
            }
        };

        let transport = &*self.transport;
        let policy = self.settings.retry;
        let bytes = &bytes;
        let results: Vec<_> = stream::iter(recipients)
            .map(|addr| async move { send_with_retry(transport, addr, bytes, policy).await })
            .buffer_unordered(FANOUT_CONCURRENCY)
            .collect()
            .await;

        for result in results {
            match result {
                Ok(_) => report.delivered += 1,
                Err(e) => {
                    warn!(error = %e, "notification not delivered");
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Periodically evict stale clients until cancelled
    pub async fn sweep_loop(self: Arc<Self>, cancel: CancellationToken) {
        let period = self.settings.sweep_interval;
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let evicted = self.registry.sweep(self.registry.clock().now());
                    for key in &evicted {
                        debug!(client = %key, "evicted stale client");
                    }
                }
            }
        }
        debug!("sweep loop stopped");
    }
}

fn confirm(payload: ConfirmPayload) -> Result<Packet, Packet> {
    Packet::new(PacketType::Confirm, &payload)
        .map_err(|e| Packet::error(ErrorCode::InvalidPacket, e.to_string()))
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
