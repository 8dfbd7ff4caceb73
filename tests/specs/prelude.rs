// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness for the daemon specs

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pw_adapters::{FakeAuthAdapter, FakeDatastoreAdapter, FakeMutationAdapter};
use pw_core::packet::{AuthPayload, RegisterPayload};
use pw_core::{Config, OperationKind, Packet, PacketType};
use pw_daemon::protocol;
use pw_daemon::{server, startup_with, Adapters, DaemonState, Request, Response};
use tempfile::TempDir;
use tokio::net::{TcpStream, UdpSocket, UnixStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub use serde_json::json;

pub type TestDaemon = DaemonState<FakeMutationAdapter, FakeDatastoreAdapter, FakeAuthAdapter>;
pub type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const WAIT: Duration = Duration::from_secs(3);

/// Tokens known to the fake auth service
pub const ALICE_PHONE: &str = "alice-phone";
pub const ALICE_TABLET: &str = "alice-tablet";
pub const BOB: &str = "bob";
pub const ALICE: i64 = 7;
pub const BOB_ID: i64 = 8;

pub struct Harness {
    pub daemon: Arc<TestDaemon>,
    pub mutations: FakeMutationAdapter,
    pub datastore: FakeDatastoreAdapter,
    accept: JoinHandle<()>,
    _dir: TempDir,
}

impl Harness {
    pub async fn start() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Timers are stretched so specs drive health checks and drains themselves
    pub async fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.broadcast.listen_addr = "127.0.0.1:0".parse().unwrap();
        config.notify.listen_addr = "127.0.0.1:0".parse().unwrap();
        config.daemon.control_socket = dir.path().join("control.sock");
        config.health.check_interval = Duration::from_secs(3600);
        config.queue.drain_interval = Duration::from_secs(3600);
        adjust(&mut config);

        let mutations = FakeMutationAdapter::new();
        let datastore = FakeDatastoreAdapter::new();
        let auth = FakeAuthAdapter::new()
            .with_token(ALICE_PHONE, ALICE)
            .with_token(ALICE_TABLET, ALICE)
            .with_token(BOB, BOB_ID);

        let daemon = Arc::new(
            startup_with(
                &config,
                Adapters {
                    mutations: mutations.clone(),
                    datastore: datastore.clone(),
                    auth,
                },
            )
            .await
            .unwrap(),
        );

        // The check loop probes once on start; let that land before specs probe
        let probe = datastore.clone();
        wait_for("first health check", || probe.pings() > 0).await;

        let accept = {
            let daemon = Arc::clone(&daemon);
            tokio::spawn(async move {
                while let Ok((stream, _)) = daemon.listener.accept().await {
                    let daemon = Arc::clone(&daemon);
                    tokio::spawn(async move {
                        let _ = server::handle_connection(&daemon, stream).await;
                    });
                }
            })
        };

        Self {
            daemon,
            mutations,
            datastore,
            accept,
            _dir: dir,
        }
    }

    /// One request over the real control socket
    pub async fn control(&self, request: Request) -> Response {
        let stream = UnixStream::connect(&self.daemon.config.daemon.control_socket)
            .await
            .unwrap();
        let (mut reader, mut writer) = stream.into_split();
        protocol::write_message(&mut writer, &protocol::encode(&request).unwrap())
            .await
            .unwrap();
        let reply = tokio::time::timeout(WAIT, protocol::read_message(&mut reader))
            .await
            .unwrap()
            .unwrap();
        protocol::decode(&reply).unwrap()
    }

    pub async fn enqueue(&self, kind: OperationKind, actor_id: i64, target_id: i64) -> String {
        let request = Request::Enqueue {
            kind,
            actor_id,
            target_id,
            payload: Default::default(),
        };
        match self.control(request).await {
            Response::Enqueued { id } => id,
            other => panic!("enqueue failed: {other:?}"),
        }
    }

    pub async fn queue_len(&self) -> usize {
        match self.control(Request::Status).await {
            Response::Status { queue_len, .. } => queue_len,
            other => panic!("unexpected {other:?}"),
        }
    }

    /// An authenticated WebSocket connection
    pub async fn follow(&self, token: &str) -> Ws {
        let (mut ws, _) = connect_async(format!("ws://{}", self.daemon.broadcast_addr))
            .await
            .unwrap();
        let auth = Packet::new(
            PacketType::Auth,
            &AuthPayload {
                token: token.into(),
            },
        )
        .unwrap();
        ws.send(Message::text(auth.to_text().unwrap())).await.unwrap();

        let reply = next_packet(&mut ws, PacketType::AuthResponse).await;
        assert_eq!(reply.payload["success"], json!(true), "{reply:?}");
        ws
    }

    /// A UDP client whose registration has been confirmed
    pub async fn listen(&self, registration: RegisterPayload) -> UdpSocket {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let packet = Packet::new(PacketType::Register, &registration).unwrap();
        socket
            .send_to(&packet.encode().unwrap(), self.daemon.notify_addr)
            .await
            .unwrap();
        let reply = recv_datagram(&socket).await.unwrap();
        assert_eq!(reply.kind, PacketType::Confirm, "{reply:?}");
        socket
    }

    pub async fn stop(self) {
        self.accept.abort();
        self.daemon.shutdown().await;
    }
}

/// Next packet of `kind`, skipping heartbeats and anything else
pub async fn next_packet(ws: &mut Ws, kind: PacketType) -> Packet {
    loop {
        let frame = tokio::time::timeout(WAIT, ws.next())
            .await
            .unwrap_or_else(|_| panic!("no {} packet in time", kind.as_str()))
            .unwrap()
            .unwrap();
        if let Message::Text(text) = frame {
            let packet = Packet::decode(text.as_bytes()).unwrap();
            if packet.kind == kind {
                return packet;
            }
        }
    }
}

/// True if a packet of `kind` shows up within `within`
pub async fn receives(ws: &mut Ws, kind: PacketType, within: Duration) -> bool {
    tokio::time::timeout(within, next_packet(ws, kind))
        .await
        .is_ok()
}

/// Next datagram, or `None` when nothing arrives within `WAIT`
pub async fn recv_datagram(socket: &UdpSocket) -> Option<Packet> {
    recv_datagram_within(socket, WAIT).await
}

pub async fn recv_datagram_within(socket: &UdpSocket, within: Duration) -> Option<Packet> {
    let mut buf = vec![0u8; 65_536];
    let (n, _) = tokio::time::timeout(within, socket.recv_from(&mut buf))
        .await
        .ok()?
        .ok()?;
    Some(Packet::decode(&buf[..n]).unwrap())
}

/// Poll until `cond` holds
pub async fn wait_for(what: &str, cond: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !cond() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
