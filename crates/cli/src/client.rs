// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control socket client for CLI commands

use std::path::PathBuf;
use std::time::Duration;

use pw_core::config::DaemonConfig;
use pw_core::{OperationKind, Payload};
use pw_daemon::protocol::{self, ProtocolError};
use pw_daemon::{Request, Response};
use thiserror::Error;
use tokio::net::UnixStream;

/// Environment variable naming the control socket
pub const SOCKET_ENV: &str = "PAGEWIRE_CONTROL_SOCKET";

// Timeout configuration (env vars in milliseconds)
fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Timeout for IPC requests (status, enqueue, progress, notify, shutdown)
pub fn timeout_ipc() -> Duration {
    parse_duration_ms("PAGEWIRE_TIMEOUT_IPC_MS").unwrap_or(Duration::from_secs(5))
}

/// Timeout for a flush, which waits on the whole queue drain
pub fn timeout_flush() -> Duration {
    parse_duration_ms("PAGEWIRE_TIMEOUT_FLUSH_MS").unwrap_or(Duration::from_secs(60))
}

/// `--socket`, else the environment, else the daemon's default path
pub fn resolve_socket_path(flag: Option<PathBuf>, env: Option<String>) -> PathBuf {
    flag.or_else(|| env.filter(|p| !p.is_empty()).map(PathBuf::from))
        .unwrap_or_else(|| DaemonConfig::default().control_socket)
}

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Daemon not running (no socket at {0})")]
    DaemonNotRunning(PathBuf),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Unexpected response from daemon")]
    UnexpectedResponse,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Daemon status as reported over the control socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonStatus {
    pub uptime_secs: u64,
    pub healthy: bool,
    pub queue_len: usize,
    pub peers: usize,
    pub clients: usize,
}

/// Daemon client
pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    /// Connect to a running daemon
    pub fn connect(socket_path: PathBuf) -> Result<Self, ClientError> {
        if !socket_path.exists() {
            return Err(ClientError::DaemonNotRunning(socket_path));
        }
        Ok(Self { socket_path })
    }

    async fn send_with_timeout(
        &self,
        request: Request,
        read_timeout: Duration,
        write_timeout: Duration,
    ) -> Result<Response, ClientError> {
        let stream = UnixStream::connect(&self.socket_path).await?;
        let (mut reader, mut writer) = stream.into_split();

        // Encode and send request with write timeout
        let data = protocol::encode(&request)?;
        tokio::time::timeout(write_timeout, protocol::write_message(&mut writer, &data))
            .await
            .map_err(|_| ProtocolError::Timeout)??;

        // Read response with read timeout
        let response_bytes =
            tokio::time::timeout(read_timeout, protocol::read_message(&mut reader))
                .await
                .map_err(|_| ProtocolError::Timeout)??;

        let response: Response = protocol::decode(&response_bytes)?;
        Ok(response)
    }

    /// Send a request and receive a response
    pub async fn send(&self, request: Request) -> Result<Response, ClientError> {
        self.send_with_timeout(request, timeout_ipc(), timeout_ipc())
            .await
    }

    /// Check the daemon speaks our protocol version
    pub async fn hello(&self) -> Result<String, ClientError> {
        let request = Request::Hello {
            version: protocol::PROTOCOL_VERSION.to_string(),
        };
        match self.send(request).await? {
            Response::Hello { version } => Ok(version),
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn status(&self) -> Result<DaemonStatus, ClientError> {
        match self.send(Request::Status).await? {
            Response::Status {
                uptime_secs,
                healthy,
                queue_len,
                peers,
                clients,
            } => Ok(DaemonStatus {
                uptime_secs,
                healthy,
                queue_len,
                peers,
                clients,
            }),
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Buffer a mutation; returns the operation id
    pub async fn enqueue(
        &self,
        kind: OperationKind,
        actor_id: i64,
        target_id: i64,
        payload: Payload,
    ) -> Result<String, ClientError> {
        let request = Request::Enqueue {
            kind,
            actor_id,
            target_id,
            payload,
        };
        match self.send(request).await? {
            Response::Enqueued { id } => Ok(id),
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Drain the queue now; returns `(processed, failed)`
    pub async fn flush(&self) -> Result<(usize, usize), ClientError> {
        match self
            .send_with_timeout(Request::Flush, timeout_flush(), timeout_ipc())
            .await?
        {
            Response::Flushed { processed, failed } => Ok((processed, failed)),
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Push a progress update to the user's connected devices
    pub async fn progress(
        &self,
        user_id: i64,
        entity_id: i64,
        position: f64,
        sub_position_id: Option<i64>,
    ) -> Result<usize, ClientError> {
        let request = Request::BroadcastProgress {
            user_id,
            entity_id,
            position,
            sub_position_id,
        };
        match self.send(request).await? {
            Response::Broadcast { delivered } => Ok(delivered),
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Start a topic fan-out; returns the recipient count
    pub async fn notify_topic(
        &self,
        topic_id: i64,
        name: String,
        extra: Payload,
    ) -> Result<usize, ClientError> {
        let response = self
            .send(Request::NotifyTopic {
                topic_id,
                name,
                extra,
            })
            .await?;
        fanout(response)
    }

    pub async fn notify_user(
        &self,
        user_id: i64,
        name: String,
        extra: Payload,
    ) -> Result<usize, ClientError> {
        let response = self
            .send(Request::NotifyUser {
                user_id,
                name,
                extra,
            })
            .await?;
        fanout(response)
    }

    /// Ask the daemon to stop
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        match self.send(Request::Shutdown).await? {
            Response::ShuttingDown => Ok(()),
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }
}

fn fanout(response: Response) -> Result<usize, ClientError> {
    match response {
        Response::Notified { recipients } => Ok(recipients),
        Response::Error { message } => Err(ClientError::Rejected(message)),
        _ => Err(ClientError::UnexpectedResponse),
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
