// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control socket protocol
//!
//! Wire format: 4-byte big-endian length prefix followed by a JSON body.
//! One request and one response per connection.

use std::time::Duration;

use pw_core::{OperationKind, Payload};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Protocol version reported in `Hello`
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default read/write timeout for a control connection
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on a single message body
pub const MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Requests accepted on the control socket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    Ping,
    Hello {
        version: String,
    },
    Status,
    /// Buffer a mutation for replay
    Enqueue {
        kind: OperationKind,
        actor_id: i64,
        target_id: i64,
        #[serde(default)]
        payload: Payload,
    },
    /// Drain the write-ahead queue now
    Flush,
    BroadcastProgress {
        user_id: i64,
        entity_id: i64,
        position: f64,
        #[serde(default)]
        sub_position_id: Option<i64>,
    },
    NotifyTopic {
        topic_id: i64,
        name: String,
        #[serde(default)]
        extra: Payload,
    },
    NotifyUser {
        user_id: i64,
        name: String,
        #[serde(default)]
        extra: Payload,
    },
    Shutdown,
}

/// Responses sent back on the control socket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    Pong,
    Hello {
        version: String,
    },
    Status {
        uptime_secs: u64,
        healthy: bool,
        queue_len: usize,
        peers: usize,
        clients: usize,
    },
    Enqueued {
        id: String,
    },
    Flushed {
        processed: usize,
        failed: usize,
    },
    Broadcast {
        delivered: usize,
    },
    /// Fan-out started; delivery continues in the background
    Notified {
        recipients: usize,
    },
    ShuttingDown,
    Error {
        message: String,
    },
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("timeout")]
    Timeout,

    #[error("connection closed")]
    ConnectionClosed,
}

/// Serialize to a JSON body (no length prefix)
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(msg)?)
}

/// Deserialize a JSON body
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Read one length-prefixed message body
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::ConnectionClosed)
        }
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(body)
}

/// Write one length-prefixed message body
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), ProtocolError> {
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: data.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    writer.write_all(&(data.len() as u32).to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// Read and decode a request, bounded by `timeout`
pub async fn read_request<R: AsyncRead + Unpin>(
    reader: &mut R,
    timeout: Duration,
) -> Result<Request, ProtocolError> {
    let bytes = tokio::time::timeout(timeout, read_message(reader))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    decode(&bytes)
}

/// Encode and write a response, bounded by `timeout`
pub async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &Response,
    timeout: Duration,
) -> Result<(), ProtocolError> {
    let data = encode(response)?;
    tokio::time::timeout(timeout, write_message(writer, &data))
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
