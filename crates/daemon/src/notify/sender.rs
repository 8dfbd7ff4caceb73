// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Best-effort datagram delivery with bounded retry

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use pw_core::packet::MAX_DATAGRAM_SIZE;
use tokio::net::UdpSocket;
use tracing::debug;

use super::SendError;

/// Something datagrams can be sent through
#[async_trait]
pub trait DatagramTransport: Send + Sync + 'static {
    async fn send_to(&self, bytes: &[u8], addr: SocketAddr) -> io::Result<usize>;
}

#[async_trait]
impl DatagramTransport for UdpSocket {
    async fn send_to(&self, bytes: &[u8], addr: SocketAddr) -> io::Result<usize> {
        UdpSocket::send_to(self, bytes, addr).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    /// The wait after failed attempt `n` is `n * backoff`
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(100),
        }
    }
}

/// Errors worth another attempt
pub fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock
            | io::ErrorKind::Interrupted
            | io::ErrorKind::TimedOut
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
    )
}

/// Send one datagram, retrying transient failures with linear backoff
///
/// Returns the number of attempts used on success.
pub async fn send_with_retry<T>(
    transport: &T,
    addr: SocketAddr,
    bytes: &[u8],
    policy: RetryPolicy,
) -> Result<u32, SendError>
where
    T: DatagramTransport + ?Sized,
{
    if bytes.len() > MAX_DATAGRAM_SIZE {
        return Err(SendError::TooLarge {
            size: bytes.len(),
            max: MAX_DATAGRAM_SIZE,
        });
    }

    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        let err = match transport.send_to(bytes, addr).await {
            Ok(_) => return Ok(attempt),
            Err(e) => e,
        };

        if !is_transient(&err) {
            return Err(SendError::Failed { addr, source: err });
        }
        if attempt >= attempts {
            return Err(SendError::Exhausted {
                addr,
                attempts,
                source: err,
            });
        }

        let wait = policy.backoff * attempt;
        debug!(%addr, attempt, wait_ms = wait.as_millis() as u64, error = %err, "transient send failure, retrying");
        tokio::time::sleep(wait).await;
        attempt += 1;
    }
}

#[cfg(test)]
#[path = "sender_tests.rs"]
mod tests;
