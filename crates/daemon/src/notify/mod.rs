// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connectionless topic notifications over UDP
//!
//! Clients register their address with a `register` datagram and receive
//! `notification` datagrams for the topics they follow. Delivery is
//! best-effort with a short bounded retry; stale registrations are swept.

mod registry;
mod sender;
mod server;

#[cfg(test)]
mod fake;

pub use registry::{ClientRegistry, NotificationClient, RegistryFull, Registration};
pub use sender::{is_transient, send_with_retry, DatagramTransport, RetryPolicy};
pub use server::{FanoutReport, NotifyServer, NotifySettings};

#[cfg(test)]
pub(crate) use fake::FakeTransport;

use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("receive failed: {0}")]
    Receive(#[source] std::io::Error),
}

/// Failure to deliver one datagram
#[derive(Debug, Error)]
pub enum SendError {
    #[error("datagram of {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: usize, max: usize },

    #[error("send to {addr} failed: {source}")]
    Failed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("send to {addr} gave up after {attempts} attempts: {source}")]
    Exhausted {
        addr: SocketAddr,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },
}
