// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection-oriented progress broadcast over WebSocket
//!
//! Clients connect, authenticate with a bearer token, and then receive
//! `progress` pushes addressed to their user. Delivery is fire-and-forget
//! to devices that are online right now.

mod hub;
mod server;

pub use hub::BroadcastHub;
pub use server::{BroadcastServer, BroadcastSettings};

use pw_core::CodecError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("failed to encode packet: {0}")]
    Codec(#[from] CodecError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        source: std::io::Error,
    },

    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}
