// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pw-core: shared types for the Pagewire resilience layer
//!
//! This crate provides:
//! - Clock and ID abstractions for deterministic tests
//! - Queued mutation types buffered during datastore outages
//! - The JSON packet envelope spoken by both push protocols
//! - Daemon configuration

pub mod clock;
pub mod config;
pub mod id;
pub mod operation;
pub mod packet;

pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{Config, ConfigError};
pub use id::{IdGen, SequentialIdGen, UuidIdGen};
pub use operation::{OperationKind, Payload, QueuedOperation};
pub use packet::{CodecError, ErrorCode, Packet, PacketType};
