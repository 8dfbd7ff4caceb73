// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Pagewire daemon (pagewired)
//!
//! Hosts the two push servers, the write path and the control socket the
//! business layer and operators talk to.

pub mod broadcast;
pub mod lifecycle;
pub mod notify;
pub mod protocol;
pub mod server;
pub mod supervisor;

pub use lifecycle::{startup, startup_with, Adapters, Daemon, DaemonState, LifecycleError};
pub use protocol::{Request, Response};
