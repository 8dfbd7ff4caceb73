// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Pagewire write path: the write-ahead queue, the datastore health
//! supervisor and the processor that replays the queue on recovery

mod error;
pub mod health;
pub mod processor;
pub mod queue;

pub use error::{QueueError, ReconnectError};
pub use health::{
    HealthHandle, HealthSettings, HealthSnapshot, HealthSupervisor, HealthTransition,
    ReconnectHandler,
};
pub use processor::WriteProcessor;
pub use queue::{DrainReport, Drained, QueueStats, WriteAheadQueue};
