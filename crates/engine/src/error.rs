// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine

use pw_adapters::MutationError;
use thiserror::Error;

/// Errors surfaced by the write-ahead queue
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("write-ahead queue is full ({max_size} operations pending)")]
    QueueFull { max_size: usize },
    #[error("operation {id} dropped after {attempts} attempts: {source}")]
    RetryExhausted {
        id: String,
        attempts: u32,
        source: MutationError,
    },
}

/// Error returned by a reconnect handler; logged by the health supervisor
pub type ReconnectError = Box<dyn std::error::Error + Send + Sync>;
