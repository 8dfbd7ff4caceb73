// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adapters that apply queued mutations to the datastore

mod http;

pub use http::HttpMutationAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeMutationAdapter;

use async_trait::async_trait;
use pw_core::QueuedOperation;
use thiserror::Error;

/// Errors from applying a mutation
#[derive(Debug, Error)]
pub enum MutationError {
    #[error("mutation rejected with status {status}")]
    Rejected { status: u16 },
    #[error("datastore unreachable: {0}")]
    Unreachable(String),
    #[error("failed to encode operation: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Performs the datastore write for a queued operation
#[async_trait]
pub trait MutationAdapter: Clone + Send + Sync + 'static {
    async fn apply(&self, op: &QueuedOperation) -> Result<(), MutationError>;
}
