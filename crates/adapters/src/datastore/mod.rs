// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Datastore reachability probes

mod tcp;

pub use tcp::TcpProbeAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeDatastoreAdapter;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from a reachability probe
#[derive(Debug, Error)]
pub enum DatastoreError {
    #[error("datastore unreachable: {0}")]
    Unreachable(String),
    #[error("datastore ping timed out")]
    Timeout,
}

/// Answers whether the shared datastore can currently be reached
#[async_trait]
pub trait DatastoreAdapter: Clone + Send + Sync + 'static {
    async fn ping(&self) -> Result<(), DatastoreError>;
}
