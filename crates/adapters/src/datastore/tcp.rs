// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TCP connect probe

use super::{DatastoreAdapter, DatastoreError};
use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;

/// Considers the datastore reachable when a TCP connection to it succeeds.
///
/// Does not speak the datastore's protocol; the pool owner is expected to
/// surface query-level failures on its own.
#[derive(Clone, Debug)]
pub struct TcpProbeAdapter {
    addr: String,
    timeout: Duration,
}

impl TcpProbeAdapter {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }
}

#[async_trait]
impl DatastoreAdapter for TcpProbeAdapter {
    async fn ping(&self) -> Result<(), DatastoreError> {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr)).await {
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(e)) => Err(DatastoreError::Unreachable(e.to_string())),
            Err(_) => Err(DatastoreError::Timeout),
        }
    }
}
