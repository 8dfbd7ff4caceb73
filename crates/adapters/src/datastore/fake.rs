// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake datastore probe for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{DatastoreAdapter, DatastoreError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Probe whose answer is flipped by the test
#[derive(Clone)]
pub struct FakeDatastoreAdapter {
    reachable: Arc<AtomicBool>,
    pings: Arc<AtomicU64>,
}

impl FakeDatastoreAdapter {
    /// Starts reachable
    pub fn new() -> Self {
        Self {
            reachable: Arc::new(AtomicBool::new(true)),
            pings: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Number of pings observed so far
    pub fn pings(&self) -> u64 {
        self.pings.load(Ordering::SeqCst)
    }
}

impl Default for FakeDatastoreAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatastoreAdapter for FakeDatastoreAdapter {
    async fn ping(&self) -> Result<(), DatastoreError> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DatastoreError::Unreachable("fake datastore down".to_string()))
        }
    }
}
