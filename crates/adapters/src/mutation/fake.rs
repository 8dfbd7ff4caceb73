// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake mutation adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{MutationAdapter, MutationError};
use async_trait::async_trait;
use pw_core::QueuedOperation;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Fake mutation adapter that records every apply attempt in call order
#[derive(Clone, Default)]
pub struct FakeMutationAdapter {
    calls: Arc<Mutex<Vec<QueuedOperation>>>,
    fail_all: Arc<AtomicBool>,
    fail_next: Arc<AtomicU32>,
}

impl FakeMutationAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent apply fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.fail_all.store(failing, Ordering::SeqCst);
    }

    /// Fail only the next `n` applies
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Every attempted operation, in call order
    pub fn calls(&self) -> Vec<QueuedOperation> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// IDs of attempted operations, in call order
    pub fn call_ids(&self) -> Vec<String> {
        self.calls().into_iter().map(|op| op.id).collect()
    }
}

#[async_trait]
impl MutationAdapter for FakeMutationAdapter {
    async fn apply(&self, op: &QueuedOperation) -> Result<(), MutationError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(op.clone());

        if self.fail_all.load(Ordering::SeqCst) {
            return Err(MutationError::Unreachable("fake datastore down".to_string()));
        }
        let pending = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if pending.is_ok() {
            return Err(MutationError::Rejected { status: 503 });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
