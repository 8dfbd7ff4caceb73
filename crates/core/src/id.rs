// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ID generation for connections and queued operations

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Generates unique connection identifiers
pub trait IdGen: Clone + Send + Sync + 'static {
    fn next(&self) -> String;
}

/// UUID-based generator for production use
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidIdGen;

impl IdGen for UuidIdGen {
    fn next(&self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }
}

/// Sequential generator for tests: `prefix-1`, `prefix-2`, ...
#[derive(Clone, Debug)]
pub struct SequentialIdGen {
    prefix: String,
    counter: Arc<AtomicU64>,
}

impl SequentialIdGen {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Default for SequentialIdGen {
    fn default() -> Self {
        Self::new("conn")
    }
}

impl IdGen for SequentialIdGen {
    fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}", self.prefix, n)
    }
}

/// Build the ID of a queued operation from actor, target, enqueue time and
/// the queue's sequence number
///
/// The ID doubles as the upstream idempotency key, so `seq` must be unique
/// per queue: the timestamp alone repeats under a coarse or stepped clock.
pub fn operation_id(
    kind: &str,
    actor_id: i64,
    target_id: i64,
    at: DateTime<Utc>,
    seq: u64,
) -> String {
    let nanos = at
        .timestamp_nanos_opt()
        .unwrap_or_else(|| at.timestamp_micros().saturating_mul(1_000));
    format!("{kind}:{actor_id}:{target_id}:{nanos}:{seq}")
}
