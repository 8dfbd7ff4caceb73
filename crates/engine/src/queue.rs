// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-ahead queue
//!
//! A bounded in-memory FIFO of mutations that could not be applied while
//! the datastore was down. The lock is held only to push or pop; the
//! mutation adapter is always called with the lock released so a slow
//! datastore never blocks producers.

use crate::error::QueueError;
use pw_adapters::MutationAdapter;
use pw_core::{Clock, OperationKind, Payload, QueuedOperation};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::time::Instant;

/// Counters since the queue was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub enqueued: u64,
    pub applied: u64,
    pub retried: u64,
    pub dropped: u64,
}

/// Outcome of a single [`WriteAheadQueue::drain_one`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Drained {
    /// Nothing was queued
    Empty,
    /// The operation was applied and removed
    Applied { id: String },
    /// The operation failed and went to the back of the queue
    Requeued { id: String, retry_count: u32 },
}

/// Counts from one drain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Operations applied successfully
    pub processed: usize,
    /// Failed attempts, requeued or dropped
    pub failed: usize,
    /// Subset of `failed` that exhausted its retries
    pub dropped: usize,
    /// The drain stopped at its deadline with work left
    pub deadline_hit: bool,
}

impl DrainReport {
    pub fn is_empty(&self) -> bool {
        self.processed == 0 && self.failed == 0
    }
}

struct QueueInner {
    ops: VecDeque<QueuedOperation>,
    stats: QueueStats,
}

/// Bounded FIFO of pending mutations with per-operation retry counters
pub struct WriteAheadQueue<C: Clock> {
    inner: Mutex<QueueInner>,
    max_size: usize,
    max_retries: u32,
    next_seq: AtomicU64,
    clock: C,
}

impl<C: Clock> WriteAheadQueue<C> {
    pub fn new(max_size: usize, max_retries: u32, clock: C) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                ops: VecDeque::new(),
                stats: QueueStats::default(),
            }),
            max_size,
            max_retries,
            next_seq: AtomicU64::new(0),
            clock,
        }
    }

    /// Append an operation, returning its ID
    pub fn enqueue(
        &self,
        kind: OperationKind,
        actor_id: i64,
        target_id: i64,
        payload: Payload,
    ) -> Result<String, QueueError> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let op = QueuedOperation::new(
            kind,
            actor_id,
            target_id,
            payload,
            self.clock.utc_now(),
            seq,
        );
        let id = op.id.clone();

        {
            let mut inner = self.lock();
            if inner.ops.len() >= self.max_size {
                return Err(QueueError::QueueFull {
                    max_size: self.max_size,
                });
            }
            inner.ops.push_back(op);
            inner.stats.enqueued += 1;
        }

        tracing::debug!(id = %id, "operation queued");
        Ok(id)
    }

    /// Pop the oldest operation and try to apply it
    ///
    /// A failure re-appends the operation at the back with its retry count
    /// bumped, until `max_retries` retries have been spent; after that the
    /// operation is dropped and reported as [`QueueError::RetryExhausted`].
    pub async fn drain_one<A: MutationAdapter>(&self, apply: &A) -> Result<Drained, QueueError> {
        let Some(op) = self.lock().ops.pop_front() else {
            return Ok(Drained::Empty);
        };

        let err = match apply.apply(&op).await {
            Ok(()) => {
                self.lock().stats.applied += 1;
                return Ok(Drained::Applied { id: op.id });
            }
            Err(e) => e,
        };

        let mut inner = self.lock();
        if op.retry_count < self.max_retries {
            let op = op.with_incremented_retries();
            let drained = Drained::Requeued {
                id: op.id.clone(),
                retry_count: op.retry_count,
            };
            // Re-appending ignores max_size: the slot was ours before the pop
            inner.ops.push_back(op);
            inner.stats.retried += 1;
            drop(inner);
            tracing::debug!(error = %err, "operation requeued");
            Ok(drained)
        } else {
            inner.stats.dropped += 1;
            Err(QueueError::RetryExhausted {
                id: op.id,
                attempts: op.retry_count + 1,
                source: err,
            })
        }
    }

    /// Apply queued operations until the queue reports empty
    ///
    /// Failed operations are retried within the same drain until they
    /// succeed or exhaust their retries. Attempts are capped at
    /// `len × (max_retries + 1)` from the start of the drain, so operations
    /// enqueued concurrently past that point wait for the next drain.
    pub async fn drain_all<A: MutationAdapter>(&self, apply: &A) -> DrainReport {
        self.drain_until(apply, None).await
    }

    /// Like [`drain_all`](Self::drain_all), but stops before starting an
    /// operation once `deadline` has passed. An in-flight apply is never
    /// abandoned, so nothing is lost when the deadline hits.
    pub async fn drain_until<A: MutationAdapter>(
        &self,
        apply: &A,
        deadline: Option<Instant>,
    ) -> DrainReport {
        let mut report = DrainReport::default();
        let attempts_per_op = usize::try_from(self.max_retries)
            .unwrap_or(usize::MAX)
            .saturating_add(1);
        let budget = self.len().saturating_mul(attempts_per_op);

        for _ in 0..budget {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                report.deadline_hit = true;
                break;
            }
            match self.drain_one(apply).await {
                Ok(Drained::Empty) => break,
                Ok(Drained::Applied { .. }) => report.processed += 1,
                Ok(Drained::Requeued { .. }) => report.failed += 1,
                Err(e) => {
                    tracing::error!(error = %e, "dropping queued operation");
                    report.failed += 1;
                    report.dropped += 1;
                }
            }
        }

        report
    }

    pub fn len(&self) -> usize {
        self.lock().ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().ops.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }

    pub fn stats(&self) -> QueueStats {
        self.lock().stats
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
