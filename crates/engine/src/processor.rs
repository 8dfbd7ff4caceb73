// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write processor
//!
//! Replays the write-ahead queue through the mutation adapter, both on a
//! steady interval and immediately when the health supervisor reports the
//! datastore is back. Drains never overlap, so successful operations keep
//! their FIFO order.

use crate::error::ReconnectError;
use crate::health::{renew_if_cancelled, HealthHandle, ReconnectHandler};
use crate::queue::{DrainReport, WriteAheadQueue};
use async_trait::async_trait;
use pw_adapters::MutationAdapter;
use pw_core::Clock;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct WriteProcessor<M, C: Clock> {
    queue: Arc<WriteAheadQueue<C>>,
    mutations: M,
    health: Option<HealthHandle>,
    flush_timeout: Duration,
    drain_lock: tokio::sync::Mutex<()>,
    cancel: Mutex<CancellationToken>,
}

impl<M: MutationAdapter, C: Clock> WriteProcessor<M, C> {
    pub fn new(queue: Arc<WriteAheadQueue<C>>, mutations: M, flush_timeout: Duration) -> Self {
        Self {
            queue,
            mutations,
            health: None,
            flush_timeout,
            drain_lock: tokio::sync::Mutex::new(()),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Skip periodic drains while this handle reports unhealthy
    pub fn with_health(mut self, health: HealthHandle) -> Self {
        self.health = Some(health);
        self
    }

    pub fn queue(&self) -> &Arc<WriteAheadQueue<C>> {
        &self.queue
    }

    /// Spawn the periodic drain loop; restartable after [`stop`](Self::stop)
    pub fn start_processing(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let processor = Arc::clone(self);
        let cancel = renew_if_cancelled(&self.cancel);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // interval fires immediately; the first drain waits a full period
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => processor.periodic_drain().await,
                }
            }

            tracing::debug!("write processor stopped");
        })
    }

    async fn periodic_drain(&self) {
        if self.queue.is_empty() {
            return;
        }
        if self.health.as_ref().is_some_and(|h| !h.is_healthy()) {
            tracing::debug!(pending = self.queue.len(), "datastore unhealthy, skipping drain");
            return;
        }

        let _guard = self.drain_lock.lock().await;
        let report = self.queue.drain_all(&self.mutations).await;
        if !report.is_empty() {
            tracing::info!(
                processed = report.processed,
                failed = report.failed,
                dropped = report.dropped,
                pending = self.queue.len(),
                "periodic drain"
            );
        }
    }

    /// Drain everything queued now, bounded by the flush timeout
    ///
    /// On timeout the counts so far are returned with `deadline_hit` set;
    /// the remaining operations stay queued.
    pub async fn process_all_now(&self) -> DrainReport {
        let _guard = self.drain_lock.lock().await;
        let deadline = tokio::time::Instant::now() + self.flush_timeout;
        let report = self
            .queue
            .drain_until(&self.mutations, Some(deadline))
            .await;

        if report.deadline_hit {
            tracing::warn!(
                processed = report.processed,
                failed = report.failed,
                pending = self.queue.len(),
                "flush timed out"
            );
        }
        report
    }

    /// Stop the periodic loop
    pub fn stop(&self) {
        self.cancel.lock().unwrap_or_else(|e| e.into_inner()).cancel();
    }
}

#[async_trait]
impl<M: MutationAdapter, C: Clock> ReconnectHandler for WriteProcessor<M, C> {
    async fn on_reconnect(&self) -> Result<(), ReconnectError> {
        let pending = self.queue.len();
        let report = self.process_all_now().await;
        tracing::info!(
            pending,
            processed = report.processed,
            failed = report.failed,
            dropped = report.dropped,
            "replayed queue after reconnect"
        );

        if report.deadline_hit {
            return Err(format!(
                "flush stopped after {} operations with {} still queued",
                report.processed + report.failed,
                self.queue.len()
            )
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "processor_tests.rs"]
mod tests;
