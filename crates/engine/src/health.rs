// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Datastore health supervision
//!
//! A timer loop pings the datastore and flips between healthy and
//! unhealthy. Only the unhealthy to healthy edge notifies the registered
//! [`ReconnectHandler`], and it does so on its own task with a bounded
//! timeout so a slow replay cannot stall the next ping.

use crate::error::ReconnectError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pw_adapters::DatastoreAdapter;
use pw_core::Clock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Receives the "datastore is back" event
#[async_trait]
pub trait ReconnectHandler: Send + Sync + 'static {
    async fn on_reconnect(&self) -> Result<(), ReconnectError>;
}

/// What a single probe changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthTransition {
    None,
    BecameUnhealthy,
    Recovered,
}

/// Point-in-time view of the supervisor state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthSnapshot {
    pub healthy: bool,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub last_healthy_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
}

/// Supervisor timing
#[derive(Debug, Clone, Copy)]
pub struct HealthSettings {
    pub check_interval: Duration,
    pub ping_timeout: Duration,
    /// Consecutive failed pings before the state flips to unhealthy
    pub failure_threshold: u32,
    pub reconnect_timeout: Duration,
}

impl From<&pw_core::config::HealthConfig> for HealthSettings {
    fn from(config: &pw_core::config::HealthConfig) -> Self {
        Self {
            check_interval: config.check_interval,
            ping_timeout: config.ping_timeout,
            failure_threshold: config.failure_threshold,
            reconnect_timeout: config.reconnect_timeout,
        }
    }
}

/// Cloneable read-only view of the health flag
#[derive(Debug, Clone)]
pub struct HealthHandle {
    healthy: Arc<AtomicBool>,
}

impl HealthHandle {
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }
}

/// Polls datastore reachability and fires the reconnect handler on recovery
pub struct HealthSupervisor<D, C> {
    datastore: D,
    clock: C,
    settings: HealthSettings,
    healthy: Arc<AtomicBool>,
    snapshot: Mutex<HealthSnapshot>,
    on_reconnect: Mutex<Option<Arc<dyn ReconnectHandler>>>,
    cancel: Mutex<CancellationToken>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<D: DatastoreAdapter, C: Clock> HealthSupervisor<D, C> {
    /// Starts healthy; the first failed ping says otherwise
    pub fn new(datastore: D, clock: C, settings: HealthSettings) -> Self {
        Self {
            datastore,
            clock,
            settings,
            healthy: Arc::new(AtomicBool::new(true)),
            snapshot: Mutex::new(HealthSnapshot {
                healthy: true,
                last_checked_at: None,
                last_healthy_at: None,
                consecutive_failures: 0,
            }),
            on_reconnect: Mutex::new(None),
            cancel: Mutex::new(CancellationToken::new()),
            task: Mutex::new(None),
        }
    }

    /// Replace the handler notified on recovery
    pub fn set_on_reconnect(&self, handler: Arc<dyn ReconnectHandler>) {
        *self.on_reconnect.lock().unwrap_or_else(|e| e.into_inner()) = Some(handler);
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    pub fn handle(&self) -> HealthHandle {
        HealthHandle {
            healthy: Arc::clone(&self.healthy),
        }
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        self.snapshot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Spawn the check loop. A second call while running is ignored;
    /// a call after [`stop`](Self::stop) starts a fresh loop.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }

        let supervisor = Arc::clone(self);
        let cancel = renew_if_cancelled(&self.cancel);
        let period = self.settings.check_interval;

        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            tracing::info!(interval_ms = period.as_millis() as u64, "health supervisor started");

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        supervisor.check_now().await;
                    }
                }
            }

            tracing::info!("health supervisor stopped");
        }));
    }

    /// Cancel the check loop; fine to call without a prior `start`
    pub fn stop(&self) {
        self.cancel.lock().unwrap_or_else(|e| e.into_inner()).cancel();
        self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
    }

    /// Probe once and apply the result
    pub async fn check_now(&self) -> HealthTransition {
        let probe = tokio::time::timeout(self.settings.ping_timeout, self.datastore.ping()).await;
        let failure = match probe {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some("ping timed out".to_string()),
        };

        let now = self.clock.utc_now();
        let transition = {
            let mut snap = self.snapshot.lock().unwrap_or_else(|e| e.into_inner());
            snap.last_checked_at = Some(now);

            let transition = if failure.is_none() {
                snap.consecutive_failures = 0;
                snap.last_healthy_at = Some(now);
                if snap.healthy {
                    HealthTransition::None
                } else {
                    snap.healthy = true;
                    HealthTransition::Recovered
                }
            } else {
                snap.consecutive_failures = snap.consecutive_failures.saturating_add(1);
                if snap.healthy && snap.consecutive_failures >= self.settings.failure_threshold {
                    snap.healthy = false;
                    HealthTransition::BecameUnhealthy
                } else {
                    HealthTransition::None
                }
            };

            self.healthy.store(snap.healthy, Ordering::Release);
            transition
        };

        match transition {
            HealthTransition::BecameUnhealthy => {
                tracing::warn!(
                    error = failure.as_deref().unwrap_or_default(),
                    "datastore unreachable, marking unhealthy"
                );
            }
            HealthTransition::Recovered => {
                tracing::info!("datastore reachable again");
                self.fire_reconnect();
            }
            HealthTransition::None => {
                if let Some(error) = failure {
                    tracing::debug!(error = %error, "datastore ping failed");
                }
            }
        }

        transition
    }

    fn fire_reconnect(&self) {
        let handler = self
            .on_reconnect
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let Some(handler) = handler else {
            return;
        };

        let limit = self.settings.reconnect_timeout;
        tokio::spawn(async move {
            match tokio::time::timeout(limit, handler.on_reconnect()).await {
                Ok(Ok(())) => tracing::debug!("reconnect handler finished"),
                Ok(Err(e)) => tracing::error!(error = %e, "reconnect handler failed"),
                Err(_) => tracing::warn!(
                    timeout_ms = limit.as_millis() as u64,
                    "reconnect handler timed out"
                ),
            }
        });
    }
}

/// The current token, replaced first if a previous stop cancelled it
pub(crate) fn renew_if_cancelled(slot: &Mutex<CancellationToken>) -> CancellationToken {
    let mut token = slot.lock().unwrap_or_else(|e| e.into_inner());
    if token.is_cancelled() {
        *token = CancellationToken::new();
    }
    token.clone()
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
