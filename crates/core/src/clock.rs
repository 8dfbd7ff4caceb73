// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction for testable time handling
//!
//! Monotonic instants drive staleness and timeouts; wall-clock timestamps
//! are only recorded on queued operations and health snapshots.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// A clock that provides the current time
pub trait Clock: Clone + Send + Sync + 'static {
    /// Monotonic time, used for intervals and staleness
    fn now(&self) -> Instant;

    /// Wall-clock time, used for timestamps that leave the process
    fn utc_now(&self) -> DateTime<Utc>;
}

/// Real system clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug)]
struct FakeTime {
    instant: Instant,
    utc: DateTime<Utc>,
}

/// Fake clock for testing with controllable time
///
/// Clones share the same time source, so advancing one advances all.
#[derive(Clone, Debug)]
pub struct FakeClock {
    current: Arc<Mutex<FakeTime>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            current: Arc::new(Mutex::new(FakeTime {
                instant: Instant::now(),
                utc: Utc::now(),
            })),
        }
    }

    /// Advance both the monotonic and wall clocks by the given duration
    pub fn advance(&self, duration: Duration) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        current.instant += duration;
        current.utc += chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::zero());
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .instant
    }

    fn utc_now(&self) -> DateTime<Utc> {
        self.current.lock().unwrap_or_else(|e| e.into_inner()).utc
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
