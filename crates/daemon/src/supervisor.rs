// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Restart supervision for long-running server loops

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Run `make_task` until `cancel` fires, restarting it after `backoff`
/// whenever it returns.
///
/// An error or an unexpected clean exit are both treated as a fault. The
/// backoff sleep is itself cancellable. Returns the number of restarts.
pub async fn supervise<F, Fut, E>(
    name: &str,
    backoff: Duration,
    cancel: CancellationToken,
    mut make_task: F,
) -> u32
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    let mut restarts = 0u32;

    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = make_task() => result,
        };

        if cancel.is_cancelled() {
            break;
        }

        match result {
            Ok(()) => warn!(task = name, "task exited unexpectedly"),
            Err(e) => error!(task = name, error = %e, "task failed"),
        }

        restarts += 1;
        info!(
            task = name,
            restarts,
            backoff_ms = backoff.as_millis() as u64,
            "restarting after backoff"
        );

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(backoff) => {}
        }
    }

    info!(task = name, restarts, "supervisor stopped");
    restarts
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
