// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `pw status`, `pw flush`, `pw shutdown` - daemon control

use std::fmt;

use anyhow::Result;
use serde::Serialize;

use crate::client::{DaemonClient, DaemonStatus};
use crate::output::{self, OutputFormat};

#[derive(Serialize)]
struct StatusView {
    version: String,
    healthy: bool,
    queue_len: usize,
    peers: usize,
    clients: usize,
    uptime_secs: u64,
}

impl StatusView {
    fn new(version: String, s: DaemonStatus) -> Self {
        Self {
            version,
            healthy: s.healthy,
            queue_len: s.queue_len,
            peers: s.peers,
            clients: s.clients,
            uptime_secs: s.uptime_secs,
        }
    }
}

impl fmt::Display for StatusView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let health = if self.healthy { "healthy" } else { "unhealthy" };
        writeln!(f, "Daemon:    pagewired {}", self.version)?;
        writeln!(f, "Datastore: {health}")?;
        writeln!(f, "Queued:    {}", self.queue_len)?;
        writeln!(f, "Peers:     {}", self.peers)?;
        writeln!(f, "Clients:   {}", self.clients)?;
        write!(f, "Uptime:    {}s", self.uptime_secs)
    }
}

#[derive(Serialize)]
struct FlushView {
    processed: usize,
    failed: usize,
}

impl fmt::Display for FlushView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flushed {} operation(s), {} failed", self.processed, self.failed)
    }
}

pub async fn status(client: &DaemonClient, format: OutputFormat) -> Result<()> {
    let version = client.hello().await?;
    let view = StatusView::new(version, client.status().await?);
    output::print(&view, format);
    Ok(())
}

pub async fn flush(client: &DaemonClient, format: OutputFormat) -> Result<()> {
    let (processed, failed) = client.flush().await?;
    output::print(&FlushView { processed, failed }, format);
    Ok(())
}

pub async fn shutdown(client: &DaemonClient) -> Result<()> {
    client.shutdown().await?;
    println!("Daemon shutting down");
    Ok(())
}
