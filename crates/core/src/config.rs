// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration
//!
//! Loaded from an optional TOML file, then overridden by `PAGEWIRE_*`
//! environment variables. Every field has a default, so an empty file is a
//! valid configuration.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "PAGEWIRE_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {0}: {1}")]
    Read(PathBuf, #[source] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub queue: QueueConfig,
    pub health: HealthConfig,
    pub broadcast: BroadcastConfig,
    pub notify: NotifyConfig,
    pub upstream: UpstreamConfig,
    pub daemon: DaemonConfig,
}

/// Write-ahead queue and write processor settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueueConfig {
    /// Maximum number of pending operations
    pub max_size: usize,
    /// Replays allowed after the first failed attempt
    pub max_retries: u32,
    /// Period of the background drain
    #[serde(with = "humantime_serde")]
    pub drain_interval: Duration,
    /// Upper bound on a reconnect-triggered flush
    #[serde(with = "humantime_serde")]
    pub flush_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            max_retries: 3,
            drain_interval: Duration::from_secs(30),
            flush_timeout: Duration::from_secs(30),
        }
    }
}

/// Datastore health supervision settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HealthConfig {
    #[serde(with = "humantime_serde")]
    pub check_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub ping_timeout: Duration,
    /// Consecutive failed pings before the datastore is marked unhealthy
    pub failure_threshold: u32,
    /// Upper bound on the reconnect handler task
    #[serde(with = "humantime_serde")]
    pub reconnect_timeout: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(10),
            ping_timeout: Duration::from_secs(2),
            failure_threshold: 1,
            reconnect_timeout: Duration::from_secs(60),
        }
    }
}

/// Connection-oriented progress broadcast settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BroadcastConfig {
    pub listen_addr: SocketAddr,
    /// Pause before restarting a failed accept loop
    #[serde(with = "humantime_serde")]
    pub restart_backoff: Duration,
    /// Outbound packets buffered per peer before drops begin
    pub peer_buffer: usize,
    #[serde(with = "humantime_serde")]
    pub auth_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub heartbeat_interval: Duration,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8081)),
            restart_backoff: Duration::from_secs(5),
            peer_buffer: 64,
            auth_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(30),
        }
    }
}

/// Connectionless notification settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotifyConfig {
    pub listen_addr: SocketAddr,
    pub max_clients: usize,
    #[serde(with = "humantime_serde")]
    pub stale_after: Duration,
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
    pub send_attempts: u32,
    /// Base of the linear backoff between send attempts
    #[serde(with = "humantime_serde")]
    pub retry_backoff: Duration,
    #[serde(with = "humantime_serde")]
    pub restart_backoff: Duration,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8082)),
            max_clients: 10_000,
            stale_after: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(5 * 60),
            send_attempts: 3,
            retry_backoff: Duration::from_millis(100),
            restart_backoff: Duration::from_secs(5),
        }
    }
}

/// External collaborators
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Endpoint that applies a queued mutation (POST, JSON body)
    pub mutation_url: String,
    /// Endpoint that resolves a bearer token to a user (GET)
    pub auth_url: String,
    /// Datastore address probed for reachability
    pub datastore_addr: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            mutation_url: "http://127.0.0.1:8080/internal/mutations".to_string(),
            auth_url: "http://127.0.0.1:8080/internal/auth/validate".to_string(),
            datastore_addr: "127.0.0.1:5432".to_string(),
        }
    }
}

/// Process-level settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    /// Unix socket for the control protocol
    pub control_socket: PathBuf,
    /// Log file; stderr when unset
    pub log_path: Option<PathBuf>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            control_socket: PathBuf::from("/tmp/pagewire/control.sock"),
            log_path: None,
        }
    }
}

impl Config {
    /// Load from the given file (if any), apply environment overrides, validate
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
                Self::parse(&content)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML content without overrides
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `PAGEWIRE_*` overrides through the given lookup
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(addr) = lookup("PAGEWIRE_BROADCAST_ADDR") {
            self.broadcast.listen_addr = parse_addr("PAGEWIRE_BROADCAST_ADDR", &addr)?;
        }
        if let Some(addr) = lookup("PAGEWIRE_NOTIFY_ADDR") {
            self.notify.listen_addr = parse_addr("PAGEWIRE_NOTIFY_ADDR", &addr)?;
        }
        if let Some(path) = lookup("PAGEWIRE_CONTROL_SOCKET") {
            self.daemon.control_socket = PathBuf::from(path);
        }
        if let Some(path) = lookup("PAGEWIRE_LOG_PATH") {
            self.daemon.log_path = Some(PathBuf::from(path));
        }
        Ok(())
    }

    /// Reject values that would stall loops or refuse every request
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks: [(&'static str, bool); 13] = [
            ("queue.max_size", self.queue.max_size > 0),
            ("queue.drain_interval", !self.queue.drain_interval.is_zero()),
            ("queue.flush_timeout", !self.queue.flush_timeout.is_zero()),
            ("health.check_interval", !self.health.check_interval.is_zero()),
            ("health.ping_timeout", !self.health.ping_timeout.is_zero()),
            ("health.failure_threshold", self.health.failure_threshold > 0),
            ("broadcast.peer_buffer", self.broadcast.peer_buffer > 0),
            ("broadcast.heartbeat_interval", !self.broadcast.heartbeat_interval.is_zero()),
            ("broadcast.restart_backoff", !self.broadcast.restart_backoff.is_zero()),
            ("notify.max_clients", self.notify.max_clients > 0),
            ("notify.restart_backoff", !self.notify.restart_backoff.is_zero()),
            ("notify.sweep_interval", !self.notify.sweep_interval.is_zero()),
            ("notify.send_attempts", self.notify.send_attempts > 0),
        ];
        for (key, ok) in checks {
            if !ok {
                return Err(ConfigError::Invalid {
                    key,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }
}

fn parse_addr(key: &'static str, value: &str) -> Result<SocketAddr, ConfigError> {
    value.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
