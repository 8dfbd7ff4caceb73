// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pagewire daemon (pagewired)
//!
//! Background process that buffers writes while the datastore is down and
//! pushes progress and notifications to connected devices.

use std::path::PathBuf;
use std::sync::Arc;

use pw_core::config::CONFIG_ENV;
use pw_core::Config;
use pw_daemon::protocol::PROTOCOL_VERSION;
use pw_daemon::{lifecycle, server};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = config_path(std::env::args().nth(1), std::env::var(CONFIG_ENV).ok());
    let config = Config::load(config_path.as_deref())?;

    let log_guard = setup_logging(&config)?;

    info!(version = PROTOCOL_VERSION, config = ?config_path, "starting pagewired");

    let daemon = match lifecycle::startup(&config).await {
        Ok(d) => Arc::new(d),
        Err(e) => {
            error!(error = %e, "failed to start daemon");
            drop(log_guard);
            return Err(e.into());
        }
    };

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!(
        socket = %config.daemon.control_socket.display(),
        broadcast = %daemon.broadcast_addr,
        notify = %daemon.notify_addr,
        "daemon ready"
    );

    // Signal ready for parent process (e.g., systemd, scripts waiting for startup)
    println!("READY");

    loop {
        tokio::select! {
            result = daemon.listener.accept() => {
                match result {
                    Ok((stream, _)) => {
                        let daemon = Arc::clone(&daemon);
                        tokio::spawn(async move {
                            if let Err(e) = server::handle_connection(&daemon, stream).await {
                                error!(error = %e, "error handling connection");
                            }
                        });
                    }
                    Err(e) => error!(error = %e, "error accepting connection"),
                }
            }

            _ = sigterm.recv() => {
                info!("received SIGTERM");
                break;
            }

            _ = sigint.recv() => {
                info!("received SIGINT");
                break;
            }

            _ = daemon.cancel.cancelled() => {
                info!("shutdown requested via control socket");
                break;
            }
        }
    }

    daemon.shutdown().await;
    info!("daemon stopped");
    drop(log_guard);
    Ok(())
}

/// The first argument wins over the environment
fn config_path(arg: Option<String>, env: Option<String>) -> Option<PathBuf> {
    arg.or(env).filter(|p| !p.is_empty()).map(PathBuf::from)
}

/// Log to `daemon.log_path` when set, stderr otherwise
fn setup_logging(config: &Config) -> Result<WorkerGuard, std::io::Error> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (writer, guard) = match &config.daemon.log_path {
        Some(log_path) => {
            let dir = log_path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            std::fs::create_dir_all(dir)?;
            let file_name = log_path.file_name().ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("log path has no file name: {}", log_path.display()),
                )
            })?;
            tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name))
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_ansi(config.daemon.log_path.is_none()))
        .init();

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[yare::parameterized(
        argument_wins = { Some("a.toml"), Some("b.toml"), Some("a.toml") },
        env_fallback = { None, Some("b.toml"), Some("b.toml") },
        empty_env = { None, Some(""), None },
        neither = { None, None, None },
    )]
    fn config_path_resolution(arg: Option<&str>, env: Option<&str>, expected: Option<&str>) {
        assert_eq!(
            config_path(arg.map(String::from), env.map(String::from)),
            expected.map(PathBuf::from)
        );
    }
}
