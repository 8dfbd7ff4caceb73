// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pw - Pagewire CLI

mod client;
mod commands;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{daemon, enqueue, follow, listen, notify, progress};

use crate::client::{resolve_socket_path, DaemonClient, SOCKET_ENV};
use crate::output::OutputFormat;

#[derive(Parser)]
#[command(
    name = "pw",
    version,
    about = "Pagewire - write buffering and push fan-out for reading apps"
)]
struct Cli {
    /// Daemon control socket
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', global = true, value_enum, default_value = "text")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show datastore health, queue depth and connected clients
    Status,
    /// Replay buffered writes now
    Flush,
    /// Stop the daemon
    Shutdown,
    /// Buffer a mutation for replay
    Enqueue(enqueue::EnqueueArgs),
    /// Push a progress update to a user's devices
    Progress(progress::ProgressArgs),
    /// Notify a topic's subscribers or a user's devices
    Notify(notify::NotifyArgs),
    /// Register with the notification server and print notifications
    Listen(listen::ListenArgs),
    /// Authenticate with the broadcast server and print progress updates
    Follow(follow::FollowArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let format = cli.output;

    let socket = cli.socket;
    let connect = move || {
        DaemonClient::connect(resolve_socket_path(socket, std::env::var(SOCKET_ENV).ok()))
    };

    match cli.command {
        Commands::Status => daemon::status(&connect()?, format).await,
        Commands::Flush => daemon::flush(&connect()?, format).await,
        Commands::Shutdown => daemon::shutdown(&connect()?).await,
        Commands::Enqueue(args) => enqueue::handle(&connect()?, args).await,
        Commands::Progress(args) => progress::handle(&connect()?, args).await,
        Commands::Notify(args) => notify::handle(&connect()?, args, format).await,
        // Device-side commands talk to the push servers, not the control socket
        Commands::Listen(args) => listen::handle(args, format).await,
        Commands::Follow(args) => follow::handle(args, format).await,
    }
}
