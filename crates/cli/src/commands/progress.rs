// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `pw progress` - Push a reading-progress update to a user's devices

use anyhow::Result;
use clap::Args;

use crate::client::DaemonClient;

#[derive(Args)]
pub struct ProgressArgs {
    #[arg(long)]
    pub user: i64,

    #[arg(long)]
    pub entity: i64,

    /// Chapter position (fractional for side chapters)
    #[arg(long)]
    pub position: f64,

    /// Sub-position, e.g. a page within the chapter
    #[arg(long)]
    pub sub: Option<i64>,
}

pub async fn handle(client: &DaemonClient, args: ProgressArgs) -> Result<()> {
    let delivered = client
        .progress(args.user, args.entity, args.position, args.sub)
        .await?;
    println!("Delivered to {delivered} device(s)");
    Ok(())
}
