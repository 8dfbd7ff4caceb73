// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `pw enqueue <kind>` - Buffer a mutation for replay

use anyhow::Result;
use clap::Args;
use pw_core::OperationKind;
use serde_json::Value;

use super::fields::{into_payload, parse_field};
use crate::client::DaemonClient;

#[derive(Args)]
pub struct EnqueueArgs {
    /// Operation kind (e.g. update_progress, add_to_library)
    pub kind: String,

    /// User performing the mutation
    #[arg(long)]
    pub actor: i64,

    /// Entity the mutation applies to
    #[arg(long)]
    pub target: i64,

    /// Payload fields (key=value, value parsed as JSON when possible)
    #[arg(short = 'f', long = "field", value_parser = parse_field)]
    pub fields: Vec<(String, Value)>,
}

pub async fn handle(client: &DaemonClient, args: EnqueueArgs) -> Result<()> {
    let kind = OperationKind::from(args.kind.as_str());
    let id = client
        .enqueue(kind, args.actor, args.target, into_payload(args.fields))
        .await?;
    println!("{id}");
    Ok(())
}
