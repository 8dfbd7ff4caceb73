// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `pw notify` - Send a notification to a topic's or a user's devices

use std::fmt;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use serde_json::Value;

use super::fields::{into_payload, parse_field};
use crate::client::DaemonClient;
use crate::output::{self, OutputFormat};

#[derive(Args)]
#[command(group(clap::ArgGroup::new("audience").required(true).args(["topic", "user"])))]
pub struct NotifyArgs {
    /// Topic (e.g. a series) whose subscribers are notified
    #[arg(long)]
    pub topic: Option<i64>,

    /// User whose devices are notified
    #[arg(long)]
    pub user: Option<i64>,

    /// Notification name (e.g. chapter-released)
    #[arg(long)]
    pub name: String,

    /// Extra fields (key=value, value parsed as JSON when possible)
    #[arg(short = 'f', long = "field", value_parser = parse_field)]
    pub fields: Vec<(String, Value)>,
}

#[derive(Serialize)]
struct FanoutView {
    recipients: usize,
}

impl fmt::Display for FanoutView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Notifying {} recipient(s)", self.recipients)
    }
}

pub async fn handle(client: &DaemonClient, args: NotifyArgs, format: OutputFormat) -> Result<()> {
    let extra = into_payload(args.fields);
    let recipients = match (args.topic, args.user) {
        (Some(topic), _) => client.notify_topic(topic, args.name, extra).await?,
        (None, Some(user)) => client.notify_user(user, args.name, extra).await?,
        (None, None) => anyhow::bail!("either --topic or --user is required"),
    };
    output::print(&FanoutView { recipients }, format);
    Ok(())
}
