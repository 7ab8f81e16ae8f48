// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `turnstile publish`

use super::Context;
use crate::error::TurnstileError;
use crate::output;
use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::fmt;
use std::process::ExitCode;
use turnstile_adapters::Publisher;
use turnstile_core::Payload;

#[derive(Args)]
pub struct PublishArgs {
    /// Channel to publish on
    pub channel: String,
    /// Message body
    pub data: String,
    /// Parse DATA as JSON and publish it re-encoded
    #[arg(long)]
    pub json: bool,
}

impl PublishArgs {
    fn payload(&self) -> Result<Payload, TurnstileError> {
        if !self.json {
            return Ok(Payload::text(self.data.clone()));
        }
        let value: serde_json::Value = serde_json::from_str(&self.data).map_err(|e| {
            TurnstileError::new("Message body is not valid JSON")
                .with_context(e.to_string())
                .with_suggestion("Drop --json to publish the text as-is")
                .with_source(e)
        })?;
        Ok(Payload::from(value))
    }
}

#[derive(Serialize)]
struct Published<'a> {
    channel: &'a str,
    receivers: u64,
}

impl fmt::Display for Published<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.receivers)
    }
}

pub async fn publish(args: PublishArgs, ctx: &Context) -> Result<ExitCode> {
    let payload = args.payload()?;

    let coordinator = ctx.connect()?;
    let relay = coordinator.relay();
    let ready = relay
        .publisher()
        .readiness()
        .wait_ready(ctx.connect_timeout)
        .await;
    let result = if ready {
        let receivers = relay.publish(&args.channel, payload).await;
        output::print(
            &Published {
                channel: &args.channel,
                receivers,
            },
            ctx.output,
        );
        Ok(ExitCode::SUCCESS)
    } else {
        Err(ctx.unavailable().into())
    };

    coordinator.disconnect().await;
    result
}

#[cfg(test)]
#[path = "publish_tests.rs"]
mod tests;
