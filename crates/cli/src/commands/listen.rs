// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `turnstile listen` - print inbound messages until interrupted

use super::Context;
use crate::error::TurnstileError;
use crate::output;
use anyhow::Result;
use clap::Args;
use std::process::ExitCode;
use tokio::sync::mpsc;
use turnstile_adapters::Subscriber;
use turnstile_core::Message;
use turnstile_engine::{HandlerResult, RedisCoordinator};

#[derive(Args)]
pub struct ListenArgs {
    /// Channels to listen on, or glob patterns with --pattern
    #[arg(required = true, value_name = "TOPIC")]
    pub topics: Vec<String>,
    /// Treat every TOPIC as a glob pattern
    #[arg(long)]
    pub pattern: bool,
    /// Exit after this many messages
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub count: Option<u64>,
}

pub async fn listen(args: ListenArgs, ctx: &Context) -> Result<ExitCode> {
    let coordinator = ctx.connect()?;
    let result = receive(&args, ctx, &coordinator).await;
    coordinator.disconnect().await;
    result
}

async fn receive(
    args: &ListenArgs,
    ctx: &Context,
    coordinator: &RedisCoordinator,
) -> Result<ExitCode> {
    let relay = coordinator.relay();
    if !relay
        .subscriber()
        .readiness()
        .wait_ready(ctx.connect_timeout)
        .await
    {
        return Err(ctx.unavailable().into());
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    for topic in &args.topics {
        let tx = tx.clone();
        let handler = move |message: &Message| -> HandlerResult {
            tx.send(message.clone())?;
            Ok(())
        };
        let id = if args.pattern {
            relay.psubscribe(topic, handler).await
        } else {
            relay.subscribe(topic, handler).await
        };
        if id.is_none() {
            return Err(TurnstileError::subscribe_failed(topic).into());
        }
    }
    drop(tx);
    tracing::info!(topics = ?args.topics, pattern = args.pattern, "listening");

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    let mut received = 0u64;
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!(received, "interrupted");
                break;
            }
            message = rx.recv() => {
                let Some(message) = message else { break };
                output::print_message(&message, ctx.output);
                received += 1;
                if args.count.is_some_and(|limit| received >= limit) {
                    break;
                }
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Resolves on Ctrl-C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
