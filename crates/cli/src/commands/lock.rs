// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `turnstile lock` - acquire, release, extend, inspect and run under locks

use super::Context;
use crate::error::{TurnstileError, EXIT_FAILURE};
use crate::output;
use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use std::fmt;
use std::process::{ExitCode, ExitStatus};
use std::time::Duration;
use turnstile_core::{AcquireOutcome, LockKey, LockOptions, LockToken};
use turnstile_engine::{RedisCoordinator, WithLockError};

#[derive(Args)]
pub struct LockArgs {
    #[command(subcommand)]
    pub command: LockCommand,
}

#[derive(Subcommand)]
pub enum LockCommand {
    /// Take a lock and print its token
    Acquire {
        #[command(flatten)]
        target: Target,
        #[command(flatten)]
        options: AcquireFlags,
    },
    /// Release a lock owned by TOKEN
    Release {
        #[command(flatten)]
        target: Target,
        /// Token printed by `lock acquire`
        token: String,
    },
    /// Reset the time to live of a lock owned by TOKEN
    Extend {
        #[command(flatten)]
        target: Target,
        /// Token printed by `lock acquire`
        token: String,
        /// New time to live, counted from now
        #[arg(long, value_parser = humantime::parse_duration)]
        ttl: Duration,
    },
    /// Show whether anyone holds a lock
    Status {
        #[command(flatten)]
        target: Target,
    },
    /// Run a command while holding a lock, releasing it afterwards
    Run {
        #[command(flatten)]
        target: Target,
        #[command(flatten)]
        options: AcquireFlags,
        /// Command and arguments, after `--`
        #[arg(last = true, required = true, value_name = "COMMAND")]
        command: Vec<String>,
    },
}

impl LockCommand {
    fn target(&self) -> &Target {
        match self {
            LockCommand::Acquire { target, .. }
            | LockCommand::Release { target, .. }
            | LockCommand::Extend { target, .. }
            | LockCommand::Status { target }
            | LockCommand::Run { target, .. } => target,
        }
    }
}

/// The resource a lock protects
#[derive(Args, Debug, Clone)]
pub struct Target {
    /// Resource type, e.g. `bookings`
    pub resource: String,
    /// Resource identifier
    pub id: String,
}

#[derive(Args, Debug, Clone)]
pub struct AcquireFlags {
    /// How long the lock lives unless released or extended
    #[arg(long, default_value = "30s", value_parser = humantime::parse_duration)]
    pub ttl: Duration,
    /// Retries after the first attempt
    #[arg(long, default_value_t = 3)]
    pub retries: u32,
    /// Delay before the first retry
    #[arg(long, default_value = "100ms", value_parser = humantime::parse_duration)]
    pub retry_delay: Duration,
    /// Growth factor applied to each further retry delay
    #[arg(long, default_value_t = 2.0)]
    pub backoff: f64,
}

impl AcquireFlags {
    pub fn options(&self) -> LockOptions {
        LockOptions::default()
            .with_ttl(self.ttl)
            .with_retry_attempts(self.retries)
            .with_retry_delay(self.retry_delay)
            .with_backoff_multiplier(self.backoff)
    }
}

#[derive(Serialize)]
struct Acquired<'a> {
    resource: &'a str,
    id: &'a str,
    token: &'a str,
    ttl_ms: u64,
}

impl fmt::Display for Acquired<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token)
    }
}

#[derive(Serialize)]
struct Changed<'a> {
    resource: &'a str,
    id: &'a str,
    action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ttl_ms: Option<u64>,
}

impl fmt::Display for Changed<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}:{}", self.action, self.resource, self.id)
    }
}

#[derive(Serialize)]
struct Status<'a> {
    resource: &'a str,
    id: &'a str,
    held: bool,
}

impl fmt::Display for Status<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", if self.held { "held" } else { "free" })
    }
}

pub async fn lock(args: LockArgs, ctx: &Context) -> Result<ExitCode> {
    // Bad keys fail before any connection is opened
    let target = args.command.target();
    LockKey::new(&target.resource, &target.id)?;

    let coordinator = ctx.connect()?;
    let result = dispatch(args.command, ctx, &coordinator).await;
    coordinator.disconnect().await;
    result
}

async fn dispatch(
    command: LockCommand,
    ctx: &Context,
    coordinator: &RedisCoordinator,
) -> Result<ExitCode> {
    let locks = coordinator.locks();
    if !locks.wait_ready(ctx.connect_timeout).await {
        return Err(ctx.unavailable().into());
    }

    match command {
        LockCommand::Acquire { target, options } => {
            let options = options.options();
            let outcome = locks.acquire(&target.resource, &target.id, &options).await?;
            let token = match outcome {
                AcquireOutcome::Acquired(token) => token,
                other => return Err(not_acquired(ctx, &target, other).into()),
            };
            output::print(
                &Acquired {
                    resource: &target.resource,
                    id: &target.id,
                    token: token.as_str(),
                    ttl_ms: millis(options.ttl),
                },
                ctx.output,
            );
        }
        LockCommand::Release { target, token } => {
            let token = LockToken::new(token);
            if !locks.release(&target.resource, &target.id, &token).await? {
                let err = TurnstileError::not_owner(&target.resource, &target.id, "released");
                return Err(err.into());
            }
            output::print(
                &Changed {
                    resource: &target.resource,
                    id: &target.id,
                    action: "released",
                    ttl_ms: None,
                },
                ctx.output,
            );
        }
        LockCommand::Extend { target, token, ttl } => {
            let token = LockToken::new(token);
            if !locks.extend(&target.resource, &target.id, &token, ttl).await? {
                let err = TurnstileError::not_owner(&target.resource, &target.id, "extended");
                return Err(err.into());
            }
            output::print(
                &Changed {
                    resource: &target.resource,
                    id: &target.id,
                    action: "extended",
                    ttl_ms: Some(millis(ttl)),
                },
                ctx.output,
            );
        }
        LockCommand::Status { target } => {
            let held = locks.exists(&target.resource, &target.id).await?;
            output::print(
                &Status {
                    resource: &target.resource,
                    id: &target.id,
                    held,
                },
                ctx.output,
            );
        }
        LockCommand::Run {
            target,
            options,
            command,
        } => return run_locked(ctx, coordinator, &target, &options.options(), &command).await,
    }

    Ok(ExitCode::SUCCESS)
}

async fn run_locked(
    ctx: &Context,
    coordinator: &RedisCoordinator,
    target: &Target,
    options: &LockOptions,
    command: &[String],
) -> Result<ExitCode> {
    let Some((program, args)) = command.split_first() else {
        return Err(TurnstileError::new("No command given").into());
    };

    let result = coordinator
        .locks()
        .with_lock(&target.resource, &target.id, options, || async move {
            tracing::info!(program = %program, "running under lock");
            tokio::process::Command::new(program).args(args).status().await
        })
        .await;

    match result {
        Ok(status) => Ok(exit_code(status)),
        Err(WithLockError::NotAcquired(outcome)) => Err(not_acquired(ctx, target, outcome).into()),
        Err(WithLockError::Lock(e)) => Err(e.into()),
        Err(WithLockError::Task(e)) => Err(TurnstileError::new(format!(
            "Failed to run {}: {}",
            program, e
        ))
        .with_source(e)
        .into()),
    }
}

fn not_acquired(ctx: &Context, target: &Target, outcome: AcquireOutcome) -> TurnstileError {
    match outcome {
        AcquireOutcome::Contended { attempts } => {
            TurnstileError::lock_contended(&target.resource, &target.id, attempts)
        }
        _ => ctx.unavailable(),
    }
}

fn millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}

/// Child exit status as our own; signals map to failure
fn exit_code(status: ExitStatus) -> ExitCode {
    let code = status
        .code()
        .and_then(|c| u8::try_from(c).ok())
        .unwrap_or(EXIT_FAILURE);
    ExitCode::from(code)
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
