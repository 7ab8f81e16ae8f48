// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! turnstile - distributed locks and events over Redis

mod commands;
mod completions;
mod error;
mod output;

use clap::{Parser, Subcommand};
use commands::{listen, lock, publish, Context};
use completions::CompletionsArgs;
use error::{TurnstileError, EXIT_FAILURE};
use output::OutputFormat;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use turnstile_core::STORE_URL_ENV;

#[derive(Parser)]
#[command(
    name = "turnstile",
    version,
    about = "Turnstile - distributed locks and pub/sub events over Redis"
)]
struct Cli {
    /// Coordination store, redis[s]://[user[:password]@]host[:port][/db]
    #[arg(long, global = true, env = STORE_URL_ENV, hide_env_values = true)]
    store_url: Option<String>,

    /// How long to wait for the store before giving up
    #[arg(
        long,
        global = true,
        default_value = "2s",
        value_parser = humantime::parse_duration
    )]
    connect_timeout: Duration,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Acquire, release, extend and inspect distributed locks
    Lock(lock::LockArgs),
    /// Publish a message to a channel
    Publish(publish::PublishArgs),
    /// Print messages from channels or patterns until interrupted
    Listen(listen::ListenArgs),
    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(err) => report(&err),
    }
}

/// Logs go to stderr so stdout stays parseable; `RUST_LOG` overrides the level
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let command = match cli.command {
        Commands::Completions(args) => {
            completions::generate_completions::<Cli>(args.shell);
            return Ok(ExitCode::SUCCESS);
        }
        other => other,
    };

    let ctx = Context::new(cli.store_url.as_deref(), cli.connect_timeout, cli.output)?;
    match command {
        Commands::Lock(args) => lock::lock(args, &ctx).await,
        Commands::Publish(args) => publish::publish(args, &ctx).await,
        Commands::Listen(args) => listen::listen(args, &ctx).await,
        Commands::Completions(_) => Ok(ExitCode::SUCCESS),
    }
}

fn report(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<TurnstileError>() {
        Some(e) => {
            eprint!("{}", e);
            e.exit()
        }
        None => {
            eprintln!("error: {:#}", err);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
