// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output formatting for CLI commands

use clap::ValueEnum;
use serde::Serialize;
use turnstile_core::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Print output in the specified format
pub fn print<T: Serialize + std::fmt::Display>(value: &T, format: OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", value),
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(value) {
                println!("{}", json);
            }
        }
    }
}

/// Print one inbound message per line, suitable for piping
pub fn print_message(message: &Message, format: OutputFormat) {
    println!("{}", render_message(message, format));
}

pub(crate) fn render_message(message: &Message, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => match &message.pattern {
            Some(pattern) => format!("{} {} {}", pattern, message.channel, message.payload),
            None => format!("{} {}", message.channel, message.payload),
        },
        OutputFormat::Json => serde_json::to_string(message).unwrap_or_default(),
    }
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
