// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User-friendly error display with context and suggestions.
//!
//! Each error carries:
//! - What went wrong (message)
//! - Why it might have happened (context)
//! - How to fix it (suggestions)
//! - The process exit code it maps to

use std::fmt;
use std::process::ExitCode;
use std::time::Duration;
use turnstile_core::STORE_URL_ENV;

/// Generic failure
pub const EXIT_FAILURE: u8 = 1;
/// The lock stayed held by someone else
pub const EXIT_CONTENDED: u8 = 3;
/// The coordination store could not be reached
pub const EXIT_UNAVAILABLE: u8 = 4;

/// Error with context and recovery suggestions for user-friendly display.
#[derive(Debug)]
pub struct TurnstileError {
    /// What went wrong
    pub message: String,
    /// Why it might have happened
    pub context: Vec<String>,
    /// How to fix it
    pub suggestions: Vec<String>,
    pub exit_code: u8,
    /// Original error if any
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TurnstileError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: Vec::new(),
            suggestions: Vec::new(),
            exit_code: EXIT_FAILURE,
            source: None,
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_exit_code(mut self, code: u8) -> Self {
        self.exit_code = code;
        self
    }

    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn exit(&self) -> ExitCode {
        ExitCode::from(self.exit_code)
    }
}

impl fmt::Display for TurnstileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {}", self.message)?;

        if !self.context.is_empty() {
            writeln!(f)?;
            for ctx in &self.context {
                writeln!(f, "  -> {}", ctx)?;
            }
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            writeln!(f, "suggestions:")?;
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                writeln!(f, "  {}. {}", i + 1, suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for TurnstileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Common error builders for typical failure scenarios.
impl TurnstileError {
    pub fn missing_store_url() -> Self {
        TurnstileError::new("No coordination store configured")
            .with_suggestion("Pass --store-url redis://localhost:6379")
            .with_suggestion(format!(
                "Or set {}=redis://localhost:6379",
                STORE_URL_ENV
            ))
    }

    pub fn invalid_store_url(source: turnstile_core::ConfigError) -> Self {
        TurnstileError::new(format!("Invalid store URL: {}", source))
            .with_context("Expected redis[s]://[user[:password]@]host[:port][/db]")
            .with_source(source)
    }

    pub fn store_unavailable(store: &str, timeout: Duration) -> Self {
        TurnstileError::new(format!("Coordination store {} is unavailable", store))
            .with_context(format!(
                "No connection within {}",
                humantime::format_duration(timeout)
            ))
            .with_suggestion("Check that the store is running and reachable")
            .with_suggestion("Allow more time with --connect-timeout")
            .with_exit_code(EXIT_UNAVAILABLE)
    }

    pub fn lock_contended(resource: &str, id: &str, attempts: u32) -> Self {
        TurnstileError::new(format!("Lock {}:{} is held by another owner", resource, id))
            .with_context(format!("Gave up after {} attempts", attempts))
            .with_suggestion("Wait for the current holder to release or for its TTL to run out")
            .with_suggestion("Retry longer with --retries or --retry-delay")
            .with_suggestion(format!("Check the lock: turnstile lock status {} {}", resource, id))
            .with_exit_code(EXIT_CONTENDED)
    }

    pub fn not_owner(resource: &str, id: &str, action: &str) -> Self {
        TurnstileError::new(format!("Lock {}:{} was not {}", resource, id, action))
            .with_context("The token does not own the lock")
            .with_context("The lock may have expired or been released already")
            .with_suggestion(format!("Check the lock: turnstile lock status {} {}", resource, id))
    }

    pub fn subscribe_failed(topic: &str) -> Self {
        TurnstileError::new(format!("Could not subscribe to {}", topic))
            .with_context("The subscriber connection dropped or the store refused the request")
            .with_exit_code(EXIT_UNAVAILABLE)
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
