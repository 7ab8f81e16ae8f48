// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock tokens and the mints that produce them

use crate::clock::{Clock, SystemClock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Opaque proof of ownership for a held lock
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockToken(String);

impl LockToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LockToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for LockToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for LockToken {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

/// Mints fresh lock tokens
pub trait TokenMint: Clone + Send + Sync + 'static {
    fn mint(&self) -> LockToken;
}

/// Token mint for production use
///
/// Tokens have the form `{instance}-{pid}-{epoch_ms}-{counter}`. The instance
/// id is random per mint, so two processes that share a pid (containers) still
/// produce distinct tokens.
#[derive(Clone, Debug)]
pub struct ProcessTokenMint<C: Clock = SystemClock> {
    instance: Arc<str>,
    pid: u32,
    counter: Arc<AtomicU64>,
    clock: C,
}

impl ProcessTokenMint<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for ProcessTokenMint<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> ProcessTokenMint<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            instance: uuid::Uuid::new_v4().simple().to_string().into(),
            pid: std::process::id(),
            counter: Arc::new(AtomicU64::new(0)),
            clock,
        }
    }

    /// Random identifier shared by every token from this mint
    pub fn instance(&self) -> &str {
        &self.instance
    }
}

impl<C: Clock> TokenMint for ProcessTokenMint<C> {
    fn mint(&self) -> LockToken {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        LockToken(format!(
            "{}-{}-{}-{}",
            self.instance,
            self.pid,
            self.clock.epoch_ms(),
            n
        ))
    }
}

/// Sequential token mint for testing
#[derive(Clone, Debug)]
pub struct SequentialTokenMint {
    prefix: String,
    counter: Arc<AtomicU64>,
}

impl SequentialTokenMint {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Default for SequentialTokenMint {
    fn default() -> Self {
        Self::new("token")
    }
}

impl TokenMint for SequentialTokenMint {
    fn mint(&self) -> LockToken {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        LockToken(format!("{}-{}", self.prefix, n))
    }
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
