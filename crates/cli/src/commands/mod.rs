// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store-backed commands

pub mod listen;
pub mod lock;
pub mod publish;

use crate::error::TurnstileError;
use crate::output::OutputFormat;
use std::time::Duration;
use turnstile_adapters::RedisOptions;
use turnstile_core::{LockOptions, StoreConfig};
use turnstile_engine::{CoordinatorOptions, RedisCoordinator};

/// Settings shared by every command that talks to the store
#[derive(Debug)]
pub struct Context {
    pub store: StoreConfig,
    /// How long a command waits for its connection before giving up
    pub connect_timeout: Duration,
    pub output: OutputFormat,
}

impl Context {
    pub fn new(
        store_url: Option<&str>,
        connect_timeout: Duration,
        output: OutputFormat,
    ) -> Result<Self, TurnstileError> {
        let url = store_url.ok_or_else(TurnstileError::missing_store_url)?;
        let store = StoreConfig::parse(url).map_err(TurnstileError::invalid_store_url)?;
        Ok(Self {
            store,
            connect_timeout,
            output,
        })
    }

    /// Start the store connections in the background
    pub fn connect(&self) -> anyhow::Result<RedisCoordinator> {
        let options = CoordinatorOptions {
            redis: RedisOptions::default().with_connect_timeout(self.connect_timeout),
            lock_defaults: LockOptions::default(),
        };
        Ok(RedisCoordinator::connect(&self.store, options)?)
    }

    pub fn unavailable(&self) -> TurnstileError {
        TurnstileError::store_unavailable(&self.store.redacted(), self.connect_timeout)
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
