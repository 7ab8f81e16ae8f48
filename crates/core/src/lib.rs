// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! turnstile-core: Core types for the Turnstile coordination layer
//!
//! This crate provides:
//! - Lock keys, options, tokens and the per-key lock state machine
//! - Reconnect policy and connection readiness shared by every store connection
//! - The subscription registry behind the event relay
//! - Pub/sub payloads and the store connection string

pub mod clock;
pub mod config;
pub mod coordination;
pub mod message;
pub mod resilience;
pub mod token;

// Re-exports
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{ConfigError, StoreConfig, DEFAULT_PORT, STORE_URL_ENV};
pub use coordination::{
    AcquireOutcome, Added, KeyError, LockKey, LockOptions, LockSlot, OptionsError, Removal,
    SlotEvent, SlotInput, SubscriptionId, SubscriptionRegistry, validate_ttl,
};
pub use message::{Message, Payload};
pub use resilience::{
    ConnectionRole, ConnectionStatus, Readiness, ReconnectAction, ReconnectPolicy, ReconnectState,
};
pub use token::{LockToken, ProcessTokenMint, SequentialTokenMint, TokenMint};
