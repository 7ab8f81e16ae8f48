// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Turnstile lock manager and event relay

mod coordinator;
mod error;
mod lock_manager;
mod relay;

pub use coordinator::{Coordinator, CoordinatorOptions, CoordinatorStatus, RedisCoordinator};
pub use error::{CoordinatorError, LockError, RelayError, WithLockError};
pub use lock_manager::LockManager;
pub use relay::{EventRelay, HandlerError, HandlerResult, MessageHandler};
