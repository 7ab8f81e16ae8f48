// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordination primitives for distributed resource management
//!
//! This module provides:
//! - **LockKey** - Validated `(resource, resource_id)` pairs and their store keys
//! - **LockOptions** - TTL and retry/backoff settings for acquisition
//! - **LockSlot** - The per-key `FREE -> HELD(token) -> FREE` state machine
//! - **SubscriptionRegistry** - Channel to handler bookkeeping for the event relay

pub mod key;
pub mod lock;
pub mod registry;

pub use key::{KeyError, LockKey, LOCK_KEY_PREFIX};
pub use lock::{
    validate_ttl, AcquireOutcome, LockOptions, LockSlot, OptionsError, SlotEvent, SlotInput,
};
pub use registry::{Added, Removal, SubscriptionId, SubscriptionRegistry};
