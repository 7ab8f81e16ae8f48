// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock store adapters

mod redis_store;

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeLockStore, StoreCall};

pub use redis_store::RedisLockStore;

use crate::error::StoreError;
use async_trait::async_trait;
use std::time::Duration;
use turnstile_core::{LockToken, Readiness};

/// Atomic single-key operations backing the lock manager
///
/// Keys arrive fully formed (`lock:{resource}:{id}`); implementations do not
/// interpret them.
#[async_trait]
pub trait LockStore: Clone + Send + Sync + 'static {
    /// Readiness of the connection behind this store
    fn readiness(&self) -> &Readiness;

    fn is_ready(&self) -> bool {
        self.readiness().is_ready()
    }

    /// Set `key` to `token` with a TTL, only if absent. `Ok(false)` when held.
    async fn set_if_absent(
        &self,
        key: &str,
        token: &LockToken,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    /// Delete `key` only if it holds `token`
    async fn delete_if_owner(&self, key: &str, token: &LockToken) -> Result<bool, StoreError>;

    /// Reset the TTL of `key` only if it holds `token`
    async fn expire_if_owner(
        &self,
        key: &str,
        token: &LockToken,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Ask the connection to come back after it gave up
    fn reconnect(&self) {}

    /// Drop the connection for good
    async fn close(&self);
}

/// TTL in whole milliseconds for PX / PEXPIRE
pub(crate) fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}
