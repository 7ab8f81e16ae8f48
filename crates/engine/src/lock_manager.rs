// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Distributed lock manager
//!
//! Each acquisition mints a fresh token and sets `lock:{resource}:{id}` to it
//! only if the key is absent. Release and extend succeed only for the token
//! that set the key, so a caller whose lock already expired can never free or
//! prolong someone else's.

use crate::error::{LockError, WithLockError};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use turnstile_adapters::LockStore;
use turnstile_core::{
    validate_ttl, AcquireOutcome, LockKey, LockOptions, LockToken, ProcessTokenMint, TokenMint,
};

/// Acquires, releases and extends locks on a [`LockStore`]
#[derive(Clone)]
pub struct LockManager<S, M = ProcessTokenMint> {
    store: S,
    mint: M,
    defaults: LockOptions,
}

impl<S: LockStore> LockManager<S> {
    pub fn new(store: S) -> Self {
        Self::with_mint(store, ProcessTokenMint::new())
    }
}

impl<S: LockStore, M: TokenMint> LockManager<S, M> {
    pub fn with_mint(store: S, mint: M) -> Self {
        Self {
            store,
            mint,
            defaults: LockOptions::default(),
        }
    }

    /// Options used by [`LockManager::acquire_default`]
    pub fn with_defaults(mut self, defaults: LockOptions) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn defaults(&self) -> &LockOptions {
        &self.defaults
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn is_ready(&self) -> bool {
        self.store.is_ready()
    }

    /// Wait for the lock connection, for host start-up only
    pub async fn wait_ready(&self, timeout: Duration) -> bool {
        self.store.readiness().wait_ready(timeout).await
    }

    /// Acquire with the manager's default options
    pub async fn acquire_default(
        &self,
        resource: &str,
        resource_id: &str,
    ) -> Result<AcquireOutcome, LockError> {
        let options = self.defaults.clone();
        self.acquire(resource, resource_id, &options).await
    }

    /// Try to take the lock, retrying with exponential backoff while it is held
    ///
    /// Returns immediately with [`AcquireOutcome::Unavailable`] when the lock
    /// connection is not ready, and stops retrying if it drops mid-way.
    pub async fn acquire(
        &self,
        resource: &str,
        resource_id: &str,
        options: &LockOptions,
    ) -> Result<AcquireOutcome, LockError> {
        let key = LockKey::new(resource, resource_id)?;
        options.validate()?;

        if !self.store.is_ready() {
            tracing::warn!(%key, "lock store not ready, acquire skipped");
            return Ok(AcquireOutcome::Unavailable);
        }

        let store_key = key.store_key();
        let token = self.mint.mint();
        let attempts = options.total_attempts();

        for attempt in 0..attempts {
            let last = attempt + 1 == attempts;

            match self.store.set_if_absent(&store_key, &token, options.ttl).await {
                Ok(true) => {
                    tracing::debug!(%key, attempt = attempt + 1, "lock acquired");
                    return Ok(AcquireOutcome::Acquired(token));
                }
                Ok(false) => tracing::debug!(%key, attempt = attempt + 1, "lock held elsewhere"),
                Err(e) if e.is_unavailable() => {
                    tracing::warn!(%key, error = %e, "lock store unavailable during acquire");
                    return Ok(AcquireOutcome::Unavailable);
                }
                Err(e) if last => return Err(LockError::Store(e)),
                Err(e) => tracing::warn!(
                    %key,
                    attempt = attempt + 1,
                    error = %e,
                    "acquire attempt failed, retrying"
                ),
            }

            if last {
                break;
            }
            if !self.store.is_ready() {
                tracing::warn!(%key, "lock connection lost, acquire abandoned");
                return Ok(AcquireOutcome::Unavailable);
            }
            tokio::time::sleep(options.delay_for(attempt)).await;
        }

        tracing::info!(%key, attempts, "lock contended");
        Ok(AcquireOutcome::Contended { attempts })
    }

    /// Release the lock if `token` still owns it
    ///
    /// `Ok(false)` when the token does not own the key (expired, released, or
    /// never held) or the store is not ready.
    pub async fn release(
        &self,
        resource: &str,
        resource_id: &str,
        token: &LockToken,
    ) -> Result<bool, LockError> {
        let key = LockKey::new(resource, resource_id)?;
        if !self.store.is_ready() {
            tracing::warn!(%key, "lock store not ready, release skipped");
            return Ok(false);
        }

        match self.store.delete_if_owner(&key.store_key(), token).await {
            Ok(released) => {
                if !released {
                    tracing::debug!(%key, "release ignored, token does not own the lock");
                }
                Ok(released)
            }
            Err(e) if e.is_unavailable() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Reset the TTL to `ttl` if `token` still owns the lock
    pub async fn extend(
        &self,
        resource: &str,
        resource_id: &str,
        token: &LockToken,
        ttl: Duration,
    ) -> Result<bool, LockError> {
        let key = LockKey::new(resource, resource_id)?;
        validate_ttl(ttl)?;
        if !self.store.is_ready() {
            tracing::warn!(%key, "lock store not ready, extend skipped");
            return Ok(false);
        }

        match self.store.expire_if_owner(&key.store_key(), token, ttl).await {
            Ok(extended) => {
                if !extended {
                    tracing::debug!(%key, "extend ignored, token does not own the lock");
                }
                Ok(extended)
            }
            Err(e) if e.is_unavailable() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether anyone currently holds the lock. Informational only.
    pub async fn exists(&self, resource: &str, resource_id: &str) -> Result<bool, LockError> {
        let key = LockKey::new(resource, resource_id)?;
        if !self.store.is_ready() {
            return Ok(false);
        }

        match self.store.exists(&key.store_key()).await {
            Ok(held) => Ok(held),
            Err(e) if e.is_unavailable() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Run `task` while holding the lock
    ///
    /// The lock is released after the task returns `Ok`, returns `Err`, or
    /// panics; a panic resumes once the lock is released. If the returned
    /// future is dropped mid-task the lock is left to expire with its TTL.
    pub async fn with_lock<T, E, F, Fut>(
        &self,
        resource: &str,
        resource_id: &str,
        options: &LockOptions,
        task: F,
    ) -> Result<T, WithLockError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let token = match self.acquire(resource, resource_id, options).await? {
            AcquireOutcome::Acquired(token) => token,
            outcome => return Err(WithLockError::NotAcquired(outcome)),
        };

        let outcome = AssertUnwindSafe(async move { task().await })
            .catch_unwind()
            .await;

        match self.release(resource, resource_id, &token).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(
                resource,
                resource_id,
                "lock no longer held at release, ttl may have run out"
            ),
            Err(e) => tracing::warn!(
                resource,
                resource_id,
                error = %e,
                "release after critical section failed"
            ),
        }

        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(WithLockError::Task(e)),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

#[cfg(test)]
#[path = "lock_manager_tests.rs"]
mod tests;
