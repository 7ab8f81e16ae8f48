// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the lock manager, relay and coordinator

use thiserror::Error;
use turnstile_adapters::StoreError;
use turnstile_core::{AcquireOutcome, ConfigError, KeyError, OptionsError};

/// Errors from lock operations
///
/// An unavailable store is not an error: acquire reports
/// [`AcquireOutcome::Unavailable`] and the other operations return `false`.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("invalid lock key: {0}")]
    InvalidKey(#[from] KeyError),
    #[error("invalid lock options: {0}")]
    InvalidOptions(#[from] OptionsError),
    #[error("lock store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from [`crate::LockManager::with_lock`]
#[derive(Debug, Error)]
pub enum WithLockError<E> {
    /// The lock was contended or the store unavailable; the task did not run
    #[error("lock not acquired: {0}")]
    NotAcquired(AcquireOutcome),
    #[error(transparent)]
    Lock(#[from] LockError),
    /// The task ran under the lock and failed
    #[error("{0}")]
    Task(E),
}

impl<E> WithLockError<E> {
    pub fn is_not_acquired(&self) -> bool {
        matches!(self, WithLockError::NotAcquired(_))
    }

    /// The task's own error, if that is what this is
    pub fn into_task(self) -> Option<E> {
        match self {
            WithLockError::Task(e) => Some(e),
            _ => None,
        }
    }
}

/// Errors from the event relay's typed helpers
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("payload encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors from building a coordinator
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
