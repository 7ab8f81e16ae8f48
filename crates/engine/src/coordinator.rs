// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide bundle of the lock manager and event relay
//!
//! A host builds one [`Coordinator`] at start-up and shares clones of it.
//! It owns the three store connections (lock, publisher, subscriber) and
//! closes them together on [`Coordinator::disconnect`].

use crate::error::CoordinatorError;
use crate::lock_manager::LockManager;
use crate::relay::EventRelay;
use serde::Serialize;
use std::time::Duration;
use turnstile_adapters::{
    LockStore, Publisher, RedisLockStore, RedisOptions, RedisPublisher, RedisSubscriber,
    Subscriber, TracedLockStore, TracedPublisher, TracedSubscriber,
};
use turnstile_core::{ConnectionStatus, LockOptions, StoreConfig};

/// Code-level tuning for [`Coordinator::connect`]
#[derive(Debug, Clone, Default)]
pub struct CoordinatorOptions {
    pub redis: RedisOptions,
    /// Options for [`LockManager::acquire_default`]
    pub lock_defaults: LockOptions,
}

/// Status of each connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoordinatorStatus {
    pub lock: ConnectionStatus,
    pub publisher: ConnectionStatus,
    pub subscriber: ConnectionStatus,
}

impl CoordinatorStatus {
    pub fn all_ready(&self) -> bool {
        [&self.lock, &self.publisher, &self.subscriber]
            .iter()
            .all(|s| **s == ConnectionStatus::Ready)
    }
}

/// Coordinator over Redis with traced adapters
pub type RedisCoordinator = Coordinator<
    TracedLockStore<RedisLockStore>,
    TracedPublisher<RedisPublisher>,
    TracedSubscriber<RedisSubscriber>,
>;

/// Owns the store connections and the components built on them
#[derive(Clone)]
pub struct Coordinator<L, P, S> {
    locks: LockManager<L>,
    relay: EventRelay<P, S>,
}

impl RedisCoordinator {
    /// Open all three connections in the background. Requires a Tokio runtime.
    ///
    /// Returns as soon as the connections are started; use
    /// [`Coordinator::wait_ready`] to block start-up until they are up.
    pub fn connect(
        config: &StoreConfig,
        options: CoordinatorOptions,
    ) -> Result<Self, CoordinatorError> {
        tracing::info!(store = %config, "connecting to coordination store");
        let store = RedisLockStore::connect(config, &options.redis)?;
        let publisher = RedisPublisher::connect(config, &options.redis)?;
        let subscriber = RedisSubscriber::connect(config, &options.redis)?;

        Ok(Self::from_parts(
            TracedLockStore::new(store),
            TracedPublisher::new(publisher),
            TracedSubscriber::new(subscriber),
            options.lock_defaults,
        ))
    }

    /// Parse a connection string and connect
    pub fn connect_url(url: &str, options: CoordinatorOptions) -> Result<Self, CoordinatorError> {
        let config = StoreConfig::parse(url)?;
        Self::connect(&config, options)
    }
}

impl<L: LockStore, P: Publisher, S: Subscriber> Coordinator<L, P, S> {
    /// Assemble from already-open adapters. Requires a Tokio runtime.
    pub fn from_parts(store: L, publisher: P, subscriber: S, lock_defaults: LockOptions) -> Self {
        Self {
            locks: LockManager::new(store).with_defaults(lock_defaults),
            relay: EventRelay::new(publisher, subscriber),
        }
    }

    pub fn locks(&self) -> &LockManager<L> {
        &self.locks
    }

    pub fn relay(&self) -> &EventRelay<P, S> {
        &self.relay
    }

    pub fn status(&self) -> CoordinatorStatus {
        CoordinatorStatus {
            lock: self.locks.store().readiness().status(),
            publisher: self.relay.publisher().readiness().status(),
            subscriber: self.relay.subscriber().readiness().status(),
        }
    }

    /// Wait for every connection, for host start-up only
    pub async fn wait_ready(&self, timeout: Duration) -> bool {
        let (locks, relay) = tokio::join!(
            self.locks.wait_ready(timeout),
            self.relay.wait_ready(timeout)
        );
        locks && relay
    }

    /// Restart any connection that gave up reconnecting
    pub fn reconnect(&self) {
        self.locks.store().reconnect();
        self.relay.reconnect();
    }

    /// Close every connection and stop dispatch. Idempotent.
    pub async fn disconnect(&self) {
        self.relay.disconnect().await;
        self.locks.store().close().await;
        tracing::info!("coordination store disconnected");
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
