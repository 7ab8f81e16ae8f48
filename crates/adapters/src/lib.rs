// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for the coordination store

pub mod connector;
pub mod error;
pub mod pubsub;
pub mod store;
pub mod supervisor;
pub mod traced;

pub use connector::{RedisConnector, RedisOptions};
pub use error::StoreError;
pub use pubsub::{Publisher, RedisPublisher, RedisSubscriber, Subscriber, MESSAGE_BUFFER};
pub use store::{LockStore, RedisLockStore};
pub use supervisor::{Connector, Lease, Supervisor};
pub use traced::{TracedLockStore, TracedPublisher, TracedSubscriber};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use pubsub::{glob_match, FakeBroker, FakePublisher, FakeSubscriber, PubSubCall};
#[cfg(any(test, feature = "test-support"))]
pub use store::{FakeLockStore, StoreCall};
