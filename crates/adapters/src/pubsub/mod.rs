// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Publish/subscribe adapters
//!
//! Publishing and subscribing use separate connections: a connection in
//! subscribe mode cannot issue other commands.

mod redis_pubsub;

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
mod pattern;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeBroker, FakePublisher, FakeSubscriber, PubSubCall};
#[cfg(any(test, feature = "test-support"))]
pub use pattern::glob_match;

pub use redis_pubsub::{RedisPublisher, RedisSubscriber};

use crate::error::StoreError;
use async_trait::async_trait;
use tokio::sync::mpsc;
use turnstile_core::{Message, Payload, Readiness};

/// Inbound messages buffered per subscriber before new ones are dropped
pub const MESSAGE_BUFFER: usize = 1024;

/// Sends messages to channels
#[async_trait]
pub trait Publisher: Clone + Send + Sync + 'static {
    fn readiness(&self) -> &Readiness;

    fn is_ready(&self) -> bool {
        self.readiness().is_ready()
    }

    /// Returns how many subscribers received the message
    async fn publish(&self, channel: &str, payload: &Payload) -> Result<u64, StoreError>;

    /// Ask the connection to come back after it gave up
    fn reconnect(&self) {}

    async fn close(&self);
}

/// Receives messages for channels and glob patterns
#[async_trait]
pub trait Subscriber: Clone + Send + Sync + 'static {
    fn readiness(&self) -> &Readiness;

    fn is_ready(&self) -> bool {
        self.readiness().is_ready()
    }

    async fn subscribe(&self, channel: &str) -> Result<(), StoreError>;

    async fn unsubscribe(&self, channel: &str) -> Result<(), StoreError>;

    async fn psubscribe(&self, pattern: &str) -> Result<(), StoreError>;

    async fn punsubscribe(&self, pattern: &str) -> Result<(), StoreError>;

    /// Stream of inbound messages; only the first call gets it
    fn take_messages(&self) -> Option<mpsc::Receiver<Message>>;

    /// Ask the connection to come back after it gave up
    fn reconnect(&self) {}

    async fn close(&self);
}
