// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Publish/subscribe event relay
//!
//! Handlers register per channel (or glob pattern). The relay holds one
//! store-level subscription per topic no matter how many handlers share it,
//! subscribing when the first handler arrives and unsubscribing when the last
//! leaves. A background task drains the subscriber's inbound stream and fans
//! each message out to the handlers registered for its topic.
//!
//! Delivery is best-effort: nothing is retried or buffered while the store is
//! down.

use crate::error::RelayError;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use turnstile_adapters::{Publisher, Subscriber};
use turnstile_core::{Message, Payload, Removal, SubscriptionId, SubscriptionRegistry};

/// Error a handler may return; it is logged and otherwise ignored
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

pub type HandlerResult = Result<(), HandlerError>;

/// Callback for inbound messages
pub trait MessageHandler: Send + Sync + 'static {
    fn handle(&self, message: &Message) -> HandlerResult;
}

impl<F> MessageHandler for F
where
    F: Fn(&Message) -> HandlerResult + Send + Sync + 'static,
{
    fn handle(&self, message: &Message) -> HandlerResult {
        self(message)
    }
}

type SharedHandler = Arc<dyn MessageHandler>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TopicKind {
    Channel,
    Pattern,
}

impl std::fmt::Display for TopicKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TopicKind::Channel => write!(f, "channel"),
            TopicKind::Pattern => write!(f, "pattern"),
        }
    }
}

struct RelayInner<P, S> {
    publisher: P,
    subscriber: S,
    channels: Mutex<SubscriptionRegistry<SharedHandler>>,
    patterns: Mutex<SubscriptionRegistry<SharedHandler>>,
    /// Serializes first-subscribe and last-unsubscribe with their store calls
    topic_ops: tokio::sync::Mutex<()>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

/// Publishes messages and routes inbound ones to registered handlers
pub struct EventRelay<P, S> {
    inner: Arc<RelayInner<P, S>>,
}

impl<P, S> Clone for EventRelay<P, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl<P: Publisher, S: Subscriber> EventRelay<P, S> {
    /// Build the relay and start dispatching. Requires a Tokio runtime.
    pub fn new(publisher: P, subscriber: S) -> Self {
        let messages = subscriber.take_messages();
        let relay = Self {
            inner: Arc::new(RelayInner {
                publisher,
                subscriber,
                channels: Mutex::new(SubscriptionRegistry::new()),
                patterns: Mutex::new(SubscriptionRegistry::new()),
                topic_ops: tokio::sync::Mutex::new(()),
                dispatcher: Mutex::new(None),
            }),
        };

        match messages {
            Some(messages) => {
                let inner = Arc::downgrade(&relay.inner);
                let handle = tokio::spawn(dispatch_loop(inner, messages));
                *lock(&relay.inner.dispatcher) = Some(handle);
            }
            None => tracing::warn!("subscriber stream already taken, nothing will be dispatched"),
        }
        relay
    }

    pub fn publisher(&self) -> &P {
        &self.inner.publisher
    }

    pub fn subscriber(&self) -> &S {
        &self.inner.subscriber
    }

    pub fn is_ready(&self) -> bool {
        self.inner.publisher.is_ready() && self.inner.subscriber.is_ready()
    }

    /// Wait for both connections, for host start-up only
    pub async fn wait_ready(&self, timeout: Duration) -> bool {
        let (publisher, subscriber) = tokio::join!(
            self.inner.publisher.readiness().wait_ready(timeout),
            self.inner.subscriber.readiness().wait_ready(timeout),
        );
        publisher && subscriber
    }

    /// Publish to a channel, returning how many subscribers received it
    ///
    /// Returns 0 when the publisher is not ready or the store rejects the
    /// message.
    pub async fn publish(&self, channel: &str, payload: impl Into<Payload>) -> u64 {
        let payload = payload.into();
        if !self.inner.publisher.is_ready() {
            tracing::warn!(channel, "publisher not ready, message dropped");
            return 0;
        }

        match self.inner.publisher.publish(channel, &payload).await {
            Ok(receivers) => receivers,
            Err(e) => {
                tracing::warn!(channel, error = %e, "publish failed");
                0
            }
        }
    }

    /// Publish any serializable value as JSON
    pub async fn publish_json<T: Serialize + ?Sized>(
        &self,
        channel: &str,
        value: &T,
    ) -> Result<u64, RelayError> {
        let payload = Payload::json(value)?;
        Ok(self.publish(channel, payload).await)
    }

    /// Register a handler for a channel
    ///
    /// `None` when the subscriber is not ready or the store refused the
    /// subscription; nothing stays registered in either case.
    pub async fn subscribe(
        &self,
        channel: &str,
        handler: impl MessageHandler,
    ) -> Option<SubscriptionId> {
        self.add(TopicKind::Channel, channel, Arc::new(handler))
            .await
    }

    /// Remove one handler, or every handler when `id` is `None`
    ///
    /// Returns whether anything was removed.
    pub async fn unsubscribe(&self, channel: &str, id: Option<SubscriptionId>) -> bool {
        self.remove(TopicKind::Channel, channel, id).await
    }

    /// Register a handler for every channel matching a glob pattern
    pub async fn psubscribe(
        &self,
        pattern: &str,
        handler: impl MessageHandler,
    ) -> Option<SubscriptionId> {
        self.add(TopicKind::Pattern, pattern, Arc::new(handler))
            .await
    }

    pub async fn punsubscribe(&self, pattern: &str, id: Option<SubscriptionId>) -> bool {
        self.remove(TopicKind::Pattern, pattern, id).await
    }

    pub fn handler_count(&self, channel: &str) -> usize {
        lock(&self.inner.channels).handler_count(channel)
    }

    pub fn pattern_handler_count(&self, pattern: &str) -> usize {
        lock(&self.inner.patterns).handler_count(pattern)
    }

    /// Channels with at least one handler, sorted
    pub fn channels(&self) -> Vec<String> {
        lock(&self.inner.channels).topics()
    }

    /// Patterns with at least one handler, sorted
    pub fn patterns(&self) -> Vec<String> {
        lock(&self.inner.patterns).topics()
    }

    /// Ask any connection that gave up to start over
    pub fn reconnect(&self) {
        self.inner.publisher.reconnect();
        self.inner.subscriber.reconnect();
    }

    /// Stop dispatching, drop every handler and close both connections
    pub async fn disconnect(&self) {
        if let Some(handle) = lock(&self.inner.dispatcher).take() {
            handle.abort();
        }
        let channels = lock(&self.inner.channels).clear();
        let patterns = lock(&self.inner.patterns).clear();
        tracing::debug!(
            channels = channels.len(),
            patterns = patterns.len(),
            "relay disconnecting"
        );
        self.inner.subscriber.close().await;
        self.inner.publisher.close().await;
    }

    fn registry(&self, kind: TopicKind) -> &Mutex<SubscriptionRegistry<SharedHandler>> {
        match kind {
            TopicKind::Channel => &self.inner.channels,
            TopicKind::Pattern => &self.inner.patterns,
        }
    }

    async fn add(
        &self,
        kind: TopicKind,
        topic: &str,
        handler: SharedHandler,
    ) -> Option<SubscriptionId> {
        let subscriber = &self.inner.subscriber;
        if !subscriber.is_ready() {
            tracing::warn!(%kind, topic, "subscriber not ready, subscription skipped");
            return None;
        }

        let _ops = self.inner.topic_ops.lock().await;
        let added = lock(self.registry(kind)).add(topic, handler);

        if added.first {
            let result = match kind {
                TopicKind::Channel => subscriber.subscribe(topic).await,
                TopicKind::Pattern => subscriber.psubscribe(topic).await,
            };
            if let Err(e) = result {
                lock(self.registry(kind)).remove(topic, added.id);
                tracing::warn!(%kind, topic, error = %e, "store subscribe failed");
                return None;
            }
        }

        tracing::debug!(%kind, topic, id = %added.id, "handler registered");
        Some(added.id)
    }

    async fn remove(&self, kind: TopicKind, topic: &str, id: Option<SubscriptionId>) -> bool {
        let _ops = self.inner.topic_ops.lock().await;
        let removal = {
            let mut registry = lock(self.registry(kind));
            match id {
                Some(id) => registry.remove(topic, id),
                None => registry.remove_all(topic),
            }
        };

        match removal {
            Removal::NotFound => false,
            Removal::Removed { last } => {
                if last {
                    let subscriber = &self.inner.subscriber;
                    let result = match kind {
                        TopicKind::Channel => subscriber.unsubscribe(topic).await,
                        TopicKind::Pattern => subscriber.punsubscribe(topic).await,
                    };
                    if let Err(e) = result {
                        tracing::warn!(%kind, topic, error = %e, "store unsubscribe failed");
                    }
                }
                true
            }
        }
    }
}

impl<P, S> RelayInner<P, S> {
    fn dispatch(&self, message: &Message) {
        let handlers = match &message.pattern {
            Some(pattern) => lock(&self.patterns).handlers(pattern),
            None => lock(&self.channels).handlers(&message.channel),
        };
        if handlers.is_empty() {
            tracing::trace!(topic = message.topic(), "no handlers for message");
            return;
        }

        for handler in handlers {
            match std::panic::catch_unwind(AssertUnwindSafe(|| handler.handle(message))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(
                    channel = %message.channel,
                    topic = message.topic(),
                    error = %e,
                    "message handler failed"
                ),
                Err(panic) => tracing::error!(
                    channel = %message.channel,
                    topic = message.topic(),
                    panic = panic_message(panic.as_ref()),
                    "message handler panicked"
                ),
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

async fn dispatch_loop<P, S>(
    inner: Weak<RelayInner<P, S>>,
    mut messages: mpsc::Receiver<Message>,
) {
    while let Some(message) = messages.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.dispatch(&message);
    }
    tracing::debug!("inbound message stream ended");
}

#[cfg(test)]
#[path = "relay_tests.rs"]
mod tests;
