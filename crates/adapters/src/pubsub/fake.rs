// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory broker for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::pattern::glob_match;
use super::{Publisher, Subscriber, MESSAGE_BUFFER};
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use turnstile_core::{ConnectionRole, Message, Payload, Readiness};

/// Recorded broker call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PubSubCall {
    Publish { channel: String, payload: String },
    Subscribe { channel: String },
    Unsubscribe { channel: String },
    PSubscribe { pattern: String },
    PUnsubscribe { pattern: String },
}

struct Subscription {
    channels: BTreeSet<String>,
    patterns: BTreeSet<String>,
    sink: mpsc::Sender<Message>,
}

#[derive(Default)]
struct BrokerState {
    subscriptions: HashMap<u64, Subscription>,
    calls: Vec<PubSubCall>,
    fail_subscribe: bool,
    next_subscriber: u64,
}

/// Routes published messages to fake subscribers in the same process
#[derive(Clone, Default)]
pub struct FakeBroker {
    state: Arc<Mutex<BrokerState>>,
}

fn ready(role: ConnectionRole) -> Readiness {
    let readiness = Readiness::new(role);
    readiness.mark_ready();
    readiness
}

impl FakeBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// A ready publisher attached to this broker
    pub fn publisher(&self) -> FakePublisher {
        FakePublisher {
            broker: self.clone(),
            readiness: ready(ConnectionRole::Publisher),
        }
    }

    /// A ready subscriber attached to this broker
    pub fn subscriber(&self) -> FakeSubscriber {
        let (sink, messages) = mpsc::channel(MESSAGE_BUFFER);
        let mut state = self.state();
        state.next_subscriber += 1;
        let id = state.next_subscriber;
        state.subscriptions.insert(
            id,
            Subscription {
                channels: BTreeSet::new(),
                patterns: BTreeSet::new(),
                sink,
            },
        );
        FakeSubscriber {
            id,
            broker: self.clone(),
            readiness: ready(ConnectionRole::Subscriber),
            messages: Arc::new(Mutex::new(Some(messages))),
        }
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<PubSubCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Make every subscribe and psubscribe fail
    pub fn set_subscribe_fails(&self, fail: bool) {
        self.state().fail_subscribe = fail;
    }

    /// Channels any subscriber is attached to
    pub fn channels(&self) -> BTreeSet<String> {
        self.state()
            .subscriptions
            .values()
            .flat_map(|s| s.channels.iter().cloned())
            .collect()
    }

    /// Patterns any subscriber is attached to
    pub fn patterns(&self) -> BTreeSet<String> {
        self.state()
            .subscriptions
            .values()
            .flat_map(|s| s.patterns.iter().cloned())
            .collect()
    }

    fn deliver(&self, channel: &str, payload: &str) -> u64 {
        let mut state = self.state();
        state.calls.push(PubSubCall::Publish {
            channel: channel.to_string(),
            payload: payload.to_string(),
        });

        let mut receivers = 0;
        for subscription in state.subscriptions.values() {
            if subscription.channels.contains(channel) {
                let _ = subscription.sink.try_send(Message::new(channel, payload));
                receivers += 1;
            }
            for pattern in &subscription.patterns {
                if glob_match(pattern, channel) {
                    let message = Message::new(channel, payload).with_pattern(pattern.as_str());
                    let _ = subscription.sink.try_send(message);
                    receivers += 1;
                }
            }
        }
        receivers
    }
}

/// Publisher side of a [`FakeBroker`]
#[derive(Clone)]
pub struct FakePublisher {
    broker: FakeBroker,
    readiness: Readiness,
}

impl FakePublisher {
    pub fn set_ready(&self, ready: bool) {
        if ready {
            self.readiness.mark_ready();
        } else {
            self.readiness.mark_reconnecting(1);
        }
    }
}

#[async_trait]
impl Publisher for FakePublisher {
    fn readiness(&self) -> &Readiness {
        &self.readiness
    }

    async fn publish(&self, channel: &str, payload: &Payload) -> Result<u64, StoreError> {
        if self.readiness.is_closed() {
            return Err(StoreError::Closed);
        }
        if !self.readiness.is_ready() {
            return Err(StoreError::NotReady);
        }
        Ok(self.broker.deliver(channel, payload.as_str()))
    }

    fn reconnect(&self) {
        if !self.readiness.is_closed() {
            self.readiness.mark_ready();
        }
    }

    async fn close(&self) {
        self.readiness.mark_closed();
    }
}

/// Subscriber side of a [`FakeBroker`]
#[derive(Clone)]
pub struct FakeSubscriber {
    id: u64,
    broker: FakeBroker,
    readiness: Readiness,
    messages: Arc<Mutex<Option<mpsc::Receiver<Message>>>>,
}

enum Change {
    Subscribe,
    Unsubscribe,
    PSubscribe,
    PUnsubscribe,
}

impl FakeSubscriber {
    pub fn set_ready(&self, ready: bool) {
        if ready {
            self.readiness.mark_ready();
        } else {
            self.readiness.mark_reconnecting(1);
        }
    }

    fn change(&self, change: Change, topic: &str) -> Result<(), StoreError> {
        let mut state = self.broker.state();
        let topic = topic.to_string();
        state.calls.push(match change {
            Change::Subscribe => PubSubCall::Subscribe {
                channel: topic.clone(),
            },
            Change::Unsubscribe => PubSubCall::Unsubscribe {
                channel: topic.clone(),
            },
            Change::PSubscribe => PubSubCall::PSubscribe {
                pattern: topic.clone(),
            },
            Change::PUnsubscribe => PubSubCall::PUnsubscribe {
                pattern: topic.clone(),
            },
        });

        if self.readiness.is_closed() {
            return Err(StoreError::Closed);
        }
        let adding = matches!(change, Change::Subscribe | Change::PSubscribe);
        if adding && !self.readiness.is_ready() {
            return Err(StoreError::NotReady);
        }
        if adding && state.fail_subscribe {
            return Err(StoreError::Command("subscribe rejected".into()));
        }

        let Some(subscription) = state.subscriptions.get_mut(&self.id) else {
            return Err(StoreError::Closed);
        };
        match change {
            Change::Subscribe => subscription.channels.insert(topic),
            Change::Unsubscribe => subscription.channels.remove(&topic),
            Change::PSubscribe => subscription.patterns.insert(topic),
            Change::PUnsubscribe => subscription.patterns.remove(&topic),
        };
        Ok(())
    }
}

#[async_trait]
impl Subscriber for FakeSubscriber {
    fn readiness(&self) -> &Readiness {
        &self.readiness
    }

    async fn subscribe(&self, channel: &str) -> Result<(), StoreError> {
        self.change(Change::Subscribe, channel)
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), StoreError> {
        self.change(Change::Unsubscribe, channel)
    }

    async fn psubscribe(&self, pattern: &str) -> Result<(), StoreError> {
        self.change(Change::PSubscribe, pattern)
    }

    async fn punsubscribe(&self, pattern: &str) -> Result<(), StoreError> {
        self.change(Change::PUnsubscribe, pattern)
    }

    fn take_messages(&self) -> Option<mpsc::Receiver<Message>> {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    fn reconnect(&self) {
        if !self.readiness.is_closed() {
            self.readiness.mark_ready();
        }
    }

    async fn close(&self) {
        self.broker.state().subscriptions.remove(&self.id);
        self.readiness.mark_closed();
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
