// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process bookkeeping of pub/sub handlers
//!
//! The registry tells its caller when a topic gains its first handler and
//! when it loses its last one, which is exactly when the store-level
//! subscription must be created or torn down.

use std::collections::HashMap;

/// Identifies one registered handler
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Result of registering a handler
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Added {
    pub id: SubscriptionId,
    /// The topic had no handlers before this one
    pub first: bool,
}

/// Result of removing handlers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Removal {
    /// Nothing matched
    NotFound,
    /// At least one handler was removed
    Removed {
        /// The topic has no handlers left and its entry was dropped
        last: bool,
    },
}

/// Topic (channel or pattern) to handlers
#[derive(Debug)]
pub struct SubscriptionRegistry<H> {
    topics: HashMap<String, Vec<(SubscriptionId, H)>>,
    next_id: u64,
}

impl<H> Default for SubscriptionRegistry<H> {
    fn default() -> Self {
        Self {
            topics: HashMap::new(),
            next_id: 1,
        }
    }
}

impl<H: Clone> SubscriptionRegistry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, topic: &str, handler: H) -> Added {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;

        let handlers = self.topics.entry(topic.to_string()).or_default();
        let first = handlers.is_empty();
        handlers.push((id, handler));

        Added { id, first }
    }

    pub fn remove(&mut self, topic: &str, id: SubscriptionId) -> Removal {
        let Some(handlers) = self.topics.get_mut(topic) else {
            return Removal::NotFound;
        };

        let before = handlers.len();
        handlers.retain(|(h, _)| *h != id);
        if handlers.len() == before {
            return Removal::NotFound;
        }

        let last = handlers.is_empty();
        if last {
            self.topics.remove(topic);
        }
        Removal::Removed { last }
    }

    pub fn remove_all(&mut self, topic: &str) -> Removal {
        match self.topics.remove(topic) {
            Some(handlers) if !handlers.is_empty() => Removal::Removed { last: true },
            _ => Removal::NotFound,
        }
    }

    /// Snapshot of the handlers for a topic, in registration order
    pub fn handlers(&self, topic: &str) -> Vec<H> {
        self.topics
            .get(topic)
            .map(|handlers| handlers.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.topics.contains_key(topic)
    }

    pub fn handler_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, Vec::len)
    }

    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.topics.keys().cloned().collect();
        topics.sort();
        topics
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Drop every entry, returning the topics that had handlers
    pub fn clear(&mut self) -> Vec<String> {
        let topics = self.topics();
        self.topics.clear();
        topics
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
