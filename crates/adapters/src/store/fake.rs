// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory lock store for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::LockStore;
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use turnstile_core::{
    ConnectionRole, FakeClock, LockSlot, LockToken, Readiness, SlotEvent, SlotInput,
};

/// Recorded store call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    SetIfAbsent {
        key: String,
        token: LockToken,
        ttl: Duration,
    },
    DeleteIfOwner {
        key: String,
        token: LockToken,
    },
    ExpireIfOwner {
        key: String,
        token: LockToken,
        ttl: Duration,
    },
    Exists {
        key: String,
    },
    Close,
}

#[derive(Default)]
struct FakeStoreState {
    slots: HashMap<String, LockSlot>,
    calls: Vec<StoreCall>,
    failures: VecDeque<StoreError>,
}

/// Lock store backed by [`LockSlot`] state machines and a fake clock
#[derive(Clone)]
pub struct FakeLockStore {
    state: Arc<Mutex<FakeStoreState>>,
    clock: FakeClock,
    readiness: Readiness,
}

impl Default for FakeLockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeLockStore {
    /// A ready store with its own clock
    pub fn new() -> Self {
        Self::with_clock(FakeClock::new())
    }

    pub fn with_clock(clock: FakeClock) -> Self {
        let readiness = Readiness::new(ConnectionRole::Lock);
        readiness.mark_ready();
        Self {
            state: Arc::default(),
            clock,
            readiness,
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeStoreState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn clock(&self) -> &FakeClock {
        &self.clock
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<StoreCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Flip readiness without touching stored keys
    pub fn set_ready(&self, ready: bool) {
        if ready {
            self.readiness.mark_ready();
        } else {
            self.readiness.mark_reconnecting(1);
        }
    }

    /// Fail the next store call with `error`
    pub fn fail_next(&self, error: StoreError) {
        self.state().failures.push_back(error);
    }

    /// Current live holder of `key`
    pub fn holder(&self, key: &str) -> Option<LockToken> {
        let mut state = self.state();
        let slot = state.slots.entry(key.to_string()).or_insert(LockSlot::Free);
        let (next, _) = slot.transition(SlotInput::Tick, &self.clock);
        *slot = next;
        slot.holder().cloned()
    }

    /// Hold `key` as some other owner
    pub fn hold(&self, key: &str, token: impl Into<LockToken>, ttl: Duration) {
        self.apply(
            key,
            SlotInput::SetIfAbsent {
                token: token.into(),
                ttl,
            },
        );
    }

    fn apply(&self, key: &str, input: SlotInput) -> Vec<SlotEvent> {
        let mut state = self.state();
        let slot = state.slots.entry(key.to_string()).or_insert(LockSlot::Free);
        let (next, events) = slot.transition(input, &self.clock);
        *slot = next;
        events
    }

    /// Record the call, then fail if not ready or a failure is queued
    fn begin(&self, call: StoreCall) -> Result<(), StoreError> {
        let mut state = self.state();
        state.calls.push(call);
        if self.readiness.is_closed() {
            return Err(StoreError::Closed);
        }
        if !self.readiness.is_ready() {
            return Err(StoreError::NotReady);
        }
        match state.failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl LockStore for FakeLockStore {
    fn readiness(&self) -> &Readiness {
        &self.readiness
    }

    async fn set_if_absent(
        &self,
        key: &str,
        token: &LockToken,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.begin(StoreCall::SetIfAbsent {
            key: key.to_string(),
            token: token.clone(),
            ttl,
        })?;
        let events = self.apply(
            key,
            SlotInput::SetIfAbsent {
                token: token.clone(),
                ttl,
            },
        );
        Ok(events
            .iter()
            .any(|e| matches!(e, SlotEvent::Acquired { .. })))
    }

    async fn delete_if_owner(&self, key: &str, token: &LockToken) -> Result<bool, StoreError> {
        self.begin(StoreCall::DeleteIfOwner {
            key: key.to_string(),
            token: token.clone(),
        })?;
        let events = self.apply(
            key,
            SlotInput::DeleteIfOwner {
                token: token.clone(),
            },
        );
        Ok(events
            .iter()
            .any(|e| matches!(e, SlotEvent::Released { .. })))
    }

    async fn expire_if_owner(
        &self,
        key: &str,
        token: &LockToken,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.begin(StoreCall::ExpireIfOwner {
            key: key.to_string(),
            token: token.clone(),
            ttl,
        })?;
        let events = self.apply(
            key,
            SlotInput::ExpireIfOwner {
                token: token.clone(),
                ttl,
            },
        );
        Ok(events
            .iter()
            .any(|e| matches!(e, SlotEvent::Extended { .. })))
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.begin(StoreCall::Exists {
            key: key.to_string(),
        })?;
        Ok(self.holder(key).is_some())
    }

    fn reconnect(&self) {
        if !self.readiness.is_closed() {
            self.readiness.mark_ready();
        }
    }

    async fn close(&self) {
        self.state().calls.push(StoreCall::Close);
        self.readiness.mark_closed();
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
