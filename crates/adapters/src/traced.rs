// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::error::StoreError;
use crate::pubsub::{Publisher, Subscriber};
use crate::store::LockStore;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::Instrument;
use turnstile_core::{LockToken, Message, Payload, Readiness};

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn millis(d: Duration) -> u64 {
    d.as_millis() as u64
}

/// Wrapper that adds tracing to any LockStore
#[derive(Clone)]
pub struct TracedLockStore<S> {
    inner: S,
}

impl<S> TracedLockStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: LockStore> LockStore for TracedLockStore<S> {
    fn readiness(&self) -> &Readiness {
        self.inner.readiness()
    }

    async fn set_if_absent(
        &self,
        key: &str,
        token: &LockToken,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let span = tracing::debug_span!("store.set_if_absent", key, ttl_ms = millis(ttl));
        async {
            let start = Instant::now();
            let result = self.inner.set_if_absent(key, token, ttl).await;
            let elapsed_ms = elapsed_ms(start);
            match &result {
                Ok(true) => tracing::debug!(elapsed_ms, "key set"),
                Ok(false) => tracing::debug!(elapsed_ms, "key held elsewhere"),
                Err(e) => tracing::warn!(elapsed_ms, error = %e, "set failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn delete_if_owner(&self, key: &str, token: &LockToken) -> Result<bool, StoreError> {
        let span = tracing::debug_span!("store.delete_if_owner", key);
        async {
            let result = self.inner.delete_if_owner(key, token).await;
            match &result {
                Ok(true) => tracing::debug!("key deleted"),
                Ok(false) => tracing::debug!("not owner, key left alone"),
                Err(e) => tracing::warn!(error = %e, "delete failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn expire_if_owner(
        &self,
        key: &str,
        token: &LockToken,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let span = tracing::debug_span!("store.expire_if_owner", key, ttl_ms = millis(ttl));
        async {
            let result = self.inner.expire_if_owner(key, token, ttl).await;
            match &result {
                Ok(true) => tracing::debug!("expiry reset"),
                Ok(false) => tracing::debug!("not owner, expiry left alone"),
                Err(e) => tracing::warn!(error = %e, "expire failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let result = self.inner.exists(key).await;
        tracing::trace!(key, exists = ?result.as_ref().ok(), "checked");
        result
    }

    fn reconnect(&self) {
        tracing::info!(role = %self.inner.readiness().role(), "reconnect requested");
        self.inner.reconnect();
    }

    async fn close(&self) {
        self.inner.close().await;
    }
}

/// Wrapper that adds tracing to any Publisher
#[derive(Clone)]
pub struct TracedPublisher<P> {
    inner: P,
}

impl<P> TracedPublisher<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: Publisher> Publisher for TracedPublisher<P> {
    fn readiness(&self) -> &Readiness {
        self.inner.readiness()
    }

    async fn publish(&self, channel: &str, payload: &Payload) -> Result<u64, StoreError> {
        let span = tracing::debug_span!("pubsub.publish", channel);
        async {
            let start = Instant::now();
            let result = self.inner.publish(channel, payload).await;
            let elapsed_ms = elapsed_ms(start);
            match &result {
                Ok(receivers) => tracing::debug!(
                    receivers,
                    payload_len = payload.as_str().len(),
                    elapsed_ms,
                    "published"
                ),
                Err(e) => tracing::warn!(elapsed_ms, error = %e, "publish failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    fn reconnect(&self) {
        tracing::info!(role = %self.inner.readiness().role(), "reconnect requested");
        self.inner.reconnect();
    }

    async fn close(&self) {
        self.inner.close().await;
    }
}

/// Wrapper that adds tracing to any Subscriber
#[derive(Clone)]
pub struct TracedSubscriber<S> {
    inner: S,
}

impl<S> TracedSubscriber<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

fn log_change(result: &Result<(), StoreError>, done: &str) {
    match result {
        Ok(()) => tracing::info!("{}", done),
        Err(e) => tracing::warn!(error = %e, "failed"),
    }
}

#[async_trait]
impl<S: Subscriber> Subscriber for TracedSubscriber<S> {
    fn readiness(&self) -> &Readiness {
        self.inner.readiness()
    }

    async fn subscribe(&self, channel: &str) -> Result<(), StoreError> {
        let span = tracing::info_span!("pubsub.subscribe", channel);
        async {
            let result = self.inner.subscribe(channel).await;
            log_change(&result, "subscribed");
            result
        }
        .instrument(span)
        .await
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), StoreError> {
        let span = tracing::info_span!("pubsub.unsubscribe", channel);
        async {
            let result = self.inner.unsubscribe(channel).await;
            log_change(&result, "unsubscribed");
            result
        }
        .instrument(span)
        .await
    }

    async fn psubscribe(&self, pattern: &str) -> Result<(), StoreError> {
        let span = tracing::info_span!("pubsub.psubscribe", pattern);
        async {
            let result = self.inner.psubscribe(pattern).await;
            log_change(&result, "subscribed");
            result
        }
        .instrument(span)
        .await
    }

    async fn punsubscribe(&self, pattern: &str) -> Result<(), StoreError> {
        let span = tracing::info_span!("pubsub.punsubscribe", pattern);
        async {
            let result = self.inner.punsubscribe(pattern).await;
            log_change(&result, "unsubscribed");
            result
        }
        .instrument(span)
        .await
    }

    fn take_messages(&self) -> Option<mpsc::Receiver<Message>> {
        self.inner.take_messages()
    }

    fn reconnect(&self) {
        tracing::info!(role = %self.inner.readiness().role(), "reconnect requested");
        self.inner.reconnect();
    }

    async fn close(&self) {
        self.inner.close().await;
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
