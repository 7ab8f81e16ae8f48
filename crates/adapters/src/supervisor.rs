// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background connection supervision
//!
//! A [`Supervisor`] owns one long-lived connection. It connects in the
//! background and hands out clones of the live connection to callers. When a
//! caller reports a connection failure, or the connector notices the idle
//! connection has died, it drops the connection and retries on the
//! [`ReconnectPolicy`] schedule. Once the attempt budget is spent the
//! connection is marked unavailable and stays that way until
//! [`Supervisor::reconnect`] is called.

use crate::error::StoreError;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use turnstile_core::{ReconnectAction, ReconnectPolicy, ReconnectState, Readiness};

/// Opens connections for a [`Supervisor`]
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Connection: Clone + Send + Sync + 'static;

    async fn connect(&self) -> Result<Self::Connection, StoreError>;

    /// Resolves once `conn` is found broken while nobody is using it.
    /// Never resolves for connectors that cannot tell.
    async fn disconnected(&self, _conn: &Self::Connection) -> StoreError {
        std::future::pending().await
    }
}

/// A connection handed out by the supervisor, tagged with the connect
/// generation it came from
#[derive(Clone, Debug)]
pub struct Lease<T> {
    pub conn: T,
    generation: u64,
}

struct Slot<T> {
    conn: Option<T>,
    generation: u64,
}

struct Inner<C: Connector> {
    connector: C,
    policy: ReconnectPolicy,
    readiness: Readiness,
    slot: Mutex<Slot<C::Connection>>,
    lost: Notify,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Keeps one connection alive in the background
pub struct Supervisor<C: Connector> {
    inner: Arc<Inner<C>>,
}

impl<C: Connector> Clone for Supervisor<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl<C: Connector> Supervisor<C> {
    /// Start connecting in the background. Requires a Tokio runtime.
    pub fn start(connector: C, policy: ReconnectPolicy, readiness: Readiness) -> Self {
        let supervisor = Self {
            inner: Arc::new(Inner {
                connector,
                policy,
                readiness,
                slot: Mutex::new(Slot {
                    conn: None,
                    generation: 0,
                }),
                lost: Notify::new(),
                task: Mutex::new(None),
            }),
        };
        let handle = tokio::spawn(supervise(Arc::clone(&supervisor.inner)));
        *lock(&supervisor.inner.task) = Some(handle);
        supervisor
    }

    pub fn readiness(&self) -> &Readiness {
        &self.inner.readiness
    }

    pub fn connector(&self) -> &C {
        &self.inner.connector
    }

    /// The live connection, if there is one
    pub fn lease(&self) -> Result<Lease<C::Connection>, StoreError> {
        if self.inner.readiness.is_closed() {
            return Err(StoreError::Closed);
        }
        let slot = lock(&self.inner.slot);
        match &slot.conn {
            Some(conn) => Ok(Lease {
                conn: conn.clone(),
                generation: slot.generation,
            }),
            None => Err(StoreError::NotReady),
        }
    }

    /// Report the outcome of a failed command
    ///
    /// Only connection errors against the current generation trigger a
    /// reconnect; stale leases and command errors are ignored.
    pub fn report(&self, lease: &Lease<C::Connection>, error: &StoreError) {
        if !error.is_connection() {
            return;
        }
        let dropped = {
            let mut slot = lock(&self.inner.slot);
            slot.generation == lease.generation && slot.conn.take().is_some()
        };
        if dropped {
            let role = self.inner.readiness.role();
            tracing::warn!(%role, error = %error, "dropping store connection");
            self.inner.lost.notify_one();
        }
    }

    /// Start over after the supervisor gave up. No-op while it is still running.
    pub fn reconnect(&self) {
        if self.inner.readiness.is_closed() {
            return;
        }
        let mut task = lock(&self.inner.task);
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }
        self.inner
            .readiness
            .set(turnstile_core::ConnectionStatus::Connecting);
        *task = Some(tokio::spawn(supervise(Arc::clone(&self.inner))));
    }

    /// Stop supervising and drop the connection. Idempotent.
    pub fn shutdown(&self) {
        if let Some(task) = lock(&self.inner.task).take() {
            task.abort();
        }
        lock(&self.inner.slot).conn = None;
        self.inner.readiness.mark_closed();
    }
}

async fn supervise<C: Connector>(inner: Arc<Inner<C>>) {
    let role = inner.readiness.role();
    let mut state = ReconnectState::default();

    loop {
        match inner.connector.connect().await {
            Ok(conn) => {
                {
                    let mut slot = lock(&inner.slot);
                    slot.generation += 1;
                    slot.conn = Some(conn.clone());
                }
                state.record_success();
                inner.readiness.mark_ready();
                watch(&inner, &conn).await;
            }
            Err(e) => tracing::warn!(%role, error = %e, "store connect failed"),
        }

        match state.next_action(&inner.policy) {
            ReconnectAction::Retry { attempt, after } => {
                state.record_attempt();
                inner.readiness.mark_reconnecting(attempt);
                tokio::time::sleep(after).await;
            }
            ReconnectAction::GiveUp => {
                state.record_give_up();
                inner.readiness.mark_unavailable();
                return;
            }
        }
    }
}

/// Wait until the live connection is dropped, either by a caller report or
/// by the connector noticing it died
async fn watch<C: Connector>(inner: &Inner<C>, conn: &C::Connection) {
    let disconnected = inner.connector.disconnected(conn);
    tokio::pin!(disconnected);

    loop {
        tokio::select! {
            _ = inner.lost.notified() => {
                // A permit left over from an earlier generation
                if lock(&inner.slot).conn.is_none() {
                    return;
                }
            }
            error = &mut disconnected => {
                if lock(&inner.slot).conn.take().is_some() {
                    let role = inner.readiness.role();
                    tracing::warn!(%role, error = %error, "store connection lost");
                }
                return;
            }
        }
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
