// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-connection readiness tracking
//!
//! Operations check [`Readiness::is_ready`] up front and fail fast when the
//! connection is down. Nothing in the request path waits for a reconnect.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Which process-wide connection a readiness flag belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionRole {
    Lock,
    Publisher,
    Subscriber,
}

impl std::fmt::Display for ConnectionRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionRole::Lock => "lock",
            ConnectionRole::Publisher => "publisher",
            ConnectionRole::Subscriber => "subscriber",
        };
        write!(f, "{}", name)
    }
}

/// Lifecycle of a store connection
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Initial connect in progress
    Connecting,
    Ready,
    /// Lost or failed; waiting to retry
    Reconnecting { attempt: u32 },
    /// Reconnect attempts exhausted
    Unavailable,
    /// Disconnected on purpose
    Closed,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Ready => write!(f, "ready"),
            ConnectionStatus::Reconnecting { attempt } => {
                write!(f, "reconnecting (attempt {})", attempt)
            }
            ConnectionStatus::Unavailable => write!(f, "unavailable"),
            ConnectionStatus::Closed => write!(f, "closed"),
        }
    }
}

/// Shared, cloneable readiness flag for one connection
#[derive(Clone, Debug)]
pub struct Readiness {
    role: ConnectionRole,
    tx: Arc<watch::Sender<ConnectionStatus>>,
}

impl Readiness {
    pub fn new(role: ConnectionRole) -> Self {
        let (tx, _) = watch::channel(ConnectionStatus::Connecting);
        Self {
            role,
            tx: Arc::new(tx),
        }
    }

    pub fn role(&self) -> ConnectionRole {
        self.role
    }

    pub fn status(&self) -> ConnectionStatus {
        self.tx.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.tx.borrow(), ConnectionStatus::Ready)
    }

    pub fn is_closed(&self) -> bool {
        matches!(*self.tx.borrow(), ConnectionStatus::Closed)
    }

    /// Move to a new status, logging the transition
    pub fn set(&self, status: ConnectionStatus) {
        let previous = self.tx.send_replace(status.clone());
        if previous == status {
            return;
        }

        let role = self.role;
        match &status {
            ConnectionStatus::Ready => tracing::info!(%role, "store connection ready"),
            ConnectionStatus::Reconnecting { attempt } => {
                tracing::warn!(%role, attempt, "store connection lost, reconnecting")
            }
            ConnectionStatus::Unavailable => {
                tracing::error!(%role, "store connection unavailable, reconnect attempts exhausted")
            }
            ConnectionStatus::Closed => tracing::info!(%role, "store connection closed"),
            ConnectionStatus::Connecting => tracing::debug!(%role, "store connection connecting"),
        }
    }

    pub fn mark_ready(&self) {
        self.set(ConnectionStatus::Ready);
    }

    pub fn mark_reconnecting(&self, attempt: u32) {
        self.set(ConnectionStatus::Reconnecting { attempt });
    }

    pub fn mark_unavailable(&self) {
        self.set(ConnectionStatus::Unavailable);
    }

    pub fn mark_closed(&self) {
        self.set(ConnectionStatus::Closed);
    }

    /// Watch status changes
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.tx.subscribe()
    }

    /// Wait until ready, for host start-up only
    ///
    /// Returns `false` on timeout, or as soon as the connection is
    /// unavailable or closed.
    pub async fn wait_ready(&self, timeout: Duration) -> bool {
        let mut rx = self.tx.subscribe();
        let wait = async move {
            loop {
                let status = rx.borrow_and_update().clone();
                match status {
                    ConnectionStatus::Ready => return true,
                    ConnectionStatus::Unavailable | ConnectionStatus::Closed => return false,
                    ConnectionStatus::Connecting | ConnectionStatus::Reconnecting { .. } => {}
                }
                if rx.changed().await.is_err() {
                    return false;
                }
            }
        };
        tokio::time::timeout(timeout, wait).await.unwrap_or(false)
    }
}

#[cfg(test)]
#[path = "readiness_tests.rs"]
mod tests;
