// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redis connection setup shared by the lock store and the publisher

use crate::error::StoreError;
use crate::supervisor::{Connector, Supervisor};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use turnstile_core::{ReconnectPolicy, StoreConfig};

/// Connection settings for the Redis adapters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisOptions {
    pub reconnect: ReconnectPolicy,
    /// Bound on a single connect attempt
    pub connect_timeout: Duration,
    /// Bound on a single command round trip
    pub command_timeout: Duration,
    /// How often an idle connection is pinged to notice it died. Zero disables.
    pub health_check_interval: Duration,
}

impl Default for RedisOptions {
    fn default() -> Self {
        Self {
            reconnect: ReconnectPolicy::default(),
            connect_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(5),
            health_check_interval: Duration::from_secs(1),
        }
    }
}

impl RedisOptions {
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }
}

/// Open a client without touching the network
pub fn open_client(config: &StoreConfig) -> Result<redis::Client, StoreError> {
    redis::Client::open(config.url().as_str()).map_err(|e| {
        StoreError::Connection(format!("invalid store config {}: {}", config.redacted(), e))
    })
}

/// Opens multiplexed connections for a [`crate::Supervisor`]
#[derive(Clone)]
pub struct RedisConnector {
    client: redis::Client,
    timeout: Duration,
    ping_timeout: Duration,
    health_check_interval: Duration,
}

impl RedisConnector {
    pub fn new(config: &StoreConfig, options: &RedisOptions) -> Result<Self, StoreError> {
        Ok(Self {
            client: open_client(config)?,
            timeout: options.connect_timeout,
            ping_timeout: options.command_timeout,
            health_check_interval: options.health_check_interval,
        })
    }
}

#[async_trait]
impl Connector for RedisConnector {
    type Connection = MultiplexedConnection;

    async fn connect(&self) -> Result<MultiplexedConnection, StoreError> {
        bounded(self.timeout, self.client.get_multiplexed_async_connection()).await
    }

    async fn disconnected(&self, conn: &MultiplexedConnection) -> StoreError {
        if self.health_check_interval.is_zero() {
            return std::future::pending().await;
        }
        let mut ticks = tokio::time::interval(self.health_check_interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick fires immediately
        ticks.tick().await;

        loop {
            ticks.tick().await;
            let mut conn = conn.clone();
            let reply: Result<String, StoreError> =
                bounded(self.ping_timeout, redis::cmd("PING").query_async(&mut conn)).await;
            match reply {
                Err(e) if e.is_connection() => return e,
                Err(e) => tracing::debug!(error = %e, "health check ping rejected"),
                Ok(_) => {}
            }
        }
    }
}

/// Run a Redis future under a deadline; a timeout counts as a connection error
pub(crate) async fn bounded<T>(
    limit: Duration,
    fut: impl Future<Output = redis::RedisResult<T>>,
) -> Result<T, StoreError> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(StoreError::from),
        Err(_) => Err(StoreError::Connection(format!(
            "no reply within {}ms",
            limit.as_millis()
        ))),
    }
}

/// Run one command on the supervised connection, reporting failures back
pub(crate) async fn run_command<T, F, Fut>(
    supervisor: &Supervisor<RedisConnector>,
    limit: Duration,
    op: F,
) -> Result<T, StoreError>
where
    F: FnOnce(MultiplexedConnection) -> Fut,
    Fut: Future<Output = redis::RedisResult<T>>,
{
    let lease = supervisor.lease()?;
    let result = bounded(limit, op(lease.conn.clone())).await;
    if let Err(e) = &result {
        supervisor.report(&lease, e);
    }
    result
}
