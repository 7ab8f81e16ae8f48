// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redis-backed lock store
//!
//! Acquire is `SET key token NX PX ttl`. Release and extend run as Lua
//! scripts so the ownership check and the write happen in one step.

use super::{ttl_millis, LockStore};
use crate::connector::{run_command, RedisConnector, RedisOptions};
use crate::error::StoreError;
use crate::supervisor::Supervisor;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use turnstile_core::{ConnectionRole, LockToken, Readiness, StoreConfig};

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

const EXTEND_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("PEXPIRE", KEYS[1], ARGV[2])
else
    return 0
end
"#;

struct Scripts {
    release: redis::Script,
    extend: redis::Script,
}

/// Lock store over a supervised multiplexed connection
#[derive(Clone)]
pub struct RedisLockStore {
    supervisor: Supervisor<RedisConnector>,
    scripts: Arc<Scripts>,
    command_timeout: Duration,
}

impl RedisLockStore {
    /// Start connecting in the background. Requires a Tokio runtime.
    pub fn connect(config: &StoreConfig, options: &RedisOptions) -> Result<Self, StoreError> {
        let connector = RedisConnector::new(config, options)?;
        let supervisor = Supervisor::start(
            connector,
            options.reconnect.clone(),
            Readiness::new(ConnectionRole::Lock),
        );
        Ok(Self {
            supervisor,
            scripts: Arc::new(Scripts {
                release: redis::Script::new(RELEASE_SCRIPT),
                extend: redis::Script::new(EXTEND_SCRIPT),
            }),
            command_timeout: options.command_timeout,
        })
    }

    async fn run<T, F, Fut>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: Future<Output = redis::RedisResult<T>>,
    {
        run_command(&self.supervisor, self.command_timeout, op).await
    }
}

#[async_trait]
impl LockStore for RedisLockStore {
    fn readiness(&self) -> &Readiness {
        self.supervisor.readiness()
    }

    async fn set_if_absent(
        &self,
        key: &str,
        token: &LockToken,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key)
            .arg(token.as_str())
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl));
        let reply: redis::Value = self
            .run(move |mut conn| async move { cmd.query_async(&mut conn).await })
            .await?;
        Ok(!matches!(reply, redis::Value::Nil))
    }

    async fn delete_if_owner(&self, key: &str, token: &LockToken) -> Result<bool, StoreError> {
        let script = self.scripts.release.clone();
        let key = key.to_string();
        let token = token.as_str().to_string();
        let deleted: i64 = self
            .run(move |mut conn| async move {
                script.key(key).arg(token).invoke_async(&mut conn).await
            })
            .await?;
        Ok(deleted == 1)
    }

    async fn expire_if_owner(
        &self,
        key: &str,
        token: &LockToken,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let script = self.scripts.extend.clone();
        let key = key.to_string();
        let token = token.as_str().to_string();
        let millis = ttl_millis(ttl);
        let extended: i64 = self
            .run(move |mut conn| async move {
                script
                    .key(key)
                    .arg(token)
                    .arg(millis)
                    .invoke_async(&mut conn)
                    .await
            })
            .await?;
        Ok(extended == 1)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut cmd = redis::cmd("EXISTS");
        cmd.arg(key);
        let count: i64 = self
            .run(move |mut conn| async move { cmd.query_async(&mut conn).await })
            .await?;
        Ok(count > 0)
    }

    fn reconnect(&self) {
        self.supervisor.reconnect();
    }

    async fn close(&self) {
        self.supervisor.shutdown();
    }
}
