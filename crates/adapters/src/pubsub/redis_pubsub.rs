// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redis publisher and subscriber
//!
//! The subscriber runs as a single task that owns the pub/sub connection.
//! Callers talk to it over a command channel; the task multiplexes those
//! commands with inbound messages, and after a reconnect it re-issues every
//! channel and pattern subscription it still holds.

use super::{Publisher, Subscriber, MESSAGE_BUFFER};
use crate::connector::{bounded, open_client, run_command, RedisConnector, RedisOptions};
use crate::error::StoreError;
use crate::supervisor::Supervisor;
use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::PubSub;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use turnstile_core::{
    ConnectionRole, ConnectionStatus, Message, Payload, Readiness, ReconnectAction,
    ReconnectState, StoreConfig,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Publisher over a supervised multiplexed connection
#[derive(Clone)]
pub struct RedisPublisher {
    supervisor: Supervisor<RedisConnector>,
    command_timeout: Duration,
}

impl RedisPublisher {
    /// Start connecting in the background. Requires a Tokio runtime.
    pub fn connect(config: &StoreConfig, options: &RedisOptions) -> Result<Self, StoreError> {
        let connector = RedisConnector::new(config, options)?;
        Ok(Self {
            supervisor: Supervisor::start(
                connector,
                options.reconnect.clone(),
                Readiness::new(ConnectionRole::Publisher),
            ),
            command_timeout: options.command_timeout,
        })
    }
}

#[async_trait]
impl Publisher for RedisPublisher {
    fn readiness(&self) -> &Readiness {
        self.supervisor.readiness()
    }

    async fn publish(&self, channel: &str, payload: &Payload) -> Result<u64, StoreError> {
        let mut cmd = redis::cmd("PUBLISH");
        cmd.arg(channel).arg(payload.as_str());
        let receivers: u64 = run_command(&self.supervisor, self.command_timeout, move |mut conn| {
            async move { cmd.query_async(&mut conn).await }
        })
        .await?;
        Ok(receivers)
    }

    fn reconnect(&self) {
        self.supervisor.reconnect();
    }

    async fn close(&self) {
        self.supervisor.shutdown();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Topic {
    Channel(String),
    Pattern(String),
}

type Reply = oneshot::Sender<Result<(), StoreError>>;

enum Command {
    Subscribe(Topic, Reply),
    Unsubscribe(Topic, Reply),
    Reconnect,
}

/// What the subscriber task does after a phase ends
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    /// Carry on with the reconnect schedule
    Continue,
    /// Start a fresh reconnect budget
    Restart,
    Shutdown,
}

/// Subscriber over a dedicated pub/sub connection
#[derive(Clone)]
pub struct RedisSubscriber {
    commands: mpsc::UnboundedSender<Command>,
    readiness: Readiness,
    messages: Arc<Mutex<Option<mpsc::Receiver<Message>>>>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl RedisSubscriber {
    /// Start connecting in the background. Requires a Tokio runtime.
    pub fn connect(config: &StoreConfig, options: &RedisOptions) -> Result<Self, StoreError> {
        let client = open_client(config)?;
        let readiness = Readiness::new(ConnectionRole::Subscriber);
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (sink, messages) = mpsc::channel(MESSAGE_BUFFER);

        let actor = SubscriberTask {
            client,
            options: options.clone(),
            readiness: readiness.clone(),
            commands: command_rx,
            sink,
            channels: BTreeSet::new(),
            patterns: BTreeSet::new(),
        };
        let task = tokio::spawn(actor.run());

        Ok(Self {
            commands,
            readiness,
            messages: Arc::new(Mutex::new(Some(messages))),
            task: Arc::new(Mutex::new(Some(task))),
        })
    }

    async fn request(&self, command: impl FnOnce(Reply) -> Command) -> Result<(), StoreError> {
        if self.readiness.is_closed() {
            return Err(StoreError::Closed);
        }
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .map_err(|_| StoreError::Closed)?;
        rx.await.map_err(|_| StoreError::Closed)?
    }
}

#[async_trait]
impl Subscriber for RedisSubscriber {
    fn readiness(&self) -> &Readiness {
        &self.readiness
    }

    async fn subscribe(&self, channel: &str) -> Result<(), StoreError> {
        let topic = Topic::Channel(channel.to_string());
        self.request(|reply| Command::Subscribe(topic, reply)).await
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), StoreError> {
        let topic = Topic::Channel(channel.to_string());
        self.request(|reply| Command::Unsubscribe(topic, reply))
            .await
    }

    async fn psubscribe(&self, pattern: &str) -> Result<(), StoreError> {
        let topic = Topic::Pattern(pattern.to_string());
        self.request(|reply| Command::Subscribe(topic, reply)).await
    }

    async fn punsubscribe(&self, pattern: &str) -> Result<(), StoreError> {
        let topic = Topic::Pattern(pattern.to_string());
        self.request(|reply| Command::Unsubscribe(topic, reply))
            .await
    }

    fn take_messages(&self) -> Option<mpsc::Receiver<Message>> {
        lock(&self.messages).take()
    }

    fn reconnect(&self) {
        if !self.readiness.is_closed() {
            let _ = self.commands.send(Command::Reconnect);
        }
    }

    async fn close(&self) {
        if let Some(task) = lock(&self.task).take() {
            task.abort();
        }
        self.readiness.mark_closed();
    }
}

struct SubscriberTask {
    client: redis::Client,
    options: RedisOptions,
    readiness: Readiness,
    commands: mpsc::UnboundedReceiver<Command>,
    sink: mpsc::Sender<Message>,
    channels: BTreeSet<String>,
    patterns: BTreeSet<String>,
}

impl SubscriberTask {
    async fn run(mut self) {
        let mut state = ReconnectState::default();

        loop {
            if let Some(mut pubsub) = self.open().await {
                state.record_success();
                self.readiness.mark_ready();
                if self.serve(&mut pubsub).await == Flow::Shutdown {
                    return;
                }
            }

            let wait = match state.next_action(&self.options.reconnect) {
                ReconnectAction::Retry { attempt, after } => {
                    state.record_attempt();
                    self.readiness.mark_reconnecting(attempt);
                    Some(after)
                }
                ReconnectAction::GiveUp => {
                    state.record_give_up();
                    self.readiness.mark_unavailable();
                    None
                }
            };

            match self.idle(wait).await {
                Flow::Continue => {}
                Flow::Restart => {
                    state = ReconnectState::default();
                    self.readiness.set(ConnectionStatus::Connecting);
                }
                Flow::Shutdown => return,
            }
        }
    }

    /// Connect and restore every held subscription
    async fn open(&self) -> Option<PubSub> {
        let role = self.readiness.role();
        let limit = self.options.command_timeout;

        let mut pubsub =
            match bounded(self.options.connect_timeout, self.client.get_async_pubsub()).await {
                Ok(pubsub) => pubsub,
                Err(e) => {
                    tracing::warn!(%role, error = %e, "store connect failed");
                    return None;
                }
            };

        for channel in &self.channels {
            if let Err(e) = bounded(limit, pubsub.subscribe(channel.as_str())).await {
                tracing::warn!(%role, channel, error = %e, "resubscribe failed");
                return None;
            }
        }
        for pattern in &self.patterns {
            if let Err(e) = bounded(limit, pubsub.psubscribe(pattern.as_str())).await {
                tracing::warn!(%role, pattern, error = %e, "resubscribe failed");
                return None;
            }
        }
        if !self.channels.is_empty() || !self.patterns.is_empty() {
            tracing::info!(
                %role,
                channels = self.channels.len(),
                patterns = self.patterns.len(),
                "subscriptions restored"
            );
        }

        Some(pubsub)
    }

    /// Serve commands and forward messages until the connection drops
    async fn serve(&mut self, pubsub: &mut PubSub) -> Flow {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    None => return Flow::Shutdown,
                    Some(Command::Reconnect) => {}
                    Some(Command::Subscribe(topic, reply)) => {
                        let result = self.apply(pubsub, &topic, true).await;
                        let lost = matches!(&result, Err(e) if e.is_connection());
                        if result.is_ok() {
                            self.remember(topic);
                        }
                        let _ = reply.send(result);
                        if lost {
                            return Flow::Continue;
                        }
                    }
                    Some(Command::Unsubscribe(topic, reply)) => {
                        let result = self.apply(pubsub, &topic, false).await;
                        let lost = matches!(&result, Err(e) if e.is_connection());
                        self.forget(&topic);
                        let _ = reply.send(result);
                        if lost {
                            return Flow::Continue;
                        }
                    }
                },
                message = next_message(pubsub) => match message {
                    Some(msg) => self.forward(&msg),
                    None => {
                        tracing::warn!(role = %self.readiness.role(), "pub/sub stream ended");
                        return Flow::Continue;
                    }
                },
            }
        }
    }

    /// Wait out a backoff (or, with no deadline, a reconnect request) while
    /// answering commands without a connection
    async fn idle(&mut self, wait: Option<Duration>) -> Flow {
        let backoff = async {
            match wait {
                Some(after) => tokio::time::sleep(after).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(backoff);

        loop {
            tokio::select! {
                _ = &mut backoff => return Flow::Continue,
                command = self.commands.recv() => match command {
                    None => return Flow::Shutdown,
                    Some(Command::Reconnect) if wait.is_none() => return Flow::Restart,
                    Some(Command::Reconnect) => {}
                    Some(Command::Subscribe(_, reply)) => {
                        let _ = reply.send(Err(StoreError::NotReady));
                    }
                    Some(Command::Unsubscribe(topic, reply)) => {
                        self.forget(&topic);
                        let _ = reply.send(Ok(()));
                    }
                },
            }
        }
    }

    async fn apply(&self, pubsub: &mut PubSub, topic: &Topic, on: bool) -> Result<(), StoreError> {
        let limit = self.options.command_timeout;
        match (topic, on) {
            (Topic::Channel(c), true) => bounded(limit, pubsub.subscribe(c.as_str())).await,
            (Topic::Channel(c), false) => bounded(limit, pubsub.unsubscribe(c.as_str())).await,
            (Topic::Pattern(p), true) => bounded(limit, pubsub.psubscribe(p.as_str())).await,
            (Topic::Pattern(p), false) => bounded(limit, pubsub.punsubscribe(p.as_str())).await,
        }
    }

    fn remember(&mut self, topic: Topic) {
        match topic {
            Topic::Channel(c) => self.channels.insert(c),
            Topic::Pattern(p) => self.patterns.insert(p),
        };
    }

    fn forget(&mut self, topic: &Topic) {
        match topic {
            Topic::Channel(c) => self.channels.remove(c),
            Topic::Pattern(p) => self.patterns.remove(p),
        };
    }

    fn forward(&self, msg: &redis::Msg) {
        let payload = String::from_utf8_lossy(msg.get_payload_bytes()).into_owned();
        let mut message = Message::new(msg.get_channel_name(), payload);
        if msg.from_pattern() {
            match msg.get_pattern::<String>() {
                Ok(pattern) => message = message.with_pattern(pattern),
                Err(e) => tracing::debug!(error = %e, "unreadable pattern on message"),
            }
        }

        match self.sink.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(message)) => tracing::warn!(
                channel = %message.channel,
                capacity = MESSAGE_BUFFER,
                "inbound buffer full, message dropped"
            ),
            Err(TrySendError::Closed(_)) => {
                tracing::trace!("no consumer for inbound messages")
            }
        }
    }
}

async fn next_message(pubsub: &mut PubSub) -> Option<redis::Msg> {
    let stream = pubsub.on_message();
    futures::pin_mut!(stream);
    stream.next().await
}
