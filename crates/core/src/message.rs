// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pub/sub payloads and inbound messages

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Outbound message body
///
/// Strings pass through unchanged; anything else is serialized to JSON.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Payload(String);

impl Payload {
    pub fn text(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        match serde_json::to_value(value)? {
            serde_json::Value::String(s) => Ok(Self(s)),
            other => Ok(Self(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => Self(s),
            other => Self(other.to_string()),
        }
    }
}

/// A message received from the store
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Concrete channel the message was published to
    pub channel: String,
    /// Pattern that matched, for pattern subscriptions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    pub payload: String,
}

impl Message {
    pub fn new(channel: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            pattern: None,
            payload: payload.into(),
        }
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Registry key the message is dispatched under
    pub fn topic(&self) -> &str {
        self.pattern.as_deref().unwrap_or(&self.channel)
    }

    /// Decode a JSON payload
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.payload)
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
