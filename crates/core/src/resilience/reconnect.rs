// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reconnect backoff with a give-up point

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for reconnect attempts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Delay unit; attempt `n` waits `n * base_delay`
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,
    /// Upper bound for any single wait
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
    /// Consecutive failed attempts before giving up
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(3),
            max_attempts: 10,
        }
    }
}

impl ReconnectPolicy {
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// `min(attempt * base_delay, max_delay)` for a 1-based attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .checked_mul(attempt)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

/// Reconnect progress for one connection
#[derive(Debug, Clone, Default)]
pub struct ReconnectState {
    /// Consecutive failed attempts since the last successful connect
    pub attempts: u32,
    pub gave_up: bool,
}

/// Determines what the connection supervisor does next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectAction {
    /// Wait, then try again
    Retry { attempt: u32, after: Duration },
    /// Stop reconnecting and report the connection unavailable
    GiveUp,
}

impl ReconnectState {
    /// Next action after a failed or lost connection
    pub fn next_action(&self, policy: &ReconnectPolicy) -> ReconnectAction {
        if self.gave_up {
            return ReconnectAction::GiveUp;
        }

        let attempt = self.attempts.saturating_add(1);
        if attempt > policy.max_attempts {
            return ReconnectAction::GiveUp;
        }

        ReconnectAction::Retry {
            attempt,
            after: policy.delay_for(attempt),
        }
    }

    /// Record that a retry is about to happen
    pub fn record_attempt(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
    }

    /// Record a successful connect; the attempt budget starts over
    pub fn record_success(&mut self) {
        self.attempts = 0;
        self.gave_up = false;
    }

    /// Mark as given up
    pub fn record_give_up(&mut self) {
        self.gave_up = true;
    }
}

#[cfg(test)]
#[path = "reconnect_tests.rs"]
mod tests;
