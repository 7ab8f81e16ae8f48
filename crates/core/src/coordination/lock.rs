// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock options, acquisition outcomes and the per-key lock state machine
//!
//! A lock key is either free or held by exactly one token. The store enforces
//! this with an atomic set-if-absent; [`LockSlot`] models the same rules for
//! in-memory stores and tests.

use crate::clock::Clock;
use crate::token::LockToken;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors from validating lock options
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptionsError {
    #[error("ttl must be greater than zero")]
    ZeroTtl,
    #[error("ttl must be at least one millisecond, got {0:?}")]
    SubMillisecondTtl(Duration),
    #[error("backoff multiplier must be a finite number >= 1, got {0}")]
    InvalidMultiplier(f64),
}

/// Settings for a single acquisition
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockOptions {
    /// How long the store keeps the lock before evicting it
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    /// Retries after the first attempt; total attempts is this plus one
    pub retry_attempts: u32,
    /// Delay before the first retry
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,
    /// Growth factor applied to the delay on each further retry
    pub backoff_multiplier: f64,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30),
            retry_attempts: 3,
            retry_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
        }
    }
}

impl LockOptions {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Single attempt, no waiting
    pub fn no_retry(self) -> Self {
        self.with_retry_attempts(0)
    }

    pub fn validate(&self) -> Result<(), OptionsError> {
        validate_ttl(self.ttl)?;
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(OptionsError::InvalidMultiplier(self.backoff_multiplier));
        }
        Ok(())
    }

    pub fn total_attempts(&self) -> u32 {
        self.retry_attempts.saturating_add(1)
    }

    /// Delay to wait after failed attempt `attempt` (0-based):
    /// `retry_delay * backoff_multiplier ^ attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let factor = self.backoff_multiplier.powi(exponent);
        Duration::try_from_secs_f64(self.retry_delay.as_secs_f64() * factor)
            .unwrap_or(Duration::MAX)
    }
}

/// Checks a TTL against the store's millisecond resolution
pub fn validate_ttl(ttl: Duration) -> Result<(), OptionsError> {
    if ttl.is_zero() {
        return Err(OptionsError::ZeroTtl);
    }
    if ttl < Duration::from_millis(1) {
        return Err(OptionsError::SubMillisecondTtl(ttl));
    }
    Ok(())
}

/// Result of an acquisition that reached the store (or chose not to)
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The key was free and now holds this token
    Acquired(LockToken),
    /// The key stayed held through every attempt
    Contended { attempts: u32 },
    /// The lock connection was not ready; nothing was attempted
    Unavailable,
}

impl AcquireOutcome {
    pub fn is_acquired(&self) -> bool {
        matches!(self, AcquireOutcome::Acquired(_))
    }

    pub fn token(&self) -> Option<&LockToken> {
        match self {
            AcquireOutcome::Acquired(token) => Some(token),
            _ => None,
        }
    }

    pub fn into_token(self) -> Option<LockToken> {
        match self {
            AcquireOutcome::Acquired(token) => Some(token),
            _ => None,
        }
    }
}

impl std::fmt::Display for AcquireOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AcquireOutcome::Acquired(token) => write!(f, "acquired ({})", token),
            AcquireOutcome::Contended { attempts } => {
                write!(f, "held by another owner after {} attempts", attempts)
            }
            AcquireOutcome::Unavailable => write!(f, "store unavailable"),
        }
    }
}

/// State of one lock key
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LockSlot {
    /// Key absent
    Free,
    /// Key present with an owner and an eviction deadline
    Held {
        token: LockToken,
        expires_at: Instant,
    },
}

/// Store operations against a single key
#[derive(Clone, Debug)]
pub enum SlotInput {
    /// Set the key only if it is absent
    SetIfAbsent { token: LockToken, ttl: Duration },
    /// Delete the key only if the token matches
    DeleteIfOwner { token: LockToken },
    /// Reset expiry only if the token matches
    ExpireIfOwner { token: LockToken, ttl: Duration },
    /// Evict the key if its deadline passed
    Tick,
}

/// What a transition did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlotEvent {
    Acquired { token: LockToken },
    Denied { holder: LockToken },
    Released { token: LockToken },
    Extended { token: LockToken },
    Expired { token: LockToken },
    NotOwner { token: LockToken },
}

impl LockSlot {
    pub fn is_free(&self) -> bool {
        matches!(self, LockSlot::Free)
    }

    pub fn is_held_by(&self, token: &LockToken) -> bool {
        matches!(self, LockSlot::Held { token: t, .. } if t == token)
    }

    pub fn holder(&self) -> Option<&LockToken> {
        match self {
            LockSlot::Free => None,
            LockSlot::Held { token, .. } => Some(token),
        }
    }

    /// Held with a deadline that has passed
    pub fn is_expired(&self, clock: &impl Clock) -> bool {
        match self {
            LockSlot::Free => false,
            LockSlot::Held { expires_at, .. } => clock.now() >= *expires_at,
        }
    }

    /// Pure state transition function
    ///
    /// Expiry is applied before the input, so a held key never passes to a new
    /// owner without first becoming free.
    pub fn transition(&self, input: SlotInput, clock: &impl Clock) -> (LockSlot, Vec<SlotEvent>) {
        let mut events = Vec::new();

        let current = match self {
            LockSlot::Held { token, .. } if self.is_expired(clock) => {
                events.push(SlotEvent::Expired {
                    token: token.clone(),
                });
                LockSlot::Free
            }
            other => other.clone(),
        };

        let next = match (input, &current) {
            (SlotInput::SetIfAbsent { token, ttl }, LockSlot::Free) => {
                events.push(SlotEvent::Acquired {
                    token: token.clone(),
                });
                LockSlot::Held {
                    token,
                    expires_at: clock.now() + ttl,
                }
            }
            (SlotInput::SetIfAbsent { .. }, LockSlot::Held { token: holder, .. }) => {
                events.push(SlotEvent::Denied {
                    holder: holder.clone(),
                });
                current.clone()
            }
            (SlotInput::DeleteIfOwner { token }, LockSlot::Held { token: holder, .. })
                if holder == &token =>
            {
                events.push(SlotEvent::Released { token });
                LockSlot::Free
            }
            (SlotInput::DeleteIfOwner { token }, _) => {
                events.push(SlotEvent::NotOwner { token });
                current.clone()
            }
            (SlotInput::ExpireIfOwner { token, ttl }, LockSlot::Held { token: holder, .. })
                if holder == &token =>
            {
                events.push(SlotEvent::Extended {
                    token: token.clone(),
                });
                LockSlot::Held {
                    token,
                    expires_at: clock.now() + ttl,
                }
            }
            (SlotInput::ExpireIfOwner { token, .. }, _) => {
                events.push(SlotEvent::NotOwner { token });
                current.clone()
            }
            (SlotInput::Tick, _) => current.clone(),
        };

        (next, events)
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
