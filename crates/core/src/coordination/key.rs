// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock keys

use thiserror::Error;

/// Prefix shared by every lock key in the store
pub const LOCK_KEY_PREFIX: &str = "lock";

/// Errors from lock key construction
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("resource must not be empty")]
    EmptyResource,
    #[error("resource id must not be empty")]
    EmptyResourceId,
}

/// Names a lockable resource, e.g. `("booking", "class-42")`
///
/// Maps to the single store key `lock:{resource}:{resource_id}`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LockKey {
    resource: String,
    resource_id: String,
}

impl LockKey {
    /// Both parts must contain something other than whitespace.
    pub fn new(
        resource: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Result<Self, KeyError> {
        let resource = resource.into();
        let resource_id = resource_id.into();

        if resource.trim().is_empty() {
            return Err(KeyError::EmptyResource);
        }
        if resource_id.trim().is_empty() {
            return Err(KeyError::EmptyResourceId);
        }

        Ok(Self {
            resource,
            resource_id,
        })
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn store_key(&self) -> String {
        format!("{}:{}:{}", LOCK_KEY_PREFIX, self.resource, self.resource_id)
    }
}

impl std::fmt::Display for LockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.store_key())
    }
}

#[cfg(test)]
#[path = "key_tests.rs"]
mod tests;
