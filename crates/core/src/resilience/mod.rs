// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection resilience shared by the lock client and the pub/sub connections

mod readiness;
mod reconnect;

pub use readiness::{ConnectionRole, ConnectionStatus, Readiness};
pub use reconnect::{ReconnectAction, ReconnectPolicy, ReconnectState};
