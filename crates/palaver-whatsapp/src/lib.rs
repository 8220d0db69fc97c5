// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp session management for Palaver.
//!
//! [`SessionManager`] owns the registry of live protocol connections, drives
//! the persisted session state machine from connection events and hands
//! inbound messages to an [`InboundHandler`](palaver_core::InboundHandler).
//! [`BridgeConnector`] is the production connection factory; it talks to a
//! sidecar bridge process over WebSocket.

pub mod bridge;
pub mod credentials;
pub mod manager;
pub mod wire;

pub use bridge::{BridgeConnection, BridgeConnector};
pub use manager::{SessionManager, SessionState};
