// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Admin HTTP API for Palaver.
//!
//! Tenant back offices use it to start and pair WhatsApp sessions, manage
//! agents and contacts, and feed the knowledge base.

pub mod auth;
pub mod handlers;
pub mod server;

pub use auth::AuthConfig;
pub use server::{GatewayState, router, start_server};
