// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for Palaver.
//!
//! This crate provides the trait definitions, error type, protocol events and
//! domain types shared by every other crate in the workspace. Adapters
//! (bridge connector, LLM providers, storage, knowledge retrieval) implement
//! the traits defined here.

pub mod error;
pub mod protocol;
pub mod traits;
pub mod types;

pub use error::PalaverError;
pub use protocol::{ConnectionEvent, DisconnectReason, InboundEvent, MessagePayload};
pub use types::{AdapterType, HealthStatus};

pub use traits::{
    ConnectionParts, InboundHandler, KnowledgeRetriever, PluginAdapter, ProviderAdapter,
    StorageAdapter, WaConnection, WaConnector,
};
