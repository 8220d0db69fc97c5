// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! Long-lived adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod connection;
pub mod provider;
pub mod retrieval;
pub mod storage;

pub use adapter::PluginAdapter;
pub use connection::{ConnectionParts, InboundHandler, WaConnection, WaConnector};
pub use provider::ProviderAdapter;
pub use retrieval::KnowledgeRetriever;
pub use storage::StorageAdapter;
