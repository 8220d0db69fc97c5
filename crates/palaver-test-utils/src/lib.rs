// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Palaver integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic tests without a bridge process or LLM API.
//!
//! # Components
//!
//! - [`MockProvider`] - LLM provider with queued responses and call counting
//! - [`MockConnector`] / [`MockConnection`] - fake connection factory that
//!   captures sent texts and emits scripted events
//! - [`TestHarness`] - real SQLite storage, session manager and pipeline
//!   wired around the mocks

pub mod harness;
pub mod mock_connector;
pub mod mock_provider;

use std::future::Future;
use std::time::Duration;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_connector::{MockConnection, MockConnector, SentText, audio_event, text_event};
pub use mock_provider::MockProvider;

/// Polls `check` every 10ms for up to two seconds.
///
/// Returns whether the condition became true. For assertions on work that
/// happens in spawned tasks.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
