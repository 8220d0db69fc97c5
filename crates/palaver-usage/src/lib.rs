// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Usage accounting for Palaver tenants.
//!
//! Creation of agents, sessions and contacts is gated by the tenant's
//! effective limits, and playground sessions are held to a daily message
//! quota. Counts are always read live from storage, so two concurrent
//! creations may both be admitted at the boundary.

pub mod limits;

pub use limits::{EffectiveLimits, UsageLimiter};
