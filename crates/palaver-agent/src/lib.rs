// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound message handling for Palaver agents.
//!
//! [`MessagePipeline`] turns one inbound WhatsApp message into one reply:
//! it resolves the owning agent and tenant, records the conversation,
//! retrieves knowledge, assembles the prompt, calls the LLM gateway and
//! applies any scheduling block found in the model output.

pub mod pipeline;
pub mod prompt;
pub mod schedule;

pub use pipeline::MessagePipeline;
pub use schedule::{Extraction, ScheduleBlock, ScheduleRequest, extract_schedule};
