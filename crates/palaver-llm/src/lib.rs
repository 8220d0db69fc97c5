// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LLM backends for Palaver.
//!
//! Two thin request/response clients ([`OpenAiProvider`] for any
//! OpenAI-compatible API and [`AnthropicProvider`]) behind
//! [`ProviderAdapter`](palaver_core::ProviderAdapter), plus [`LlmGateway`],
//! which picks providers by priority and falls back on failure.

pub mod anthropic;
pub mod gateway;
mod http;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use gateway::{LlmGateway, ProviderEntry};
pub use openai::OpenAiProvider;

use palaver_core::types::CompletionRequest;

/// System prompt with retrieved knowledge appended as a labelled section.
pub(crate) fn system_with_context(request: &CompletionRequest) -> String {
    match request.context.as_deref().map(str::trim) {
        Some(context) if !context.is_empty() => format!(
            "{}\n\nRelevant knowledge (use it when it helps answer):\n{context}",
            request.system_prompt
        ),
        _ => request.system_prompt.clone(),
    }
}
