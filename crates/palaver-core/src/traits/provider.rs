// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter trait for LLM backends (OpenAI-compatible, Anthropic).

use async_trait::async_trait;

use crate::error::PalaverError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{CompletionRequest, CompletionResponse};

/// Adapter for LLM provider integrations.
#[async_trait]
pub trait ProviderAdapter: PluginAdapter {
    /// Sends a single-shot completion request and returns the full reply.
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, PalaverError>;

    /// Transcribes an audio clip to text.
    ///
    /// Providers without a speech endpoint keep the default, which rejects.
    async fn transcribe(&self, audio: Vec<u8>, mime_type: &str) -> Result<String, PalaverError> {
        let _ = (audio, mime_type);
        Err(PalaverError::provider(format!(
            "provider {} does not support transcription",
            self.name()
        )))
    }

    fn supports_transcription(&self) -> bool {
        false
    }
}
