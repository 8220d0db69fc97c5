// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Priority-ordered provider selection with fallback.

use std::sync::Arc;

use palaver_config::model::{ProviderConfig, ProviderKind};
use palaver_core::types::{CompletionRequest, CompletionResponse};
use palaver_core::{PalaverError, ProviderAdapter};
use tracing::{info, warn};

use crate::{AnthropicProvider, OpenAiProvider};

/// A provider with its routing metadata.
#[derive(Clone)]
pub struct ProviderEntry {
    pub adapter: Arc<dyn ProviderAdapter>,
    /// Higher is tried first.
    pub priority: i32,
    pub active: bool,
}

impl ProviderEntry {
    pub fn new(adapter: Arc<dyn ProviderAdapter>, priority: i32, active: bool) -> Self {
        Self {
            adapter,
            priority,
            active,
        }
    }
}

/// Routes generation and transcription to the configured providers.
///
/// Active providers are tried from highest to lowest priority; the first
/// success wins. Inactive providers are never called.
pub struct LlmGateway {
    /// Sorted by descending priority, stable for ties.
    entries: Vec<ProviderEntry>,
}

impl LlmGateway {
    pub fn new(mut entries: Vec<ProviderEntry>) -> Self {
        entries.sort_by(|a, b| b.priority.cmp(&a.priority));
        Self { entries }
    }

    /// Builds clients for every `[[providers]]` entry.
    pub fn from_config(providers: &[ProviderConfig]) -> Result<Self, PalaverError> {
        let mut entries = Vec::with_capacity(providers.len());
        for config in providers {
            let adapter: Arc<dyn ProviderAdapter> = match config.kind {
                ProviderKind::Openai => Arc::new(OpenAiProvider::new(config)?),
                ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(config)?),
            };
            info!(
                provider = %config.name,
                model = %config.model,
                priority = config.priority,
                active = config.active,
                "registered LLM provider"
            );
            entries.push(ProviderEntry::new(adapter, config.priority, config.active));
        }
        Ok(Self::new(entries))
    }

    fn active(&self) -> impl Iterator<Item = &ProviderEntry> {
        self.entries.iter().filter(|e| e.active)
    }

    /// The provider that would be tried first.
    pub fn active_provider(&self) -> Result<Arc<dyn ProviderAdapter>, PalaverError> {
        self.active()
            .next()
            .map(|e| Arc::clone(&e.adapter))
            .ok_or(PalaverError::NoActiveProvider)
    }

    pub fn has_active_provider(&self) -> bool {
        self.active().next().is_some()
    }

    /// Generates a reply, falling back through active providers on failure.
    /// Returns the last provider's error when all of them fail.
    pub async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, PalaverError> {
        let mut last_error = None;
        for entry in self.active() {
            match entry.adapter.complete(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    warn!(provider = entry.adapter.name(), error = %e, "completion failed, trying next provider");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or(PalaverError::NoActiveProvider))
    }

    /// Transcribes audio with the first active provider that supports it.
    pub async fn transcribe(&self, audio: Vec<u8>, mime_type: &str) -> Result<String, PalaverError> {
        let mut last_error = None;
        for entry in self.active().filter(|e| e.adapter.supports_transcription()) {
            match entry.adapter.transcribe(audio.clone(), mime_type).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    warn!(provider = entry.adapter.name(), error = %e, "transcription failed, trying next provider");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| {
            PalaverError::provider("no active provider supports audio transcription")
        }))
    }
}
