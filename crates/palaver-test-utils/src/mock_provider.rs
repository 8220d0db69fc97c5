// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock LLM provider adapter for deterministic testing.
//!
//! `MockProvider` answers from a FIFO queue of scripted outcomes and records
//! every request it receives so tests can assert on prompt assembly.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use palaver_core::types::{AdapterType, CompletionRequest, CompletionResponse, HealthStatus};
use palaver_core::{PalaverError, PluginAdapter, ProviderAdapter};

/// A mock LLM provider with queued responses and call counting.
///
/// When the queue is empty, `"mock response"` is returned.
pub struct MockProvider {
    name: String,
    responses: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    calls: AtomicUsize,
    transcription: Option<String>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::named("mock-provider")
    }

    /// A mock reporting `name` from [`PluginAdapter::name`].
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            transcription: None,
        }
    }

    /// Create a mock provider pre-loaded with the given responses.
    pub fn with_responses(responses: Vec<String>) -> Self {
        let mut provider = Self::new();
        provider
            .responses
            .get_mut()
            .extend(responses.into_iter().map(Ok));
        provider
    }

    /// Makes `transcribe` succeed with `text`.
    pub fn with_transcription(mut self, text: &str) -> Self {
        self.transcription = Some(text.to_string());
        self
    }

    pub async fn add_response(&self, text: impl Into<String>) {
        self.responses.lock().await.push_back(Ok(text.into()));
    }

    /// Queues a provider error.
    pub async fn add_failure(&self, message: impl Into<String>) {
        self.responses.lock().await.push_back(Err(message.into()));
    }

    /// Number of `complete` calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().await.last().cloned()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, PalaverError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PalaverError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, PalaverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().await.push(request);
        let next = self.responses.lock().await.pop_front();
        match next {
            Some(Ok(text)) => Ok(CompletionResponse {
                text,
                model: "mock-model".into(),
                provider: self.name.clone(),
            }),
            Some(Err(message)) => Err(PalaverError::provider(message)),
            None => Ok(CompletionResponse {
                text: "mock response".into(),
                model: "mock-model".into(),
                provider: self.name.clone(),
            }),
        }
    }

    async fn transcribe(&self, _audio: Vec<u8>, _mime_type: &str) -> Result<String, PalaverError> {
        self.transcription
            .clone()
            .ok_or_else(|| PalaverError::provider("mock provider cannot transcribe"))
    }

    fn supports_transcription(&self) -> bool {
        self.transcription.is_some()
    }
}
