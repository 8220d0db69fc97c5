// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic Messages API client.

use async_trait::async_trait;
use palaver_config::model::ProviderConfig;
use palaver_core::types::{CompletionRequest, CompletionResponse, MessageRole};
use palaver_core::{AdapterType, HealthStatus, PalaverError, PluginAdapter, ProviderAdapter};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::http::{self, REQUEST_TIMEOUT};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessageRequest<'a> {
    model: &'a str,
    system: String,
    messages: Vec<ApiMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    model: String,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(rename = "type")]
    type_: String,
    message: String,
}

fn describe_error(body: &str) -> Option<String> {
    serde_json::from_str::<ApiErrorResponse>(body)
        .ok()
        .map(|e| format!("Anthropic API error ({}): {}", e.error.type_, e.error.message))
}

/// Claude via the Messages API. Does not transcribe audio.
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    name: String,
    client: reqwest::Client,
    url: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, PalaverError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &config.api_key {
            headers.insert(
                "x-api-key",
                HeaderValue::from_str(key).map_err(|e| {
                    PalaverError::Config(format!("invalid API key header value: {e}"))
                })?,
            );
        }
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(http::client_error)?;

        let base = config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        Ok(Self {
            name: config.name.clone(),
            client,
            url: format!("{}/v1/messages", base.trim_end_matches('/')),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl PluginAdapter for AnthropicProvider {
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
impl ProviderAdapter for AnthropicProvider {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, PalaverError> {
        let mut messages: Vec<ApiMessage<'_>> = request
            .history
            .iter()
            .map(|turn| ApiMessage {
                role: match turn.role {
                    MessageRole::User => "user",
                    MessageRole::Assistant => "assistant",
                },
                content: &turn.content,
            })
            .collect();
        // The API requires the first turn to come from the user.
        while messages.first().is_some_and(|m| m.role == "assistant") {
            messages.remove(0);
        }
        messages.push(ApiMessage {
            role: "user",
            content: &request.user_message,
        });

        let body = MessageRequest {
            model: &self.model,
            system: crate::system_with_context(&request),
            messages,
            max_tokens: self.max_tokens,
        };
        let response: MessageResponse = http::send_json(
            &self.name,
            || self.client.post(&self.url).json(&body),
            describe_error,
        )
        .await?;

        let text = response
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");
        if text.is_empty() {
            return Err(PalaverError::provider(format!("{}: empty completion", self.name)));
        }

        Ok(CompletionResponse {
            text,
            model: response.model,
            provider: self.name.clone(),
        })
    }
}
