// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible chat completions and audio transcription.

use async_trait::async_trait;
use palaver_config::model::ProviderConfig;
use palaver_core::types::{CompletionRequest, CompletionResponse, MessageRole};
use palaver_core::{AdapterType, HealthStatus, PalaverError, PluginAdapter, ProviderAdapter};
use serde::{Deserialize, Serialize};

use crate::http::{self, REQUEST_TIMEOUT};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

fn describe_error(body: &str) -> Option<String> {
    serde_json::from_str::<ApiErrorResponse>(body)
        .ok()
        .map(|e| format!("OpenAI API error: {}", e.error.message))
}

/// Client for any API that speaks the OpenAI chat completions protocol.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    name: String,
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    transcription_model: Option<String>,
    max_tokens: u32,
}

impl OpenAiProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, PalaverError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(http::client_error)?;
        Ok(Self {
            name: config.name.clone(),
            client,
            api_key: config.api_key.clone(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: config.model.clone(),
            transcription_model: config.transcription_model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.client.post(format!("{}{path}", self.base_url));
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl PluginAdapter for OpenAiProvider {
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
impl ProviderAdapter for OpenAiProvider {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, PalaverError> {
        let system = crate::system_with_context(&request);
        let mut messages = vec![ChatMessage {
            role: "system",
            content: &system,
        }];
        for turn in &request.history {
            messages.push(ChatMessage {
                role: match turn.role {
                    MessageRole::User => "user",
                    MessageRole::Assistant => "assistant",
                },
                content: &turn.content,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.user_message,
        });

        let body = ChatRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
        };
        let response: ChatResponse = http::send_json(
            &self.name,
            || self.post("/chat/completions").json(&body),
            describe_error,
        )
        .await?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| PalaverError::provider(format!("{}: empty completion", self.name)))?;

        Ok(CompletionResponse {
            text,
            model: response.model.unwrap_or_else(|| self.model.clone()),
            provider: self.name.clone(),
        })
    }

    async fn transcribe(&self, audio: Vec<u8>, mime_type: &str) -> Result<String, PalaverError> {
        let Some(model) = self.transcription_model.as_deref() else {
            return Err(PalaverError::provider(format!(
                "{}: no transcription_model configured",
                self.name
            )));
        };
        let file_name = format!("audio.{}", extension_for(mime_type));

        let response: TranscriptionResponse = http::send_json(
            &self.name,
            || {
                let part = reqwest::multipart::Part::bytes(audio.clone())
                    .file_name(file_name.clone());
                let part = match part.mime_str(mime_type) {
                    Ok(part) => part,
                    Err(_) => reqwest::multipart::Part::bytes(audio.clone())
                        .file_name(file_name.clone()),
                };
                let form = reqwest::multipart::Form::new()
                    .text("model", model.to_string())
                    .part("file", part);
                self.post("/audio/transcriptions").multipart(form)
            },
            describe_error,
        )
        .await?;
        Ok(response.text)
    }

    fn supports_transcription(&self) -> bool {
        self.transcription_model.is_some()
    }
}

/// File extension the transcription endpoint uses to sniff the format.
fn extension_for(mime_type: &str) -> &'static str {
    let essence = mime_type.split(';').next().unwrap_or("").trim();
    match essence {
        "audio/ogg" | "audio/opus" => "ogg",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/mp4" | "audio/m4a" | "audio/aac" => "m4a",
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/webm" => "webm",
        _ => "ogg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use palaver_config::model::ProviderKind;
    use palaver_core::types::ChatTurn;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> ProviderConfig {
        ProviderConfig {
            name: "openai".into(),
            kind: ProviderKind::Openai,
            api_key: Some("sk-test".into()),
            base_url: Some(base_url.into()),
            model: "gpt-4o-mini".into(),
            transcription_model: Some("whisper-1".into()),
            max_tokens: 256,
            priority: 0,
            active: true,
        }
    }

    #[tokio::test]
    async fn complete_sends_system_history_and_user() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "system", "content": "Be kind."},
                    {"role": "assistant", "content": "Hello!"},
                    {"role": "user", "content": "Book me in"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "gpt-4o-mini-2024",
                "choices": [{"message": {"role": "assistant", "content": "Sure."}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(&config(&server.uri())).unwrap();
        let response = provider
            .complete(CompletionRequest {
                system_prompt: "Be kind.".into(),
                user_message: "Book me in".into(),
                context: None,
                history: vec![ChatTurn {
                    role: MessageRole::Assistant,
                    content: "Hello!".into(),
                }],
            })
            .await
            .unwrap();
        assert_eq!(response.text, "Sure.");
        assert_eq!(response.model, "gpt-4o-mini-2024");
        assert_eq!(response.provider, "openai");
    }

    #[tokio::test]
    async fn retries_once_on_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "after retry"}}]
            })))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(&config(&server.uri())).unwrap();
        let response = provider.complete(CompletionRequest::default()).await.unwrap();
        assert_eq!(response.text, "after retry");
        assert_eq!(response.model, "gpt-4o-mini");
    }

    #[tokio::test]
    async fn api_error_message_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
            })))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(&config(&server.uri())).unwrap();
        let err = provider.complete(CompletionRequest::default()).await.unwrap_err();
        assert!(err.to_string().contains("openai"), "got: {err}");
        match err {
            PalaverError::Provider { message, .. } => {
                assert!(message.contains("Incorrect API key"), "got: {message}")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn transcribe_posts_multipart() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"text": "quero marcar um horário"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenAiProvider::new(&config(&server.uri())).unwrap();
        assert!(provider.supports_transcription());
        let text = provider
            .transcribe(vec![1, 2, 3], "audio/ogg; codecs=opus")
            .await
            .unwrap();
        assert_eq!(text, "quero marcar um horário");
    }

    #[tokio::test]
    async fn transcribe_without_model_is_rejected() {
        let mut cfg = config("http://127.0.0.1:1");
        cfg.transcription_model = None;
        let provider = OpenAiProvider::new(&cfg).unwrap();
        assert!(!provider.supports_transcription());
        assert!(provider.transcribe(vec![0], "audio/ogg").await.is_err());
    }

    #[test]
    fn extension_follows_mime_essence() {
        assert_eq!(extension_for("audio/ogg; codecs=opus"), "ogg");
        assert_eq!(extension_for("audio/mpeg"), "mp3");
        assert_eq!(extension_for("application/octet-stream"), "ogg");
    }
}
