// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model.
//!
//! Every struct rejects unrecognized keys so typos fail at startup.

use serde::{Deserialize, Serialize};

/// Top-level configuration. All sections are optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PalaverConfig {
    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Bridge endpoints and credential storage.
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    /// Per-message pipeline tuning and canned replies.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// LLM backends, tried in priority order.
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,

    /// HTTP admin gateway.
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Process identity and log filter.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Default `tracing` filter (trace, debug, info, warn, error). `RUST_LOG` wins.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "palaver".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn data_dir() -> std::path::PathBuf {
    dirs::data_dir()
        .map(|p| p.join("palaver"))
        .unwrap_or_else(|| std::path::PathBuf::from("."))
}

fn default_database_path() -> String {
    data_dir().join("palaver.db").to_string_lossy().into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// WhatsApp bridge configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WhatsAppConfig {
    /// WebSocket base URL of the protocol bridge.
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,

    /// HTTP base URL of the bridge, used for media downloads.
    #[serde(default = "default_bridge_http_url")]
    pub bridge_http_url: String,

    /// Root of the per-session credential directories.
    #[serde(default = "default_auth_dir")]
    pub auth_dir: String,

    /// Delay before reconnecting previously connected sessions at startup.
    #[serde(default = "default_restore_delay_secs")]
    pub restore_delay_secs: u64,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            bridge_url: default_bridge_url(),
            bridge_http_url: default_bridge_http_url(),
            auth_dir: default_auth_dir(),
            restore_delay_secs: default_restore_delay_secs(),
        }
    }
}

fn default_bridge_url() -> String {
    "ws://127.0.0.1:3100".to_string()
}

fn default_bridge_http_url() -> String {
    "http://127.0.0.1:3100".to_string()
}

fn default_auth_dir() -> String {
    data_dir().join("auth").to_string_lossy().into_owned()
}

fn default_restore_delay_secs() -> u64 {
    5
}

/// Message pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Number of stored messages, the current one included, rendered into the prompt.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Knowledge chunks requested per message.
    #[serde(default = "default_knowledge_top_k")]
    pub knowledge_top_k: usize,

    /// Daily playground message quota when neither organization nor plan sets one.
    #[serde(default = "default_daily_message_limit")]
    pub default_daily_message_limit: i64,

    /// Sent when generation fails.
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,

    /// Sent instead of generating once the daily quota is spent.
    #[serde(default = "default_quota_reply")]
    pub quota_reply: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            knowledge_top_k: default_knowledge_top_k(),
            default_daily_message_limit: default_daily_message_limit(),
            fallback_reply: default_fallback_reply(),
            quota_reply: default_quota_reply(),
        }
    }
}

fn default_history_limit() -> usize {
    10
}

fn default_knowledge_top_k() -> usize {
    5
}

fn default_daily_message_limit() -> i64 {
    50
}

fn default_fallback_reply() -> String {
    "Sorry, I couldn't process your message right now. Please try again in a moment.".to_string()
}

fn default_quota_reply() -> String {
    "You've reached today's message limit for this test chat. Upgrade your plan to keep testing."
        .to_string()
}

/// Knowledge ingestion and retrieval configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct KnowledgeConfig {
    #[serde(default = "default_knowledge_enabled")]
    pub enabled: bool,

    /// Target chunk length in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Chunks scoring below this (0.0..=1.0) are dropped.
    #[serde(default = "default_min_score")]
    pub min_score: f32,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            enabled: default_knowledge_enabled(),
            chunk_size: default_chunk_size(),
            min_score: default_min_score(),
        }
    }
}

fn default_knowledge_enabled() -> bool {
    true
}

fn default_chunk_size() -> usize {
    800
}

fn default_min_score() -> f32 {
    0.0
}

/// LLM backend family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Any OpenAI-compatible chat completions API.
    Openai,
    Anthropic,
}

/// One `[[providers]]` entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    pub name: String,

    pub kind: ProviderKind,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Overrides the vendor's public endpoint.
    #[serde(default)]
    pub base_url: Option<String>,

    pub model: String,

    /// Enables audio transcription on OpenAI-compatible providers.
    #[serde(default)]
    pub transcription_model: Option<String>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Higher is preferred.
    #[serde(default)]
    pub priority: i32,

    #[serde(default = "default_provider_active")]
    pub active: bool,
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_provider_active() -> bool {
    true
}

/// HTTP admin gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_enabled")]
    pub enabled: bool,

    #[serde(default = "default_gateway_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Required on every `/v1` route when set.
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: default_gateway_enabled(),
            host: default_gateway_host(),
            port: default_gateway_port(),
            bearer_token: None,
        }
    }
}

fn default_gateway_enabled() -> bool {
    true
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    3000
}
