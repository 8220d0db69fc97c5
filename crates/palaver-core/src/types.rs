// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across adapter traits and services.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of an adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Channel,
    Provider,
    Storage,
    Retrieval,
}

/// Persisted lifecycle status of a protocol session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// Initial state, and the terminal state after an explicit logout.
    Disconnected,
    /// A pairing code was emitted and is waiting to be scanned.
    QrReady,
    /// Paired and online.
    Connected,
}

/// Whether a session serves real customers or the tenant's own test chat.
///
/// Playground sessions are subject to the per-tenant daily message quota.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    #[default]
    Production,
    Playground,
}

/// A tenant-owned WhatsApp connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub agent_id: String,
    pub kind: SessionKind,
    pub status: SessionStatus,
    /// Last pairing code; `None` once connected.
    pub qr_code: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A tenant-configured LLM persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub prompt: String,
    pub active: bool,
    pub created_at: String,
}

/// A tenant and its limit overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub plan_id: Option<String>,
    pub max_agents: Option<i64>,
    pub max_sessions: Option<i64>,
    pub max_contacts: Option<i64>,
    pub daily_message_limit: Option<i64>,
    pub created_at: String,
}

/// Default limits attached to a subscription plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub name: String,
    pub max_agents: i64,
    pub max_sessions: i64,
    pub max_contacts: i64,
    pub daily_message_limit: Option<i64>,
}

/// A counterpart on the protocol, unique per (phone, organization).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub organization_id: String,
    pub phone: String,
    pub name: String,
    pub tag: String,
    pub created_at: String,
}

/// Who authored a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One append-only conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub session_id: String,
    pub contact_id: String,
    pub role: MessageRole,
    pub content: String,
    pub created_at: String,
}

/// An appointment created from a scheduling block in model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledItem {
    pub id: String,
    pub organization_id: String,
    pub contact_id: String,
    pub subject: String,
    /// Date/time exactly as the model emitted it.
    pub scheduled_for: String,
    pub summary: String,
    /// Contact display name, or the phone number when the name is unknown.
    pub client: String,
    pub created_at: String,
}

/// Resource kinds gated by plan limits.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Agents,
    Sessions,
    Contacts,
}

/// A previously ingested text chunk returned by knowledge retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    pub id: String,
    pub organization_id: String,
    pub source: String,
    pub content: String,
    /// Relevance in `0.0..=1.0`, higher is better.
    pub score: f32,
}

/// One prior turn handed to a provider alongside the current message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: MessageRole,
    pub content: String,
}

/// A single-shot generation request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_message: String,
    /// Retrieved knowledge, rendered as plain text.
    pub context: Option<String>,
    pub history: Vec<ChatTurn>,
}

/// The generated reply from a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    pub text: String,
    pub model: String,
    /// Name of the provider that produced the reply.
    pub provider: String,
}
