// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-message pipeline.
//!
//! Runs once per inbound message, in its own task. Problems before the
//! inbound message is recorded are logged and the message is dropped.
//! Problems while producing the reply send the configured fallback apology
//! instead. Nothing is ever reported back to the connection's event loop.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use tracing::{debug, error, info, warn};

use palaver_config::model::PipelineConfig;
use palaver_core::protocol::InboundEvent;
use palaver_core::types::{
    Agent, Contact, Message, MessageRole, ScheduledItem, Session, SessionKind,
};
use palaver_core::{InboundHandler, KnowledgeRetriever, PalaverError, StorageAdapter, WaConnection};
use palaver_llm::LlmGateway;
use palaver_usage::UsageLimiter;

use crate::prompt::{build_system_prompt, render_knowledge};
use crate::schedule::{ScheduleBlock, ScheduleRequest, extract_schedule};

/// Display name for contacts whose push name is unknown.
pub const UNKNOWN_CONTACT_NAME: &str = "Unknown";

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Everything resolved about one inbound message.
struct Turn {
    session: Session,
    agent: Agent,
    contact: Contact,
    remote_jid: String,
    text: String,
    inbound_id: String,
    connection: Arc<dyn WaConnection>,
}

/// Answers inbound WhatsApp messages with the owning agent.
pub struct MessagePipeline {
    storage: Arc<dyn StorageAdapter>,
    llm: Arc<LlmGateway>,
    retriever: Option<Arc<dyn KnowledgeRetriever>>,
    limiter: Arc<UsageLimiter>,
    config: PipelineConfig,
}

impl MessagePipeline {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        llm: Arc<LlmGateway>,
        retriever: Option<Arc<dyn KnowledgeRetriever>>,
        limiter: Arc<UsageLimiter>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            storage,
            llm,
            retriever,
            limiter,
            config,
        }
    }

    /// Processes one inbound message end to end.
    pub async fn handle_incoming_message(
        &self,
        session_id: &str,
        event: InboundEvent,
        connection: Arc<dyn WaConnection>,
    ) {
        let Some(text) = self.message_text(session_id, &event, connection.as_ref()).await else {
            debug!(session_id, message_id = %event.id, "no text in message, ignoring");
            return;
        };

        let Some((session, agent)) = self.resolve(session_id).await else {
            return;
        };
        if !agent.active {
            debug!(session_id, agent_id = %agent.id, "agent paused, dropping message");
            return;
        }

        let name = event
            .push_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(UNKNOWN_CONTACT_NAME);
        let contact = match self
            .storage
            .find_or_create_contact(&agent.organization_id, event.sender_phone(), name)
            .await
        {
            Ok(contact) => contact,
            Err(e) => {
                error!(session_id, organization_id = %agent.organization_id, error = %e, "contact lookup failed");
                return;
            }
        };

        let turn = Turn {
            session,
            agent,
            contact,
            remote_jid: event.remote_jid,
            text,
            inbound_id: uuid::Uuid::new_v4().to_string(),
            connection,
        };

        if turn.session.kind == SessionKind::Playground && self.over_quota(&turn).await {
            if self.record(&turn, &turn.inbound_id, MessageRole::User, &turn.text).await {
                info!(session_id, organization_id = %turn.agent.organization_id, "daily quota reached");
                self.send(&turn, &self.config.quota_reply).await;
            }
            return;
        }

        if !self.record(&turn, &turn.inbound_id, MessageRole::User, &turn.text).await {
            return;
        }

        if !self.llm.has_active_provider() {
            warn!(session_id, organization_id = %turn.agent.organization_id, "no active LLM provider, not replying");
            return;
        }

        let reply = match self.generate_reply(&turn).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(session_id, contact_id = %turn.contact.id, error = %e, "reply generation failed");
                self.send(&turn, &self.config.fallback_reply).await;
                return;
            }
        };

        if let Err(e) = turn.connection.send_text(&turn.remote_jid, &reply).await {
            error!(session_id, contact_id = %turn.contact.id, error = %e, "failed to deliver reply");
            self.send(&turn, &self.config.fallback_reply).await;
            return;
        }
        let reply_id = uuid::Uuid::new_v4().to_string();
        self.record(&turn, &reply_id, MessageRole::Assistant, &reply).await;
    }

    /// Text from the payload, or a transcript of a voice note.
    async fn message_text(
        &self,
        session_id: &str,
        event: &InboundEvent,
        connection: &dyn WaConnection,
    ) -> Option<String> {
        if let Some(text) = event.payload.text() {
            return Some(text.trim().to_string());
        }
        let mime_type = event.payload.audio_mime_type()?;
        let audio = match connection.download_media(&event.id).await {
            Ok(audio) => audio,
            Err(e) => {
                warn!(session_id, message_id = %event.id, error = %e, "audio download failed");
                return None;
            }
        };
        match self.llm.transcribe(audio, mime_type).await {
            Ok(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Ok(_) => None,
            Err(e) => {
                warn!(session_id, message_id = %event.id, error = %e, "audio transcription failed");
                None
            }
        }
    }

    /// Session and agent for `session_id`, checking the organization exists.
    async fn resolve(&self, session_id: &str) -> Option<(Session, Agent)> {
        let session = match self.storage.get_session(session_id).await {
            Ok(Some(session)) => session,
            Ok(None) => {
                warn!(session_id, "message for unknown session");
                return None;
            }
            Err(e) => {
                error!(session_id, error = %e, "session lookup failed");
                return None;
            }
        };
        let agent = match self.storage.get_agent(&session.agent_id).await {
            Ok(Some(agent)) => agent,
            Ok(None) => {
                warn!(session_id, agent_id = %session.agent_id, "session has no agent");
                return None;
            }
            Err(e) => {
                error!(session_id, error = %e, "agent lookup failed");
                return None;
            }
        };
        match self.storage.get_organization(&agent.organization_id).await {
            Ok(Some(_)) => Some((session, agent)),
            Ok(None) => {
                warn!(session_id, organization_id = %agent.organization_id, "agent has no organization");
                None
            }
            Err(e) => {
                error!(session_id, error = %e, "organization lookup failed");
                None
            }
        }
    }

    async fn over_quota(&self, turn: &Turn) -> bool {
        match self
            .limiter
            .is_over_daily_quota(&turn.agent.organization_id)
            .await
        {
            Ok(over) => over,
            Err(e) => {
                warn!(organization_id = %turn.agent.organization_id, error = %e, "quota check failed, allowing message");
                false
            }
        }
    }

    /// Appends a message. Returns `false` (after logging) on failure.
    async fn record(&self, turn: &Turn, id: &str, role: MessageRole, content: &str) -> bool {
        let message = Message {
            id: id.to_string(),
            session_id: turn.session.id.clone(),
            contact_id: turn.contact.id.clone(),
            role,
            content: content.to_string(),
            created_at: now(),
        };
        match self.storage.insert_message(&message).await {
            Ok(()) => true,
            Err(e) => {
                error!(session_id = %turn.session.id, contact_id = %turn.contact.id, %role, error = %e, "failed to record message");
                false
            }
        }
    }

    async fn send(&self, turn: &Turn, text: &str) {
        if let Err(e) = turn.connection.send_text(&turn.remote_jid, text).await {
            error!(session_id = %turn.session.id, contact_id = %turn.contact.id, error = %e, "failed to send message");
        }
    }

    /// History, knowledge, completion and schedule extraction. Returns the
    /// text to deliver.
    async fn generate_reply(&self, turn: &Turn) -> Result<String, PalaverError> {
        let (knowledge, history) = tokio::join!(self.knowledge(turn), self.history(turn));
        let history = history?;

        let system_prompt = build_system_prompt(&turn.agent.prompt, &history);
        let response = self
            .llm
            .complete(palaver_core::types::CompletionRequest {
                system_prompt,
                user_message: turn.text.clone(),
                context: knowledge,
                history: Vec::new(),
            })
            .await?;
        debug!(session_id = %turn.session.id, provider = %response.provider, model = %response.model, "reply generated");

        let extraction = extract_schedule(&response.text);
        match &extraction.block {
            ScheduleBlock::Absent => {}
            ScheduleBlock::Parsed(request) => self.schedule(turn, request).await,
            ScheduleBlock::Malformed(reason) => {
                warn!(session_id = %turn.session.id, %reason, "malformed scheduling block, sending reply unmodified");
            }
        }

        let text = extraction.text.trim();
        if !text.is_empty() {
            return Ok(text.to_string());
        }
        match extraction.request() {
            Some(request) => Ok(format!("Scheduled: {} on {}.", request.subject, request.date)),
            None => Err(PalaverError::provider("model returned an empty reply")),
        }
    }

    /// Best-effort retrieval; failures mean no context.
    async fn knowledge(&self, turn: &Turn) -> Option<String> {
        let retriever = self.retriever.as_ref()?;
        match retriever
            .retrieve(
                &turn.text,
                &turn.agent.organization_id,
                self.config.knowledge_top_k,
            )
            .await
        {
            Ok(chunks) => render_knowledge(&chunks),
            Err(e) => {
                warn!(organization_id = %turn.agent.organization_id, error = %e, "knowledge retrieval failed, continuing without context");
                None
            }
        }
    }

    /// The last `history_limit` persisted messages with this contact,
    /// oldest first. Read after the inbound turn is stored, so it is the
    /// final line of the transcript.
    async fn history(&self, turn: &Turn) -> Result<Vec<Message>, PalaverError> {
        let mut recent = self
            .storage
            .recent_messages(&turn.session.id, &turn.contact.id, self.config.history_limit)
            .await?;
        recent.reverse();
        Ok(recent)
    }

    async fn schedule(&self, turn: &Turn, request: &ScheduleRequest) {
        let client = if turn.contact.name.trim().is_empty() {
            turn.contact.phone.clone()
        } else {
            turn.contact.name.clone()
        };
        let item = ScheduledItem {
            id: uuid::Uuid::new_v4().to_string(),
            organization_id: turn.agent.organization_id.clone(),
            contact_id: turn.contact.id.clone(),
            subject: request.subject.clone(),
            scheduled_for: request.date.clone(),
            summary: request.summary.clone(),
            client,
            created_at: now(),
        };
        match self.storage.create_scheduled_item(&item).await {
            Ok(()) => info!(
                organization_id = %item.organization_id,
                contact_id = %item.contact_id,
                scheduled_for = %item.scheduled_for,
                "appointment scheduled"
            ),
            Err(e) => error!(organization_id = %item.organization_id, error = %e, "failed to store scheduled item"),
        }
    }
}

#[async_trait]
impl InboundHandler for MessagePipeline {
    async fn handle_incoming(
        &self,
        session_id: &str,
        event: InboundEvent,
        connection: Arc<dyn WaConnection>,
    ) {
        self.handle_incoming_message(session_id, event, connection)
            .await;
    }
}
