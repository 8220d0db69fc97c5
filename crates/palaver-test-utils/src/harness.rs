// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the full message path around mocks: temp SQLite
//! storage seeded with one plan, organization and agent, the real session
//! manager driving a [`MockConnector`], and the real pipeline answering
//! through a [`MockProvider`].

use std::sync::Arc;

use palaver_agent::MessagePipeline;
use palaver_config::model::{KnowledgeConfig, PalaverConfig, StorageConfig};
use palaver_core::protocol::{ConnectionEvent, InboundEvent};
use palaver_core::types::{Agent, Message, Organization, Plan, Session, SessionKind, SessionStatus};
use palaver_core::{KnowledgeRetriever, PalaverError, StorageAdapter};
use palaver_knowledge::{FtsRetriever, KnowledgeStore};
use palaver_llm::{LlmGateway, ProviderEntry};
use palaver_storage::SqliteStorage;
use palaver_usage::UsageLimiter;
use palaver_whatsapp::SessionManager;

use crate::eventually;
use crate::mock_connector::{MockConnection, MockConnector, text_event};
use crate::mock_provider::MockProvider;

pub const ORGANIZATION_ID: &str = "test-org";
pub const AGENT_ID: &str = "test-agent";

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    responses: Vec<String>,
    daily_message_limit: Option<i64>,
    max_sessions: i64,
    agent_prompt: String,
    agent_active: bool,
    with_provider: bool,
    transcription: Option<String>,
    history_limit: Option<usize>,
    knowledge: Vec<(String, String)>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            responses: Vec::new(),
            daily_message_limit: None,
            max_sessions: 10,
            agent_prompt: "You are the front desk of a hair salon.".to_string(),
            agent_active: true,
            with_provider: true,
            transcription: None,
            history_limit: None,
            knowledge: Vec::new(),
        }
    }

    /// Set mock provider responses.
    pub fn with_mock_responses(mut self, responses: Vec<String>) -> Self {
        self.responses = responses;
        self
    }

    /// Daily playground message limit on the seeded plan.
    pub fn with_daily_message_limit(mut self, limit: i64) -> Self {
        self.daily_message_limit = Some(limit);
        self
    }

    pub fn with_max_sessions(mut self, max: i64) -> Self {
        self.max_sessions = max;
        self
    }

    pub fn with_agent_prompt(mut self, prompt: &str) -> Self {
        self.agent_prompt = prompt.to_string();
        self
    }

    /// Seeds the agent as paused.
    pub fn with_paused_agent(mut self) -> Self {
        self.agent_active = false;
        self
    }

    /// Builds an LLM gateway with no providers at all.
    pub fn without_provider(mut self) -> Self {
        self.with_provider = false;
        self
    }

    pub fn with_transcription(mut self, text: &str) -> Self {
        self.transcription = Some(text.to_string());
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }

    /// Text ingested for the seeded organization under `source`.
    pub fn with_knowledge(mut self, source: &str, text: &str) -> Self {
        self.knowledge.push((source.to_string(), text.to_string()));
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, PalaverError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| PalaverError::Storage { source: e.into() })?;

        let mut config = PalaverConfig::default();
        config.storage = StorageConfig {
            database_path: temp_dir.path().join("test.db").to_string_lossy().into_owned(),
            wal_mode: true,
        };
        config.whatsapp.auth_dir = temp_dir.path().join("auth").to_string_lossy().into_owned();
        config.whatsapp.restore_delay_secs = 0;
        config.knowledge = KnowledgeConfig {
            chunk_size: 200,
            ..KnowledgeConfig::default()
        };
        if let Some(limit) = self.history_limit {
            config.pipeline.history_limit = limit;
        }

        let storage = SqliteStorage::new(config.storage.clone());
        storage.initialize().await?;
        let knowledge_store = Arc::new(KnowledgeStore::new(
            storage.database()?.connection().clone(),
        ));
        let storage: Arc<dyn StorageAdapter> = Arc::new(storage);
        seed(
            storage.as_ref(),
            self.daily_message_limit,
            self.max_sessions,
            &self.agent_prompt,
            self.agent_active,
        )
        .await?;

        let retriever = Arc::new(FtsRetriever::new(knowledge_store, config.knowledge.clone()));
        for (source, text) in &self.knowledge {
            retriever.ingest(ORGANIZATION_ID, source, text).await?;
        }

        let mut provider = MockProvider::with_responses(self.responses);
        if let Some(text) = &self.transcription {
            provider = provider.with_transcription(text);
        }
        let provider = Arc::new(provider);
        let llm = Arc::new(if self.with_provider {
            LlmGateway::new(vec![ProviderEntry::new(provider.clone(), 0, true)])
        } else {
            LlmGateway::new(Vec::new())
        });

        let limiter = Arc::new(UsageLimiter::new(
            Arc::clone(&storage),
            config.pipeline.default_daily_message_limit,
        ));
        let pipeline = Arc::new(MessagePipeline::new(
            Arc::clone(&storage),
            Arc::clone(&llm),
            Some(retriever.clone() as Arc<dyn KnowledgeRetriever>),
            Arc::clone(&limiter),
            config.pipeline.clone(),
        ));
        let connector = Arc::new(MockConnector::new());
        let manager = SessionManager::new(
            Arc::clone(&storage),
            connector.clone(),
            pipeline.clone(),
            Arc::clone(&limiter),
            config.whatsapp.auth_dir.clone(),
        );

        Ok(TestHarness {
            storage,
            provider,
            connector,
            llm,
            retriever,
            limiter,
            pipeline,
            manager,
            config,
            _temp_dir: temp_dir,
        })
    }
}

async fn seed(
    storage: &dyn StorageAdapter,
    daily_message_limit: Option<i64>,
    max_sessions: i64,
    agent_prompt: &str,
    agent_active: bool,
) -> Result<(), PalaverError> {
    let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
    storage
        .create_plan(&Plan {
            id: "test-plan".into(),
            name: "Test".into(),
            max_agents: 5,
            max_sessions,
            max_contacts: 1000,
            daily_message_limit,
        })
        .await?;
    storage
        .create_organization(&Organization {
            id: ORGANIZATION_ID.into(),
            name: "Test Salon".into(),
            plan_id: Some("test-plan".into()),
            max_agents: None,
            max_sessions: None,
            max_contacts: None,
            daily_message_limit: None,
            created_at: now.clone(),
        })
        .await?;
    storage
        .create_agent(&Agent {
            id: AGENT_ID.into(),
            organization_id: ORGANIZATION_ID.into(),
            name: "Front desk".into(),
            prompt: agent_prompt.to_string(),
            active: agent_active,
            created_at: now,
        })
        .await
}

/// A complete test environment with mock adapters and temp storage.
pub struct TestHarness {
    /// SQLite storage adapter (temp DB, cleaned up on drop).
    pub storage: Arc<dyn StorageAdapter>,
    pub provider: Arc<MockProvider>,
    pub connector: Arc<MockConnector>,
    pub llm: Arc<LlmGateway>,
    pub retriever: Arc<FtsRetriever>,
    pub limiter: Arc<UsageLimiter>,
    pub pipeline: Arc<MessagePipeline>,
    pub manager: SessionManager,
    pub config: PalaverConfig,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Starts a session for the seeded agent and waits until it is `CONNECTED`.
    pub async fn start_session(&self, kind: SessionKind) -> Result<Session, PalaverError> {
        let session = self.manager.start_session(AGENT_ID, kind).await?;
        self.connector.emit(&session.id, ConnectionEvent::Open).await;

        let storage = Arc::clone(&self.storage);
        let id = session.id.clone();
        let connected = eventually(move || {
            let storage = Arc::clone(&storage);
            let id = id.clone();
            async move {
                matches!(
                    storage.get_session(&id).await,
                    Ok(Some(s)) if s.status == SessionStatus::Connected
                )
            }
        })
        .await;
        if !connected {
            return Err(PalaverError::Internal(format!(
                "session {} never reached CONNECTED",
                session.id
            )));
        }
        self.storage
            .get_session(&session.id)
            .await?
            .ok_or_else(|| PalaverError::not_found("session", session.id))
    }

    /// Runs the pipeline for `event` to completion on the session's live
    /// connection and returns that connection.
    pub async fn deliver(
        &self,
        session_id: &str,
        event: InboundEvent,
    ) -> Result<Arc<MockConnection>, PalaverError> {
        let connection = self
            .connector
            .connection(session_id)
            .await
            .ok_or_else(|| PalaverError::not_found("connection", session_id))?;
        self.pipeline
            .handle_incoming_message(session_id, event, connection.clone())
            .await;
        Ok(connection)
    }

    /// [`deliver`](Self::deliver) for a plain text from `phone`.
    pub async fn send_text(
        &self,
        session_id: &str,
        phone: &str,
        text: &str,
    ) -> Result<Arc<MockConnection>, PalaverError> {
        self.deliver(session_id, text_event(phone, Some("Test User"), text))
            .await
    }

    /// Conversation with `phone` on `session_id`, oldest first.
    pub async fn conversation(
        &self,
        session_id: &str,
        phone: &str,
    ) -> Result<Vec<Message>, PalaverError> {
        let contact = self
            .storage
            .find_or_create_contact(ORGANIZATION_ID, phone, "Unknown")
            .await?;
        let mut messages = self
            .storage
            .recent_messages(session_id, &contact.id, 1000)
            .await?;
        messages.reverse();
        Ok(messages)
    }
}
