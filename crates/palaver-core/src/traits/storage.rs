// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for the persistence gateway.

use async_trait::async_trait;

use crate::error::PalaverError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    Agent, Contact, Message, Organization, Plan, ScheduledItem, Session, SessionStatus,
};

/// Durable store for tenants, agents, sessions, contacts, messages and
/// scheduled items.
///
/// Lookups by id return `Ok(None)` when the row is absent; only backend
/// failures surface as errors.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Opens the backend and applies pending migrations.
    async fn initialize(&self) -> Result<(), PalaverError>;

    /// Flushes pending writes and releases the connection.
    async fn close(&self) -> Result<(), PalaverError>;

    // --- Organizations and plans ---

    async fn create_plan(&self, plan: &Plan) -> Result<(), PalaverError>;

    async fn get_plan(&self, id: &str) -> Result<Option<Plan>, PalaverError>;

    async fn create_organization(&self, org: &Organization) -> Result<(), PalaverError>;

    async fn get_organization(&self, id: &str) -> Result<Option<Organization>, PalaverError>;

    // --- Agents ---

    async fn create_agent(&self, agent: &Agent) -> Result<(), PalaverError>;

    async fn get_agent(&self, id: &str) -> Result<Option<Agent>, PalaverError>;

    /// Pauses or resumes an agent. Returns `false` when the agent is unknown.
    async fn set_agent_active(&self, id: &str, active: bool) -> Result<bool, PalaverError>;

    async fn count_agents(&self, organization_id: &str) -> Result<i64, PalaverError>;

    // --- Sessions ---

    async fn create_session(&self, session: &Session) -> Result<(), PalaverError>;

    async fn get_session(&self, id: &str) -> Result<Option<Session>, PalaverError>;

    /// Persists a status transition together with the pairing code.
    async fn update_session_status(
        &self,
        id: &str,
        status: SessionStatus,
        qr_code: Option<&str>,
    ) -> Result<(), PalaverError>;

    /// Deletes the row. Returns `false` when it was already gone.
    async fn delete_session(&self, id: &str) -> Result<bool, PalaverError>;

    async fn list_sessions_by_status(
        &self,
        status: SessionStatus,
    ) -> Result<Vec<Session>, PalaverError>;

    /// Sessions across all of the organization's agents.
    async fn count_sessions(&self, organization_id: &str) -> Result<i64, PalaverError>;

    // --- Contacts ---

    /// Returns the contact for `(phone, organization_id)`, creating it when
    /// unseen. Concurrent callers converge on a single row.
    async fn find_or_create_contact(
        &self,
        organization_id: &str,
        phone: &str,
        name: &str,
    ) -> Result<Contact, PalaverError>;

    async fn create_contact(&self, contact: &Contact) -> Result<(), PalaverError>;

    async fn count_contacts(&self, organization_id: &str) -> Result<i64, PalaverError>;

    // --- Messages ---

    async fn insert_message(&self, message: &Message) -> Result<(), PalaverError>;

    /// The most recent `limit` messages for a session and contact, newest first.
    async fn recent_messages(
        &self,
        session_id: &str,
        contact_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, PalaverError>;

    /// User-role messages across the organization created at or after `since`
    /// (an RFC 3339 timestamp).
    async fn count_user_messages_since(
        &self,
        organization_id: &str,
        since: &str,
    ) -> Result<i64, PalaverError>;

    // --- Scheduled items ---

    async fn create_scheduled_item(&self, item: &ScheduledItem) -> Result<(), PalaverError>;

    async fn list_scheduled_items(
        &self,
        organization_id: &str,
    ) -> Result<Vec<ScheduledItem>, PalaverError>;
}
