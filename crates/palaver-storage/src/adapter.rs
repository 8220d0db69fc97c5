// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of [`StorageAdapter`].

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use palaver_config::model::StorageConfig;
use palaver_core::types::{
    Agent, Contact, Message, Organization, Plan, ScheduledItem, Session, SessionStatus,
};
use palaver_core::{AdapterType, HealthStatus, PalaverError, PluginAdapter, StorageAdapter};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed storage adapter.
///
/// The database is opened by [`StorageAdapter::initialize`]; every other
/// call fails until then.
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// The underlying handle, for components that share the connection.
    pub fn database(&self) -> Result<&Database, PalaverError> {
        self.db.get().ok_or_else(|| PalaverError::Storage {
            source: "storage not initialized, call initialize() first".into(),
        })
    }

    fn db(&self) -> Result<&Database, PalaverError> {
        self.database()
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, PalaverError> {
        self.db()?
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PalaverError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), PalaverError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| PalaverError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), PalaverError> {
        self.db()?.checkpoint().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    async fn create_plan(&self, plan: &Plan) -> Result<(), PalaverError> {
        queries::organizations::create_plan(self.db()?, plan).await
    }

    async fn get_plan(&self, id: &str) -> Result<Option<Plan>, PalaverError> {
        queries::organizations::get_plan(self.db()?, id).await
    }

    async fn create_organization(&self, org: &Organization) -> Result<(), PalaverError> {
        queries::organizations::create_organization(self.db()?, org).await
    }

    async fn get_organization(&self, id: &str) -> Result<Option<Organization>, PalaverError> {
        queries::organizations::get_organization(self.db()?, id).await
    }

    async fn create_agent(&self, agent: &Agent) -> Result<(), PalaverError> {
        queries::agents::create_agent(self.db()?, agent).await
    }

    async fn get_agent(&self, id: &str) -> Result<Option<Agent>, PalaverError> {
        queries::agents::get_agent(self.db()?, id).await
    }

    async fn set_agent_active(&self, id: &str, active: bool) -> Result<bool, PalaverError> {
        queries::agents::set_agent_active(self.db()?, id, active).await
    }

    async fn count_agents(&self, organization_id: &str) -> Result<i64, PalaverError> {
        queries::agents::count_agents(self.db()?, organization_id).await
    }

    async fn create_session(&self, session: &Session) -> Result<(), PalaverError> {
        queries::sessions::create_session(self.db()?, session).await
    }

    async fn get_session(&self, id: &str) -> Result<Option<Session>, PalaverError> {
        queries::sessions::get_session(self.db()?, id).await
    }

    async fn update_session_status(
        &self,
        id: &str,
        status: SessionStatus,
        qr_code: Option<&str>,
    ) -> Result<(), PalaverError> {
        queries::sessions::update_session_status(self.db()?, id, status, qr_code).await
    }

    async fn delete_session(&self, id: &str) -> Result<bool, PalaverError> {
        queries::sessions::delete_session(self.db()?, id).await
    }

    async fn list_sessions_by_status(
        &self,
        status: SessionStatus,
    ) -> Result<Vec<Session>, PalaverError> {
        queries::sessions::list_sessions_by_status(self.db()?, status).await
    }

    async fn count_sessions(&self, organization_id: &str) -> Result<i64, PalaverError> {
        queries::sessions::count_sessions(self.db()?, organization_id).await
    }

    async fn find_or_create_contact(
        &self,
        organization_id: &str,
        phone: &str,
        name: &str,
    ) -> Result<Contact, PalaverError> {
        queries::contacts::find_or_create_contact(self.db()?, organization_id, phone, name).await
    }

    async fn create_contact(&self, contact: &Contact) -> Result<(), PalaverError> {
        queries::contacts::create_contact(self.db()?, contact).await
    }

    async fn count_contacts(&self, organization_id: &str) -> Result<i64, PalaverError> {
        queries::contacts::count_contacts(self.db()?, organization_id).await
    }

    async fn insert_message(&self, message: &Message) -> Result<(), PalaverError> {
        queries::messages::insert_message(self.db()?, message).await
    }

    async fn recent_messages(
        &self,
        session_id: &str,
        contact_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, PalaverError> {
        queries::messages::recent_messages(self.db()?, session_id, contact_id, limit).await
    }

    async fn count_user_messages_since(
        &self,
        organization_id: &str,
        since: &str,
    ) -> Result<i64, PalaverError> {
        queries::messages::count_user_messages_since(self.db()?, organization_id, since).await
    }

    async fn create_scheduled_item(&self, item: &ScheduledItem) -> Result<(), PalaverError> {
        queries::schedule::create_scheduled_item(self.db()?, item).await
    }

    async fn list_scheduled_items(
        &self,
        organization_id: &str,
    ) -> Result<Vec<ScheduledItem>, PalaverError> {
        queries::schedule::list_scheduled_items(self.db()?, organization_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::fixtures;
    use tempfile::tempdir;

    fn make_config(path: &std::path::Path) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string_lossy().into_owned(),
            wal_mode: true,
        }
    }

    #[tokio::test]
    async fn identity() {
        let dir = tempdir().unwrap();
        let storage = SqliteStorage::new(make_config(&dir.path().join("id.db")));
        assert_eq!(storage.name(), "sqlite");
        assert_eq!(storage.adapter_type(), AdapterType::Storage);
    }

    #[tokio::test]
    async fn initialize_twice_returns_error() {
        let dir = tempdir().unwrap();
        let storage = SqliteStorage::new(make_config(&dir.path().join("double.db")));
        storage.initialize().await.unwrap();
        assert!(storage.initialize().await.is_err());
    }

    #[tokio::test]
    async fn calls_before_initialize_fail() {
        let dir = tempdir().unwrap();
        let storage = SqliteStorage::new(make_config(&dir.path().join("none.db")));
        assert!(storage.health_check().await.is_err());
        assert!(storage.get_session("x").await.is_err());
    }

    #[tokio::test]
    async fn tenant_graph_through_adapter() {
        let dir = tempdir().unwrap();
        let storage = SqliteStorage::new(make_config(&dir.path().join("graph.db")));
        storage.initialize().await.unwrap();
        assert_eq!(storage.health_check().await.unwrap(), HealthStatus::Healthy);

        storage.create_plan(&fixtures::plan("p")).await.unwrap();
        storage
            .create_organization(&fixtures::organization("o", Some("p")))
            .await
            .unwrap();
        storage.create_agent(&fixtures::agent("a", "o")).await.unwrap();
        storage.create_session(&fixtures::session("s", "a")).await.unwrap();

        let session = storage.get_session("s").await.unwrap().unwrap();
        let agent = storage.get_agent(&session.agent_id).await.unwrap().unwrap();
        let org = storage
            .get_organization(&agent.organization_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(org.plan_id.as_deref(), Some("p"));
        assert_eq!(storage.count_sessions("o").await.unwrap(), 1);

        assert!(storage.delete_session("s").await.unwrap());
        storage.shutdown().await.unwrap();
    }
}
