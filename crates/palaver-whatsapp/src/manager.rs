// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry of live protocol connections and the session state machine.
//!
//! Persisted status moves `DISCONNECTED -> QR_READY -> CONNECTED`. A close
//! for any reason other than logout re-enters the connect flow for the same
//! session id; a logout evicts the handle and persists `DISCONNECTED`.
//!
//! Each registry entry carries a generation number. An event loop checks
//! that its generation is still current before acting on an event, so a
//! loop whose handle has been replaced never drives the state machine.
//!
//! Disconnect and delete bump a per-session teardown epoch. A connect that
//! began under an older epoch closes its fresh connection instead of
//! registering it, so an in-flight reconnect cannot revive a removed session.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use palaver_core::protocol::ConnectionEvent;
use palaver_core::types::{ResourceKind, Session, SessionKind, SessionStatus};
use palaver_core::{InboundHandler, PalaverError, StorageAdapter, WaConnection, WaConnector};
use palaver_usage::UsageLimiter;

use crate::credentials;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Pollable pairing state of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub session_id: String,
    pub status: SessionStatus,
    pub qr_code: Option<String>,
}

struct SessionHandle {
    connection: Arc<dyn WaConnection>,
    generation: u64,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct Registry {
    handles: HashMap<String, SessionHandle>,
    teardowns: HashMap<String, u64>,
}

impl Registry {
    fn teardown_epoch(&self, session_id: &str) -> u64 {
        self.teardowns.get(session_id).copied().unwrap_or(0)
    }
}

struct Inner {
    storage: Arc<dyn StorageAdapter>,
    connector: Arc<dyn WaConnector>,
    handler: Arc<dyn InboundHandler>,
    limiter: Arc<UsageLimiter>,
    auth_dir: PathBuf,
    registry: Mutex<Registry>,
    generations: AtomicU64,
}

/// Owns every live WhatsApp connection in the process.
///
/// Cheap to clone; clones share one registry.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        connector: Arc<dyn WaConnector>,
        handler: Arc<dyn InboundHandler>,
        limiter: Arc<UsageLimiter>,
        auth_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                storage,
                connector,
                handler,
                limiter,
                auth_dir: auth_dir.into(),
                registry: Mutex::new(Registry::default()),
                generations: AtomicU64::new(1),
            }),
        }
    }

    fn credentials_dir(&self, session_id: &str) -> PathBuf {
        credentials::session_dir(&self.inner.auth_dir, session_id)
    }

    /// Establishes (or re-establishes) the connection for an existing session.
    ///
    /// Any handle already registered for `session_id` is discarded first.
    /// Boxed because the event loop it spawns calls back into it on reconnect.
    pub fn create_session<'a>(&'a self, session_id: &'a str) -> BoxFuture<'a, Result<(), PalaverError>> {
        Box::pin(async move {
            let epoch = self.inner.registry.lock().await.teardown_epoch(session_id);
            if self.inner.storage.get_session(session_id).await?.is_none() {
                return Err(PalaverError::not_found("session", session_id));
            }

            if let Some(old) = self.evict(session_id).await {
                old.task.abort();
                if let Err(e) = old.connection.close().await {
                    debug!(session_id, error = %e, "closing replaced connection failed");
                }
            }

            let dir = self.credentials_dir(session_id);
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| PalaverError::Storage {
                    source: Box::new(e),
                })?;
            let parts = self.inner.connector.connect(session_id, &dir).await?;
            let generation = self.inner.generations.fetch_add(1, Ordering::SeqCst);

            // Spawn under the lock so the loop cannot observe the registry
            // before its own entry is in place.
            let replaced = {
                let mut registry = self.inner.registry.lock().await;
                if registry.teardown_epoch(session_id) != epoch {
                    let superseded = registry.handles.contains_key(session_id);
                    drop(registry);
                    info!(session_id, "session torn down while connecting, dropping connection");
                    if let Err(e) = parts.connection.close().await {
                        debug!(session_id, error = %e, "closing abandoned connection failed");
                    }
                    if !superseded {
                        if let Err(e) = credentials::remove(&dir).await {
                            warn!(session_id, error = %e, "failed to remove credential directory");
                        }
                    }
                    return Err(PalaverError::not_found("session", session_id));
                }
                let task = tokio::spawn(self.clone().run_events(
                    session_id.to_string(),
                    generation,
                    parts.events,
                ));
                registry.handles.insert(
                    session_id.to_string(),
                    SessionHandle {
                        connection: Arc::clone(&parts.connection),
                        generation,
                        task,
                    },
                )
            };
            if let Some(stale) = replaced {
                stale.task.abort();
                if let Err(e) = stale.connection.close().await {
                    debug!(session_id, error = %e, "closing superseded connection failed");
                }
            }

            info!(session_id, generation, "session connecting");
            Ok(())
        })
    }

    /// Best-effort close of the current handle, then [`create_session`](Self::create_session).
    pub async fn reconnect_session(&self, session_id: &str) -> Result<(), PalaverError> {
        if let Some(old) = self.evict(session_id).await {
            old.task.abort();
            if let Err(e) = old.connection.close().await {
                debug!(session_id, error = %e, "close before reconnect failed, continuing");
            }
        }
        self.create_session(session_id).await
    }

    /// Logs the device out and forgets its credentials. The row stays, as
    /// `DISCONNECTED`.
    pub async fn disconnect_session(&self, session_id: &str) -> Result<(), PalaverError> {
        let exists = self.inner.storage.get_session(session_id).await?.is_some();
        self.teardown(session_id).await;
        if !exists {
            return Err(PalaverError::not_found("session", session_id));
        }
        self.inner
            .storage
            .update_session_status(session_id, SessionStatus::Disconnected, None)
            .await?;
        info!(session_id, "session disconnected");
        Ok(())
    }

    /// Tears the session down and deletes its row. Succeeds when the row or
    /// the credential directory are already gone.
    pub async fn delete_session(&self, session_id: &str) -> Result<(), PalaverError> {
        self.teardown(session_id).await;
        match self.inner.storage.delete_session(session_id).await {
            Ok(true) => info!(session_id, "session deleted"),
            Ok(false) => debug!(session_id, "session row already absent"),
            Err(e) => {
                error!(session_id, error = %e, "failed to delete session row");
                return Err(e);
            }
        }
        Ok(())
    }

    pub async fn get_session_status(&self, session_id: &str) -> Result<SessionState, PalaverError> {
        let session = self
            .inner
            .storage
            .get_session(session_id)
            .await?
            .ok_or_else(|| PalaverError::not_found("session", session_id))?;
        Ok(SessionState {
            session_id: session.id,
            status: session.status,
            qr_code: session.qr_code,
        })
    }

    /// Creates a `DISCONNECTED` session for `agent_id` within the
    /// organization's session limit, then starts connecting it.
    pub async fn start_session(
        &self,
        agent_id: &str,
        kind: SessionKind,
    ) -> Result<Session, PalaverError> {
        let agent = self
            .inner
            .storage
            .get_agent(agent_id)
            .await?
            .ok_or_else(|| PalaverError::not_found("agent", agent_id))?;
        self.inner
            .limiter
            .check_limit(&agent.organization_id, ResourceKind::Sessions)
            .await?;

        let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let session = Session {
            id: uuid::Uuid::new_v4().to_string(),
            agent_id: agent.id,
            kind,
            status: SessionStatus::Disconnected,
            qr_code: None,
            created_at: now.clone(),
            updated_at: now,
        };
        self.inner.storage.create_session(&session).await?;
        self.create_session(&session.id).await?;

        self.inner
            .storage
            .get_session(&session.id)
            .await?
            .ok_or_else(|| PalaverError::not_found("session", session.id.clone()))
    }

    /// Waits `delay`, then reconnects every session persisted as `CONNECTED`.
    /// Returns how many came back.
    pub async fn restore_connected_sessions(&self, delay: Duration) -> Result<usize, PalaverError> {
        tokio::time::sleep(delay).await;
        let sessions = self
            .inner
            .storage
            .list_sessions_by_status(SessionStatus::Connected)
            .await?;
        let total = sessions.len();
        let mut restored = 0;
        for session in sessions {
            match self.create_session(&session.id).await {
                Ok(()) => restored += 1,
                Err(e) => warn!(session_id = %session.id, error = %e, "failed to restore session"),
            }
        }
        info!(restored, total, "restored connected sessions");
        Ok(restored)
    }

    /// Closes every live connection without logging out, so persisted
    /// `CONNECTED` sessions come back on the next start.
    pub async fn shutdown(&self) {
        let handles: Vec<(String, SessionHandle)> =
            self.inner.registry.lock().await.handles.drain().collect();
        for (session_id, handle) in handles {
            handle.task.abort();
            if let Err(e) = handle.connection.close().await {
                warn!(session_id = %session_id, error = %e, "close on shutdown failed");
            }
        }
        debug!("session manager shut down");
    }

    pub async fn is_live(&self, session_id: &str) -> bool {
        self.inner.registry.lock().await.handles.contains_key(session_id)
    }

    pub async fn live_count(&self) -> usize {
        self.inner.registry.lock().await.handles.len()
    }

    async fn evict(&self, session_id: &str) -> Option<SessionHandle> {
        self.inner.registry.lock().await.handles.remove(session_id)
    }

    /// Removes the entry only if it still belongs to `generation`.
    async fn evict_generation(&self, session_id: &str, generation: u64) -> Option<SessionHandle> {
        let mut registry = self.inner.registry.lock().await;
        match registry.handles.get(session_id) {
            Some(handle) if handle.generation == generation => registry.handles.remove(session_id),
            _ => None,
        }
    }

    async fn current_connection(
        &self,
        session_id: &str,
        generation: u64,
    ) -> Option<Arc<dyn WaConnection>> {
        self.inner
            .registry
            .lock()
            .await
            .handles
            .get(session_id)
            .filter(|handle| handle.generation == generation)
            .map(|handle| Arc::clone(&handle.connection))
    }

    /// Logout, eviction and credential removal, each independent of the others.
    async fn teardown(&self, session_id: &str) {
        let evicted = {
            let mut registry = self.inner.registry.lock().await;
            *registry.teardowns.entry(session_id.to_string()).or_insert(0) += 1;
            registry.handles.remove(session_id)
        };
        if let Some(handle) = evicted {
            if let Err(e) = handle.connection.logout().await {
                warn!(session_id, error = %e, "logout failed, continuing teardown");
            }
            handle.task.abort();
        }
        if let Err(e) = credentials::remove(&self.credentials_dir(session_id)).await {
            warn!(session_id, error = %e, "failed to remove credential directory");
        }
    }

    async fn set_status(&self, session_id: &str, status: SessionStatus, qr_code: Option<&str>) {
        if let Err(e) = self
            .inner
            .storage
            .update_session_status(session_id, status, qr_code)
            .await
        {
            warn!(session_id, %status, error = %e, "failed to persist session status");
        }
    }

    async fn run_events(
        self,
        session_id: String,
        generation: u64,
        mut events: mpsc::Receiver<ConnectionEvent>,
    ) {
        while let Some(event) = events.recv().await {
            let Some(connection) = self.current_connection(&session_id, generation).await else {
                debug!(session_id = %session_id, generation, "stale event loop, stopping");
                return;
            };

            match event {
                ConnectionEvent::Qr(code) => {
                    debug!(session_id = %session_id, "pairing code issued");
                    self.set_status(&session_id, SessionStatus::QrReady, Some(&code))
                        .await;
                }
                ConnectionEvent::Open => {
                    info!(session_id = %session_id, "session connected");
                    self.set_status(&session_id, SessionStatus::Connected, None)
                        .await;
                }
                ConnectionEvent::CredentialsUpdated(data) => {
                    if let Err(e) = credentials::store(&self.credentials_dir(&session_id), &data).await
                    {
                        error!(session_id = %session_id, error = %e, "failed to persist credentials");
                    }
                }
                ConnectionEvent::Message(message) => {
                    if message.from_me {
                        continue;
                    }
                    let handler = Arc::clone(&self.inner.handler);
                    let id = session_id.clone();
                    tokio::spawn(async move {
                        handler.handle_incoming(&id, message, connection).await;
                    });
                }
                ConnectionEvent::Closed(reason) => {
                    if reason.should_reconnect() {
                        info!(session_id = %session_id, ?reason, "connection closed, reconnecting");
                        let manager = self.clone();
                        tokio::spawn(async move {
                            match manager.create_session(&session_id).await {
                                Ok(()) => {}
                                Err(PalaverError::NotFound { .. }) => {
                                    debug!(session_id = %session_id, "session removed, not reconnecting");
                                }
                                Err(e) => {
                                    warn!(session_id = %session_id, error = %e, "reconnect failed");
                                    manager
                                        .set_status(&session_id, SessionStatus::Disconnected, None)
                                        .await;
                                }
                            }
                        });
                    } else {
                        info!(session_id = %session_id, "logged out");
                        self.evict_generation(&session_id, generation).await;
                        self.set_status(&session_id, SessionStatus::Disconnected, None)
                            .await;
                        if let Err(e) = credentials::remove(&self.credentials_dir(&session_id)).await {
                            warn!(session_id = %session_id, error = %e, "failed to remove credential directory");
                        }
                    }
                    return;
                }
            }
        }
        debug!(session_id = %session_id, generation, "event stream ended");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use palaver_config::model::StorageConfig;
    use palaver_core::protocol::{DisconnectReason, InboundEvent};
    use palaver_core::types::{Agent, Organization, Plan};
    use palaver_storage::{SqliteStorage, now_timestamp};
    use palaver_test_utils::{MockConnector, eventually, text_event};

    #[derive(Default)]
    struct RecordingHandler {
        seen: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl InboundHandler for RecordingHandler {
        async fn handle_incoming(
            &self,
            session_id: &str,
            event: InboundEvent,
            connection: Arc<dyn WaConnection>,
        ) {
            let text = event.payload.text().unwrap_or_default().to_string();
            let _ = connection.send_text(&event.remote_jid, "ack").await;
            self.seen.lock().await.push((session_id.to_string(), text));
        }
    }

    struct Fixture {
        manager: SessionManager,
        storage: Arc<dyn StorageAdapter>,
        connector: Arc<MockConnector>,
        handler: Arc<RecordingHandler>,
        auth_dir: PathBuf,
        _dir: tempfile::TempDir,
    }

    async fn fixture_with(connector: MockConnector, max_sessions: i64) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let storage = SqliteStorage::new(StorageConfig {
            database_path: dir.path().join("wa.db").to_string_lossy().into_owned(),
            wal_mode: true,
        });
        storage.initialize().await.unwrap();
        let storage: Arc<dyn StorageAdapter> = Arc::new(storage);
        storage
            .create_plan(&Plan {
                id: "plan".into(),
                name: "Plan".into(),
                max_agents: 5,
                max_sessions,
                max_contacts: 100,
                daily_message_limit: None,
            })
            .await
            .unwrap();
        storage
            .create_organization(&Organization {
                id: "org".into(),
                name: "Org".into(),
                plan_id: Some("plan".into()),
                max_agents: None,
                max_sessions: None,
                max_contacts: None,
                daily_message_limit: None,
                created_at: now_timestamp(),
            })
            .await
            .unwrap();
        storage
            .create_agent(&Agent {
                id: "agent".into(),
                organization_id: "org".into(),
                name: "Desk".into(),
                prompt: "Help.".into(),
                active: true,
                created_at: now_timestamp(),
            })
            .await
            .unwrap();

        let connector = Arc::new(connector);
        let handler = Arc::new(RecordingHandler::default());
        let limiter = Arc::new(UsageLimiter::new(Arc::clone(&storage), 50));
        let auth_dir = dir.path().join("auth");
        let manager = SessionManager::new(
            Arc::clone(&storage),
            connector.clone(),
            handler.clone(),
            limiter,
            auth_dir.clone(),
        );
        Fixture {
            manager,
            storage,
            connector,
            handler,
            auth_dir,
            _dir: dir,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(MockConnector::new(), 10).await
    }

    async fn status_is(f: &Fixture, id: &str, status: SessionStatus) -> bool {
        let storage = Arc::clone(&f.storage);
        let id = id.to_string();
        eventually(move || {
            let storage = Arc::clone(&storage);
            let id = id.clone();
            async move {
                storage
                    .get_session(&id)
                    .await
                    .ok()
                    .flatten()
                    .is_some_and(|s| s.status == status)
            }
        })
        .await
    }

    #[tokio::test]
    async fn pairing_walks_the_state_machine() {
        let f = fixture().await;
        let session = f
            .manager
            .start_session("agent", SessionKind::Production)
            .await
            .unwrap();
        assert_eq!(session.status, SessionStatus::Disconnected);
        assert!(f.manager.is_live(&session.id).await);

        assert!(f.connector.emit(&session.id, ConnectionEvent::Qr("2@qr".into())).await);
        assert!(status_is(&f, &session.id, SessionStatus::QrReady).await);
        let state = f.manager.get_session_status(&session.id).await.unwrap();
        assert_eq!(state.qr_code.as_deref(), Some("2@qr"));

        f.connector.emit(&session.id, ConnectionEvent::Open).await;
        assert!(status_is(&f, &session.id, SessionStatus::Connected).await);
        let state = f.manager.get_session_status(&session.id).await.unwrap();
        assert_eq!(state.qr_code, None);
    }

    #[tokio::test]
    async fn credentials_land_in_the_session_directory() {
        let f = fixture().await;
        let session = f
            .manager
            .start_session("agent", SessionKind::Production)
            .await
            .unwrap();
        f.connector
            .emit(&session.id, ConnectionEvent::CredentialsUpdated(b"{}".to_vec()))
            .await;
        let creds = f.auth_dir.join(&session.id).join("creds.json");
        let probe = creds.clone();
        assert!(eventually(move || {
            let probe = probe.clone();
            async move { probe.exists() }
        })
        .await);
        assert_eq!(
            f.connector.credential_dirs().await,
            vec![f.auth_dir.join(&session.id)]
        );
    }

    #[tokio::test]
    async fn inbound_messages_reach_the_handler() {
        let f = fixture().await;
        let session = f
            .manager
            .start_session("agent", SessionKind::Production)
            .await
            .unwrap();

        let mut own = text_event("5511", None, "sent from phone");
        own.from_me = true;
        f.connector.emit(&session.id, ConnectionEvent::Message(own)).await;
        f.connector
            .emit(
                &session.id,
                ConnectionEvent::Message(text_event("5511", Some("Ana"), "hello")),
            )
            .await;

        let handler = Arc::clone(&f.handler);
        assert!(eventually(move || {
            let handler = Arc::clone(&handler);
            async move { !handler.seen.lock().await.is_empty() }
        })
        .await);
        let seen = f.handler.seen.lock().await.clone();
        assert_eq!(seen, vec![(session.id.clone(), "hello".to_string())]);
        let conn = f.connector.connection(&session.id).await.unwrap();
        assert_eq!(conn.sent_count().await, 1);
    }

    #[tokio::test]
    async fn logout_evicts_and_disconnects() {
        let f = fixture().await;
        let session = f
            .manager
            .start_session("agent", SessionKind::Production)
            .await
            .unwrap();
        f.connector.emit(&session.id, ConnectionEvent::Open).await;
        assert!(status_is(&f, &session.id, SessionStatus::Connected).await);

        f.connector
            .emit(&session.id, ConnectionEvent::Closed(DisconnectReason::LoggedOut))
            .await;
        assert!(status_is(&f, &session.id, SessionStatus::Disconnected).await);
        let manager = f.manager.clone();
        let id = session.id.clone();
        assert!(eventually(move || {
            let manager = manager.clone();
            let id = id.clone();
            async move { !manager.is_live(&id).await }
        })
        .await);
        assert_eq!(f.connector.connect_count(&session.id).await, 1);
    }

    #[tokio::test]
    async fn other_close_reasons_reconnect_the_same_session() {
        let f = fixture().await;
        let session = f
            .manager
            .start_session("agent", SessionKind::Production)
            .await
            .unwrap();
        f.connector
            .emit(
                &session.id,
                ConnectionEvent::Closed(DisconnectReason::ConnectionLost),
            )
            .await;

        let connector = Arc::clone(&f.connector);
        let id = session.id.clone();
        assert!(eventually(move || {
            let connector = Arc::clone(&connector);
            let id = id.clone();
            async move { connector.connect_count(&id).await == 2 }
        })
        .await);
        assert!(f.manager.is_live(&session.id).await);
        assert!(f.storage.get_session(&session.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn replaced_handle_stops_old_event_loop() {
        let f = fixture().await;
        let session = f
            .manager
            .start_session("agent", SessionKind::Production)
            .await
            .unwrap();
        let first = f.connector.connection(&session.id).await.unwrap();

        f.manager.reconnect_session(&session.id).await.unwrap();
        assert!(first.was_closed());
        assert_eq!(f.connector.connect_count(&session.id).await, 2);
        assert_eq!(f.manager.live_count().await, 1);

        f.connector.emit(&session.id, ConnectionEvent::Qr("fresh".into())).await;
        assert!(status_is(&f, &session.id, SessionStatus::QrReady).await);
    }

    #[tokio::test]
    async fn delete_removes_everything_and_is_idempotent() {
        let f = fixture().await;
        let session = f
            .manager
            .start_session("agent", SessionKind::Production)
            .await
            .unwrap();
        let conn = f.connector.connection(&session.id).await.unwrap();
        conn.set_fail_teardown(true);
        credentials::store(&f.auth_dir.join(&session.id), b"{}")
            .await
            .unwrap();

        f.manager.delete_session(&session.id).await.unwrap();
        assert!(conn.was_logged_out());
        assert!(!f.manager.is_live(&session.id).await);
        assert!(!f.auth_dir.join(&session.id).exists());
        assert!(f.storage.get_session(&session.id).await.unwrap().is_none());

        f.manager.delete_session(&session.id).await.unwrap();
    }

    #[tokio::test]
    async fn delete_during_automatic_reconnect_stays_deleted() {
        let f = fixture().await;
        let session = f
            .manager
            .start_session("agent", SessionKind::Production)
            .await
            .unwrap();
        f.connector.set_connect_delay(Duration::from_millis(300));
        f.connector
            .emit(
                &session.id,
                ConnectionEvent::Closed(DisconnectReason::ConnectionLost),
            )
            .await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        f.manager.delete_session(&session.id).await.unwrap();
        assert!(!f.manager.is_live(&session.id).await);

        let connector = Arc::clone(&f.connector);
        let id = session.id.clone();
        assert!(eventually(move || {
            let connector = Arc::clone(&connector);
            let id = id.clone();
            async move { connector.connect_count(&id).await == 2 }
        })
        .await);
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert!(!f.manager.is_live(&session.id).await);
        assert_eq!(f.manager.live_count().await, 0);
        assert!(f.storage.get_session(&session.id).await.unwrap().is_none());
        assert!(!f.auth_dir.join(&session.id).exists());
        let abandoned = f.connector.connection(&session.id).await.unwrap();
        assert!(abandoned.was_closed());
    }

    #[tokio::test]
    async fn disconnect_keeps_row_and_drops_credentials() {
        let f = fixture().await;
        let session = f
            .manager
            .start_session("agent", SessionKind::Production)
            .await
            .unwrap();
        f.connector.emit(&session.id, ConnectionEvent::Open).await;
        assert!(status_is(&f, &session.id, SessionStatus::Connected).await);

        f.manager.disconnect_session(&session.id).await.unwrap();
        let state = f.manager.get_session_status(&session.id).await.unwrap();
        assert_eq!(state.status, SessionStatus::Disconnected);
        assert!(!f.auth_dir.join(&session.id).exists());
        assert!(!f.manager.is_live(&session.id).await);

        let err = f.manager.disconnect_session("ghost").await.unwrap_err();
        assert!(matches!(err, PalaverError::NotFound { .. }));
    }

    #[tokio::test]
    async fn session_limit_blocks_start() {
        let f = fixture_with(MockConnector::new(), 1).await;
        f.manager
            .start_session("agent", SessionKind::Production)
            .await
            .unwrap();
        let err = f
            .manager
            .start_session("agent", SessionKind::Playground)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PalaverError::LimitExceeded {
                resource: ResourceKind::Sessions,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn restore_reconnects_only_connected_sessions() {
        let f = fixture().await;
        for (id, status) in [
            ("s-connected", SessionStatus::Connected),
            ("s-idle", SessionStatus::Disconnected),
        ] {
            f.storage
                .create_session(&Session {
                    id: id.into(),
                    agent_id: "agent".into(),
                    kind: SessionKind::Production,
                    status,
                    qr_code: None,
                    created_at: now_timestamp(),
                    updated_at: now_timestamp(),
                })
                .await
                .unwrap();
        }

        let restored = f
            .manager
            .restore_connected_sessions(Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(restored, 1);
        assert!(f.manager.is_live("s-connected").await);
        assert!(!f.manager.is_live("s-idle").await);
    }

    #[tokio::test]
    async fn shutdown_closes_without_logout() {
        let f = fixture().await;
        let session = f
            .manager
            .start_session("agent", SessionKind::Production)
            .await
            .unwrap();
        let conn = f.connector.connection(&session.id).await.unwrap();
        f.manager.shutdown().await;
        assert!(conn.was_closed());
        assert!(!conn.was_logged_out());
        assert_eq!(f.manager.live_count().await, 0);
    }

    #[tokio::test]
    async fn connect_failure_surfaces_to_caller() {
        let connector = MockConnector::new();
        connector.set_fail_connects(true);
        let f = fixture_with(connector, 10).await;
        let err = f
            .manager
            .start_session("agent", SessionKind::Production)
            .await
            .unwrap_err();
        assert!(matches!(err, PalaverError::Channel { .. }));
        assert_eq!(f.manager.live_count().await, 0);
    }
}
