// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fake WhatsApp connection factory.
//!
//! `MockConnector` hands out [`MockConnection`]s and keeps the event sender
//! of the newest connection per session, so tests can push QR codes, opens,
//! closes and inbound messages into the session manager's event loop.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use palaver_core::protocol::{ConnectionEvent, InboundEvent, MessagePayload};
use palaver_core::types::{AdapterType, HealthStatus};
use palaver_core::{ConnectionParts, PalaverError, PluginAdapter, WaConnection, WaConnector};

struct Link {
    events: mpsc::Sender<ConnectionEvent>,
    connection: Arc<MockConnection>,
}

/// Connection factory that never touches the network.
pub struct MockConnector {
    links: Mutex<HashMap<String, Link>>,
    connects: Mutex<HashMap<String, usize>>,
    credential_dirs: Mutex<Vec<PathBuf>>,
    on_connect: Vec<ConnectionEvent>,
    fail_connects: AtomicBool,
    connect_delay_ms: AtomicU64,
    media: Vec<u8>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self {
            links: Mutex::new(HashMap::new()),
            connects: Mutex::new(HashMap::new()),
            credential_dirs: Mutex::new(Vec::new()),
            on_connect: Vec::new(),
            fail_connects: AtomicBool::new(false),
            connect_delay_ms: AtomicU64::new(0),
            media: b"mock-media".to_vec(),
        }
    }

    /// Events queued on every new connection before `connect` returns.
    pub fn with_connect_events(mut self, events: Vec<ConnectionEvent>) -> Self {
        self.on_connect = events;
        self
    }

    /// Bytes returned by `download_media`.
    pub fn with_media(mut self, media: Vec<u8>) -> Self {
        self.media = media;
        self
    }

    /// Makes subsequent `connect` calls fail.
    pub fn set_fail_connects(&self, fail: bool) {
        self.fail_connects.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent `connect` calls wait `delay` before returning.
    pub fn set_connect_delay(&self, delay: Duration) {
        self.connect_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Pushes an event into the newest connection of `session_id`.
    ///
    /// Returns `false` when no connection exists or its event loop is gone.
    pub async fn emit(&self, session_id: &str, event: ConnectionEvent) -> bool {
        let sender = self
            .links
            .lock()
            .await
            .get(session_id)
            .map(|link| link.events.clone());
        match sender {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    /// The newest connection handed out for `session_id`.
    pub async fn connection(&self, session_id: &str) -> Option<Arc<MockConnection>> {
        self.links
            .lock()
            .await
            .get(session_id)
            .map(|link| Arc::clone(&link.connection))
    }

    pub async fn connect_count(&self, session_id: &str) -> usize {
        self.connects
            .lock()
            .await
            .get(session_id)
            .copied()
            .unwrap_or(0)
    }

    /// Credential directories passed to `connect`, in call order.
    pub async fn credential_dirs(&self) -> Vec<PathBuf> {
        self.credential_dirs.lock().await.clone()
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockConnector {
    fn name(&self) -> &str {
        "mock-connector"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, PalaverError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PalaverError> {
        Ok(())
    }
}

#[async_trait]
impl WaConnector for MockConnector {
    async fn connect(
        &self,
        session_id: &str,
        credentials_dir: &Path,
    ) -> Result<ConnectionParts, PalaverError> {
        self.credential_dirs
            .lock()
            .await
            .push(credentials_dir.to_path_buf());
        *self
            .connects
            .lock()
            .await
            .entry(session_id.to_string())
            .or_insert(0) += 1;

        if self.fail_connects.load(Ordering::SeqCst) {
            return Err(PalaverError::channel("mock bridge unreachable"));
        }
        let delay = self.connect_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let (tx, rx) = mpsc::channel(64);
        for event in &self.on_connect {
            tx.try_send(event.clone())
                .map_err(|_| PalaverError::Internal("mock event buffer full".into()))?;
        }
        let connection = Arc::new(MockConnection::new(self.media.clone()));
        self.links.lock().await.insert(
            session_id.to_string(),
            Link {
                events: tx,
                connection: Arc::clone(&connection),
            },
        );
        Ok(ConnectionParts {
            connection,
            events: rx,
        })
    }
}

/// A text captured by [`MockConnection::send_text`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentText {
    pub jid: String,
    pub text: String,
}

/// Connection handle that records what the code under test does with it.
pub struct MockConnection {
    sent: Mutex<Vec<SentText>>,
    media: Vec<u8>,
    logged_out: AtomicBool,
    closed: AtomicBool,
    fail_teardown: AtomicBool,
}

impl MockConnection {
    pub fn new(media: Vec<u8>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            media,
            logged_out: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            fail_teardown: AtomicBool::new(false),
        }
    }

    pub async fn sent_texts(&self) -> Vec<SentText> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    pub fn was_logged_out(&self) -> bool {
        self.logged_out.load(Ordering::SeqCst)
    }

    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Makes `logout` and `close` fail after recording the attempt.
    pub fn set_fail_teardown(&self, fail: bool) {
        self.fail_teardown.store(fail, Ordering::SeqCst);
    }

    fn teardown_result(&self) -> Result<(), PalaverError> {
        if self.fail_teardown.load(Ordering::SeqCst) {
            Err(PalaverError::channel("mock socket already gone"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl WaConnection for MockConnection {
    async fn send_text(&self, jid: &str, text: &str) -> Result<(), PalaverError> {
        self.sent.lock().await.push(SentText {
            jid: jid.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn download_media(&self, _message_id: &str) -> Result<Vec<u8>, PalaverError> {
        Ok(self.media.clone())
    }

    async fn logout(&self) -> Result<(), PalaverError> {
        self.logged_out.store(true, Ordering::SeqCst);
        self.teardown_result()
    }

    async fn close(&self) -> Result<(), PalaverError> {
        self.closed.store(true, Ordering::SeqCst);
        self.teardown_result()
    }
}

/// An inbound plain-text message from `phone`.
pub fn text_event(phone: &str, push_name: Option<&str>, text: &str) -> InboundEvent {
    InboundEvent {
        id: uuid::Uuid::new_v4().to_string(),
        remote_jid: format!("{phone}@s.whatsapp.net"),
        from_me: false,
        push_name: push_name.map(str::to_string),
        payload: MessagePayload::Text {
            text: text.to_string(),
        },
    }
}

/// An inbound voice note from `phone`.
pub fn audio_event(phone: &str) -> InboundEvent {
    InboundEvent {
        id: uuid::Uuid::new_v4().to_string(),
        remote_jid: format!("{phone}@s.whatsapp.net"),
        from_me: false,
        push_name: None,
        payload: MessagePayload::Audio {
            mime_type: "audio/ogg; codecs=opus".into(),
        },
    }
}
