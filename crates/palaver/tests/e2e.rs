// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests: connection events in, WhatsApp replies out.
//!
//! Every test builds an isolated TestHarness with temp SQLite and mock
//! connector/provider, and drives it only through connection events the way
//! the bridge would.

use std::sync::Arc;
use std::time::Duration;

use palaver_core::StorageAdapter;
use palaver_core::protocol::{ConnectionEvent, DisconnectReason};
use palaver_core::types::{SessionKind, SessionStatus};
use palaver_test_utils::harness::ORGANIZATION_ID;
use palaver_test_utils::{TestHarness, eventually, text_event};

const PHONE: &str = "5511988887777";

async fn wait_for_status(harness: &TestHarness, session_id: &str, status: SessionStatus) -> bool {
    let storage = Arc::clone(&harness.storage);
    let id = session_id.to_string();
    eventually(move || {
        let storage = Arc::clone(&storage);
        let id = id.clone();
        async move {
            matches!(storage.get_session(&id).await, Ok(Some(s)) if s.status == status)
        }
    })
    .await
}

#[tokio::test]
async fn inbound_message_is_answered_over_the_same_connection() {
    let harness = TestHarness::builder()
        .with_mock_responses(vec!["Hi Ana, how can I help?".into()])
        .build()
        .await
        .unwrap();
    let session = harness.start_session(SessionKind::Production).await.unwrap();
    let conn = harness.connector.connection(&session.id).await.unwrap();

    harness
        .connector
        .emit(
            &session.id,
            ConnectionEvent::Message(text_event(PHONE, Some("Ana"), "hello")),
        )
        .await;

    let probe = Arc::clone(&conn);
    assert!(eventually(move || {
        let probe = Arc::clone(&probe);
        async move { probe.sent_count().await == 1 }
    })
    .await);
    let sent = conn.sent_texts().await;
    assert_eq!(sent[0].text, "Hi Ana, how can I help?");

    let conversation = harness.conversation(&session.id, PHONE).await.unwrap();
    assert_eq!(conversation.len(), 2);
}

#[tokio::test]
async fn own_messages_are_not_answered() {
    let harness = TestHarness::builder().build().await.unwrap();
    let session = harness.start_session(SessionKind::Production).await.unwrap();
    let conn = harness.connector.connection(&session.id).await.unwrap();

    let mut echo = text_event(PHONE, None, "sent from the phone");
    echo.from_me = true;
    harness
        .connector
        .emit(&session.id, ConnectionEvent::Message(echo))
        .await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(conn.sent_count().await, 0);
    assert_eq!(harness.provider.call_count(), 0);
}

#[tokio::test]
async fn pairing_code_is_visible_until_open() {
    let harness = TestHarness::builder().build().await.unwrap();
    let session = harness
        .manager
        .start_session(palaver_test_utils::harness::AGENT_ID, SessionKind::Playground)
        .await
        .unwrap();

    harness
        .connector
        .emit(&session.id, ConnectionEvent::Qr("2@pairing".into()))
        .await;
    assert!(wait_for_status(&harness, &session.id, SessionStatus::QrReady).await);
    let state = harness.manager.get_session_status(&session.id).await.unwrap();
    assert_eq!(state.qr_code.as_deref(), Some("2@pairing"));

    harness.connector.emit(&session.id, ConnectionEvent::Open).await;
    assert!(wait_for_status(&harness, &session.id, SessionStatus::Connected).await);
    let state = harness.manager.get_session_status(&session.id).await.unwrap();
    assert!(state.qr_code.is_none());
}

#[tokio::test]
async fn dropped_connection_reconnects_and_keeps_answering() {
    let harness = TestHarness::builder().build().await.unwrap();
    let session = harness.start_session(SessionKind::Production).await.unwrap();

    harness
        .connector
        .emit(
            &session.id,
            ConnectionEvent::Closed(DisconnectReason::ConnectionLost),
        )
        .await;

    let connector = Arc::clone(&harness.connector);
    let id = session.id.clone();
    assert!(eventually(move || {
        let connector = Arc::clone(&connector);
        let id = id.clone();
        async move { connector.connect_count(&id).await == 2 }
    })
    .await);

    harness.connector.emit(&session.id, ConnectionEvent::Open).await;
    assert!(wait_for_status(&harness, &session.id, SessionStatus::Connected).await);

    let conn = harness.send_text(&session.id, PHONE, "still there?").await.unwrap();
    assert_eq!(conn.sent_count().await, 1);
}

#[tokio::test]
async fn logout_from_the_phone_disconnects_for_good() {
    let harness = TestHarness::builder().build().await.unwrap();
    let session = harness.start_session(SessionKind::Production).await.unwrap();
    harness
        .connector
        .emit(
            &session.id,
            ConnectionEvent::CredentialsUpdated(b"{\"me\":\"x\"}".to_vec()),
        )
        .await;

    harness
        .connector
        .emit(&session.id, ConnectionEvent::Closed(DisconnectReason::LoggedOut))
        .await;

    assert!(wait_for_status(&harness, &session.id, SessionStatus::Disconnected).await);
    let manager = harness.manager.clone();
    let id = session.id.clone();
    assert!(eventually(move || {
        let manager = manager.clone();
        let id = id.clone();
        async move { !manager.is_live(&id).await }
    })
    .await);
    assert_eq!(harness.connector.connect_count(&session.id).await, 1);

    let creds = std::path::Path::new(&harness.config.whatsapp.auth_dir)
        .join(&session.id)
        .join("creds.json");
    let probe = creds.clone();
    assert!(eventually(move || {
        let probe = probe.clone();
        async move { !probe.exists() }
    })
    .await);
}

#[tokio::test]
async fn restart_restores_connected_sessions() {
    let harness = TestHarness::builder().build().await.unwrap();
    let first = harness.start_session(SessionKind::Production).await.unwrap();
    let second = harness.start_session(SessionKind::Playground).await.unwrap();
    harness.manager.disconnect_session(&second.id).await.unwrap();

    harness.manager.shutdown().await;
    assert_eq!(harness.manager.live_count().await, 0);

    let restored = harness
        .manager
        .restore_connected_sessions(Duration::ZERO)
        .await
        .unwrap();
    assert_eq!(restored, 1);
    assert!(harness.manager.is_live(&first.id).await);
    assert!(!harness.manager.is_live(&second.id).await);

    let conn = harness.send_text(&first.id, PHONE, "back?").await.unwrap();
    assert_eq!(conn.sent_count().await, 1);
}

#[tokio::test]
async fn contacts_are_shared_across_sessions_of_one_organization() {
    let harness = TestHarness::builder().build().await.unwrap();
    let production = harness.start_session(SessionKind::Production).await.unwrap();
    let playground = harness.start_session(SessionKind::Playground).await.unwrap();

    harness.send_text(&production.id, PHONE, "hi").await.unwrap();
    harness.send_text(&playground.id, PHONE, "hi again").await.unwrap();

    assert_eq!(harness.storage.count_contacts(ORGANIZATION_ID).await.unwrap(), 1);
    assert_eq!(harness.conversation(&production.id, PHONE).await.unwrap().len(), 2);
    assert_eq!(harness.conversation(&playground.id, PHONE).await.unwrap().len(), 2);
}
