// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection factory backed by the WhatsApp bridge sidecar.
//!
//! One WebSocket per session at `<bridge_url>/sessions/<id>/socket`. A reader
//! task turns bridge frames into [`ConnectionEvent`]s; a writer task owns the
//! sink and drains the command queue. Media is fetched over plain HTTP.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use palaver_config::model::WhatsAppConfig;
use palaver_core::protocol::{ConnectionEvent, DisconnectReason};
use palaver_core::types::{AdapterType, HealthStatus};
use palaver_core::{ConnectionParts, PalaverError, PluginAdapter, WaConnection, WaConnector};

use crate::credentials;
use crate::wire::{BridgeCommand, BridgeEvent};

const EVENT_BUFFER: usize = 64;
const COMMAND_BUFFER: usize = 32;
const MEDIA_TIMEOUT: Duration = Duration::from_secs(60);

/// Production [`WaConnector`].
pub struct BridgeConnector {
    config: WhatsAppConfig,
    http: reqwest::Client,
}

impl BridgeConnector {
    pub fn new(config: WhatsAppConfig) -> Result<Self, PalaverError> {
        let http = reqwest::Client::builder()
            .timeout(MEDIA_TIMEOUT)
            .build()
            .map_err(|e| PalaverError::Channel {
                message: "failed to build bridge HTTP client".into(),
                source: Some(Box::new(e)),
            })?;
        Ok(Self { config, http })
    }

    fn socket_url(&self, session_id: &str) -> String {
        format!(
            "{}/sessions/{session_id}/socket",
            self.config.bridge_url.trim_end_matches('/')
        )
    }

    fn media_base(&self, session_id: &str) -> String {
        format!(
            "{}/sessions/{session_id}/media",
            self.config.bridge_http_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl PluginAdapter for BridgeConnector {
    fn name(&self) -> &str {
        "whatsapp-bridge"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, PalaverError> {
        let url = format!("{}/health", self.config.bridge_http_url.trim_end_matches('/'));
        match self.http.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => Ok(HealthStatus::Healthy),
            Ok(resp) => Ok(HealthStatus::Degraded(format!(
                "bridge answered {}",
                resp.status()
            ))),
            Err(e) => Ok(HealthStatus::Unhealthy(format!("bridge unreachable: {e}"))),
        }
    }

    async fn shutdown(&self) -> Result<(), PalaverError> {
        Ok(())
    }
}

#[async_trait]
impl WaConnector for BridgeConnector {
    async fn connect(
        &self,
        session_id: &str,
        credentials_dir: &Path,
    ) -> Result<ConnectionParts, PalaverError> {
        let url = self.socket_url(session_id);
        let (socket, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| PalaverError::Channel {
                message: format!("failed to open bridge socket {url}"),
                source: Some(Box::new(e)),
            })?;
        let (mut sink, mut stream) = socket.split();

        if let Some(creds) = credentials::load(credentials_dir).await? {
            let frame = BridgeCommand::resume(&creds).to_frame()?;
            sink.send(Message::text(frame))
                .await
                .map_err(|e| PalaverError::Channel {
                    message: "failed to send resume frame".into(),
                    source: Some(Box::new(e)),
                })?;
            debug!(session_id, "resuming with stored credentials");
        }

        let (command_tx, mut command_rx) = mpsc::channel::<BridgeCommand>(COMMAND_BUFFER);
        let writer_session = session_id.to_string();
        tokio::spawn(async move {
            while let Some(command) = command_rx.recv().await {
                let terminal = command.is_terminal();
                let frame = match command.to_frame() {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(session_id = %writer_session, error = %e, "dropping unserializable command");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::text(frame)).await {
                    warn!(session_id = %writer_session, error = %e, "bridge write failed");
                    break;
                }
                if terminal {
                    let _ = sink.close().await;
                    break;
                }
            }
            debug!(session_id = %writer_session, "bridge writer stopped");
        });

        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let reader_session = session_id.to_string();
        tokio::spawn(async move {
            let mut closed = false;
            while let Some(frame) = stream.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!(session_id = %reader_session, error = %e, "bridge read failed");
                        break;
                    }
                };
                let event = match BridgeEvent::parse(text.as_str()).and_then(BridgeEvent::into_event) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(session_id = %reader_session, error = %e, "ignoring bridge frame");
                        continue;
                    }
                };
                closed = matches!(event, ConnectionEvent::Closed(_));
                if event_tx.send(event).await.is_err() || closed {
                    break;
                }
            }
            if !closed {
                let _ = event_tx
                    .send(ConnectionEvent::Closed(DisconnectReason::ConnectionLost))
                    .await;
            }
            debug!(session_id = %reader_session, "bridge reader stopped");
        });

        info!(session_id, "bridge socket open");
        Ok(ConnectionParts {
            connection: std::sync::Arc::new(BridgeConnection {
                session_id: session_id.to_string(),
                commands: command_tx,
                http: self.http.clone(),
                media_base: self.media_base(session_id),
            }),
            events: event_rx,
        })
    }
}

/// Outbound half of one bridge socket.
pub struct BridgeConnection {
    session_id: String,
    commands: mpsc::Sender<BridgeCommand>,
    http: reqwest::Client,
    media_base: String,
}

impl BridgeConnection {
    async fn command(&self, command: BridgeCommand) -> Result<(), PalaverError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| PalaverError::channel(format!("bridge socket for {} is closed", self.session_id)))
    }
}

#[async_trait]
impl WaConnection for BridgeConnection {
    async fn send_text(&self, jid: &str, text: &str) -> Result<(), PalaverError> {
        self.command(BridgeCommand::SendText {
            to: jid.to_string(),
            text: text.to_string(),
        })
        .await
    }

    async fn download_media(&self, message_id: &str) -> Result<Vec<u8>, PalaverError> {
        let url = format!("{}/{message_id}", self.media_base);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| PalaverError::Channel {
                message: format!("media download failed for message {message_id}"),
                source: Some(Box::new(e)),
            })?;
        let bytes = resp.bytes().await.map_err(|e| PalaverError::Channel {
            message: "media body read failed".into(),
            source: Some(Box::new(e)),
        })?;
        Ok(bytes.to_vec())
    }

    async fn logout(&self) -> Result<(), PalaverError> {
        self.command(BridgeCommand::Logout).await
    }

    async fn close(&self) -> Result<(), PalaverError> {
        // Already closed is fine.
        let _ = self.commands.send(BridgeCommand::Close).await;
        Ok(())
    }
}
