// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp connection seams.
//!
//! A [`WaConnector`] is the connection factory the session manager drives.
//! Each successful connect yields a [`WaConnection`] handle for outbound
//! calls plus the ordered event stream for that connection.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::PalaverError;
use crate::protocol::{ConnectionEvent, InboundEvent};
use crate::traits::adapter::PluginAdapter;

/// Outbound half of one live protocol connection.
#[async_trait]
pub trait WaConnection: Send + Sync {
    /// Sends a text message to a routing address.
    async fn send_text(&self, jid: &str, text: &str) -> Result<(), PalaverError>;

    /// Fetches the media attached to an inbound message.
    async fn download_media(&self, message_id: &str) -> Result<Vec<u8>, PalaverError>;

    /// Unlinks the device. The connection closes afterwards.
    async fn logout(&self) -> Result<(), PalaverError>;

    /// Closes the socket without unlinking.
    async fn close(&self) -> Result<(), PalaverError>;
}

/// Result of [`WaConnector::connect`].
pub struct ConnectionParts {
    pub connection: Arc<dyn WaConnection>,
    pub events: mpsc::Receiver<ConnectionEvent>,
}

impl std::fmt::Debug for ConnectionParts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionParts").finish_non_exhaustive()
    }
}

/// Opens protocol connections.
#[async_trait]
pub trait WaConnector: PluginAdapter {
    /// Opens a connection for `session_id`, resuming from credentials stored
    /// in `credentials_dir` when present.
    async fn connect(
        &self,
        session_id: &str,
        credentials_dir: &Path,
    ) -> Result<ConnectionParts, PalaverError>;
}

/// Receives inbound chat messages from the session manager.
///
/// Implementations handle every failure locally; nothing is reported back
/// to the connection's event loop.
#[async_trait]
pub trait InboundHandler: Send + Sync + 'static {
    async fn handle_incoming(
        &self,
        session_id: &str,
        event: InboundEvent,
        connection: Arc<dyn WaConnection>,
    );
}
