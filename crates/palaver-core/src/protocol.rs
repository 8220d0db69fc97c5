// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Events emitted by a WhatsApp connection.
//!
//! The wire protocol itself lives behind [`WaConnector`](crate::traits::WaConnector);
//! these types are the protocol-agnostic view the session manager and the
//! message pipeline work with.

use serde::{Deserialize, Serialize};

/// Why a connection closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectReason {
    /// The device was unlinked. The only reason that does not trigger a reconnect.
    LoggedOut,
    ConnectionLost,
    ConnectionReplaced,
    RestartRequired,
    TimedOut,
    #[serde(untagged)]
    Other(String),
}

impl DisconnectReason {
    pub fn should_reconnect(&self) -> bool {
        !matches!(self, DisconnectReason::LoggedOut)
    }
}

/// An event delivered by a live connection, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// A fresh pairing code to be scanned.
    Qr(String),
    /// Pairing succeeded or stored credentials were accepted.
    Open,
    Closed(DisconnectReason),
    /// Opaque credential material to persist for the next connect.
    CredentialsUpdated(Vec<u8>),
    Message(InboundEvent),
}

/// An inbound chat message.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub id: String,
    /// Routing address, e.g. `5511999990000@s.whatsapp.net`.
    pub remote_jid: String,
    pub from_me: bool,
    pub push_name: Option<String>,
    pub payload: MessagePayload,
}

impl InboundEvent {
    /// The sender's phone-like identifier with the protocol suffix removed.
    pub fn sender_phone(&self) -> &str {
        phone_from_jid(&self.remote_jid)
    }
}

/// The mutually exclusive message shapes the pipeline understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessagePayload {
    Text { text: String },
    ExtendedText { text: String },
    Image { caption: Option<String> },
    Video { caption: Option<String> },
    Audio { mime_type: String },
    Unsupported,
}

impl MessagePayload {
    /// Text carried by the message, if any. Empty strings count as no text.
    pub fn text(&self) -> Option<&str> {
        let text = match self {
            MessagePayload::Text { text } | MessagePayload::ExtendedText { text } => {
                Some(text.as_str())
            }
            MessagePayload::Image { caption } | MessagePayload::Video { caption } => {
                caption.as_deref()
            }
            MessagePayload::Audio { .. } | MessagePayload::Unsupported => None,
        };
        text.filter(|t| !t.trim().is_empty())
    }

    /// MIME type of an audio payload.
    pub fn audio_mime_type(&self) -> Option<&str> {
        match self {
            MessagePayload::Audio { mime_type } => Some(mime_type),
            _ => None,
        }
    }
}

/// Strips the `@server` suffix (and any `:device` part) from a JID.
pub fn phone_from_jid(jid: &str) -> &str {
    let user = jid.split('@').next().unwrap_or(jid);
    user.split(':').next().unwrap_or(user)
}
