// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON frames exchanged with the WhatsApp bridge.
//!
//! Every frame is a text WebSocket message with a `type` discriminator.
//! Credential blobs travel base64-encoded.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use palaver_core::PalaverError;
use palaver_core::protocol::{ConnectionEvent, DisconnectReason, InboundEvent, MessagePayload};

/// Bridge to Palaver.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeEvent {
    Qr {
        code: String,
    },
    Open,
    Close {
        reason: DisconnectReason,
    },
    Creds {
        data: String,
    },
    Message {
        id: String,
        remote_jid: String,
        #[serde(default)]
        from_me: bool,
        #[serde(default)]
        push_name: Option<String>,
        payload: MessagePayload,
    },
}

impl BridgeEvent {
    pub fn parse(frame: &str) -> Result<Self, PalaverError> {
        serde_json::from_str(frame).map_err(|e| PalaverError::Channel {
            message: "malformed bridge frame".into(),
            source: Some(Box::new(e)),
        })
    }

    pub fn into_event(self) -> Result<ConnectionEvent, PalaverError> {
        Ok(match self {
            BridgeEvent::Qr { code } => ConnectionEvent::Qr(code),
            BridgeEvent::Open => ConnectionEvent::Open,
            BridgeEvent::Close { reason } => ConnectionEvent::Closed(reason),
            BridgeEvent::Creds { data } => {
                let bytes = STANDARD.decode(data).map_err(|e| PalaverError::Channel {
                    message: "credential blob is not valid base64".into(),
                    source: Some(Box::new(e)),
                })?;
                ConnectionEvent::CredentialsUpdated(bytes)
            }
            BridgeEvent::Message {
                id,
                remote_jid,
                from_me,
                push_name,
                payload,
            } => ConnectionEvent::Message(InboundEvent {
                id,
                remote_jid,
                from_me,
                push_name,
                payload,
            }),
        })
    }
}

/// Palaver to bridge.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeCommand {
    /// First frame on a socket for a session that paired before.
    Resume { data: String },
    SendText { to: String, text: String },
    Logout,
    Close,
}

impl BridgeCommand {
    pub fn resume(credentials: &[u8]) -> Self {
        BridgeCommand::Resume {
            data: STANDARD.encode(credentials),
        }
    }

    /// Whether the socket is finished once this command is written.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BridgeCommand::Logout | BridgeCommand::Close)
    }

    pub fn to_frame(&self) -> Result<String, PalaverError> {
        serde_json::to_string(self).map_err(|e| PalaverError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_message_frame() {
        let frame = r#"{
            "type": "message",
            "id": "ABC",
            "remote_jid": "5511999990000@s.whatsapp.net",
            "push_name": "Ana",
            "payload": {"kind": "extended_text", "text": "hello"}
        }"#;
        let event = BridgeEvent::parse(frame).unwrap().into_event().unwrap();
        let ConnectionEvent::Message(msg) = event else {
            panic!("expected message, got {event:?}");
        };
        assert!(!msg.from_me);
        assert_eq!(msg.push_name.as_deref(), Some("Ana"));
        assert_eq!(msg.payload.text(), Some("hello"));
    }

    #[test]
    fn parses_close_reasons() {
        let logged_out = BridgeEvent::parse(r#"{"type":"close","reason":"logged_out"}"#).unwrap();
        assert_eq!(
            logged_out.into_event().unwrap(),
            ConnectionEvent::Closed(DisconnectReason::LoggedOut)
        );
        let other = BridgeEvent::parse(r#"{"type":"close","reason":"stream_errored"}"#).unwrap();
        assert_eq!(
            other.into_event().unwrap(),
            ConnectionEvent::Closed(DisconnectReason::Other("stream_errored".into()))
        );
    }

    #[test]
    fn creds_are_base64_decoded() {
        let event = BridgeEvent::Creds {
            data: STANDARD.encode(b"secret"),
        };
        assert_eq!(
            event.into_event().unwrap(),
            ConnectionEvent::CredentialsUpdated(b"secret".to_vec())
        );
        assert!(
            BridgeEvent::Creds {
                data: "***".into()
            }
            .into_event()
            .is_err()
        );
    }

    #[test]
    fn unknown_frame_type_is_rejected() {
        assert!(BridgeEvent::parse(r#"{"type":"presence"}"#).is_err());
    }

    #[test]
    fn commands_serialize_with_type_tag() {
        let send = BridgeCommand::SendText {
            to: "5511@s.whatsapp.net".into(),
            text: "hi".into(),
        };
        assert_eq!(
            send.to_frame().unwrap(),
            r#"{"type":"send_text","to":"5511@s.whatsapp.net","text":"hi"}"#
        );
        assert_eq!(BridgeCommand::Logout.to_frame().unwrap(), r#"{"type":"logout"}"#);
        assert!(BridgeCommand::Close.is_terminal());
        assert!(!send.is_terminal());
    }
}
