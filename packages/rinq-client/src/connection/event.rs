//! Lifecycle Events
//!
//! Defines the events a connection delivers to its owner.

use serde::Serialize;
use tokio_tungstenite::tungstenite::protocol::CloseFrame as WsCloseFrame;

/// A lifecycle notification from a connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum ConnectionEvent {
    /// Handshake succeeded; carries the subprotocol the peer selected
    Opened { subprotocol: Option<String> },

    /// A data frame received from the peer
    Message { payload: Payload },

    /// The connection is finished. Terminal.
    Closed { frame: Option<CloseFrame> },
}

impl ConnectionEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionEvent::Closed { .. })
    }
}

/// Opaque message data, exactly as the transport delivered it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum Payload {
    Text(String),
    Binary(#[serde(with = "base64_bytes")] Vec<u8>),
}

impl Payload {
    pub fn len(&self) -> usize {
        match self {
            Payload::Text(text) => text.len(),
            Payload::Binary(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Text(text) => text.as_bytes(),
            Payload::Binary(data) => data,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Payload::Text(text) => text.into_bytes(),
            Payload::Binary(data) => data,
        }
    }
}

/// Close code and reason sent by the peer, when the transport saw one
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloseFrame {
    pub code: u16,
    pub reason: String,
}

impl From<WsCloseFrame<'_>> for CloseFrame {
    fn from(frame: WsCloseFrame<'_>) -> Self {
        Self {
            code: frame.code.into(),
            reason: frame.reason.into_owned(),
        }
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::Serializer;

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }
}
