// src/transport/mod.rs

//! Wire messages and the channels connecting the transport to the
//! dispatch loop.
//!
//! - [`websocket`] serves the command socket (one client at a time).
//! - [`relay`] is the legacy GUI listener that forwards frames as `update`
//!   notifications.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::errors::ManagerError;
use crate::introspection::Introspection;

pub mod relay;
pub mod websocket;

pub use relay::{RelayHandle, start_relay};
pub use websocket::WebSocketServer;

/// `{"id": "...", "command": "...", "data": ...}` from the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    #[serde(default)]
    pub id: Option<String>,
    pub command: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl InboundMessage {
    pub fn new(id: impl Into<String>, command: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            id: Some(id.into()),
            command: command.into(),
            data,
        }
    }

    /// The message id, or a fresh one when the client sent none.
    pub fn reply_id(&self) -> String {
        self.id.clone().unwrap_or_else(fresh_id)
    }
}

/// `{"id": "...", "command": "ack" | "error" | ..., "data": {...}}` to the
/// client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub id: String,
    pub command: String,
    pub data: Value,
}

impl OutboundMessage {
    pub fn ack(id: impl Into<String>, message: impl Into<String>, state: &str) -> Self {
        Self {
            id: id.into(),
            command: "ack".to_string(),
            data: json!({ "message": message.into(), "state": state }),
        }
    }

    pub fn error(id: impl Into<String>, err: &ManagerError) -> Self {
        Self {
            id: id.into(),
            command: "error".to_string(),
            data: json!({ "message": err.to_string(), "code": err.code() }),
        }
    }

    pub fn state_changed(state: &str) -> Self {
        Self {
            id: fresh_id(),
            command: "state-changed".to_string(),
            data: json!({ "state": state }),
        }
    }

    pub fn update(data: Value) -> Self {
        Self {
            id: fresh_id(),
            command: "update".to_string(),
            data,
        }
    }

    pub fn introspection(info: &Introspection) -> Self {
        Self {
            id: fresh_id(),
            command: "introspection".to_string(),
            data: serde_json::to_value(info).unwrap_or(Value::Null),
        }
    }
}

/// Parse one text frame. A frame that is not a command yields the `error`
/// reply to send back, keeping the id when one can be recovered.
pub fn parse_frame(text: &str) -> Result<InboundMessage, OutboundMessage> {
    match serde_json::from_str::<InboundMessage>(text) {
        Ok(message) => Ok(message),
        Err(e) => {
            let id = serde_json::from_str::<Value>(text)
                .ok()
                .and_then(|v| v.get("id").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(fresh_id);
            let err = ManagerError::InvalidPayload {
                command: "<frame>".to_string(),
                message: e.to_string(),
            };
            Err(OutboundMessage::error(id, &err))
        }
    }
}

pub fn fresh_id() -> String {
    Uuid::new_v4().to_string()
}

/// Sending half of the outbound channel. Never blocks; messages sent while
/// no client is connected are dropped by the server.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<OutboundMessage>,
}

impl Outbox {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, message: OutboundMessage) {
        if self.tx.send(message).is_err() {
            debug!("outbound channel closed; dropping message");
        }
    }
}
