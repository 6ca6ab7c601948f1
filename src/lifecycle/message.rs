//! Worker <-> client message protocol
//!
//! Messages are tagged by a `type` field on the wire:
//! - client -> worker: `{"type":"SKIP_WAITING"}`
//! - worker -> clients: `{"type":"APP_UPDATED","message":"..."}`

use crate::error::{SwgateError, SwgateResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of one foreground context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(pub Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.simple().to_string()[..8])
    }
}

/// Message posted by a foreground context to a worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Activate the waiting worker now
    SkipWaiting,
}

/// Message broadcast by the active worker to its clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    /// A new version took control; the client should reload
    AppUpdated { message: String },
}

impl ClientMessage {
    pub fn to_json(&self) -> SwgateResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(s: &str) -> SwgateResult<Self> {
        serde_json::from_str(s).map_err(|e| SwgateError::Protocol(e.to_string()))
    }
}

impl WorkerMessage {
    pub fn to_json(&self) -> SwgateResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(s: &str) -> SwgateResult<Self> {
        serde_json::from_str(s).map_err(|e| SwgateError::Protocol(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_waiting_wire_format() {
        assert_eq!(
            ClientMessage::SkipWaiting.to_json().unwrap(),
            r#"{"type":"SKIP_WAITING"}"#
        );
        assert_eq!(
            ClientMessage::from_json(r#"{"type":"SKIP_WAITING"}"#).unwrap(),
            ClientMessage::SkipWaiting
        );
    }

    #[test]
    fn app_updated_wire_format() {
        let msg = WorkerMessage::AppUpdated {
            message: "reloading".to_string(),
        };
        assert_eq!(
            msg.to_json().unwrap(),
            r#"{"type":"APP_UPDATED","message":"reloading"}"#
        );
    }

    #[test]
    fn unknown_type_is_protocol_error() {
        let err = ClientMessage::from_json(r#"{"type":"CLAIM"}"#).unwrap_err();
        assert!(matches!(err, SwgateError::Protocol(_)));

        let err = WorkerMessage::from_json(r#"{"type":"APP_UPDATED"}"#).unwrap_err();
        assert!(matches!(err, SwgateError::Protocol(_)));
    }
}
