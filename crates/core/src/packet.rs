// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire envelope shared by the broadcast and notification protocols
//!
//! Every frame or datagram is a single JSON object:
//!
//! ```text
//! {"type": "<discriminator>", "payload": <any>, "error": "<message>"}
//! ```
//!
//! No length prefix, no trailing newline, no version field. New `type`
//! values can be added freely; existing payload shapes are frozen.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Largest payload a single UDP datagram can carry
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Errors produced while encoding or decoding packets
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed packet: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("unknown packet type: {0}")]
    UnknownType(String),
    #[error("invalid {kind} payload: {source}")]
    InvalidPayload {
        kind: PacketType,
        #[source]
        source: serde_json::Error,
    },
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Packet discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacketType {
    // Broadcast protocol
    Auth,
    AuthResponse,
    Progress,
    Heartbeat,
    // Notification protocol
    Register,
    Unregister,
    Confirm,
    Notification,
    // Both
    Error,
}

impl PacketType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PacketType::Auth => "auth",
            PacketType::AuthResponse => "auth_response",
            PacketType::Progress => "progress",
            PacketType::Heartbeat => "heartbeat",
            PacketType::Register => "register",
            PacketType::Unregister => "unregister",
            PacketType::Confirm => "confirm",
            PacketType::Notification => "notification",
            PacketType::Error => "error",
        }
    }

    fn from_wire(s: &str) -> Option<Self> {
        Some(match s {
            "auth" => PacketType::Auth,
            "auth_response" => PacketType::AuthResponse,
            "progress" => PacketType::Progress,
            "heartbeat" => PacketType::Heartbeat,
            "register" => PacketType::Register,
            "unregister" => PacketType::Unregister,
            "confirm" => PacketType::Confirm,
            "notification" => PacketType::Notification,
            "error" => PacketType::Error,
            _ => return None,
        })
    }
}

impl std::fmt::Display for PacketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable error codes carried in `error` packets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidPacket,
    UnknownType,
    InvalidPayload,
    Unauthorized,
    NotAuthenticated,
    AuthTimeout,
    ServerCapacity,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidPacket => "invalid_packet",
            ErrorCode::UnknownType => "unknown_type",
            ErrorCode::InvalidPayload => "invalid_payload",
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::NotAuthenticated => "not_authenticated",
            ErrorCode::AuthTimeout => "auth_timeout",
            ErrorCode::ServerCapacity => "server_capacity",
        }
    }

    /// Map a decode failure onto the code reported to the sender
    pub fn for_codec_error(err: &CodecError) -> Self {
        match err {
            CodecError::UnknownType(_) => ErrorCode::UnknownType,
            CodecError::InvalidPayload { .. } => ErrorCode::InvalidPayload,
            CodecError::Malformed(_) | CodecError::Encode(_) => ErrorCode::InvalidPacket,
        }
    }
}

/// The envelope
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Packet {
    #[serde(rename = "type")]
    pub kind: PacketType,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub payload: Value,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub error: String,
}

#[derive(Deserialize)]
struct RawPacket {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    error: String,
}

impl Packet {
    /// Packet with a typed payload
    pub fn new<T: Serialize>(kind: PacketType, payload: &T) -> Result<Self, CodecError> {
        Ok(Self {
            kind,
            payload: serde_json::to_value(payload).map_err(CodecError::Encode)?,
            error: String::new(),
        })
    }

    /// Packet without a payload (e.g. heartbeat)
    pub fn bare(kind: PacketType) -> Self {
        Self {
            kind,
            payload: Value::Null,
            error: String::new(),
        }
    }

    /// Error packet with a `{code, message}` payload
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: PacketType::Error,
            payload: serde_json::json!({ "code": code.as_str(), "message": message }),
            error: message,
        }
    }

    /// Decode a packet from a frame or datagram
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let raw: RawPacket = serde_json::from_slice(bytes).map_err(CodecError::Malformed)?;
        let kind = PacketType::from_wire(&raw.kind).ok_or(CodecError::UnknownType(raw.kind))?;
        Ok(Self {
            kind,
            payload: raw.payload,
            error: raw.error,
        })
    }

    /// Encode to raw JSON bytes
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(self).map_err(CodecError::Encode)
    }

    /// Encode to a JSON string (for text frames)
    pub fn to_text(&self) -> Result<String, CodecError> {
        serde_json::to_string(self).map_err(CodecError::Encode)
    }

    /// Interpret the payload as a typed structure
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, CodecError> {
        serde_json::from_value(self.payload.clone()).map_err(|source| CodecError::InvalidPayload {
            kind: self.kind,
            source,
        })
    }
}

// Broadcast protocol payloads

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthPayload {
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponsePayload {
    pub success: bool,
    #[serde(rename = "userID", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
}

/// Reading-progress update pushed to a user's other devices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressPayload {
    #[serde(rename = "userID")]
    pub user_id: i64,
    #[serde(rename = "entityID")]
    pub entity_id: i64,
    /// Chapter number; fractional for side chapters (e.g. 10.5)
    pub position: f64,
    #[serde(rename = "subPositionID", default, skip_serializing_if = "Option::is_none")]
    pub sub_position_id: Option<i64>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

// Notification protocol payloads

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterPayload {
    #[serde(rename = "userID", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(rename = "topicIDs", default)]
    pub topic_ids: Vec<i64>,
    #[serde(rename = "allTopics", default)]
    pub all_topics: bool,
    #[serde(rename = "deviceID", default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnregisterPayload {
    #[serde(rename = "userID", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmPayload {
    /// `registered` or `unregistered`
    pub action: String,
    #[serde(rename = "userID", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(rename = "topicIDs", default)]
    pub topic_ids: Vec<i64>,
    #[serde(rename = "allTopics", default)]
    pub all_topics: bool,
    #[serde(default)]
    pub removed: usize,
}

/// Content-release notification (e.g. a new chapter for a series)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    #[serde(rename = "topicID", default, skip_serializing_if = "Option::is_none")]
    pub topic_id: Option<i64>,
    pub name: String,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, Value>,
    #[serde(rename = "sentAt")]
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

#[cfg(test)]
#[path = "packet_tests.rs"]
mod tests;
