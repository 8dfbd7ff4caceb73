// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deferred mutations buffered while the datastore is unavailable

use crate::id::operation_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operation-specific fields, opaque to the queue
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Kind of mutation carried by a [`QueuedOperation`]
///
/// Serialized as a snake_case string. Kinds this build does not know about
/// survive as [`OperationKind::Other`] so the business layer can add new
/// mutations without a coordinated release.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OperationKind {
    AddToLibrary,
    RemoveFromLibrary,
    UpdateProgress,
    CreateReview,
    UpdateReview,
    DeleteReview,
    MarkRead,
    Other(String),
}

impl OperationKind {
    pub fn as_str(&self) -> &str {
        match self {
            OperationKind::AddToLibrary => "add_to_library",
            OperationKind::RemoveFromLibrary => "remove_from_library",
            OperationKind::UpdateProgress => "update_progress",
            OperationKind::CreateReview => "create_review",
            OperationKind::UpdateReview => "update_review",
            OperationKind::DeleteReview => "delete_review",
            OperationKind::MarkRead => "mark_read",
            OperationKind::Other(s) => s,
        }
    }
}

impl From<&str> for OperationKind {
    fn from(s: &str) -> Self {
        match s {
            "add_to_library" => OperationKind::AddToLibrary,
            "remove_from_library" => OperationKind::RemoveFromLibrary,
            "update_progress" => OperationKind::UpdateProgress,
            "create_review" => OperationKind::CreateReview,
            "update_review" => OperationKind::UpdateReview,
            "delete_review" => OperationKind::DeleteReview,
            "mark_read" => OperationKind::MarkRead,
            other => OperationKind::Other(other.to_string()),
        }
    }
}

impl From<String> for OperationKind {
    fn from(s: String) -> Self {
        OperationKind::from(s.as_str())
    }
}

impl From<OperationKind> for String {
    fn from(kind: OperationKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mutation waiting to be replayed against the datastore
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedOperation {
    pub id: String,
    pub kind: OperationKind,
    #[serde(rename = "actorID")]
    pub actor_id: i64,
    #[serde(rename = "targetID")]
    pub target_id: i64,
    #[serde(default)]
    pub payload: Payload,
    #[serde(rename = "enqueuedAt")]
    pub enqueued_at: DateTime<Utc>,
    #[serde(rename = "retryCount", default)]
    pub retry_count: u32,
}

impl QueuedOperation {
    /// Create a fresh operation; `seq` comes from the owning queue
    pub fn new(
        kind: OperationKind,
        actor_id: i64,
        target_id: i64,
        payload: Payload,
        enqueued_at: DateTime<Utc>,
        seq: u64,
    ) -> Self {
        Self {
            id: operation_id(kind.as_str(), actor_id, target_id, enqueued_at, seq),
            kind,
            actor_id,
            target_id,
            payload,
            enqueued_at,
            retry_count: 0,
        }
    }

    /// Copy of this operation with one more recorded failure
    pub fn with_incremented_retries(self) -> Self {
        Self {
            retry_count: self.retry_count + 1,
            ..self
        }
    }
}

#[cfg(test)]
#[path = "operation_tests.rs"]
mod tests;
