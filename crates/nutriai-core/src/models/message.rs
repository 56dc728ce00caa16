// ABOUTME: Chat message record, sender role, and send request body
// ABOUTME: Supports the optimistic placeholder message authored locally before confirmation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 NutriAI Contributors

use crate::constants::sentinels;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// The signed-in person
    User,
    /// The nutrition assistant
    Assistant,
}

/// A message in a conversation thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "MessageWire")]
pub struct Message {
    /// Server-assigned id, or [`sentinels::TEMP_MESSAGE_ID`] while unconfirmed
    pub id: String,
    /// Author role
    pub role: MessageRole,
    /// Text content
    pub content: String,
    /// Creation timestamp
    pub created_at: Option<DateTime<Utc>>,
}

impl Message {
    /// Locally-authored placeholder shown until the send round-trip completes
    pub fn optimistic(content: impl Into<String>) -> Self {
        Self {
            id: sentinels::TEMP_MESSAGE_ID.to_owned(),
            role: MessageRole::User,
            content: content.into(),
            created_at: Some(Utc::now()),
        }
    }

    /// Whether this is the unconfirmed placeholder
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.id == sentinels::TEMP_MESSAGE_ID
    }

    /// Whether the signed-in person authored this message
    #[must_use]
    pub fn is_from_user(&self) -> bool {
        self.role == MessageRole::User
    }
}

// Some backends nest the role under `metadata`; older records omit it entirely.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageWire {
    id: String,
    #[serde(default)]
    role: Option<MessageRole>,
    #[serde(default)]
    content: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    metadata: Option<MessageMetadata>,
}

#[derive(Deserialize)]
struct MessageMetadata {
    #[serde(default)]
    role: Option<MessageRole>,
}

impl From<MessageWire> for Message {
    fn from(wire: MessageWire) -> Self {
        let role = wire
            .role
            .or_else(|| wire.metadata.and_then(|m| m.role))
            .unwrap_or(MessageRole::Assistant);
        Self {
            id: wire.id,
            role,
            content: wire.content,
            created_at: wire.created_at,
        }
    }
}

/// Body of `POST /api/conversations/{id}/messages`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    /// Text content
    pub content: String,
    /// Author role
    pub role: MessageRole,
}

impl NewMessage {
    /// A message authored by the signed-in person
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            role: MessageRole::User,
        }
    }
}
