// ABOUTME: Conversation record, identifier newtype, and list payload normalization
// ABOUTME: Includes title derivation from the first message and sidebar display helpers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 NutriAI Contributors

use super::truncate_chars;
use crate::constants::{display, sentinels};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque conversation identifier
///
/// The reserved value [`sentinels::NEW_CONVERSATION_ID`] denotes a thread that
/// has not been persisted yet; the client never invents any other id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    /// Wrap a server-assigned id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The "not yet persisted" sentinel
    #[must_use]
    pub fn unsaved() -> Self {
        Self(sentinels::NEW_CONVERSATION_ID.to_owned())
    }

    /// Whether this id is the unsaved sentinel
    #[must_use]
    pub fn is_unsaved(&self) -> bool {
        self.0 == sentinels::NEW_CONVERSATION_ID
    }

    /// Borrow the raw id
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for ConversationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A conversation as listed by `GET /api/conversations`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Server-assigned id
    pub id: ConversationId,
    /// Short title, derived from the first message when absent
    #[serde(default)]
    pub title: Option<String>,
    /// Preview of the latest message
    #[serde(default)]
    pub last_message: Option<String>,
    /// Last activity timestamp
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Display-only pin flag
    #[serde(default)]
    pub pinned: bool,
}

impl Conversation {
    /// Title shown in the sidebar
    ///
    /// Falls back to the start of the last message, then to a generic label.
    #[must_use]
    pub fn display_title(&self) -> String {
        if let Some(title) = self.title.as_deref().filter(|t| !t.is_empty()) {
            return title.to_owned();
        }
        self.last_message
            .as_deref()
            .filter(|m| !m.is_empty())
            .map_or_else(
                || display::UNTITLED_CONVERSATION.to_owned(),
                |m| truncate_chars(m, display::SIDEBAR_TITLE_CHARS).to_owned(),
            )
    }

    /// One-line preview shown under the title
    #[must_use]
    pub fn preview(&self) -> String {
        self.last_message
            .as_deref()
            .filter(|m| !m.is_empty())
            .map_or_else(
                || display::EMPTY_PREVIEW.to_owned(),
                |m| truncate_chars(m, display::SIDEBAR_PREVIEW_CHARS).to_owned(),
            )
    }
}

/// Conversation list response body
///
/// The backend answers either with a bare array or with `{ "data": [...] }`.
/// Both shapes normalize to the same ordered sequence.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ConversationListPayload {
    /// `[ {...}, {...} ]`
    Bare(Vec<Conversation>),
    /// `{ "data": [ {...} ] }`
    Wrapped {
        /// Listed conversations; a missing field means an empty list
        #[serde(default)]
        data: Vec<Conversation>,
    },
}

impl ConversationListPayload {
    /// Normalize to the ordered conversation sequence
    #[must_use]
    pub fn into_conversations(self) -> Vec<Conversation> {
        match self {
            Self::Bare(conversations) | Self::Wrapped { data: conversations } => conversations,
        }
    }
}

/// Body of `POST /api/conversations`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest {
    /// Patient the conversation belongs to
    pub patient_id: String,
}

/// Body of `PATCH /api/conversations/{id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateConversationRequest {
    /// New title
    pub title: String,
}

/// Title derived from the first message of a new conversation
///
/// Content of at most 50 characters is used as-is; longer content keeps its first
/// 50 characters followed by `"..."`.
#[must_use]
pub fn derive_title(content: &str) -> String {
    let head = truncate_chars(content, display::TITLE_MAX_CHARS);
    if head.len() < content.len() {
        format!("{head}{}", display::TITLE_ELLIPSIS)
    } else {
        head.to_owned()
    }
}
