// ABOUTME: Cache abstraction for query results keyed by resource kind and parameters
// ABOUTME: Defines cache keys, entries, statuses, and subscriber events for the observable store
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 NutriAI Contributors

/// Observable in-memory store implementation
pub mod store;

pub use store::{CacheStore, Listener, Subscription};

use chrono::{DateTime, Utc};
use nutriai_core::errors::AppResult;
use nutriai_core::models::ConversationId;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

/// Structured cache key
///
/// Two keys that compare equal address the same logical server resource and
/// therefore share one entry.
///
/// # Examples
///
/// ```rust
/// use nutriai_sync::cache::CacheKey;
/// use nutriai_core::models::ConversationId;
///
/// let list = CacheKey::conversations(Some("user-42"));
/// let thread = CacheKey::messages(&ConversationId::new("c1"));
///
/// assert_eq!(list.to_string(), "conversations:user:user-42");
/// assert_eq!(thread.to_string(), "messages:c1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Conversation list for one user
    Conversations {
        /// Signed-in user, if any
        user_id: Option<String>,
    },
    /// Message thread for one conversation
    Messages {
        /// Conversation the thread belongs to (possibly the unsaved sentinel)
        conversation_id: ConversationId,
    },
}

impl CacheKey {
    /// Key of the conversation list for `user_id`
    #[must_use]
    pub fn conversations(user_id: Option<&str>) -> Self {
        Self::Conversations {
            user_id: user_id.map(ToOwned::to_owned),
        }
    }

    /// Key of the message thread for `conversation_id`
    #[must_use]
    pub fn messages(conversation_id: &ConversationId) -> Self {
        Self::Messages {
            conversation_id: conversation_id.clone(),
        }
    }

    /// Glob matching every message thread key
    #[must_use]
    pub const fn all_messages_pattern() -> &'static str {
        "messages:*"
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conversations { user_id: Some(id) } => write!(f, "conversations:user:{id}"),
            Self::Conversations { user_id: None } => write!(f, "conversations:anonymous"),
            Self::Messages { conversation_id } => write!(f, "messages:{conversation_id}"),
        }
    }
}

/// Lifecycle status of a cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheStatus {
    /// Never fetched
    #[default]
    Idle,
    /// First fetch in flight with no data yet
    Loading,
    /// Holds data from the last successful fetch or write
    Success,
    /// Last fetch failed; previous data, if any, is still held
    Error,
}

/// Snapshot of one cache entry
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Entry key
    pub key: CacheKey,
    /// Last known value; insertion order is display order
    pub data: Option<Value>,
    /// Current status
    pub status: CacheStatus,
    /// Text of the last fetch failure, kept beside stale data
    pub error: Option<String>,
    /// Marked stale by an invalidation; the next activation refetches
    pub stale: bool,
    /// A fetch for this key is in flight
    pub is_fetching: bool,
    /// Number of live consumers
    pub subscriber_count: usize,
    /// Bumped whenever in-flight fetches lose the right to write their result
    pub generation: u64,
    /// When `data` was last replaced
    pub updated_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    pub(crate) fn empty(key: CacheKey) -> Self {
        Self {
            key,
            data: None,
            status: CacheStatus::Idle,
            error: None,
            stale: false,
            is_fetching: false,
            subscriber_count: 0,
            generation: 0,
            updated_at: None,
        }
    }

    /// Decode `data` into a typed value
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the stored value does not match `T`
    pub fn data_as<T: DeserializeOwned>(&self) -> AppResult<Option<T>> {
        self.data
            .as_ref()
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
            .map_err(Into::into)
    }

    /// Whether an activation should issue a fetch for this entry
    #[must_use]
    pub const fn needs_fetch(&self) -> bool {
        self.data.is_none() || self.stale || matches!(self.status, CacheStatus::Error)
    }
}

/// Change notification delivered to subscribers after the mutation is applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// `data` was replaced
    Updated {
        /// Affected key
        key: CacheKey,
    },
    /// `status` changed without new data
    StatusChanged {
        /// Affected key
        key: CacheKey,
        /// New status
        status: CacheStatus,
    },
    /// Entry was marked stale; active consumers must refetch
    Invalidated {
        /// Affected key
        key: CacheKey,
    },
    /// Entry data was cleared back to the never-fetched state
    Reset {
        /// Affected key
        key: CacheKey,
    },
}

impl CacheEvent {
    /// Key the event refers to
    #[must_use]
    pub const fn key(&self) -> &CacheKey {
        match self {
            Self::Updated { key }
            | Self::StatusChanged { key, .. }
            | Self::Invalidated { key }
            | Self::Reset { key } => key,
        }
    }
}
