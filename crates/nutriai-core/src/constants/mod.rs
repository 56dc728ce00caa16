// ABOUTME: Application constants for the chat synchronization client
// ABOUTME: Sentinel identifiers, polling cadence, title/preview limits, and env var names
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 NutriAI Contributors

/// Reserved identifiers that never name a persisted server record
pub mod sentinels {
    /// Conversation id denoting a thread that has not been created server-side yet
    pub const NEW_CONVERSATION_ID: &str = "new-conversation";

    /// Message id carried by an optimistic, not-yet-confirmed message
    pub const TEMP_MESSAGE_ID: &str = "temp-id";

    /// Patient id sent on conversation creation; the backend resolves it to the caller
    pub const DEFAULT_PATIENT_ID: &str = "me";
}

/// Cache and polling defaults
pub mod sync {
    /// Conversation list refresh cadence while a consumer is mounted
    pub const CONVERSATION_POLL_INTERVAL_MS: u64 = 5_000;

    /// Default transport timeout for REST calls
    pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

    /// Default backend base URL
    pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000";

    /// Capacity of the per-query refetch signal channel
    pub const REFETCH_SIGNAL_CAPACITY: usize = 8;
}

/// Display limits derived from the dashboard sidebar and composer
pub mod display {
    /// Maximum characters kept when deriving a title from the first message
    pub const TITLE_MAX_CHARS: usize = 50;

    /// Suffix appended to a truncated title
    pub const TITLE_ELLIPSIS: &str = "...";

    /// Characters of `lastMessage` used as a fallback title in the sidebar
    pub const SIDEBAR_TITLE_CHARS: usize = 40;

    /// Characters of `lastMessage` shown as the sidebar preview line
    pub const SIDEBAR_PREVIEW_CHARS: usize = 60;

    /// Sidebar title for a conversation with neither title nor messages
    pub const UNTITLED_CONVERSATION: &str = "New conversation";

    /// Sidebar preview for a conversation without messages
    pub const EMPTY_PREVIEW: &str = "No messages";
}

/// Environment variable names read by the configuration layer
pub mod env_vars {
    /// Backend base URL
    pub const API_BASE_URL: &str = "NUTRIAI_API_BASE_URL";
    /// Transport timeout in seconds
    pub const REQUEST_TIMEOUT_SECS: &str = "NUTRIAI_REQUEST_TIMEOUT_SECS";
    /// Patient id sent on conversation creation
    pub const PATIENT_ID: &str = "NUTRIAI_PATIENT_ID";
    /// Conversation list polling cadence in milliseconds
    pub const CONVERSATION_POLL_MS: &str = "NUTRIAI_CONVERSATION_POLL_MS";
    /// Signed-in user id used to scope the conversation list
    pub const USER_ID: &str = "NUTRIAI_USER_ID";
}

/// Service names used in structured logs
pub mod service_names {
    /// Default service name for the synchronization client
    pub const NUTRIAI_SYNC: &str = "nutriai-sync";
}
