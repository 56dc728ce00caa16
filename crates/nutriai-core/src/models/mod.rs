// ABOUTME: Data models exchanged with the chat backend
// ABOUTME: Conversations, messages, request bodies, and response normalization
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 NutriAI Contributors

/// Conversation records, ids, and list payload normalization
pub mod conversation;
/// Message records and send request bodies
pub mod message;

pub use conversation::{
    derive_title, Conversation, ConversationId, ConversationListPayload,
    CreateConversationRequest, UpdateConversationRequest,
};
pub use message::{Message, MessageRole, NewMessage};

/// Prefix of `text` holding at most `max_chars` characters
///
/// Counts Unicode scalar values so multi-byte text is never split mid-character.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    text.char_indices()
        .nth(max_chars)
        .map_or(text, |(byte_idx, _)| &text[..byte_idx])
}
