// ABOUTME: REST boundary consumed by the sync core for conversations and messages
// ABOUTME: Defines the ConversationApi trait implemented over HTTP and by test doubles
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 NutriAI Contributors

/// reqwest-backed implementation
pub mod http;

pub use http::HttpConversationApi;

use nutriai_core::errors::AppResult;
use nutriai_core::models::{
    Conversation, ConversationId, ConversationListPayload, CreateConversationRequest, Message,
    NewMessage, UpdateConversationRequest,
};

/// Remote conversation store
///
/// Every non-2xx response is an `Err`; its message is the backend's `message`
/// field when present.
#[async_trait::async_trait]
pub trait ConversationApi: Send + Sync {
    /// `GET /api/conversations?userId={id}`
    ///
    /// Returns the payload as received; callers normalize it with
    /// [`ConversationListPayload::into_conversations`].
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body cannot be decoded
    async fn list_conversations(&self, user_id: Option<&str>)
        -> AppResult<ConversationListPayload>;

    /// `POST /api/conversations`
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body cannot be decoded
    async fn create_conversation(
        &self,
        request: &CreateConversationRequest,
    ) -> AppResult<Conversation>;

    /// `PATCH /api/conversations/{id}`
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails
    async fn update_conversation(
        &self,
        id: &ConversationId,
        request: &UpdateConversationRequest,
    ) -> AppResult<()>;

    /// `GET /api/conversations/{id}/messages`
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body cannot be decoded
    async fn list_messages(&self, id: &ConversationId) -> AppResult<Vec<Message>>;

    /// `POST /api/conversations/{id}/messages`
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body cannot be decoded
    async fn send_message(&self, id: &ConversationId, message: &NewMessage) -> AppResult<Message>;
}
