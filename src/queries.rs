// ABOUTME: Query definitions binding cache keys to REST fetches for conversations and messages
// ABOUTME: Normalizes the conversation list payload once, at the query boundary
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 NutriAI Contributors

use crate::api::ConversationApi;
use crate::cache::CacheKey;
use crate::query::{query_fn, QueryFn, QueryOptions};
use nutriai_core::errors::AppError;
use nutriai_core::models::ConversationId;
use std::sync::Arc;
use std::time::Duration;

/// Conversation list query for `user_id`, polled every `poll_interval`
///
/// Disabled when there is no signed-in user.
#[must_use]
pub fn conversations(
    api: &Arc<dyn ConversationApi>,
    user_id: Option<&str>,
    poll_interval: Duration,
) -> (CacheKey, QueryFn, QueryOptions) {
    let key = CacheKey::conversations(user_id);
    let owned_user = user_id.map(ToOwned::to_owned);
    let api = Arc::clone(api);
    let fetch = query_fn(move || {
        let api = Arc::clone(&api);
        let user_id = owned_user.clone();
        async move {
            let payload = api.list_conversations(user_id.as_deref()).await?;
            Ok::<_, AppError>(payload.into_conversations())
        }
    });
    let options = QueryOptions::default()
        .enabled_if(user_id.is_some())
        .polling(poll_interval);
    (key, fetch, options)
}

/// Message thread query for `conversation_id`
///
/// Disabled for the unsaved sentinel, which has nothing on the server yet.
#[must_use]
pub fn messages(
    api: &Arc<dyn ConversationApi>,
    conversation_id: &ConversationId,
) -> (CacheKey, QueryFn, QueryOptions) {
    let key = CacheKey::messages(conversation_id);
    let id = conversation_id.clone();
    let api = Arc::clone(api);
    let fetch = query_fn(move || {
        let api = Arc::clone(&api);
        let id = id.clone();
        async move { api.list_messages(&id).await }
    });
    let options = QueryOptions::default().enabled_if(!conversation_id.is_unsaved());
    (key, fetch, options)
}
