// ABOUTME: Lazy conversation creation on first send, layered on the optimistic mutation executor
// ABOUTME: Tracks unsaved/creating/created state, adopts the server id, and sets a best-effort title
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 NutriAI Contributors

//! # Conversation Creation Flow
//!
//! Sending into the unsaved sentinel thread first creates the conversation,
//! hands the new id to the caller, then sends the message against that id. On
//! the first successful send a title derived from the message is patched onto
//! the conversation; failures of that patch are logged and otherwise ignored.

use crate::api::ConversationApi;
use crate::cache::{CacheKey, CacheStore};
use crate::mutation::{Committed, MutationExecutor, MutationOutcome};
use nutriai_core::errors::{AppError, AppResult};
use nutriai_core::models::{
    derive_title, Conversation, ConversationId, CreateConversationRequest, Message, NewMessage,
    UpdateConversationRequest,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Persistence state of the sentinel thread
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CreationState {
    /// No persisted id exists yet
    #[default]
    Unsaved,
    /// Create request in flight
    Creating,
    /// The server assigned this id
    Created(ConversationId),
}

/// What a successful send did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReport {
    /// Conversation the message was persisted in
    pub conversation_id: ConversationId,
    /// Server-confirmed message
    pub message: Message,
    /// Conversation created by this send, if the thread was unsaved
    pub created: Option<Conversation>,
    /// Title patched onto a newly created conversation, if the patch succeeded
    pub title: Option<String>,
}

struct Sent {
    conversation_id: ConversationId,
    message: Message,
    title: Option<String>,
}

/// Sends messages, creating the conversation first when needed
pub struct ConversationCreationFlow {
    api: Arc<dyn ConversationApi>,
    store: CacheStore,
    executor: MutationExecutor,
    user_id: Option<String>,
    patient_id: String,
    state: watch::Sender<CreationState>,
    sending: AtomicBool,
}

impl ConversationCreationFlow {
    /// Create a flow for the signed-in `user_id`
    #[must_use]
    pub fn new(
        api: Arc<dyn ConversationApi>,
        store: CacheStore,
        user_id: Option<String>,
        patient_id: impl Into<String>,
    ) -> Self {
        Self {
            api,
            executor: MutationExecutor::new(store.clone()),
            store,
            user_id,
            patient_id: patient_id.into(),
            state: watch::Sender::new(CreationState::Unsaved),
            sending: AtomicBool::new(false),
        }
    }

    /// Current creation state
    #[must_use]
    pub fn state(&self) -> CreationState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every state transition
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<CreationState> {
        self.state.subscribe()
    }

    /// Start over with a fresh unsaved thread
    pub fn reset(&self) {
        self.state.send_replace(CreationState::Unsaved);
    }

    /// Whether a send is in flight
    #[must_use]
    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::Acquire)
    }

    /// Send `content` into `active`, creating the conversation first if unsaved
    ///
    /// The optimistic user message is in the cache before the first network
    /// call is awaited. `on_created` runs as soon as the server assigns an id,
    /// before the message itself is sent.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for blank content, `ResourceLocked` while another
    /// send is in flight, or the creation/send failure after the optimistic
    /// message has been rolled back.
    pub async fn send<F>(
        &self,
        active: &ConversationId,
        content: &str,
        on_created: F,
    ) -> AppResult<SendReport>
    where
        F: FnOnce(&Conversation) + Send,
    {
        if content.trim().is_empty() {
            return Err(AppError::invalid_input("Message content cannot be empty"));
        }
        let _guard = SendGuard::acquire(&self.sending)?;

        let key = CacheKey::messages(active);
        let unsaved = active.is_unsaved();
        let applied = self.executor.apply(&key, |mut thread: Vec<Message>| {
            thread.push(Message::optimistic(content));
            thread
        })?;

        let mut created: Option<Conversation> = None;
        let created_slot = &mut created;
        let outcome = applied
            .settle(move || async move {
                let target = if unsaved {
                    let conversation = self.create_conversation().await?;
                    on_created(&conversation);
                    let id = conversation.id.clone();
                    *created_slot = Some(conversation);
                    id
                } else {
                    active.clone()
                };

                let message = self
                    .api
                    .send_message(&target, &NewMessage::user(content))
                    .await?;
                debug!(conversation_id = %target, message_id = %message.id, "Message persisted");

                let title = if unsaved {
                    self.apply_title(&target, content).await
                } else {
                    None
                };

                Ok::<_, AppError>(Committed::new(Sent {
                    conversation_id: target.clone(),
                    message,
                    title,
                })
                .invalidating(CacheKey::conversations(self.user_id.as_deref()))
                .invalidating(CacheKey::messages(&target)))
            })
            .await;

        match outcome {
            MutationOutcome::Committed { value, .. } => {
                if unsaved {
                    // The next "new conversation" must start from an empty thread
                    self.store.reset(&key);
                }
                Ok(SendReport {
                    conversation_id: value.conversation_id,
                    message: value.message,
                    created,
                    title: value.title,
                })
            }
            MutationOutcome::RolledBack { error, .. } => {
                if created.is_some() {
                    // The conversation exists even though its first message failed
                    self.store
                        .invalidate(&CacheKey::conversations(self.user_id.as_deref()));
                }
                warn!(conversation_id = %active, error = %error, "Send failed");
                Err(error)
            }
        }
    }

    async fn create_conversation(&self) -> AppResult<Conversation> {
        self.state.send_replace(CreationState::Creating);
        let request = CreateConversationRequest {
            patient_id: self.patient_id.clone(),
        };
        match self.api.create_conversation(&request).await {
            Ok(conversation) => {
                info!(conversation_id = %conversation.id, "Conversation created");
                self.state
                    .send_replace(CreationState::Created(conversation.id.clone()));
                Ok(conversation)
            }
            Err(error) => {
                self.state.send_replace(CreationState::Unsaved);
                Err(error)
            }
        }
    }

    async fn apply_title(&self, id: &ConversationId, content: &str) -> Option<String> {
        let title = derive_title(content);
        let request = UpdateConversationRequest {
            title: title.clone(),
        };
        match self.api.update_conversation(id, &request).await {
            Ok(()) => Some(title),
            Err(error) => {
                warn!(conversation_id = %id, error = %error, "Title update failed, ignoring");
                None
            }
        }
    }
}

struct SendGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> SendGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> AppResult<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| AppError::busy("A message is already being sent"))?;
        Ok(Self { flag })
    }
}

impl Drop for SendGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
