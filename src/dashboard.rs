// ABOUTME: Dashboard orchestrator wiring the polled conversation list, active thread, and composer
// ABOUTME: Owns the active conversation selection and switches it when a new conversation is created
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 NutriAI Contributors

//! # Dashboard Orchestrator
//!
//! Holds the only cross-cutting selection state: which conversation is
//! active. Selecting a conversation swaps the mounted message query, so the
//! previous thread stops loading. Submitting the composer draft goes through
//! the [`ConversationCreationFlow`]; when that flow creates a conversation the
//! dashboard adopts the new id and explicitly refetches the list.

use crate::cache::{CacheEntry, CacheKey};
use crate::client::SyncClient;
use crate::conversation_flow::{ConversationCreationFlow, CreationState, SendReport};
use crate::query::QueryHandle;
use nutriai_core::errors::{AppError, AppResult};
use nutriai_core::models::{Conversation, ConversationId, Message};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Mounted dashboard
pub struct Dashboard {
    client: SyncClient,
    flow: ConversationCreationFlow,
    active: watch::Sender<Option<ConversationId>>,
    conversations: Mutex<Option<QueryHandle>>,
    thread: Mutex<Option<QueryHandle>>,
    draft: Mutex<String>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        warn!("Dashboard state lock poisoned, recovering");
        poisoned.into_inner()
    })
}

impl Dashboard {
    /// Mount the dashboard: start the polled conversation list, nothing selected
    #[must_use]
    pub fn mount(client: SyncClient) -> Self {
        let conversations = client.conversations_query();
        Self {
            flow: client.creation_flow(),
            client,
            active: watch::Sender::new(None),
            conversations: Mutex::new(Some(conversations)),
            thread: Mutex::new(None),
            draft: Mutex::new(String::new()),
        }
    }

    /// Client this dashboard runs on
    #[must_use]
    pub const fn client(&self) -> &SyncClient {
        &self.client
    }

    /// Active conversation id, possibly the unsaved sentinel
    #[must_use]
    pub fn current(&self) -> Option<ConversationId> {
        self.active.borrow().clone()
    }

    /// Receiver observing every change of the active conversation
    #[must_use]
    pub fn watch_active(&self) -> watch::Receiver<Option<ConversationId>> {
        self.active.subscribe()
    }

    /// Make `id` the active conversation (or clear the selection)
    ///
    /// Interest in the previous thread is dropped: its polling and loading
    /// stop, and a late response for it is only ever written to its own key.
    pub fn select(&self, id: Option<ConversationId>) {
        if self.current() == id {
            return;
        }
        if id.as_ref().is_some_and(ConversationId::is_unsaved) {
            self.flow.reset();
        }
        debug!(conversation_id = ?id, "Selecting conversation");
        self.switch_thread(id);
    }

    /// Select a fresh unsaved thread
    pub fn start_new_conversation(&self) {
        self.select(Some(ConversationId::unsaved()));
    }

    /// Creation state of the unsaved thread
    #[must_use]
    pub fn creation_state(&self) -> CreationState {
        self.flow.state()
    }

    /// Whether a send is in flight
    #[must_use]
    pub fn is_sending(&self) -> bool {
        self.flow.is_sending()
    }

    /// Current composer text
    #[must_use]
    pub fn draft(&self) -> String {
        lock(&self.draft).clone()
    }

    /// Replace the composer text
    pub fn set_draft(&self, text: impl Into<String>) {
        *lock(&self.draft) = text.into();
    }

    /// Send the composer draft into the active conversation
    ///
    /// A blank draft is a no-op (`Ok(None)`). The draft is cleared only when
    /// the send commits, so a failed send can be resubmitted as typed.
    ///
    /// # Errors
    ///
    /// Returns an error if nothing is selected, another send is in flight, or
    /// the send failed (after its optimistic message was rolled back)
    pub async fn submit(&self) -> AppResult<Option<SendReport>> {
        let draft = self.draft();
        if draft.trim().is_empty() {
            return Ok(None);
        }
        let active = self
            .current()
            .ok_or_else(|| AppError::invalid_input("No conversation selected"))?;

        let report = self
            .flow
            .send(&active, &draft, |conversation| self.adopt(conversation))
            .await?;

        let mut current_draft = lock(&self.draft);
        // Keep anything typed while the send was in flight
        if *current_draft == draft {
            current_draft.clear();
        }
        drop(current_draft);

        Ok(Some(report))
    }

    /// Set the draft to `text` and submit it
    ///
    /// # Errors
    ///
    /// See [`Dashboard::submit`]
    pub async fn send(&self, text: impl Into<String>) -> AppResult<Option<SendReport>> {
        self.set_draft(text);
        self.submit().await
    }

    /// Conversation list as last fetched, in server order
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the cached list is malformed
    pub fn conversations(&self) -> AppResult<Vec<Conversation>> {
        Ok(self
            .client
            .store()
            .get_data(&self.conversations_key())?
            .unwrap_or_default())
    }

    /// Active thread, including any optimistic message
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the cached thread is malformed
    pub fn messages(&self) -> AppResult<Vec<Message>> {
        let Some(active) = self.current() else {
            return Ok(Vec::new());
        };
        Ok(self
            .client
            .store()
            .get_data(&CacheKey::messages(&active))?
            .unwrap_or_default())
    }

    /// Cache entry of the conversation list
    #[must_use]
    pub fn conversations_entry(&self) -> Option<CacheEntry> {
        self.client.store().get(&self.conversations_key())
    }

    /// Cache entry of the active thread
    #[must_use]
    pub fn thread_entry(&self) -> Option<CacheEntry> {
        self.current()
            .and_then(|id| self.client.store().get(&CacheKey::messages(&id)))
    }

    /// Explicitly refetch the conversation list
    pub fn refetch_conversations(&self) -> bool {
        lock(&self.conversations)
            .as_ref()
            .is_some_and(QueryHandle::refetch)
    }

    /// Mark every thread stale and refetch the list
    ///
    /// # Errors
    ///
    /// Returns an error if the invalidation pattern is rejected
    pub fn refresh_all(&self) -> AppResult<()> {
        let threads = self
            .client
            .store()
            .invalidate_pattern(CacheKey::all_messages_pattern())?;
        self.refetch_conversations();
        debug!(threads, "Forced full refresh");
        Ok(())
    }

    /// Detach every query this dashboard mounted
    pub fn unmount(&self) {
        let list = lock(&self.conversations).take();
        let thread = lock(&self.thread).take();
        drop(list);
        drop(thread);
        info!("Dashboard unmounted");
    }

    fn conversations_key(&self) -> CacheKey {
        CacheKey::conversations(self.client.config().user_id.as_deref())
    }

    fn adopt(&self, conversation: &Conversation) {
        info!(conversation_id = %conversation.id, "Adopting newly created conversation");
        self.switch_thread(Some(conversation.id.clone()));
        if !self.refetch_conversations() {
            debug!("Conversation list not mounted, skipping refetch");
        }
    }

    fn switch_thread(&self, id: Option<ConversationId>) {
        let handle = id.as_ref().map(|id| self.client.messages_query(id));
        self.active.send_replace(id);
        let previous = std::mem::replace(&mut *lock(&self.thread), handle);
        drop(previous);
    }
}
