// ABOUTME: Shared test utilities and an in-memory backend double for integration tests
// ABOUTME: MockConversationApi records every call and can hold or fail individual endpoints
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 NutriAI Contributors
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::unwrap_used,
    clippy::expect_used
)]
//! Shared test utilities for `nutriai_sync`
//!
//! The mock backend keeps conversations and messages in memory and behaves
//! like the REST service: ids are assigned server-side, list responses can
//! be returned bare or wrapped in `{data}`, and any endpoint can be told to
//! fail or to hold its response until released.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use nutriai_core::errors::{AppResult, ErrorResponse};
use nutriai_core::models::{
    Conversation, ConversationId, ConversationListPayload, CreateConversationRequest, Message,
    MessageRole, NewMessage, UpdateConversationRequest,
};
use nutriai_sync::api::ConversationApi;
use nutriai_sync::client::SyncClient;
use nutriai_sync::config::{ApiConfig, SyncConfig};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tokio::sync::Semaphore;
use url::Url;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        let _ = tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .try_init();
    });
}

/// Signed-in user used by most tests
pub const TEST_USER: &str = "user-1";

/// REST endpoints of the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    ListConversations,
    CreateConversation,
    UpdateConversation,
    ListMessages,
    SendMessage,
}

/// One recorded request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    ListConversations { user_id: Option<String> },
    CreateConversation { patient_id: String },
    UpdateConversation { id: ConversationId, title: String },
    ListMessages { id: ConversationId },
    SendMessage { id: ConversationId, content: String },
}

impl ApiCall {
    pub const fn endpoint(&self) -> Endpoint {
        match self {
            Self::ListConversations { .. } => Endpoint::ListConversations,
            Self::CreateConversation { .. } => Endpoint::CreateConversation,
            Self::UpdateConversation { .. } => Endpoint::UpdateConversation,
            Self::ListMessages { .. } => Endpoint::ListMessages,
            Self::SendMessage { .. } => Endpoint::SendMessage,
        }
    }
}

#[derive(Default)]
struct MockState {
    conversations: Vec<Conversation>,
    messages: HashMap<ConversationId, Vec<Message>>,
    calls: Vec<ApiCall>,
    failures: HashMap<Endpoint, (u16, Option<String>)>,
    gates: HashMap<Endpoint, Arc<Semaphore>>,
    wrap_list: bool,
    next_id: u64,
}

/// In-memory stand-in for the NutriAI backend
#[derive(Default)]
pub struct MockConversationApi {
    state: Mutex<MockState>,
}

fn timestamp(seq: u64) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
        + chrono::Duration::seconds(i64::try_from(seq).unwrap())
}

impl MockConversationApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Store a conversation with the given `(role, content)` messages
    pub fn seed_conversation(&self, id: &str, title: Option<&str>, messages: &[(MessageRole, &str)]) {
        let mut state = self.state.lock().unwrap();
        let id = ConversationId::new(id);
        let thread: Vec<Message> = messages
            .iter()
            .map(|(role, content)| {
                state.next_id += 1;
                Message {
                    id: format!("msg-{}", state.next_id),
                    role: *role,
                    content: (*content).to_owned(),
                    created_at: Some(timestamp(state.next_id)),
                }
            })
            .collect();
        let updated_at = timestamp(state.next_id);
        state.conversations.push(Conversation {
            id: id.clone(),
            title: title.map(ToOwned::to_owned),
            last_message: thread.last().map(|m| m.content.clone()),
            updated_at: Some(updated_at),
            pinned: false,
        });
        state.messages.insert(id, thread);
    }

    /// Return the conversation list wrapped as `{"data": [...]}`
    pub fn wrap_list_responses(&self, wrap: bool) {
        self.state.lock().unwrap().wrap_list = wrap;
    }

    /// Make `endpoint` answer with `status` and an optional `{message}` body
    pub fn fail(&self, endpoint: Endpoint, status: u16, message: Option<&str>) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(endpoint, (status, message.map(ToOwned::to_owned)));
    }

    /// Let `endpoint` succeed again
    pub fn recover(&self, endpoint: Endpoint) {
        self.state.lock().unwrap().failures.remove(&endpoint);
    }

    /// Hold every request to `endpoint` until a permit is added to the returned gate
    ///
    /// The request is recorded before it waits.
    pub fn hold(&self, endpoint: Endpoint) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.state
            .lock()
            .unwrap()
            .gates
            .insert(endpoint, Arc::clone(&gate));
        gate
    }

    /// Stop holding `endpoint`; requests already waiting must still be released
    pub fn stop_holding(&self, endpoint: Endpoint) {
        self.state.lock().unwrap().gates.remove(&endpoint);
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, endpoint: Endpoint) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|call| call.endpoint() == endpoint)
            .count()
    }

    pub fn server_messages(&self, id: &str) -> Vec<Message> {
        self.state
            .lock()
            .unwrap()
            .messages
            .get(&ConversationId::new(id))
            .cloned()
            .unwrap_or_default()
    }

    pub fn server_conversation(&self, id: &str) -> Option<Conversation> {
        self.state
            .lock()
            .unwrap()
            .conversations
            .iter()
            .find(|c| c.id.as_str() == id)
            .cloned()
    }

    /// Record the call, wait at the gate if one is set, then apply the failure rule
    async fn enter(&self, call: ApiCall) -> AppResult<()> {
        let endpoint = call.endpoint();
        let gate = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(call);
            state.gates.get(&endpoint).cloned()
        };
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }
        let failure = self.state.lock().unwrap().failures.get(&endpoint).cloned();
        match failure {
            Some((status, message)) => Err(ErrorResponse {
                message,
                error: None,
            }
            .into_app_error(status)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ConversationApi for MockConversationApi {
    async fn list_conversations(
        &self,
        user_id: Option<&str>,
    ) -> AppResult<ConversationListPayload> {
        self.enter(ApiCall::ListConversations {
            user_id: user_id.map(ToOwned::to_owned),
        })
        .await?;
        let state = self.state.lock().unwrap();
        let data = state.conversations.clone();
        Ok(if state.wrap_list {
            ConversationListPayload::Wrapped { data }
        } else {
            ConversationListPayload::Bare(data)
        })
    }

    async fn create_conversation(
        &self,
        request: &CreateConversationRequest,
    ) -> AppResult<Conversation> {
        self.enter(ApiCall::CreateConversation {
            patient_id: request.patient_id.clone(),
        })
        .await?;
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let conversation = Conversation {
            id: ConversationId::new(format!("conv-{}", state.next_id)),
            title: None,
            last_message: None,
            updated_at: Some(timestamp(state.next_id)),
            pinned: false,
        };
        state.conversations.insert(0, conversation.clone());
        state.messages.insert(conversation.id.clone(), Vec::new());
        Ok(conversation)
    }

    async fn update_conversation(
        &self,
        id: &ConversationId,
        request: &UpdateConversationRequest,
    ) -> AppResult<()> {
        self.enter(ApiCall::UpdateConversation {
            id: id.clone(),
            title: request.title.clone(),
        })
        .await?;
        let mut state = self.state.lock().unwrap();
        if let Some(conversation) = state.conversations.iter_mut().find(|c| &c.id == id) {
            conversation.title = Some(request.title.clone());
        }
        Ok(())
    }

    async fn list_messages(&self, id: &ConversationId) -> AppResult<Vec<Message>> {
        self.enter(ApiCall::ListMessages { id: id.clone() }).await?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .messages
            .get(id)
            .cloned()
            .unwrap_or_default())
    }

    async fn send_message(&self, id: &ConversationId, message: &NewMessage) -> AppResult<Message> {
        self.enter(ApiCall::SendMessage {
            id: id.clone(),
            content: message.content.clone(),
        })
        .await?;
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let persisted = Message {
            id: format!("msg-{}", state.next_id),
            role: message.role,
            content: message.content.clone(),
            created_at: Some(timestamp(state.next_id)),
        };
        state
            .messages
            .entry(id.clone())
            .or_default()
            .push(persisted.clone());
        if let Some(conversation) = state.conversations.iter_mut().find(|c| &c.id == id) {
            conversation.last_message = Some(persisted.content.clone());
        }
        Ok(persisted)
    }
}

/// Configuration pointing at a dummy origin, for `user_id`
pub fn test_config(user_id: Option<&str>) -> SyncConfig {
    let mut config = SyncConfig::new(ApiConfig::new(
        Url::parse("http://localhost:3000").unwrap(),
    ));
    config.user_id = user_id.map(ToOwned::to_owned);
    config
}

/// Sync client backed by `api` for [`TEST_USER`]
pub fn test_client(api: &Arc<MockConversationApi>) -> SyncClient {
    init_test_logging();
    let api: Arc<dyn ConversationApi> = api.clone();
    SyncClient::new(api, test_config(Some(TEST_USER)))
}

/// Let spawned tasks run to their next suspension point
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

/// Poll `condition` until it holds or roughly a second passes
pub async fn eventually(condition: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
