// ABOUTME: Explicitly constructed sync client bundling cache store, query runner, and REST API
// ABOUTME: Replaces any process-wide query client; shutdown stops polling and detaches subscribers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 NutriAI Contributors

use crate::api::{ConversationApi, HttpConversationApi};
use crate::cache::CacheStore;
use crate::config::SyncConfig;
use crate::conversation_flow::ConversationCreationFlow;
use crate::mutation::MutationExecutor;
use crate::queries;
use crate::query::{QueryHandle, QueryRunner};
use nutriai_core::errors::AppResult;
use nutriai_core::models::ConversationId;
use std::sync::Arc;
use tracing::info;

/// Owner of every shared sync component
///
/// Clones share the same store and runner. Call [`SyncClient::shutdown`] to
/// tear everything down; handles that outlive it become inert.
#[derive(Clone)]
pub struct SyncClient {
    store: CacheStore,
    runner: QueryRunner,
    executor: MutationExecutor,
    api: Arc<dyn ConversationApi>,
    config: SyncConfig,
}

impl SyncClient {
    /// Build a client around an existing API implementation
    #[must_use]
    pub fn new(api: Arc<dyn ConversationApi>, config: SyncConfig) -> Self {
        let store = CacheStore::new();
        Self {
            runner: QueryRunner::new(store.clone()),
            executor: MutationExecutor::new(store.clone()),
            store,
            api,
            config,
        }
    }

    /// Build a client talking HTTP to the configured backend
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed
    pub fn connect(config: SyncConfig) -> AppResult<Self> {
        let api = HttpConversationApi::new(&config.api)?;
        info!(base_url = %config.api.base_url, "Sync client connected");
        Ok(Self::new(Arc::new(api), config))
    }

    /// Shared cache store
    #[must_use]
    pub const fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Shared query runner
    #[must_use]
    pub const fn runner(&self) -> &QueryRunner {
        &self.runner
    }

    /// Mutation executor over the shared store
    #[must_use]
    pub const fn executor(&self) -> &MutationExecutor {
        &self.executor
    }

    /// REST boundary
    #[must_use]
    pub const fn api(&self) -> &Arc<dyn ConversationApi> {
        &self.api
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Mount the polled conversation list for the configured user
    #[must_use]
    pub fn conversations_query(&self) -> QueryHandle {
        let (key, fetch, options) = queries::conversations(
            &self.api,
            self.config.user_id.as_deref(),
            self.config.polling.conversation_poll_interval(),
        );
        self.runner.activate(key, &fetch, options)
    }

    /// Mount the message thread of `conversation_id`
    #[must_use]
    pub fn messages_query(&self, conversation_id: &ConversationId) -> QueryHandle {
        let (key, fetch, options) = queries::messages(&self.api, conversation_id);
        self.runner.activate(key, &fetch, options)
    }

    /// A creation flow writing through this client's store
    #[must_use]
    pub fn creation_flow(&self) -> ConversationCreationFlow {
        ConversationCreationFlow::new(
            Arc::clone(&self.api),
            self.store.clone(),
            self.config.user_id.clone(),
            self.config.api.patient_id.clone(),
        )
    }

    /// Stop all polling and detach all subscribers
    pub fn shutdown(&self) {
        self.runner.shutdown();
        self.store.clear_subscribers();
        info!("Sync client shut down");
    }
}
