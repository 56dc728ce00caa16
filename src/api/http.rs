// ABOUTME: HTTP client for the NutriAI conversation REST endpoints
// ABOUTME: Maps non-2xx responses to AppError using the backend's message payload when present
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 NutriAI Contributors

//! NutriAI REST client
//!
//! # Example
//! ```rust,no_run
//! use nutriai_sync::api::{ConversationApi, HttpConversationApi};
//! use nutriai_sync::config::ApiConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ApiConfig::from_env()?;
//! let api = HttpConversationApi::new(&config)?;
//! let conversations = api.list_conversations(Some("user-42")).await?.into_conversations();
//! # Ok(())
//! # }
//! ```

use super::ConversationApi;
use crate::config::ApiConfig;
use nutriai_core::errors::{AppError, AppResult, ErrorResponse};
use nutriai_core::models::{
    Conversation, ConversationId, ConversationListPayload, CreateConversationRequest, Message,
    NewMessage, UpdateConversationRequest,
};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

const SERVICE: &str = "NutriAI API";

/// reqwest-backed [`ConversationApi`]
#[derive(Clone)]
pub struct HttpConversationApi {
    http_client: Client,
    base_url: Url,
}

impl HttpConversationApi {
    /// Build a client with the configured transport timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed
    pub fn new(config: &ApiConfig) -> AppResult<Self> {
        let http_client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http_client,
            base_url: config.base_url.clone(),
        })
    }

    /// `{base}/api/conversations/{segments...}`
    fn endpoint(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| AppError::config(format!("Base URL '{}' cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(["api", "conversations"])
            .extend(segments);
        Ok(url)
    }

    async fn send(request: RequestBuilder) -> AppResult<Response> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                AppError::unavailable(format!("{SERVICE} unreachable: {e}")).with_source(e)
            } else {
                AppError::external_service(SERVICE, e.to_string()).with_source(e)
            }
        })?;

        let status = response.status();
        debug!(url = %response.url(), status = status.as_u16(), "API response");
        if status.is_success() {
            return Ok(response);
        }

        // A body that is not the expected error shape still yields "HTTP <status>"
        let payload = response.json::<ErrorResponse>().await.unwrap_or_default();
        Err(payload.into_app_error(status.as_u16()))
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> AppResult<T> {
        response.json::<T>().await.map_err(|e| {
            AppError::serialization(format!("{SERVICE} returned an unexpected body: {e}"))
                .with_source(e)
        })
    }
}

#[async_trait::async_trait]
impl ConversationApi for HttpConversationApi {
    async fn list_conversations(
        &self,
        user_id: Option<&str>,
    ) -> AppResult<ConversationListPayload> {
        let mut request = self.http_client.get(self.endpoint(&[])?);
        if let Some(user_id) = user_id {
            request = request.query(&[("userId", user_id)]);
        }
        Self::decode(Self::send(request).await?).await
    }

    async fn create_conversation(
        &self,
        request: &CreateConversationRequest,
    ) -> AppResult<Conversation> {
        let request = self.http_client.post(self.endpoint(&[])?).json(request);
        Self::decode(Self::send(request).await?).await
    }

    async fn update_conversation(
        &self,
        id: &ConversationId,
        request: &UpdateConversationRequest,
    ) -> AppResult<()> {
        let request = self
            .http_client
            .patch(self.endpoint(&[id.as_str()])?)
            .json(request);
        Self::send(request).await?;
        Ok(())
    }

    async fn list_messages(&self, id: &ConversationId) -> AppResult<Vec<Message>> {
        let request = self.http_client.get(self.endpoint(&[id.as_str(), "messages"])?);
        Self::decode(Self::send(request).await?).await
    }

    async fn send_message(&self, id: &ConversationId, message: &NewMessage) -> AppResult<Message> {
        let request = self
            .http_client
            .post(self.endpoint(&[id.as_str(), "messages"])?)
            .json(message);
        Self::decode(Self::send(request).await?).await
    }
}
