// ABOUTME: Environment-driven configuration for the backend connection and polling cadence
// ABOUTME: Malformed numeric values fall back to defaults; an unparseable base URL is rejected
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 NutriAI Contributors

use nutriai_core::constants::{env_vars, sentinels, sync};
use nutriai_core::errors::{AppError, AppResult};
use std::env;
use std::time::Duration;
use url::Url;

/// Backend connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Origin serving `/api/conversations`
    pub base_url: Url,
    /// Transport-boundary timeout for every request
    pub request_timeout_secs: u64,
    /// Sent as `patientId` when creating a conversation
    pub patient_id: String,
}

impl ApiConfig {
    /// Load from `NUTRIAI_API_BASE_URL`, `NUTRIAI_REQUEST_TIMEOUT_SECS`, `NUTRIAI_PATIENT_ID`
    ///
    /// # Errors
    ///
    /// Returns a `ConfigInvalid` error if the base URL does not parse
    pub fn from_env() -> AppResult<Self> {
        let raw_url =
            env::var(env_vars::API_BASE_URL).unwrap_or_else(|_| sync::DEFAULT_API_BASE_URL.into());
        Ok(Self {
            base_url: parse_base_url(&raw_url)?,
            request_timeout_secs: env::var(env_vars::REQUEST_TIMEOUT_SECS)
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(sync::DEFAULT_REQUEST_TIMEOUT_SECS),
            patient_id: env::var(env_vars::PATIENT_ID)
                .ok()
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| sentinels::DEFAULT_PATIENT_ID.into()),
        })
    }

    /// Settings for `base_url` with default timeout and patient id
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            request_timeout_secs: sync::DEFAULT_REQUEST_TIMEOUT_SECS,
            patient_id: sentinels::DEFAULT_PATIENT_ID.into(),
        }
    }

    /// Request timeout as a `Duration`
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Background refresh cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingConfig {
    /// Conversation list poll interval in milliseconds
    pub conversation_poll_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            conversation_poll_ms: sync::CONVERSATION_POLL_INTERVAL_MS,
        }
    }
}

impl PollingConfig {
    /// Load from `NUTRIAI_CONVERSATION_POLL_MS`
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            conversation_poll_ms: env::var(env_vars::CONVERSATION_POLL_MS)
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|ms| *ms > 0)
                .unwrap_or(sync::CONVERSATION_POLL_INTERVAL_MS),
        }
    }

    /// Conversation list poll interval
    #[must_use]
    pub const fn conversation_poll_interval(&self) -> Duration {
        Duration::from_millis(self.conversation_poll_ms)
    }
}

/// Complete client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Backend connection
    pub api: ApiConfig,
    /// Polling cadence
    pub polling: PollingConfig,
    /// Signed-in user; the conversation list is not fetched without one
    pub user_id: Option<String>,
}

impl SyncConfig {
    /// Configuration for `api` with default polling and no signed-in user
    #[must_use]
    pub fn new(api: ApiConfig) -> Self {
        Self {
            api,
            polling: PollingConfig::default(),
            user_id: None,
        }
    }

    /// Load every section from the environment
    ///
    /// # Errors
    ///
    /// Returns an error if any section is invalid
    pub fn from_env() -> AppResult<Self> {
        Ok(Self {
            api: ApiConfig::from_env()?,
            polling: PollingConfig::from_env(),
            user_id: env::var(env_vars::USER_ID)
                .ok()
                .filter(|id| !id.trim().is_empty()),
        })
    }
}

fn parse_base_url(raw: &str) -> AppResult<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| {
        AppError::config(format!("Invalid {}: '{raw}': {e}", env_vars::API_BASE_URL)).with_source(e)
    })?;
    if url.cannot_be_a_base() {
        return Err(AppError::config(format!(
            "Invalid {}: '{raw}' cannot carry a path",
            env_vars::API_BASE_URL
        )));
    }
    Ok(url)
}
