// ABOUTME: Unified error handling for the chat synchronization client
// ABOUTME: Defines ErrorCode, AppError, and the backend failure payload shape
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 NutriAI Contributors

//! # Unified Error Handling System
//!
//! Every fallible operation in the client returns [`AppResult`]. Errors carry a
//! stable [`ErrorCode`], a human-readable message (the text shown to the user
//! when a send fails), optional context, and an optional source for chaining.

use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Standard error codes used throughout the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    // Authentication & Authorization (1000-1999)
    /// Backend rejected the request as unauthenticated
    #[serde(rename = "AUTH_REQUIRED")]
    AuthRequired = 1000,
    /// Backend rejected the request as forbidden
    #[serde(rename = "PERMISSION_DENIED")]
    PermissionDenied = 1004,

    // Rate Limiting (2000-2999)
    /// Backend throttled the request
    #[serde(rename = "RATE_LIMIT_EXCEEDED")]
    RateLimitExceeded = 2000,

    // Validation (3000-3999)
    /// Caller supplied unusable input
    #[serde(rename = "INVALID_INPUT")]
    InvalidInput = 3000,

    // Resource Management (4000-4999)
    /// Resource does not exist
    #[serde(rename = "RESOURCE_NOT_FOUND")]
    ResourceNotFound = 4000,
    /// Resource already exists
    #[serde(rename = "RESOURCE_ALREADY_EXISTS")]
    ResourceAlreadyExists = 4001,
    /// Resource is busy with another operation (e.g. a send already in flight)
    #[serde(rename = "RESOURCE_LOCKED")]
    ResourceLocked = 4002,

    // External Services (5000-5999)
    /// Backend answered with a failure status
    #[serde(rename = "EXTERNAL_SERVICE_ERROR")]
    ExternalServiceError = 5000,
    /// Backend could not be reached
    #[serde(rename = "EXTERNAL_SERVICE_UNAVAILABLE")]
    ExternalServiceUnavailable = 5001,

    // Configuration (6000-6999)
    /// Configuration error encountered
    #[serde(rename = "CONFIG_ERROR")]
    ConfigError = 6000,
    /// Configuration value is invalid
    #[serde(rename = "CONFIG_INVALID")]
    ConfigInvalid = 6002,

    // Internal Errors (9000-9999)
    /// Unexpected internal failure
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError = 9000,
    /// Payload could not be encoded or decoded
    #[serde(rename = "SERIALIZATION_ERROR")]
    SerializationError = 9003,
}

impl ErrorCode {
    /// Classify a non-2xx HTTP status returned by the backend
    #[must_use]
    pub const fn from_http_status(status: u16) -> Self {
        match status {
            400 | 422 => Self::InvalidInput,
            401 => Self::AuthRequired,
            403 => Self::PermissionDenied,
            404 => Self::ResourceNotFound,
            409 => Self::ResourceAlreadyExists,
            423 => Self::ResourceLocked,
            429 => Self::RateLimitExceeded,
            502..=504 => Self::ExternalServiceUnavailable,
            _ => Self::ExternalServiceError,
        }
    }

    /// Get a user-friendly description of this error
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::AuthRequired => "Authentication is required to access this resource",
            Self::PermissionDenied => "You do not have permission to perform this action",
            Self::RateLimitExceeded => "Rate limit exceeded. Please slow down your requests",
            Self::InvalidInput => "The provided input is invalid",
            Self::ResourceNotFound => "The requested resource was not found",
            Self::ResourceAlreadyExists => "A resource with this identifier already exists",
            Self::ResourceLocked => "The resource is busy with another operation",
            Self::ExternalServiceError => "The backend service reported an error",
            Self::ExternalServiceUnavailable => "The backend service is currently unavailable",
            Self::ConfigError => "Configuration error encountered",
            Self::ConfigInvalid => "Configuration is invalid",
            Self::InternalError => "An internal error occurred",
            Self::SerializationError => "Data serialization/deserialization failed",
        }
    }
}

/// Additional context that can be attached to errors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// HTTP status returned by the backend, when the error came from a response
    pub http_status: Option<u16>,
    /// Resource the failing operation targeted (cache key, conversation id)
    pub resource_id: Option<String>,
    /// Additional key-value context
    pub details: serde_json::Value,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            http_status: None,
            resource_id: None,
            details: serde_json::Value::Object(serde_json::Map::new()),
        }
    }
}

/// Unified error type for the client
#[derive(Debug, Error)]
pub struct AppError {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Additional context
    pub context: ErrorContext,
    /// Source error for error chaining
    #[source]
    pub source: Option<Box<dyn StdError + Send + Sync>>,
}

impl AppError {
    /// Create a new `AppError` with the given code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Attach the HTTP status the backend answered with
    #[must_use]
    pub const fn with_http_status(mut self, status: u16) -> Self {
        self.context.http_status = Some(status);
        self
    }

    /// Add a resource ID to the error context
    #[must_use]
    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.context.resource_id = Some(resource_id.into());
        self
    }

    /// Add details to the error context
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.context.details = details;
        self
    }

    /// Add a source error for error chaining
    #[must_use]
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Text suitable for a blocking user notification
    #[must_use]
    pub fn user_message(&self) -> &str {
        &self.message
    }

    /// Rebuild an equivalent error without its source chain
    ///
    /// Coalesced fetches share one `Arc<AppError>`; callers that need an owned
    /// error get this detached copy.
    #[must_use]
    pub fn detached(&self) -> Self {
        Self {
            code: self.code,
            message: self.message.clone(),
            context: self.context.clone(),
            source: None,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.description(), self.message)
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// Failure payload the backend may attach to a non-2xx response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// User-visible failure text
    #[serde(default)]
    pub message: Option<String>,
    /// Machine-readable error tag, when the backend sends one
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorResponse {
    /// Build an `AppError` for a failed response, preferring the payload's message
    #[must_use]
    pub fn into_app_error(self, status: u16) -> AppError {
        let message = self
            .message
            .filter(|m| !m.trim().is_empty())
            .or(self.error)
            .unwrap_or_else(|| format!("HTTP {status}"));
        AppError::new(ErrorCode::from_http_status(status), message).with_http_status(status)
    }
}

/// Convenience functions for creating common errors
impl AppError {
    /// Invalid input
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Resource not found
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ResourceNotFound,
            format!("{} not found", resource.into()),
        )
    }

    /// Another operation holds the resource
    pub fn busy(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ResourceLocked, message)
    }

    /// Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigInvalid, message)
    }

    /// Serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SerializationError, message)
    }

    /// External service error
    pub fn external_service(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ExternalServiceError,
            format!("{}: {}", service.into(), message.into()),
        )
    }

    /// Backend unreachable (connect failure, timeout)
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ExternalServiceUnavailable, message)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::serialization(error.to_string()).with_source(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_from_http_status() {
        assert_eq!(ErrorCode::from_http_status(401), ErrorCode::AuthRequired);
        assert_eq!(ErrorCode::from_http_status(404), ErrorCode::ResourceNotFound);
        assert_eq!(ErrorCode::from_http_status(429), ErrorCode::RateLimitExceeded);
        assert_eq!(
            ErrorCode::from_http_status(503),
            ErrorCode::ExternalServiceUnavailable
        );
        assert_eq!(
            ErrorCode::from_http_status(500),
            ErrorCode::ExternalServiceError
        );
    }

    #[test]
    fn test_error_response_prefers_payload_message() {
        let payload: ErrorResponse =
            serde_json::from_str(r#"{"message":"Conversation is archived"}"#).unwrap();
        let error = payload.into_app_error(409);

        assert_eq!(error.user_message(), "Conversation is archived");
        assert_eq!(error.code, ErrorCode::ResourceAlreadyExists);
        assert_eq!(error.context.http_status, Some(409));
    }

    #[test]
    fn test_error_response_without_message_uses_status() {
        let error = ErrorResponse::default().into_app_error(500);
        assert_eq!(error.user_message(), "HTTP 500");
    }

    #[test]
    fn test_detached_keeps_code_and_message() {
        let error = AppError::busy("send in progress").with_resource_id("messages:c1");
        let copy = error.detached();

        assert_eq!(copy.code, ErrorCode::ResourceLocked);
        assert_eq!(copy.message, "send in progress");
        assert_eq!(copy.context.resource_id.as_deref(), Some("messages:c1"));
    }
}
