// ABOUTME: Core types and constants for the NutriAI chat synchronization client
// ABOUTME: Foundation crate with error handling, conversation/message models, and constants
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 NutriAI Contributors

#![deny(unsafe_code)]

//! # NutriAI Core
//!
//! Foundation crate providing shared types and constants for the NutriAI
//! synchronization client. This crate is designed to change infrequently, enabling
//! incremental compilation benefits in the workspace.
//!
//! ## Modules
//!
//! - **errors**: Unified error handling with `AppError` and `ErrorCode`
//! - **constants**: Sentinel identifiers, polling cadence, and display limits
//! - **models**: Conversation and message records as exchanged with the backend

/// Unified error handling system with standard error codes
pub mod errors;

/// Application constants organized by domain
pub mod constants;

/// Conversation and message data models
pub mod models;
