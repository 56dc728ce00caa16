// ABOUTME: Main library entry point for the NutriAI chat synchronization client
// ABOUTME: Keeps a cached, optimistic local view of conversations and messages in sync with the backend
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 NutriAI Contributors

#![deny(unsafe_code)]

//! # NutriAI Sync
//!
//! Client-side data synchronization for the NutriAI nutrition-assistant chat.
//! The local cache is a recoverable projection of the most recent successful
//! server interactions: reads are coalesced and polled, writes are applied
//! optimistically and rolled back exactly on failure.
//!
//! ## Architecture
//!
//! - **cache**: keyed observable store of query results
//! - **query**: fetch coalescing, enable/disable, and polling drivers
//! - **mutation**: optimistic writes with snapshot rollback
//! - **`conversation_flow`**: lazy conversation creation on first send
//! - **dashboard**: active selection, composer draft, and query wiring
//! - **client**: explicitly constructed owner of the above, with teardown
//! - **api**: REST boundary (`ConversationApi`) and its reqwest implementation
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use nutriai_sync::client::SyncClient;
//! use nutriai_sync::config::SyncConfig;
//! use nutriai_sync::dashboard::Dashboard;
//! use nutriai_core::errors::AppResult;
//!
//! #[tokio::main]
//! async fn main() -> AppResult<()> {
//!     let client = SyncClient::connect(SyncConfig::from_env()?)?;
//!     let dashboard = Dashboard::mount(client.clone());
//!
//!     dashboard.start_new_conversation();
//!     if let Some(report) = dashboard.send("What should I eat after a long run?").await? {
//!         println!("Saved in conversation {}", report.conversation_id);
//!     }
//!
//!     dashboard.unmount();
//!     client.shutdown();
//!     Ok(())
//! }
//! ```

/// REST boundary consumed by the sync core
pub mod api;

/// Observable cache store
pub mod cache;

/// Explicitly constructed sync client
pub mod client;

/// Environment-driven configuration
pub mod config;

/// Lazy conversation creation on first send
pub mod conversation_flow;

/// Dashboard orchestrator
pub mod dashboard;

/// Structured logging setup
pub mod logging;

/// Optimistic mutation executor
pub mod mutation;

/// Query definitions for conversations and messages
pub mod queries;

/// Query runner with request coalescing and polling
pub mod query;
