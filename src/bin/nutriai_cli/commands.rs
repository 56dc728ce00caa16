// ABOUTME: Subcommand implementations for nutriai-cli
// ABOUTME: Drives the query runner and dashboard orchestrator against the configured backend
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 NutriAI Contributors

use crate::display;
use nutriai_core::errors::{AppError, AppResult};
use nutriai_core::models::{Conversation, ConversationId, Message};
use nutriai_sync::cache::{CacheEvent, CacheKey};
use nutriai_sync::client::SyncClient;
use nutriai_sync::dashboard::Dashboard;
use nutriai_sync::queries;
use nutriai_sync::query::QueryOutcome;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

const WATCH_CHANNEL_CAPACITY: usize = 16;

fn into_result(outcome: QueryOutcome) -> AppResult<()> {
    match outcome {
        QueryOutcome::Fetched | QueryOutcome::Superseded => Ok(()),
        QueryOutcome::Failed(error) => Err(error.detached()),
    }
}

/// Fetch and print the conversation list
pub async fn list(client: &SyncClient) -> AppResult<()> {
    let (key, fetch, _) = queries::conversations(
        client.api(),
        client.config().user_id.as_deref(),
        client.config().polling.conversation_poll_interval(),
    );
    into_result(client.runner().fetch(&key, &fetch).await)?;

    let conversations: Vec<Conversation> = client.store().get_data(&key)?.unwrap_or_default();
    display::conversations(&conversations);
    Ok(())
}

/// Fetch and print one thread
pub async fn show(client: &SyncClient, id: ConversationId) -> AppResult<()> {
    if id.is_unsaved() {
        return Err(AppError::invalid_input(format!(
            "'{id}' is the placeholder for an unsaved conversation"
        )));
    }
    let (key, fetch, _) = queries::messages(client.api(), &id);
    into_result(client.runner().fetch(&key, &fetch).await)?;

    let messages: Vec<Message> = client.store().get_data(&key)?.unwrap_or_default();
    display::thread(&id, &messages);
    Ok(())
}

/// Send `text`, creating a conversation when `conversation` is `None`
pub async fn send(
    client: &SyncClient,
    conversation: Option<ConversationId>,
    text: String,
) -> AppResult<()> {
    let dashboard = Dashboard::mount(client.clone());
    match conversation {
        Some(id) => dashboard.select(Some(id)),
        None => dashboard.start_new_conversation(),
    }

    let sent = dashboard.send(text).await;
    dashboard.unmount();

    match sent? {
        Some(report) => {
            display::sent(&report);
            show(client, report.conversation_id).await
        }
        None => {
            println!("Nothing to send: message is blank");
            Ok(())
        }
    }
}

/// Print the conversation list whenever a poll changes it, until Ctrl-C
pub async fn watch(client: &SyncClient) -> AppResult<()> {
    let Some(user_id) = client.config().user_id.clone() else {
        return Err(AppError::invalid_input(
            "watch needs a signed-in user (--user or NUTRIAI_USER_ID)",
        ));
    };

    let dashboard = Dashboard::mount(client.clone());
    let key = CacheKey::conversations(Some(&user_id));
    let (tx, mut rx) = mpsc::channel(WATCH_CHANNEL_CAPACITY);
    let subscription = client.store().subscribe(
        &key,
        Arc::new(move |event: &CacheEvent| {
            if matches!(
                event,
                CacheEvent::Updated { .. } | CacheEvent::StatusChanged { .. }
            ) {
                let _ = tx.try_send(());
            }
        }),
    );

    info!(user_id = %user_id, "Watching conversation list");
    println!("Watching conversations for {user_id} (Ctrl-C to stop)");
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.map_err(|e| AppError::internal(format!("Failed to listen for Ctrl-C: {e}")))?;
                break;
            }
            Some(()) = rx.recv() => {
                if let Some(entry) = dashboard.conversations_entry() {
                    display::stale_notice(&entry);
                }
                display::conversations(&dashboard.conversations()?);
            }
        }
    }

    drop(subscription);
    dashboard.unmount();
    Ok(())
}
