// ABOUTME: Output formatting helpers for nutriai-cli
// ABOUTME: Renders the conversation sidebar, message threads, and send results as plain text
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 NutriAI Contributors

use nutriai_core::models::{Conversation, ConversationId, Message, MessageRole};
use nutriai_sync::cache::{CacheEntry, CacheStatus};
use nutriai_sync::conversation_flow::SendReport;

/// Print the sidebar list
pub fn conversations(conversations: &[Conversation]) {
    if conversations.is_empty() {
        println!("No conversations yet");
        return;
    }
    println!("{}", "=".repeat(60));
    for conversation in conversations {
        let pin = if conversation.pinned { "*" } else { " " };
        let updated = conversation
            .updated_at
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!(
            "{pin} {:<24} {}  {updated}",
            conversation.id,
            conversation.display_title()
        );
        println!("    {}", conversation.preview());
    }
    println!("{}", "=".repeat(60));
}

/// Print one thread
pub fn thread(id: &ConversationId, messages: &[Message]) {
    println!("\nConversation {id}");
    println!("{}", "-".repeat(60));
    if messages.is_empty() {
        println!("(no messages)");
    }
    for message in messages {
        let author = match message.role {
            MessageRole::User => "You",
            MessageRole::Assistant => "NutriAI",
        };
        let pending = if message.is_placeholder() {
            " (sending)"
        } else {
            ""
        };
        println!("{author}{pending}:");
        for line in message.content.lines() {
            println!("  {line}");
        }
    }
}

/// Print the result of a successful send
pub fn sent(report: &SendReport) {
    if let Some(created) = &report.created {
        println!("Created conversation {}", created.id);
    }
    if let Some(title) = &report.title {
        println!("Title: {title}");
    }
    println!(
        "Message {} saved in conversation {}",
        report.message.id, report.conversation_id
    );
}

/// Subtle indicator that the list shown is stale after a failed refresh
pub fn stale_notice(entry: &CacheEntry) {
    if entry.status == CacheStatus::Error {
        let reason = entry.error.as_deref().unwrap_or("refresh failed");
        println!("(showing last known list: {reason})");
    }
}
