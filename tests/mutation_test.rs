// ABOUTME: Integration tests for the optimistic mutation executor
// ABOUTME: Covers patch-before-await, exact snapshot rollback, commit invalidation, and racing fetches
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 NutriAI Contributors
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use common::{Endpoint, MockConversationApi};
use nutriai_core::errors::{AppError, ErrorCode};
use nutriai_core::models::{ConversationId, Message, MessageRole, NewMessage};
use nutriai_sync::cache::{CacheKey, CacheStatus, CacheStore};
use nutriai_sync::mutation::{Committed, MutationExecutor, MutationOutcome, MutationState};
use nutriai_sync::queries;
use serde_json::{json, Value};
use tokio::sync::oneshot;

fn thread_key(id: &str) -> CacheKey {
    CacheKey::messages(&ConversationId::new(id))
}

fn push_optimistic(content: &'static str) -> impl FnOnce(Vec<Message>) -> Vec<Message> {
    move |mut thread| {
        thread.push(Message::optimistic(content));
        thread
    }
}

fn server_thread() -> Value {
    // Carries a field the client does not model, so restore must be byte-exact
    json!([
        {"id": "m1", "role": "user", "content": "Is kefir good for gut health?", "createdAt": "2025-02-01T08:00:00Z", "metadata": {"source": "web"}},
        {"id": "m2", "role": "assistant", "content": "Yes, it is rich in probiotics.", "createdAt": "2025-02-01T08:00:05Z"}
    ])
}

#[tokio::test]
async fn test_failed_write_restores_identical_snapshot() {
    common::init_test_logging();
    let store = CacheStore::new();
    let executor = MutationExecutor::new(store.clone());
    let key = thread_key("c1");
    store.set_raw(&key, server_thread());

    let outcome = executor
        .execute(&key, push_optimistic("And yogurt?"), || async {
            Err::<Committed<()>, _>(AppError::external_service("NutriAI API", "HTTP 500"))
        })
        .await;

    assert_eq!(store.get(&key).unwrap().data, Some(server_thread()));
    let MutationOutcome::RolledBack { error, mutation } = outcome else {
        panic!("expected rollback");
    };
    assert_eq!(error.code, ErrorCode::ExternalServiceError);
    assert_eq!(mutation.state, MutationState::RolledBack);
    assert_eq!(mutation.snapshot, Some(server_thread()));
    assert_eq!(mutation.optimistic_value.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_failed_write_on_empty_key_restores_absence() {
    let store = CacheStore::new();
    let executor = MutationExecutor::new(store.clone());
    let key = thread_key("new-conversation");

    let outcome = executor
        .execute(&key, push_optimistic("First message"), || async {
            Err::<Committed<()>, _>(AppError::unavailable("connection refused"))
        })
        .await;

    assert!(outcome.mutation().snapshot.is_none());
    let entry = store.get(&key).unwrap();
    assert_eq!(entry.data, None);
    assert_eq!(entry.status, CacheStatus::Idle);
}

#[tokio::test]
async fn test_optimistic_value_visible_before_write_resolves() {
    let store = CacheStore::new();
    let executor = MutationExecutor::new(store.clone());
    let key = thread_key("c1");
    store.set_raw(&key, server_thread());
    let (release, released) = oneshot::channel::<()>();

    let mutation = executor.execute(&key, push_optimistic("What about miso?"), || async move {
        released.await.unwrap();
        Ok::<_, AppError>(Committed::new("m3"))
    });
    let observe = async {
        let thread: Vec<Message> = store.get_data(&key).unwrap().unwrap();
        assert_eq!(thread.len(), 3);
        assert!(thread[2].is_placeholder());
        assert_eq!(thread[2].role, MessageRole::User);
        release.send(()).unwrap();
    };
    let (outcome, ()) = tokio::join!(mutation, observe);

    assert_eq!(outcome.mutation().state, MutationState::Committed);
    assert_eq!(outcome.into_result().unwrap(), "m3");
    // The server response is never spliced in; the key is just marked stale
    let entry = store.get(&key).unwrap();
    assert!(entry.stale);
    assert_eq!(entry.data.unwrap().as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_commit_invalidates_extra_keys() {
    let store = CacheStore::new();
    let executor = MutationExecutor::new(store.clone());
    let key = thread_key("c1");
    let list = CacheKey::conversations(Some(common::TEST_USER));
    store.set_raw(&list, json!([]));
    store.set_raw(&thread_key("c2"), json!([]));

    let outcome = executor
        .execute(&key, push_optimistic("Hi"), || async {
            Ok::<_, AppError>(Committed::new(()).invalidating(list.clone()))
        })
        .await;

    assert!(matches!(outcome, MutationOutcome::Committed { .. }));
    assert!(store.get(&key).unwrap().stale);
    assert!(store.get(&list).unwrap().stale);
    assert!(!store.get(&thread_key("c2")).unwrap().stale);
}

#[tokio::test]
async fn test_commit_refetches_active_thread() {
    let api = MockConversationApi::new();
    api.seed_conversation("c1", None, &[(MessageRole::User, "Hello")]);
    let client = common::test_client(&api);
    let id = ConversationId::new("c1");
    let key = thread_key("c1");

    let handle = client.messages_query(&id);
    assert!(common::eventually(|| handle.entry().is_some_and(|e| e.status == CacheStatus::Success)).await);

    let outcome = client
        .executor()
        .execute(&key, push_optimistic("Any snack ideas?"), || async {
            let message = client
                .api()
                .send_message(&id, &NewMessage::user("Any snack ideas?"))
                .await?;
            Ok::<_, AppError>(Committed::new(message))
        })
        .await;
    assert!(outcome.into_result().is_ok());

    assert!(
        common::eventually(|| {
            handle
                .data::<Vec<Message>>()
                .unwrap()
                .is_some_and(|t| t.len() == 2 && t.iter().all(|m| !m.is_placeholder()))
        })
        .await
    );
    assert_eq!(api.count(Endpoint::ListMessages), 2);
}

#[tokio::test]
async fn test_fetch_in_flight_cannot_overwrite_patch() {
    let api = MockConversationApi::new();
    api.seed_conversation("c1", None, &[(MessageRole::User, "Hello")]);
    let client = common::test_client(&api);
    let key = thread_key("c1");
    let gate = api.hold(Endpoint::ListMessages);

    let (_, fetch, _) = queries::messages(client.api(), &ConversationId::new("c1"));
    let pending = {
        let runner = client.runner().clone();
        let key = key.clone();
        tokio::spawn(async move { runner.fetch(&key, &fetch).await })
    };
    common::settle().await;

    let applied = client
        .executor()
        .apply(&key, push_optimistic("Is honey ok?"))
        .unwrap();
    assert_eq!(applied.record().state, MutationState::Applied);

    gate.add_permits(1);
    assert!(!pending.await.unwrap().is_fetched());

    let thread: Vec<Message> = client.store().get_data(&key).unwrap().unwrap();
    assert_eq!(thread.len(), 1);
    assert!(thread[0].is_placeholder());

    let outcome = applied
        .settle(|| async { Ok::<_, AppError>(Committed::new(())) })
        .await;
    assert_eq!(outcome.mutation().state, MutationState::Committed);
}

#[tokio::test]
async fn test_dropping_unsettled_mutation_rolls_back() {
    let store = CacheStore::new();
    let executor = MutationExecutor::new(store.clone());
    let key = thread_key("c1");
    store.set_raw(&key, server_thread());

    let applied = executor.apply(&key, push_optimistic("abandoned")).unwrap();
    assert_eq!(store.get(&key).unwrap().data.unwrap().as_array().unwrap().len(), 3);

    drop(applied);

    assert_eq!(store.get(&key).unwrap().data, Some(server_thread()));
}

#[tokio::test]
async fn test_undecodable_data_leaves_cache_untouched() {
    let store = CacheStore::new();
    let executor = MutationExecutor::new(store.clone());
    let key = thread_key("c1");
    store.set_raw(&key, json!({"unexpected": true}));
    let generation = store.generation(&key);

    let outcome = executor
        .execute(&key, push_optimistic("ignored"), || async {
            Ok::<_, AppError>(Committed::new(()))
        })
        .await;

    let MutationOutcome::RolledBack { error, .. } = outcome else {
        panic!("expected rollback");
    };
    assert_eq!(error.code, ErrorCode::SerializationError);
    assert_eq!(store.get(&key).unwrap().data, Some(json!({"unexpected": true})));
    assert_eq!(store.generation(&key), generation);
}
