// ABOUTME: Integration tests for the observable cache store
// ABOUTME: Covers notification ordering, pattern invalidation, subscriber counts, and exact restore
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 NutriAI Contributors
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use nutriai_core::models::{ConversationId, Message};
use nutriai_sync::cache::{CacheEvent, CacheKey, CacheStatus, CacheStore, Subscription};
use serde_json::json;
use std::sync::{Arc, Mutex};

fn thread(id: &str) -> CacheKey {
    CacheKey::messages(&ConversationId::new(id))
}

type Recorded = Arc<Mutex<Vec<CacheEvent>>>;

fn recorder(store: &CacheStore, key: &CacheKey) -> (Recorded, Subscription) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let subscription = store.subscribe(
        key,
        Arc::new(move |event: &CacheEvent| sink.lock().unwrap().push(event.clone())),
    );
    (events, subscription)
}

#[test]
fn test_events_follow_mutation_order() {
    common::init_test_logging();
    let store = CacheStore::new();
    let key = thread("c1");
    let (events, _sub) = recorder(&store, &key);

    store.set(&key, &json!([{"id": "m1"}])).unwrap();
    store.set_status(&key, CacheStatus::Error, Some("HTTP 500".to_owned()));
    assert!(store.invalidate(&key));
    store.reset(&key);

    let events = events.lock().unwrap();
    assert_eq!(
        *events,
        vec![
            CacheEvent::Updated { key: key.clone() },
            CacheEvent::StatusChanged {
                key: key.clone(),
                status: CacheStatus::Error
            },
            CacheEvent::Invalidated { key: key.clone() },
            CacheEvent::Reset { key },
        ]
    );
}

#[test]
fn test_listeners_only_hear_their_key() {
    let store = CacheStore::new();
    let (c1_events, _c1) = recorder(&store, &thread("c1"));
    let (c2_events, _c2) = recorder(&store, &thread("c2"));

    store.set(&thread("c2"), &json!([])).unwrap();

    assert!(c1_events.lock().unwrap().is_empty());
    assert_eq!(c2_events.lock().unwrap().len(), 1);
}

#[test]
fn test_invalidate_missing_entry_is_silent() {
    let store = CacheStore::new();
    let key = thread("never-fetched");
    let (events, _sub) = recorder(&store, &key);

    assert!(!store.invalidate(&key));
    assert!(events.lock().unwrap().is_empty());
    assert!(store.get(&key).is_none());
}

#[test]
fn test_invalidate_pattern_marks_only_message_threads() {
    let store = CacheStore::new();
    let list = CacheKey::conversations(Some("user-1"));
    store.set(&list, &json!([])).unwrap();
    store.set(&thread("c1"), &json!([])).unwrap();
    store.set(&thread("c2"), &json!([])).unwrap();

    let count = store
        .invalidate_pattern(CacheKey::all_messages_pattern())
        .unwrap();

    assert_eq!(count, 2);
    assert!(store.get(&thread("c1")).unwrap().stale);
    assert!(store.get(&thread("c2")).unwrap().stale);
    assert!(!store.get(&list).unwrap().stale);
}

#[test]
fn test_invalidate_pattern_rejects_bad_glob() {
    let store = CacheStore::new();
    let err = store.invalidate_pattern("messages:[").unwrap_err();
    assert_eq!(err.code, nutriai_core::errors::ErrorCode::InvalidInput);
}

#[test]
fn test_set_clears_stale_and_error() {
    let store = CacheStore::new();
    let key = thread("c1");
    store.set(&key, &json!(["old"])).unwrap();
    store.set_status(&key, CacheStatus::Error, Some("timeout".to_owned()));
    store.invalidate(&key);

    store.set(&key, &json!(["new"])).unwrap();

    let entry = store.get(&key).unwrap();
    assert_eq!(entry.status, CacheStatus::Success);
    assert_eq!(entry.error, None);
    assert!(!entry.stale);
    assert_eq!(entry.data, Some(json!(["new"])));
    assert!(entry.updated_at.is_some());
}

#[test]
fn test_subscriber_count_reported_on_entry() {
    let store = CacheStore::new();
    let key = thread("c1");
    store.set(&key, &json!([])).unwrap();

    let first = store.subscribe(&key, Arc::new(|_: &CacheEvent| {}));
    let second = store.subscribe(&key, Arc::new(|_: &CacheEvent| {}));
    assert_eq!(store.get(&key).unwrap().subscriber_count, 2);

    drop(first);
    assert_eq!(store.get(&key).unwrap().subscriber_count, 1);

    store.clear_subscribers();
    assert_eq!(store.subscriber_count(&key), 0);
    // Dropping after teardown is harmless
    drop(second);
    assert_eq!(store.subscriber_count(&key), 0);
}

#[test]
fn test_listener_may_read_store_during_notification() {
    let store = CacheStore::new();
    let key = thread("c1");
    let seen = Arc::new(Mutex::new(None));

    let reader = store.clone();
    let slot = Arc::clone(&seen);
    let _sub = store.subscribe(
        &key,
        Arc::new(move |event: &CacheEvent| {
            let messages: Option<Vec<Message>> = reader.get_data(event.key()).unwrap();
            *slot.lock().unwrap() = messages.map(|m| m.len());
        }),
    );

    store.set(&key, &vec![Message::optimistic("hi")]).unwrap();

    assert_eq!(*seen.lock().unwrap(), Some(1));
}

#[test]
fn test_restore_puts_back_exact_value() {
    let store = CacheStore::new();
    let key = thread("c1");
    let original = json!([{"id": "m1", "role": "user", "content": "hola", "createdAt": null}]);
    store.set_raw(&key, original.clone());

    store.set_raw(&key, json!([]));
    store.restore(&key, Some(original.clone()));

    assert_eq!(store.get(&key).unwrap().data, Some(original));
}

#[test]
fn test_cancel_fetches_creates_entry_without_data() {
    let store = CacheStore::new();
    let key = thread("c1");

    let generation = store.cancel_fetches(&key);

    let entry = store.get(&key).unwrap();
    assert_eq!(generation, 1);
    assert_eq!(entry.data, None);
    assert!(!entry.is_fetching);
    assert!(store.keys().contains(&key));
}
