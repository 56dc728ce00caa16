// ABOUTME: Observable in-memory cache store with keyed entries and synchronous notification
// ABOUTME: All cache mutation goes through set/set_status/invalidate; subscribers see only settled state
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 NutriAI Contributors

use super::{CacheEntry, CacheEvent, CacheKey, CacheStatus};
use chrono::Utc;
use dashmap::DashMap;
use nutriai_core::errors::{AppError, AppResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Weak};
use tracing::debug;
use uuid::Uuid;

/// Subscriber callback
pub type Listener = Arc<dyn Fn(&CacheEvent) + Send + Sync>;

struct StoreInner {
    entries: DashMap<CacheKey, CacheEntry>,
    subscribers: DashMap<CacheKey, Vec<(Uuid, Listener)>>,
}

/// Keyed table of cached query results with subscriber notification
///
/// Uses `Arc<DashMap>` so clones share one table; the query runner's polling
/// tasks and the mutation executor all write through the same handle.
/// No entry guard is held while listeners run, so a listener may read the store.
#[derive(Clone)]
pub struct CacheStore {
    inner: Arc<StoreInner>,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                entries: DashMap::new(),
                subscribers: DashMap::new(),
            }),
        }
    }

    /// Snapshot of the entry for `key`, if one exists
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let mut entry = self.inner.entries.get(key).map(|e| e.value().clone())?;
        entry.subscriber_count = self.subscriber_count(key);
        Some(entry)
    }

    /// Typed view of the entry data
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the stored value does not match `T`
    pub fn get_data<T: DeserializeOwned>(&self, key: &CacheKey) -> AppResult<Option<T>> {
        self.get(key)
            .map_or(Ok(None), |entry| entry.data_as::<T>())
    }

    /// Replace the entry data with a serializable value
    ///
    /// # Errors
    ///
    /// Returns a serialization error if `value` cannot be encoded
    pub fn set<T: Serialize>(&self, key: &CacheKey, value: &T) -> AppResult<()> {
        let data = serde_json::to_value(value)?;
        self.set_raw(key, data);
        Ok(())
    }

    /// Replace the entry data, mark it `success` and fresh, then notify
    pub fn set_raw(&self, key: &CacheKey, data: Value) {
        {
            let mut entry = self
                .inner
                .entries
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::empty(key.clone()));
            entry.data = Some(data);
            entry.status = CacheStatus::Success;
            entry.error = None;
            entry.stale = false;
            entry.updated_at = Some(Utc::now());
        }
        debug!(key = %key, "Cache entry updated");
        self.notify(&CacheEvent::Updated { key: key.clone() });
    }

    /// Change the entry status, keeping its data, then notify
    pub fn set_status(&self, key: &CacheKey, status: CacheStatus, error: Option<String>) {
        {
            let mut entry = self
                .inner
                .entries
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::empty(key.clone()));
            entry.status = status;
            entry.error = error;
        }
        self.notify(&CacheEvent::StatusChanged {
            key: key.clone(),
            status,
        });
    }

    /// Mark the entry stale so active consumers refetch it
    ///
    /// Returns `false` when no entry exists for `key` (nothing to refetch).
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let existed = self
            .inner
            .entries
            .get_mut(key)
            .map(|mut entry| entry.stale = true)
            .is_some();
        if existed {
            debug!(key = %key, "Cache entry invalidated");
            self.notify(&CacheEvent::Invalidated { key: key.clone() });
        }
        existed
    }

    /// Invalidate every entry whose key display form matches a glob
    ///
    /// # Errors
    ///
    /// Returns an error if `pattern` is not a valid glob
    pub fn invalidate_pattern(&self, pattern: &str) -> AppResult<u64> {
        let glob_pattern = glob::Pattern::new(pattern).map_err(|e| {
            AppError::invalid_input(format!("Invalid glob pattern '{pattern}': {e}"))
        })?;

        // Collect keys first; invalidate() takes its own entry guard
        let keys: Vec<CacheKey> = self
            .inner
            .entries
            .iter()
            .filter(|e| glob_pattern.matches(&e.key().to_string()))
            .map(|e| e.key().clone())
            .collect();

        let removed = keys.iter().filter(|key| self.invalidate(key)).count() as u64;
        Ok(removed)
    }

    /// Clear the entry back to the never-fetched state, then notify
    pub fn reset(&self, key: &CacheKey) {
        {
            let Some(mut entry) = self.inner.entries.get_mut(key) else {
                return;
            };
            entry.data = None;
            entry.status = CacheStatus::Idle;
            entry.error = None;
            entry.stale = false;
            entry.updated_at = None;
        }
        self.notify(&CacheEvent::Reset { key: key.clone() });
    }

    /// Put back exactly `snapshot`; `None` means the entry held no data
    pub fn restore(&self, key: &CacheKey, snapshot: Option<Value>) {
        match snapshot {
            Some(data) => self.set_raw(key, data),
            None => self.reset(key),
        }
    }

    /// Register a listener for `key`; dropping the returned handle detaches it
    pub fn subscribe(&self, key: &CacheKey, listener: Listener) -> Subscription {
        let id = Uuid::new_v4();
        self.inner
            .subscribers
            .entry(key.clone())
            .or_default()
            .push((id, listener));
        debug!(key = %key, subscription = %id, "Subscriber attached");
        Subscription {
            store: Arc::downgrade(&self.inner),
            key: key.clone(),
            id,
            detached: false,
        }
    }

    /// Number of live consumers of `key`
    #[must_use]
    pub fn subscriber_count(&self, key: &CacheKey) -> usize {
        self.inner.subscribers.get(key).map_or(0, |s| s.len())
    }

    /// Detach every subscriber (teardown)
    pub fn clear_subscribers(&self) {
        self.inner.subscribers.clear();
    }

    /// Current fetch generation for `key`
    #[must_use]
    pub fn generation(&self, key: &CacheKey) -> u64 {
        self.inner.entries.get(key).map_or(0, |e| e.generation)
    }

    /// Revoke the right of every in-flight fetch for `key` to write its result
    pub fn cancel_fetches(&self, key: &CacheKey) -> u64 {
        let mut entry = self
            .inner
            .entries
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::empty(key.clone()));
        entry.generation += 1;
        entry.is_fetching = false;
        debug!(key = %key, generation = entry.generation, "In-flight fetches cancelled");
        entry.generation
    }

    /// Record that a fetch started; `loading` is only set when no data is held
    pub(crate) fn begin_fetch(&self, key: &CacheKey) {
        let show_loading = {
            let mut entry = self
                .inner
                .entries
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::empty(key.clone()));
            entry.is_fetching = true;
            entry.data.is_none() && entry.status != CacheStatus::Loading
        };
        if show_loading {
            self.set_status(key, CacheStatus::Loading, None);
        }
    }

    pub(crate) fn end_fetch(&self, key: &CacheKey) {
        if let Some(mut entry) = self.inner.entries.get_mut(key) {
            entry.is_fetching = false;
        }
    }

    /// Keys currently held
    #[must_use]
    pub fn keys(&self) -> Vec<CacheKey> {
        self.inner.entries.iter().map(|e| e.key().clone()).collect()
    }

    fn notify(&self, event: &CacheEvent) {
        // Clone the listener list so no map guard is held during callbacks
        let listeners: Vec<Listener> = self
            .inner
            .subscribers
            .get(event.key())
            .map(|subs| subs.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default();
        for listener in listeners {
            listener(event);
        }
    }
}

fn detach(store: &Weak<StoreInner>, key: &CacheKey, id: Uuid) {
    let Some(inner) = store.upgrade() else {
        return;
    };
    let now_empty = inner.subscribers.get_mut(key).is_some_and(|mut subs| {
        subs.retain(|(sub_id, _)| *sub_id != id);
        subs.is_empty()
    });
    if now_empty {
        inner.subscribers.remove_if(key, |_, subs| subs.is_empty());
    }
    debug!(key = %key, subscription = %id, "Subscriber detached");
}

/// Live subscription to one cache key
///
/// Counts as a consumer of the key until dropped or [`Subscription::unsubscribe`]d.
pub struct Subscription {
    store: Weak<StoreInner>,
    key: CacheKey,
    id: Uuid,
    detached: bool,
}

impl Subscription {
    /// Key this subscription listens to
    #[must_use]
    pub const fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Detach explicitly
    pub fn unsubscribe(mut self) {
        self.detach_once();
    }

    fn detach_once(&mut self) {
        if !self.detached {
            self.detached = true;
            detach(&self.store, &self.key, self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach_once();
    }
}
