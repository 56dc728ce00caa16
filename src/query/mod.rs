// ABOUTME: Query runner that fetches keyed resources into the cache store
// ABOUTME: Coalesces concurrent fetches per key and drives optional polling while consumers remain
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 NutriAI Contributors

//! # Query Runner
//!
//! A query is a cache key plus a fetch operation. [`QueryRunner::fetch`] runs
//! the operation at most once per key at a time: a second caller arriving
//! while a fetch is outstanding awaits the same shared future instead of
//! issuing another network call.
//!
//! [`QueryRunner::activate`] mounts a consumer. The first consumer of a key
//! starts a background driver that performs the initial fetch, refetches on
//! invalidation, and polls when configured. Dropping the last
//! [`QueryHandle`] for a key aborts its driver immediately.
//!
//! Fetch results are only ever written to the key they were issued for, and
//! only while the key's fetch generation is unchanged, so a late response for
//! an abandoned or mutated key cannot land in the wrong slot.

mod driver;

pub use driver::QueryHandle;

use crate::cache::{CacheKey, CacheStatus, CacheStore};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use nutriai_core::errors::{AppError, AppResult};
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Type-erased fetch operation producing the JSON value to cache
pub type QueryFn = Arc<dyn Fn() -> BoxFuture<'static, AppResult<Value>> + Send + Sync>;

/// Wrap a typed async fetch operation as a [`QueryFn`]
pub fn query_fn<F, Fut, T>(fetch: F) -> QueryFn
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<T>> + Send + 'static,
    T: Serialize,
{
    Arc::new(move || {
        let pending = fetch();
        async move {
            let value = pending.await?;
            serde_json::to_value(value).map_err(AppError::from)
        }
        .boxed()
    })
}

/// Per-consumer query configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// When false the entry is left untouched and no network call is issued
    pub enabled: bool,
    /// Re-issue the fetch on this cadence while a consumer remains
    pub poll_interval: Option<Duration>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval: None,
        }
    }
}

impl QueryOptions {
    /// Options for a query that never fetches
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            poll_interval: None,
        }
    }

    /// Enable or disable the query
    #[must_use]
    pub const fn enabled_if(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Poll every `interval` while mounted
    #[must_use]
    pub const fn polling(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }
}

/// Result of one (possibly shared) fetch
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    /// The fetch succeeded and its value was written to the cache
    Fetched,
    /// The fetch failed; prior data, if any, is still cached
    Failed(Arc<AppError>),
    /// The key's generation moved on while the fetch was in flight; result discarded
    Superseded,
}

impl QueryOutcome {
    /// Whether the cache now holds this fetch's result
    #[must_use]
    pub const fn is_fetched(&self) -> bool {
        matches!(self, Self::Fetched)
    }
}

type SharedFetch = Shared<BoxFuture<'static, QueryOutcome>>;

struct InFlight {
    fetch_id: u64,
    generation: u64,
    future: SharedFetch,
}

/// Fetches keyed resources into a [`CacheStore`]
#[derive(Clone)]
pub struct QueryRunner {
    store: CacheStore,
    in_flight: Arc<DashMap<CacheKey, InFlight>>,
    drivers: Arc<DashMap<CacheKey, driver::DriverSlot>>,
    next_fetch_id: Arc<AtomicU64>,
}

impl QueryRunner {
    /// Create a runner writing into `store`
    #[must_use]
    pub fn new(store: CacheStore) -> Self {
        Self {
            store,
            in_flight: Arc::new(DashMap::new()),
            drivers: Arc::new(DashMap::new()),
            next_fetch_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Store this runner writes into
    #[must_use]
    pub const fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Fetch `key`, or attach to the fetch already outstanding for it
    ///
    /// The underlying network call runs on its own task, so it completes (and
    /// writes to its own key) even if every caller stops awaiting it.
    pub async fn fetch(&self, key: &CacheKey, query: &QueryFn) -> QueryOutcome {
        self.start_or_join(key, query).await
    }

    /// Number of fetches currently outstanding across all keys
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Keys with a live background driver
    #[must_use]
    pub fn active_keys(&self) -> Vec<CacheKey> {
        self.drivers.iter().map(|slot| slot.key().clone()).collect()
    }

    /// Stop every polling driver; outstanding fetches still settle
    pub fn shutdown(&self) {
        let keys: Vec<CacheKey> = self.active_keys();
        for key in keys {
            if let Some((_, slot)) = self.drivers.remove(&key) {
                slot.task.abort();
                debug!(key = %key, "Query driver stopped on shutdown");
            }
        }
    }

    fn start_or_join(&self, key: &CacheKey, query: &QueryFn) -> SharedFetch {
        let generation = self.store.generation(key);

        let (future, fetch_id) = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(existing) if existing.get().generation == generation => {
                debug!(key = %key, "Attaching to in-flight fetch");
                return existing.get().future.clone();
            }
            entry => {
                let fetch_id = self.next_fetch_id.fetch_add(1, Ordering::Relaxed);
                let future = self.build_fetch(key, query, generation, fetch_id);
                let in_flight = InFlight {
                    fetch_id,
                    generation,
                    future: future.clone(),
                };
                match entry {
                    Entry::Occupied(mut superseded) => {
                        superseded.insert(in_flight);
                    }
                    Entry::Vacant(vacant) => {
                        vacant.insert(in_flight);
                    }
                }
                (future, fetch_id)
            }
        };

        debug!(key = %key, fetch_id, generation, "Starting fetch");
        self.store.begin_fetch(key);
        tokio::spawn(future.clone());
        future
    }

    fn build_fetch(
        &self,
        key: &CacheKey,
        query: &QueryFn,
        generation: u64,
        fetch_id: u64,
    ) -> SharedFetch {
        let store = self.store.clone();
        let in_flight = Arc::clone(&self.in_flight);
        let key = key.clone();
        let query = Arc::clone(query);

        async move {
            let result = query().await;

            in_flight.remove_if(&key, |_, current| current.fetch_id == fetch_id);

            if store.generation(&key) != generation {
                debug!(key = %key, fetch_id, "Discarding superseded fetch result");
                return QueryOutcome::Superseded;
            }

            store.end_fetch(&key);
            match result {
                Ok(value) => {
                    store.set_raw(&key, value);
                    QueryOutcome::Fetched
                }
                Err(error) => {
                    warn!(key = %key, error = %error, "Fetch failed, keeping last known data");
                    store.set_status(&key, CacheStatus::Error, Some(error.message.clone()));
                    QueryOutcome::Failed(Arc::new(error))
                }
            }
        }
        .boxed()
        .shared()
    }
}
