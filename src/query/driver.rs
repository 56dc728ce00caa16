// ABOUTME: Background per-key query driver and the consumer handle that keeps it alive
// ABOUTME: Runs the initial fetch, refetches on invalidation, and polls until the last consumer detaches
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 NutriAI Contributors

use super::{QueryFn, QueryOptions, QueryOutcome, QueryRunner};
use crate::cache::{CacheEntry, CacheEvent, CacheKey, CacheStore, Subscription};
use dashmap::DashMap;
use nutriai_core::constants::sync::REFETCH_SIGNAL_CAPACITY;
use nutriai_core::errors::AppResult;
use serde::de::DeserializeOwned;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, warn};
use uuid::Uuid;

pub(super) struct DriverSlot {
    id: Uuid,
    consumers: usize,
    refetch: mpsc::Sender<()>,
    pub(super) task: JoinHandle<()>,
}

impl QueryRunner {
    /// Mount a consumer of `key`
    ///
    /// With `options.enabled == false` the returned handle is inert: no
    /// subscription, no driver, no network call. Otherwise the handle counts as
    /// a subscriber until dropped. The first consumer of a key decides its
    /// polling cadence; later consumers share the running driver.
    #[must_use]
    pub fn activate(&self, key: CacheKey, query: &QueryFn, options: QueryOptions) -> QueryHandle {
        if !options.enabled {
            debug!(key = %key, "Query disabled, not fetching");
            return QueryHandle::inert(key, self.store.clone());
        }

        let (slot_id, refetch) = {
            let mut slot = self
                .drivers
                .entry(key.clone())
                .or_insert_with(|| self.spawn_driver(&key, query, options.poll_interval));
            slot.consumers += 1;
            (slot.id, slot.refetch.clone())
        };

        let (updates_tx, updates_rx) = watch::channel(0_u64);
        let listener_refetch = refetch.clone();
        let subscription = self.store.subscribe(
            &key,
            Arc::new(move |event: &CacheEvent| {
                updates_tx.send_modify(|version| *version += 1);
                if matches!(event, CacheEvent::Invalidated { .. }) {
                    // Full channel means a refetch is already queued
                    let _ = listener_refetch.try_send(());
                }
            }),
        );

        QueryHandle {
            key,
            store: self.store.clone(),
            subscription: Some(subscription),
            updates: updates_rx,
            refetch: Some(refetch),
            drivers: Arc::downgrade(&self.drivers),
            slot_id,
        }
    }

    fn spawn_driver(
        &self,
        key: &CacheKey,
        query: &QueryFn,
        poll_interval: Option<Duration>,
    ) -> DriverSlot {
        let (refetch_tx, refetch_rx) = mpsc::channel(REFETCH_SIGNAL_CAPACITY);
        let task = tokio::spawn(drive(
            self.clone(),
            key.clone(),
            Arc::clone(query),
            poll_interval,
            refetch_rx,
        ));
        debug!(key = %key, poll_interval = ?poll_interval, "Query driver started");
        DriverSlot {
            id: Uuid::new_v4(),
            consumers: 0,
            refetch: refetch_tx,
            task,
        }
    }
}

async fn drive(
    runner: QueryRunner,
    key: CacheKey,
    query: QueryFn,
    poll_interval: Option<Duration>,
    mut refetch: mpsc::Receiver<()>,
) {
    if runner.store.get(&key).as_ref().map_or(true, CacheEntry::needs_fetch) {
        report(&key, &runner.fetch(&key, &query).await);
    }

    let mut ticker = poll_interval.map(|period| {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval
    });

    loop {
        tokio::select! {
            () = next_tick(&mut ticker) => {
                debug!(key = %key, "Poll tick");
            }
            signal = refetch.recv() => {
                if signal.is_none() {
                    break;
                }
                // Collapse queued invalidations into one refetch
                while refetch.try_recv().is_ok() {}
                debug!(key = %key, "Refetching after invalidation");
            }
        }
        report(&key, &runner.fetch(&key, &query).await);
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn report(key: &CacheKey, outcome: &QueryOutcome) {
    match outcome {
        QueryOutcome::Fetched => debug!(key = %key, "Query refreshed"),
        QueryOutcome::Failed(error) => {
            warn!(key = %key, error = %error, "Background fetch failed, showing stale data");
        }
        QueryOutcome::Superseded => debug!(key = %key, "Query result superseded"),
    }
}

fn release(drivers: &Weak<DashMap<CacheKey, DriverSlot>>, key: &CacheKey, slot_id: Uuid) {
    let Some(drivers) = drivers.upgrade() else {
        return;
    };
    // Handles from a shut-down driver must not release its replacement
    let last = drivers.get_mut(key).is_some_and(|mut slot| {
        if slot.id != slot_id {
            return false;
        }
        slot.consumers = slot.consumers.saturating_sub(1);
        slot.consumers == 0
    });
    if last {
        if let Some((_, slot)) =
            drivers.remove_if(key, |_, slot| slot.id == slot_id && slot.consumers == 0)
        {
            slot.task.abort();
            debug!(key = %key, "Last consumer detached, query driver stopped");
        }
    }
}

/// A mounted query consumer
///
/// Reads go straight to the cache store. Dropping the handle detaches it; the
/// last handle for a key stops that key's polling.
pub struct QueryHandle {
    key: CacheKey,
    store: CacheStore,
    subscription: Option<Subscription>,
    updates: watch::Receiver<u64>,
    refetch: Option<mpsc::Sender<()>>,
    drivers: Weak<DashMap<CacheKey, DriverSlot>>,
    slot_id: Uuid,
}

impl QueryHandle {
    fn inert(key: CacheKey, store: CacheStore) -> Self {
        let (_, updates) = watch::channel(0);
        Self {
            key,
            store,
            subscription: None,
            updates,
            refetch: None,
            drivers: Weak::new(),
            slot_id: Uuid::nil(),
        }
    }

    /// Key this handle consumes
    #[must_use]
    pub const fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Whether the query was activated (not disabled)
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.subscription.is_some()
    }

    /// Current cache entry
    #[must_use]
    pub fn entry(&self) -> Option<CacheEntry> {
        self.store.get(&self.key)
    }

    /// Typed view of the current data
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the cached value does not match `T`
    pub fn data<T: DeserializeOwned>(&self) -> AppResult<Option<T>> {
        self.store.get_data(&self.key)
    }

    /// Ask the driver for an explicit refetch; false if the query is disabled
    pub fn refetch(&self) -> bool {
        self.refetch.as_ref().is_some_and(|tx| match tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => true,
            Err(TrySendError::Closed(())) => false,
        })
    }

    /// Wait for the next change notification on this key
    ///
    /// Returns false once the handle can no longer receive notifications.
    pub async fn changed(&mut self) -> bool {
        self.updates.changed().await.is_ok()
    }
}

impl Drop for QueryHandle {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            drop(subscription);
            release(&self.drivers, &self.key, self.slot_id);
        }
    }
}
