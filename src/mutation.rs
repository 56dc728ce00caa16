// ABOUTME: Optimistic mutation executor with exact-snapshot rollback
// ABOUTME: Patches the cache before the remote write, then invalidates on success or restores on failure
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 NutriAI Contributors

//! # Mutation Executor
//!
//! [`MutationExecutor::execute`] runs one optimistic write:
//!
//! 1. cancel in-flight fetches for the key so none can land on top of the patch
//! 2. snapshot the entry's raw data (absent stays absent)
//! 3. write the optimistic value before awaiting anything
//! 4. await the remote write
//! 5. on success, invalidate the key and any extra keys the write names; the
//!    server response is never spliced into the cache
//! 6. on failure, restore the snapshot exactly and return the error
//!
//! There are no automatic retries; resubmitting is a new user action.

use crate::cache::{CacheKey, CacheStore};
use nutriai_core::errors::AppError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use tracing::{debug, info, warn};

/// Lifecycle of a pending mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    /// Optimistic value written to the cache
    Applied,
    /// Remote write in flight
    Committing,
    /// Remote write succeeded; affected keys invalidated
    Committed,
    /// Remote write failed; snapshot restored
    RolledBack,
}

/// Record of one optimistic change
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMutation {
    /// Patched key
    pub key: CacheKey,
    /// Exact prior data; `None` when the entry held nothing
    pub snapshot: Option<Value>,
    /// Value substituted into the cache
    pub optimistic_value: Value,
    /// Current state
    pub state: MutationState,
}

/// Successful remote write plus the extra keys it made stale
#[derive(Debug, Clone)]
pub struct Committed<T> {
    /// Value returned by the remote write
    pub value: T,
    /// Keys to invalidate in addition to the patched key
    pub invalidate: Vec<CacheKey>,
}

impl<T> Committed<T> {
    /// Wrap a remote result with no extra invalidations
    pub const fn new(value: T) -> Self {
        Self {
            value,
            invalidate: Vec::new(),
        }
    }

    /// Also invalidate `key` on commit
    #[must_use]
    pub fn invalidating(mut self, key: CacheKey) -> Self {
        self.invalidate.push(key);
        self
    }
}

/// Settled mutation
#[derive(Debug)]
pub enum MutationOutcome<T> {
    /// The write succeeded and affected keys were invalidated
    Committed {
        /// Remote result
        value: T,
        /// Final record (state `Committed`)
        mutation: PendingMutation,
    },
    /// The write failed and the snapshot is already back in the cache
    RolledBack {
        /// Failure to surface to the user
        error: AppError,
        /// Final record (state `RolledBack`)
        mutation: PendingMutation,
    },
}

impl<T> MutationOutcome<T> {
    /// Record of the mutation regardless of outcome
    #[must_use]
    pub const fn mutation(&self) -> &PendingMutation {
        match self {
            Self::Committed { mutation, .. } | Self::RolledBack { mutation, .. } => mutation,
        }
    }

    /// Collapse into a `Result`, dropping the record
    ///
    /// # Errors
    ///
    /// Returns the write error when the mutation was rolled back
    pub fn into_result(self) -> Result<T, AppError> {
        match self {
            Self::Committed { value, .. } => Ok(value),
            Self::RolledBack { error, .. } => Err(error),
        }
    }
}

/// Applies optimistic cache changes around remote writes
#[derive(Clone)]
pub struct MutationExecutor {
    store: CacheStore,
}

impl MutationExecutor {
    /// Create an executor patching `store`
    #[must_use]
    pub const fn new(store: CacheStore) -> Self {
        Self { store }
    }

    /// Run one optimistic mutation against `key`
    ///
    /// Shorthand for [`MutationExecutor::apply`] followed by
    /// [`AppliedMutation::settle`]. The optimistic value is in the cache before
    /// the first suspension point of the returned future.
    pub async fn execute<D, T, B, W, Fut>(
        &self,
        key: &CacheKey,
        build_optimistic: B,
        remote_write: W,
    ) -> MutationOutcome<T>
    where
        D: Serialize + DeserializeOwned + Default,
        B: FnOnce(D) -> D,
        W: FnOnce() -> Fut,
        Fut: Future<Output = Result<Committed<T>, AppError>>,
    {
        match self.apply(key, build_optimistic) {
            Ok(applied) => applied.settle(remote_write).await,
            Err(error) => {
                warn!(key = %key, error = %error, "Optimistic patch could not be built");
                let snapshot = self.store.get(key).and_then(|entry| entry.data);
                MutationOutcome::RolledBack {
                    error,
                    mutation: PendingMutation {
                        key: key.clone(),
                        optimistic_value: snapshot.clone().unwrap_or(Value::Null),
                        snapshot,
                        state: MutationState::RolledBack,
                    },
                }
            }
        }
    }

    /// Synchronously snapshot `key` and write the optimistic value
    ///
    /// `build_optimistic` receives the current data decoded as `D`
    /// (`D::default()` when absent). Nothing is written if decoding fails.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the cached data does not decode as `D`
    pub fn apply<D, B>(
        &self,
        key: &CacheKey,
        build_optimistic: B,
    ) -> Result<AppliedMutation, AppError>
    where
        D: Serialize + DeserializeOwned + Default,
        B: FnOnce(D) -> D,
    {
        let snapshot = self.store.get(key).and_then(|entry| entry.data);
        let current: D = match &snapshot {
            Some(value) => serde_json::from_value(value.clone())?,
            None => D::default(),
        };
        let optimistic_value = serde_json::to_value(build_optimistic(current))?;

        self.store.cancel_fetches(key);
        self.store.set_raw(key, optimistic_value.clone());
        debug!(key = %key, "Optimistic value applied");

        Ok(AppliedMutation {
            store: self.store.clone(),
            mutation: PendingMutation {
                key: key.clone(),
                snapshot,
                optimistic_value,
                state: MutationState::Applied,
            },
            settled: false,
        })
    }
}

/// An optimistic patch waiting for its remote write
///
/// Dropping it unsettled (for example when the owning task is cancelled)
/// restores the snapshot.
pub struct AppliedMutation {
    store: CacheStore,
    mutation: PendingMutation,
    settled: bool,
}

impl AppliedMutation {
    /// Current record
    #[must_use]
    pub const fn record(&self) -> &PendingMutation {
        &self.mutation
    }

    /// Await `remote_write`, then invalidate on success or restore on failure
    pub async fn settle<T, W, Fut>(mut self, remote_write: W) -> MutationOutcome<T>
    where
        W: FnOnce() -> Fut,
        Fut: Future<Output = Result<Committed<T>, AppError>>,
    {
        self.mutation.state = MutationState::Committing;
        let result = remote_write().await;
        self.settled = true;
        let mut mutation = self.mutation.clone();

        match result {
            Ok(committed) => {
                self.store.invalidate(&mutation.key);
                for extra in &committed.invalidate {
                    self.store.invalidate(extra);
                }
                mutation.state = MutationState::Committed;
                debug!(key = %mutation.key, extra = committed.invalidate.len(), "Mutation committed");
                MutationOutcome::Committed {
                    value: committed.value,
                    mutation,
                }
            }
            Err(error) => {
                rollback(&self.store, &mut mutation);
                info!(key = %mutation.key, error = %error, "Mutation rolled back");
                MutationOutcome::RolledBack { error, mutation }
            }
        }
    }
}

impl Drop for AppliedMutation {
    fn drop(&mut self) {
        if !self.settled {
            rollback(&self.store, &mut self.mutation);
            warn!(key = %self.mutation.key, "Unsettled mutation dropped, snapshot restored");
        }
    }
}

fn rollback(store: &CacheStore, mutation: &mut PendingMutation) {
    // A fetch that began during the write must not land after the restore
    store.cancel_fetches(&mutation.key);
    store.restore(&mutation.key, mutation.snapshot.clone());
    // Mounted consumers lost the cancelled fetch and must read again
    if store.subscriber_count(&mutation.key) > 0 {
        store.invalidate(&mutation.key);
    }
    mutation.state = MutationState::RolledBack;
}
