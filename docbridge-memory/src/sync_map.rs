//! A concurrent ordered map for in-memory repositories.
//!
//! [`SyncMap`] wraps a `BTreeMap` in an async read-write lock: many readers or one writer at
//! a time. Readers only ever see whole values. Iteration follows key order, so predicate
//! scans return the match with the lowest key first.

use std::{collections::BTreeMap, fmt, sync::Arc};
use mea::rwlock::RwLock;
use tracing::trace;

/// Injectable, cloneable concurrent map. Clones share the same entries.
pub struct SyncMap<K, V> {
    inner: Arc<RwLock<BTreeMap<K, V>>>,
}

impl<K, V> Clone for SyncMap<K, V> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<K, V> fmt::Debug for SyncMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncMap").finish_non_exhaustive()
    }
}

impl<K: Ord, V> Default for SyncMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord, V> FromIterator<(K, V)> for SyncMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(entries: I) -> Self {
        Self { inner: Arc::new(RwLock::new(entries.into_iter().collect())) }
    }
}

impl<K: Ord, V> SyncMap<K, V> {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self { inner: Arc::new(RwLock::new(BTreeMap::new())) }
    }

    /// Creates a map pre-seeded with `entries`. Later duplicates win.
    pub fn with_entries(entries: impl IntoIterator<Item = (K, V)>) -> Self {
        entries.into_iter().collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Stores `value` under `key`, returning the previous value.
    pub async fn store(&self, key: K, value: V) -> Option<V> {
        trace!("storing entry");
        self.inner.write().await.insert(key, value)
    }

    /// Stores `value` under `key` only if the key is vacant.
    ///
    /// # Errors
    ///
    /// Hands `value` back when the key is already taken.
    pub async fn insert_new(&self, key: K, value: V) -> Result<(), V> {
        let mut entries = self.inner.write().await;
        if entries.contains_key(&key) {
            return Err(value);
        }

        trace!("inserting entry");
        entries.insert(key, value);
        Ok(())
    }

    /// Removes `key`, returning its value if it was present.
    pub async fn delete(&self, key: &K) -> Option<V> {
        trace!("deleting entry");
        self.inner.write().await.remove(key)
    }
}

impl<K: Ord, V: Clone> SyncMap<K, V> {
    /// Returns a copy of the value under `key`.
    pub async fn load(&self, key: &K) -> Option<V> {
        self.inner.read().await.get(key).cloned()
    }

    /// Returns the first value, in key order, satisfying `predicate`.
    pub async fn find(&self, predicate: impl Fn(&V) -> bool) -> Option<V> {
        self.inner
            .read()
            .await
            .values()
            .find(|value| predicate(value))
            .cloned()
    }

    /// Returns every value satisfying `predicate`, in key order.
    pub async fn find_all(&self, predicate: impl Fn(&V) -> bool) -> Vec<V> {
        self.inner
            .read()
            .await
            .values()
            .filter(|value| predicate(value))
            .cloned()
            .collect()
    }

    /// Returns the first value satisfying `predicate`, or inserts the entry built by
    /// `create` when nothing does.
    ///
    /// The scan and the insert happen under one write lock, so concurrent callers never
    /// both insert. The flag is `true` when the entry was created.
    pub async fn find_or_insert(&self, predicate: impl Fn(&V) -> bool, create: impl FnOnce() -> (K, V)) -> (V, bool) {
        let mut entries = self.inner.write().await;

        if let Some(existing) = entries.values().find(|value| predicate(value)) {
            return (existing.clone(), false);
        }

        let (key, value) = create();
        trace!("inserting entry after missed scan");
        entries.insert(key, value.clone());
        (value, true)
    }

    /// Returns a copy of every value, in key order.
    pub async fn values(&self) -> Vec<V> {
        self.inner.read().await.values().cloned().collect()
    }
}
