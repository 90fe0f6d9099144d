//! Read-through metadata cache.
//!
//! Maps logical path -> `StorageItem` metadata with explicit invalidation.
//! This is a correctness cache, not a bounded LRU: the engine invalidates
//! on every write and delete, and `remove`/`clear` are always honored.
//!
//! Invalidation wins over an in-flight fetch: a `remove` or `clear` issued
//! after a fetch started prevents that fetch from populating the cache, so
//! the next `get_or_add` hits the backend again. Concurrent misses for the
//! same key may both fetch; the fetches are idempotent reads and the last
//! insert wins.
//!
//! Invalidation bookkeeping lives only as long as a fetch that could
//! observe it: each key's generation entry is dropped once its last
//! in-flight fetch settles (or is cancelled), so invalidating keys that
//! nothing is fetching leaves no residue.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::traits::StorageResult;
use stowage_core::StorageItem;

/// Producer invoked on a cache miss: an async fetch against the backend.
/// It is lazy; a cache hit drops it unpolled.
pub type CacheProducer = BoxFuture<'static, StorageResult<Option<StorageItem>>>;

/// Metadata cache capability in front of backend reads.
#[async_trait]
pub trait StorageCache: Send + Sync {
    /// Return the cached item for `path`, or run `producer`, cache a
    /// successful (`Some`) result, and return it. Negative lookups are not
    /// cached. A producer error is returned and caches nothing.
    async fn get_or_add(
        &self,
        path: &str,
        producer: CacheProducer,
    ) -> StorageResult<Option<StorageItem>>;

    /// Evict one key so the next read re-fetches from the backend.
    async fn remove(&self, path: &str);

    /// Evict everything; used on full storage wipe.
    async fn clear(&self);
}

/// Invalidation state for one key with at least one fetch in flight. A
/// fetch snapshots `generation` at miss time and only inserts its result
/// if the generation is unchanged at completion; `in_flight` counts the
/// fetches that can still observe the entry.
#[derive(Default)]
struct GenEntry {
    generation: u64,
    in_flight: usize,
}

#[derive(Default)]
struct CacheState {
    items: HashMap<String, StorageItem>,
    generations: HashMap<String, GenEntry>,
}

/// In-memory `StorageCache` over a mutex-guarded map. Critical sections
/// are short and never await; backend fetches run with the lock released.
#[derive(Default)]
pub struct InMemoryStorageCache {
    state: Mutex<CacheState>,
}

impl InMemoryStorageCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[cfg(test)]
    fn generation_entries(&self) -> usize {
        self.lock().generations.len()
    }
}

/// Releases one in-flight slot for a key, pruning the generation entry when
/// no other fetch holds it. Runs on drop so a cancelled fetch cleans up too.
struct InFlightGuard<'a> {
    cache: &'a InMemoryStorageCache,
    path: &'a str,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.cache.lock();
        let prune = match state.generations.get_mut(self.path) {
            Some(entry) => {
                entry.in_flight -= 1;
                entry.in_flight == 0
            }
            None => false,
        };
        if prune {
            state.generations.remove(self.path);
        }
    }
}

#[async_trait]
impl StorageCache for InMemoryStorageCache {
    async fn get_or_add(
        &self,
        path: &str,
        producer: CacheProducer,
    ) -> StorageResult<Option<StorageItem>> {
        let generation = {
            let mut state = self.lock();
            if let Some(item) = state.items.get(path) {
                return Ok(Some(item.clone()));
            }
            let entry = state.generations.entry(path.to_string()).or_default();
            entry.in_flight += 1;
            entry.generation
        };

        // Lock released while the backend fetch runs. Dropping this future
        // mid-fetch (cancellation) releases the in-flight slot through the
        // guard and leaves the cache untouched.
        let _guard = InFlightGuard { cache: self, path };
        let fetched = producer.await?;

        let mut state = self.lock();
        let unchanged = state
            .generations
            .get(path)
            .map(|entry| entry.generation)
            == Some(generation);
        if unchanged {
            if let Some(item) = &fetched {
                state.items.insert(path.to_string(), item.clone());
            }
        }
        drop(state);
        Ok(fetched)
    }

    async fn remove(&self, path: &str) {
        let mut state = self.lock();
        state.items.remove(path);
        // Only an in-flight fetch can observe the bump; with none there is
        // nothing to invalidate and nothing to keep.
        if let Some(entry) = state.generations.get_mut(path) {
            entry.generation += 1;
        }
    }

    async fn clear(&self) {
        let mut state = self.lock();
        state.items.clear();
        for entry in state.generations.values_mut() {
            entry.generation += 1;
        }
    }
}
