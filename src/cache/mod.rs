//! Durable result cache
//!
//! A keyed cache consulted before any network call. Entries are bounded by
//! write order: once the count crosses `max_entries`, the oldest-written
//! entries are dropped until `retain_entries` remain. Reads never reorder.
//!
//! Every `store` writes the whole cache through to the key-value storage under
//! the cache's name. The persisted blob is read once at construction; a blob
//! that cannot be read or parsed yields an empty cache.

use crate::config::CacheConfig;
use crate::storage::{load_json, store_json, SharedStorage};
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

/// A cached payload with the time it was written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub key: String,
    pub payload: T,
    pub stored_at: DateTime<Utc>,
}

struct CacheState<T> {
    entries: HashMap<String, CacheEntry<T>>,
    /// Keys from oldest to newest write
    order: VecDeque<String>,
}

impl<T> CacheState<T> {
    fn empty() -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }
}

/// Bounded, write-through cache of fetch results
pub struct ResultCache<T> {
    name: String,
    max_entries: usize,
    retain_entries: usize,
    ttl: Option<Duration>,
    storage: Option<SharedStorage>,
    state: Mutex<CacheState<T>>,
}

impl<T> ResultCache<T>
where
    T: Clone + Serialize + DeserializeOwned,
{
    /// Creates an empty cache without persistence
    pub fn in_memory(max_entries: usize, retain_entries: usize) -> Self {
        Self {
            name: "memory".to_string(),
            max_entries,
            retain_entries: retain_entries.min(max_entries),
            ttl: None,
            storage: None,
            state: Mutex::new(CacheState::empty()),
        }
    }

    /// Loads the cache persisted under `name`
    ///
    /// # Arguments
    ///
    /// * `name` - Storage key of the persisted blob
    /// * `storage` - Backing key-value store
    /// * `config` - Bounds and optional TTL
    pub fn load(name: &str, storage: SharedStorage, config: &CacheConfig) -> Self {
        let persisted: Vec<CacheEntry<T>> = {
            let guard = storage.lock().unwrap_or_else(PoisonError::into_inner);
            match load_json(&*guard, name) {
                Ok(Some(entries)) => entries,
                Ok(None) => Vec::new(),
                Err(e) => {
                    tracing::warn!("Cache '{}' is unreadable, starting empty: {}", name, e);
                    Vec::new()
                }
            }
        };

        let mut state = CacheState::empty();
        for entry in persisted {
            if state.entries.contains_key(&entry.key) {
                state.order.retain(|k| k != &entry.key);
            }
            state.order.push_back(entry.key.clone());
            state.entries.insert(entry.key.clone(), entry);
        }

        tracing::debug!("Loaded {} entries into cache '{}'", state.entries.len(), name);

        let cache = Self {
            name: name.to_string(),
            max_entries: config.max_entries,
            retain_entries: config.retain_entries.min(config.max_entries),
            ttl: config.ttl_hours.map(|h| Duration::hours(h as i64)),
            storage: Some(storage),
            state: Mutex::new(state),
        };

        {
            let mut state = cache.lock_state();
            cache.evict(&mut state);
        }
        cache
    }

    /// Sets an expiry after which entries are no longer returned
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, CacheState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_fresh(&self, entry: &CacheEntry<T>, now: DateTime<Utc>) -> bool {
        match self.ttl {
            Some(ttl) => now - entry.stored_at <= ttl,
            None => true,
        }
    }

    /// Returns the cached payload for `key` if present and not expired
    pub fn lookup(&self, key: &str) -> Option<T> {
        let state = self.lock_state();
        state
            .entries
            .get(key)
            .filter(|entry| self.is_fresh(entry, Utc::now()))
            .map(|entry| entry.payload.clone())
    }

    /// Returns true if `key` has a live entry
    pub fn contains(&self, key: &str) -> bool {
        let state = self.lock_state();
        state
            .entries
            .get(key)
            .is_some_and(|entry| self.is_fresh(entry, Utc::now()))
    }

    /// Inserts or overwrites `key`, evicts past the bound, and persists
    pub fn store(&self, key: &str, payload: T) {
        let mut state = self.lock_state();

        if state.entries.contains_key(key) {
            state.order.retain(|k| k != key);
        }
        state.order.push_back(key.to_string());
        state.entries.insert(
            key.to_string(),
            CacheEntry {
                key: key.to_string(),
                payload,
                stored_at: Utc::now(),
            },
        );

        self.evict(&mut state);
        self.persist(&state);
    }

    /// Removes every entry, including the persisted blob
    pub fn clear(&self) {
        let mut state = self.lock_state();
        state.entries.clear();
        state.order.clear();

        if let Some(storage) = &self.storage {
            let mut guard = storage.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(e) = guard.remove_value(&self.name) {
                tracing::warn!("Failed to clear cache '{}': {}", self.name, e);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock_state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys from oldest to newest write
    pub fn keys(&self) -> Vec<String> {
        self.lock_state().order.iter().cloned().collect()
    }

    /// Every entry, oldest write first
    pub fn entries(&self) -> Vec<CacheEntry<T>> {
        let state = self.lock_state();
        state
            .order
            .iter()
            .filter_map(|k| state.entries.get(k).cloned())
            .collect()
    }

    fn evict(&self, state: &mut CacheState<T>) {
        if state.entries.len() <= self.max_entries {
            return;
        }

        let before = state.entries.len();
        while state.entries.len() > self.retain_entries {
            match state.order.pop_front() {
                Some(oldest) => {
                    state.entries.remove(&oldest);
                }
                None => break,
            }
        }

        tracing::debug!(
            "Cache '{}' evicted {} entries",
            self.name,
            before - state.entries.len()
        );
    }

    fn persist(&self, state: &CacheState<T>) {
        let Some(storage) = &self.storage else {
            return;
        };

        let ordered: Vec<&CacheEntry<T>> = state
            .order
            .iter()
            .filter_map(|k| state.entries.get(k))
            .collect();

        let mut guard = storage.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = store_json(&mut *guard, &self.name, &ordered) {
            tracing::warn!("Failed to persist cache '{}': {}", self.name, e);
        }
    }
}

/// Derives the cache key for a translation request
///
/// The text is trimmed and hashed together with both language tags, so the
/// same text under a different language pair never shares a key.
pub fn text_fingerprint(text: &str, source_lang: &str, target_lang: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_lang.as_bytes());
    hasher.update([0u8]);
    hasher.update(target_lang.as_bytes());
    hasher.update([0u8]);
    hasher.update(text.trim().as_bytes());
    format!(
        "{}-{}-{}",
        source_lang,
        target_lang,
        hex::encode(hasher.finalize())
    )
}
