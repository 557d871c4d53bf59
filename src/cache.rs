//! Score cache
//!
//! Short-lived cache for derived values: section scores, store scores and
//! response listings. Entries are dropped explicitly by the service after each
//! write, and additionally carry the store's write generation from before the
//! value was computed. A lookup with a newer generation is a miss, so a
//! computation racing a write can never publish a stale score.

use dashmap::DashMap;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::CacheConfig;
use crate::scoring::{Section, SectionScore, StoreScore};
use crate::store::SectionResponses;

/// Cache key for a derived value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    SectionScore { store: String, section: String },
    StoreScore { store: String },
    Responses { store: String, section: String },
}

impl CacheKey {
    pub fn section_score(store: &str, section: &str) -> Self {
        CacheKey::SectionScore {
            store: store.to_string(),
            section: section.to_string(),
        }
    }

    pub fn store_score(store: &str) -> Self {
        CacheKey::StoreScore {
            store: store.to_string(),
        }
    }

    pub fn responses(store: &str, section: &str) -> Self {
        CacheKey::Responses {
            store: store.to_string(),
            section: section.to_string(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::SectionScore { store, section } => {
                write!(f, "section_score_{}_{}", store, section)
            }
            CacheKey::StoreScore { store } => write!(f, "store_score_{}", store),
            CacheKey::Responses { store, section } => write!(f, "responses_{}_{}", store, section),
        }
    }
}

/// A cached derived value
#[derive(Debug, Clone)]
pub enum CachedValue {
    Section(SectionScore),
    Store(StoreScore),
    Responses(SectionResponses),
}

struct CacheEntry {
    value: CachedValue,
    generation: u64,
    inserted_at: Instant,
}

/// Cache statistics for the debug endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub ttl_secs: u64,
    pub max_entries: usize,
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// TTL cache of derived scores
pub struct ScoreCache {
    entries: DashMap<CacheKey, CacheEntry>,
    enabled: bool,
    ttl: Duration,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ScoreCache {
    pub fn new(enabled: bool, ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            enabled,
            ttl,
            max_entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(
            config.enabled,
            Duration::from_secs(config.score_ttl_secs),
            config.max_entries,
        )
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Look up a value computed at `generation`
    pub fn get(&self, key: &CacheKey, generation: u64) -> Option<CachedValue> {
        if !self.enabled {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let found = match self.entries.get(key) {
            Some(entry) if self.is_fresh(&entry, generation) => Some(entry.value.clone()),
            Some(_) => None,
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        match found {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            None => {
                // stale or expired
                self.entries
                    .remove_if(key, |_, entry| !self.is_fresh(entry, generation));
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a value computed from data at `generation`
    pub fn insert(&self, key: CacheKey, value: CachedValue, generation: u64) {
        if !self.enabled || self.max_entries == 0 {
            return;
        }

        if self.entries.len() >= self.max_entries && !self.entries.contains_key(&key) {
            self.evict_oldest();
        }

        self.entries.insert(
            key,
            CacheEntry {
                value,
                generation,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop one entry, returning whether it existed
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            debug!(key = %key, "Cache entry invalidated");
        }
        removed
    }

    /// Drop everything derived from one section: its score, its response
    /// listing and the store score
    pub fn invalidate_section(&self, store: &str, section: &str) {
        self.invalidate(&CacheKey::store_score(store));
        self.invalidate(&CacheKey::section_score(store, section));
        self.invalidate(&CacheKey::responses(store, section));
    }

    /// Drop the store score and every fixed section of a store
    pub fn invalidate_store(&self, store: &str) {
        self.invalidate(&CacheKey::store_score(store));
        for section in Section::ALL {
            self.invalidate(&CacheKey::section_score(store, section.as_str()));
            self.invalidate(&CacheKey::responses(store, section.as_str()));
        }
    }

    pub fn clear(&self) {
        self.entries.clear();
        debug!("Cache cleared");
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            enabled: self.enabled,
            ttl_secs: self.ttl.as_secs(),
            max_entries: self.max_entries,
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn is_fresh(&self, entry: &CacheEntry, generation: u64) -> bool {
        entry.generation == generation && entry.inserted_at.elapsed() < self.ttl
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().inserted_at)
            .map(|entry| entry.key().clone());

        if let Some(key) = oldest {
            self.entries.remove(&key);
            debug!(key = %key, "Evicted oldest cache entry");
        }
    }
}
