//! Document caching with TTL and ETag revalidation

use std::time::{Duration, SystemTime};

use dashmap::DashMap;
use tracing::debug;

use crate::api::RegistryDocument;

/// Default time a cached document is served without revalidation
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Default number of documents held before eviction
pub const DEFAULT_CAPACITY: usize = 1024;

/// Cache entry with TTL
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Cached document
    pub document: RegistryDocument,
    /// Entity tag returned with the document
    pub etag: Option<String>,
    /// When the entry was stored
    pub stored_at: SystemTime,
    /// Time-to-live duration
    pub ttl: Duration,
}

impl CacheEntry {
    /// Create cache entry with a custom TTL
    pub fn new(document: RegistryDocument, etag: Option<String>, ttl: Duration) -> Self {
        Self {
            document,
            etag,
            stored_at: SystemTime::now(),
            ttl,
        }
    }

    /// Check if cache entry is still fresh
    pub fn is_fresh(&self) -> bool {
        match self.stored_at.elapsed() {
            Ok(elapsed) => elapsed < self.ttl,
            Err(_) => false, // Clock went backwards, consider stale
        }
    }

    /// Get age of cache entry
    pub fn age(&self) -> Option<Duration> {
        self.stored_at.elapsed().ok()
    }
}

/// In-memory document cache keyed by package name.
///
/// Stale entries are kept while they carry an ETag: the request engine sends
/// it as `If-None-Match` and reuses the document on a 304. Once `capacity`
/// is reached an insert first drops stale entries without an ETag, then the
/// oldest entry.
#[derive(Debug)]
pub struct MetadataCache {
    cache: DashMap<String, CacheEntry>,
    ttl: Duration,
    capacity: usize,
}

impl MetadataCache {
    /// Create a cache with the default TTL
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    /// Create a cache whose entries live for `ttl`
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            cache: DashMap::new(),
            ttl,
            capacity: DEFAULT_CAPACITY,
        }
    }

    /// Limit the number of cached documents
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Get a cached document if fresh
    pub fn get_fresh(&self, package_name: &str) -> Option<RegistryDocument> {
        let entry = self.cache.get(package_name)?;
        entry.is_fresh().then(|| entry.document.clone())
    }

    /// Get an entry regardless of freshness, for revalidation
    pub fn get_for_revalidation(&self, package_name: &str) -> Option<CacheEntry> {
        self.cache.get(package_name).map(|entry| entry.clone())
    }

    /// Store a document
    pub fn insert(&self, package_name: &str, document: RegistryDocument, etag: Option<String>) {
        if !self.cache.contains_key(package_name) && self.cache.len() >= self.capacity {
            self.evict();
        }
        let entry = CacheEntry::new(document, etag, self.ttl);
        self.cache.insert(package_name.to_string(), entry);
    }

    /// Restart the TTL of an entry the registry confirmed unchanged
    pub fn touch(&self, package_name: &str) {
        if let Some(mut entry) = self.cache.get_mut(package_name) {
            entry.stored_at = SystemTime::now();
        }
    }

    /// Drop an entry, e.g. after a write to the package
    pub fn invalidate(&self, package_name: &str) {
        self.cache.remove(package_name);
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let mut fresh_count = 0;
        let mut stale_count = 0;

        for entry in self.cache.iter() {
            if entry.is_fresh() {
                fresh_count += 1;
            } else {
                stale_count += 1;
            }
        }

        CacheStats {
            total_entries: self.cache.len(),
            fresh_entries: fresh_count,
            stale_entries: stale_count,
        }
    }

    /// Remove stale entries that cannot be revalidated
    pub fn cleanup(&self) -> usize {
        let mut removed = 0;
        self.cache.retain(|_, entry| {
            if entry.is_fresh() || entry.etag.is_some() {
                true
            } else {
                removed += 1;
                false
            }
        });
        removed
    }

    /// Make room for one more entry
    fn evict(&self) {
        let mut removed = self.cleanup();
        if self.cache.len() >= self.capacity {
            let oldest = self
                .cache
                .iter()
                .min_by_key(|entry| entry.stored_at)
                .map(|entry| entry.key().clone());
            if let Some(key) = oldest {
                self.cache.remove(&key);
                removed += 1;
            }
        }
        debug!(removed, stats = ?self.stats(), "evicted cached documents");
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Total number of entries
    pub total_entries: usize,
    /// Number of fresh entries
    pub fresh_entries: usize,
    /// Number of stale entries
    pub stale_entries: usize,
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new()
    }
}
