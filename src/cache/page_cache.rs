//! Page image cache.
//!
//! Rendered pages are cached by page index in LRU order. Whether the cache is
//! over budget is decided by an injectable [`EvictionPolicy`]; after every
//! insertion least-recently-used entries are evicted until the policy is
//! satisfied.
//!
//! Eviction can happen to any entry between a `put` and a later `get`, so a
//! miss is always a routine outcome for callers.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use tracing::trace;

use crate::raster::RasterImage;
use crate::source::PageIndex;

/// Default cache budget: 64MB of decoded pixels
pub const DEFAULT_PAGE_CACHE_BYTES: usize = 64 * 1024 * 1024;

// =============================================================================
// Eviction Policy
// =============================================================================

/// Current occupancy of a cache, as seen by an eviction policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheUsage {
    pub entries: usize,
    pub bytes: usize,
}

/// Decides when the cache holds too much.
pub trait EvictionPolicy: Send + Sync + fmt::Debug {
    /// Returns `true` while entries must be evicted.
    fn over_budget(&self, usage: CacheUsage) -> bool;

    /// Byte budget, if the policy has one.
    fn byte_budget(&self) -> Option<usize> {
        None
    }
}

/// Evict once the total pixel bytes exceed a budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteBudget(pub usize);

impl EvictionPolicy for ByteBudget {
    fn over_budget(&self, usage: CacheUsage) -> bool {
        usage.bytes > self.0
    }

    fn byte_budget(&self) -> Option<usize> {
        Some(self.0)
    }
}

/// Evict once more than a fixed number of pages are cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryLimit(pub usize);

impl EvictionPolicy for EntryLimit {
    fn over_budget(&self, usage: CacheUsage) -> bool {
        usage.entries > self.0
    }
}

/// Never evict on insertion. Only [`PageCache::trim_to`] and
/// [`PageCache::clear`] release memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Unbounded;

impl EvictionPolicy for Unbounded {
    fn over_budget(&self, _usage: CacheUsage) -> bool {
        false
    }
}

// =============================================================================
// Page Cache
// =============================================================================

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

struct Inner {
    entries: LruCache<PageIndex, RasterImage>,
    bytes: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl Inner {
    fn usage(&self) -> CacheUsage {
        CacheUsage {
            entries: self.entries.len(),
            bytes: self.bytes,
        }
    }

    fn evict_lru(&mut self) -> bool {
        match self.entries.pop_lru() {
            Some((index, image)) => {
                self.bytes = self.bytes.saturating_sub(image.byte_size());
                self.evictions += 1;
                trace!(page = %index, bytes = image.byte_size(), "Evicted page image");
                true
            }
            None => false,
        }
    }
}

/// Thread-safe LRU cache of rendered pages.
///
/// All state sits behind one lock, held only for map operations, never
/// while rendering. A reader racing with a writer sees either the old or
/// the new image.
pub struct PageCache {
    inner: Mutex<Inner>,
    policy: Box<dyn EvictionPolicy>,
}

impl PageCache {
    /// Create a cache with the default byte budget (64MB).
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_PAGE_CACHE_BYTES)
    }

    /// Create a cache bounded to `max_bytes` of pixel data.
    pub fn with_capacity(max_bytes: usize) -> Self {
        Self::with_policy(ByteBudget(max_bytes))
    }

    /// Create a cache governed by a custom eviction policy.
    pub fn with_policy(policy: impl EvictionPolicy + 'static) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::unbounded(),
                bytes: 0,
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
            policy: Box::new(policy),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Every mutation leaves `Inner` consistent, so a poisoned lock is still usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get a page image, marking it recently used.
    pub fn get(&self, index: PageIndex) -> Option<RasterImage> {
        let mut inner = self.lock();
        match inner.entries.get(&index).cloned() {
            Some(image) => {
                inner.hits += 1;
                Some(image)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Check presence without touching LRU order or counters.
    pub fn contains(&self, index: PageIndex) -> bool {
        self.lock().entries.contains(&index)
    }

    /// Store a page image, then evict LRU entries while the policy reports
    /// the cache over budget.
    ///
    /// Replacing an existing entry marks it recently used.
    pub fn put(&self, index: PageIndex, image: RasterImage) {
        let size = image.byte_size();
        let mut inner = self.lock();

        if let Some(old) = inner.entries.put(index, image) {
            inner.bytes = inner.bytes.saturating_sub(old.byte_size());
        }
        inner.bytes += size;

        while self.policy.over_budget(inner.usage()) {
            if !inner.evict_lru() {
                break;
            }
        }
    }

    /// Remove a page image, returning it if it was cached.
    pub fn remove(&self, index: PageIndex) -> Option<RasterImage> {
        let mut inner = self.lock();
        let image = inner.entries.pop(&index)?;
        inner.bytes = inner.bytes.saturating_sub(image.byte_size());
        Some(image)
    }

    /// Evict LRU entries until at most `max_bytes` remain.
    ///
    /// This is the hook for host memory-pressure signals. Returns the number
    /// of entries evicted.
    pub fn trim_to(&self, max_bytes: usize) -> usize {
        let mut inner = self.lock();
        let mut evicted = 0;
        while inner.bytes > max_bytes && inner.evict_lru() {
            evicted += 1;
        }
        evicted
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.bytes = 0;
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Current total size of cached pixels in bytes.
    pub fn size(&self) -> usize {
        self.lock().bytes
    }

    /// Byte budget of the eviction policy, if it has one.
    pub fn capacity(&self) -> Option<usize> {
        self.policy.byte_budget()
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            entries: inner.entries.len(),
            bytes: inner.bytes,
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
        }
    }
}

impl Default for PageCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PageCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        f.debug_struct("PageCache")
            .field("entries", &stats.entries)
            .field("bytes", &stats.bytes)
            .field("policy", &self.policy)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
