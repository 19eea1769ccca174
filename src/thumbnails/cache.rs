//! In-memory thumbnail store with LRU eviction under a byte budget.
//!
//! Entries are keyed by an xxhash of (path + width + height). Decode failures
//! are cached as placeholders so a broken file isn't decoded over and over.

use std::num::NonZeroUsize;
use std::path::Path;

use lru::LruCache;
use parking_lot::RwLock;
use tracing::{debug, trace, warn};
use xxhash_rust::xxh3::xxh3_64;

use super::generator::{Thumbnail, ThumbnailGenerator, ThumbnailPurpose};

/// Minimum memory budget in megabytes.
const MIN_MEMORY_MB: usize = 16;

/// Maximum memory budget in megabytes.
const MAX_MEMORY_MB: usize = 512;

/// Entry cap of the LRU, independent of the byte budget.
const DEFAULT_LRU_CAPACITY: usize = 4096;

/// A service returning decoded, scaled images.
///
/// Shared by worker threads; `get_or_create` may be called concurrently.
/// Never fails: undecodable files yield [`Thumbnail::placeholder`].
pub trait ThumbnailStore: Send + Sync {
    fn get_or_create(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        purpose: ThumbnailPurpose,
    ) -> Thumbnail;

    /// Drops every entry. Callers cancel in-flight prefetches first.
    ///
    /// Cancelling does not wait for a worker already inside `get_or_create`,
    /// so that one item may still land after `clear` returns. Stores must stay
    /// consistent under this interleaving.
    fn clear(&self);
}

/// Cache key for thumbnail lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey(u64);

impl CacheKey {
    pub fn new(path: &Path, width: u32, height: u32) -> Self {
        let path_str = path.to_string_lossy();
        let mut data = Vec::with_capacity(path_str.len() + 8);
        data.extend_from_slice(path_str.as_bytes());
        data.extend_from_slice(&width.to_le_bytes());
        data.extend_from_slice(&height.to_le_bytes());
        Self(xxh3_64(&data))
    }
}

struct StoreInner {
    entries: LruCache<CacheKey, Thumbnail>,
    current_bytes: usize,
}

pub struct MemoryThumbnailStore {
    name: String,
    max_memory_bytes: usize,
    inner: RwLock<StoreInner>,
}

impl MemoryThumbnailStore {
    pub fn new(name: &str, max_memory_mb: usize) -> Self {
        let max_memory_mb = max_memory_mb.clamp(MIN_MEMORY_MB, MAX_MEMORY_MB);
        debug!(store = name, max_memory_mb, "Initialized thumbnail store");

        Self {
            name: name.to_string(),
            max_memory_bytes: max_memory_mb * 1024 * 1024,
            inner: RwLock::new(StoreInner {
                entries: LruCache::new(
                    NonZeroUsize::new(DEFAULT_LRU_CAPACITY).unwrap_or(NonZeroUsize::MIN),
                ),
                current_bytes: 0,
            }),
        }
    }

    pub fn contains(&self, path: &Path, width: u32, height: u32) -> bool {
        self.inner
            .read()
            .entries
            .contains(&CacheKey::new(path, width, height))
    }

    pub fn memory_usage(&self) -> usize {
        self.inner.read().current_bytes
    }

    pub fn entry_count(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn max_memory(&self) -> usize {
        self.max_memory_bytes
    }

    fn insert(&self, key: CacheKey, thumb: Thumbnail) {
        let needed = thumb.memory_bytes();
        let mut inner = self.inner.write();

        if let Some(old) = inner.entries.pop(&key) {
            inner.current_bytes = inner.current_bytes.saturating_sub(old.memory_bytes());
        }

        // Evict least recently used entries
        while inner.current_bytes + needed > self.max_memory_bytes {
            match inner.entries.pop_lru() {
                Some((_, evicted)) => {
                    inner.current_bytes = inner.current_bytes.saturating_sub(evicted.memory_bytes());
                    trace!(
                        store = %self.name,
                        evicted_bytes = evicted.memory_bytes(),
                        current_bytes = inner.current_bytes,
                        "Evicted thumbnail"
                    );
                }
                None => break,
            }
        }

        // Entry cap reached
        if let Some((_, evicted)) = inner.entries.push(key, thumb) {
            inner.current_bytes = inner.current_bytes.saturating_sub(evicted.memory_bytes());
        }
        inner.current_bytes += needed;
    }
}

impl ThumbnailStore for MemoryThumbnailStore {
    fn get_or_create(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        purpose: ThumbnailPurpose,
    ) -> Thumbnail {
        let key = CacheKey::new(path, width, height);

        if let Some(cached) = self.inner.write().entries.get(&key).cloned() {
            trace!(store = %self.name, ?path, "Memory cache hit");
            return cached;
        }

        // Decoded outside the lock; concurrent misses on one key may both decode.
        let thumb = match ThumbnailGenerator::generate(path, width, height, purpose) {
            Ok(thumb) => thumb,
            Err(e) => {
                warn!(store = %self.name, ?path, error = ?e, "Failed to generate thumbnail");
                Thumbnail::placeholder()
            }
        };
        self.insert(key, thumb.clone());
        thumb
    }

    fn clear(&self) {
        let mut inner = self.inner.write();
        inner.entries.clear();
        inner.current_bytes = 0;
        debug!(store = %self.name, "Cleared thumbnail store");
    }
}
