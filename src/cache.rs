use std::{collections::HashMap, num::NonZeroUsize, sync::Arc};

use lru::LruCache;
use parking_lot::Mutex;

use crate::{hasher::ContentDigest, DetectionSet};

enum Store {
    Unbounded(HashMap<ContentDigest, Arc<DetectionSet>>),
    Bounded(LruCache<ContentDigest, Arc<DetectionSet>>),
}

/// Recognition results keyed by image content.
///
/// Only detections are cached; annotation is recomputed on every request.
/// `store` for a digest that is already present replaces the entry, which is
/// harmless since identical bytes always give equally valid detections.
pub struct ResultCache {
    store: Mutex<Store>,
}

impl ResultCache {
    /// A cache that never evicts.
    pub fn new() -> Self {
        Self {
            store: Mutex::new(Store::Unbounded(HashMap::new())),
        }
    }

    /// A cache holding at most `max_entries` results, evicting the least
    /// recently used one when full.
    pub fn bounded(max_entries: NonZeroUsize) -> Self {
        Self {
            store: Mutex::new(Store::Bounded(LruCache::new(max_entries))),
        }
    }

    pub fn lookup(&self, digest: &ContentDigest) -> Option<Arc<DetectionSet>> {
        match &mut *self.store.lock() {
            Store::Unbounded(map) => map.get(digest).cloned(),
            Store::Bounded(lru) => lru.get(digest).cloned(),
        }
    }

    pub fn store(&self, digest: ContentDigest, detections: Arc<DetectionSet>) {
        match &mut *self.store.lock() {
            Store::Unbounded(map) => {
                map.insert(digest, detections);
            }
            Store::Bounded(lru) => {
                if let Some((evicted, _)) = lru.push(digest, detections) {
                    if evicted != digest {
                        log::trace!("Evicted cached detections for {evicted}");
                    }
                }
            }
        }
    }

    pub fn contains(&self, digest: &ContentDigest) -> bool {
        match &*self.store.lock() {
            Store::Unbounded(map) => map.contains_key(digest),
            Store::Bounded(lru) => lru.contains(digest),
        }
    }

    pub fn len(&self) -> usize {
        match &*self.store.lock() {
            Store::Unbounded(map) => map.len(),
            Store::Bounded(lru) => lru.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        match &mut *self.store.lock() {
            Store::Unbounded(map) => map.clear(),
            Store::Bounded(lru) => lru.clear(),
        }
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}
