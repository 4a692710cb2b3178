//! Bounded page cache with insertion-order eviction

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use super::types::PageContent;

/// Cache for decoded pages, keyed by absolute page index.
///
/// Eviction is FIFO by insertion: reads never refresh an entry and replacing
/// the value of a cached page keeps its original position. The underlying
/// [`LruCache`] is only ever touched through non-promoting accessors so its
/// "least recently used" end is always the oldest insertion.
pub struct PageCache {
    cache: LruCache<usize, Arc<PageContent>>,
}

impl PageCache {
    /// Create a new cache with the given capacity (at least 1)
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    /// Get a cached page without touching eviction order
    #[must_use]
    pub fn get(&self, page: usize) -> Option<Arc<PageContent>> {
        self.cache.peek(&page).cloned()
    }

    #[must_use]
    pub fn contains(&self, page: usize) -> bool {
        self.cache.contains(&page)
    }

    /// Insert a page, returning the evicted page index if the cache overflowed.
    ///
    /// Re-inserting a cached page replaces the payload in place.
    pub fn put(&mut self, page: usize, data: Arc<PageContent>) -> Option<usize> {
        if let Some(slot) = self.cache.peek_mut(&page) {
            *slot = data;
            return None;
        }

        match self.cache.push(page, data) {
            Some((evicted, _)) if evicted != page => Some(evicted),
            _ => None,
        }
    }

    /// Clear all cached pages
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Cached page indices, oldest insertion first
    #[must_use]
    pub fn pages(&self) -> Vec<usize> {
        self.cache.iter().rev().map(|(page, _)| *page).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(n: usize) -> Arc<PageContent> {
        Arc::new(PageContent::new(n, vec![n as u8; 4]))
    }

    #[test]
    fn cache_insert_and_get() {
        let mut cache = PageCache::new(10);
        cache.put(1, page(1));

        assert!(cache.contains(1));
        assert_eq!(cache.get(1).map(|p| p.page_num), Some(1));
        assert!(cache.get(2).is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn evicts_oldest_insertion() {
        let mut cache = PageCache::new(2);
        assert_eq!(cache.put(1, page(1)), None);
        assert_eq!(cache.put(2, page(2)), None);
        assert_eq!(cache.put(3, page(3)), Some(1));

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(1));
        assert_eq!(cache.pages(), vec![2, 3]);
    }

    #[test]
    fn reads_do_not_refresh_order() {
        let mut cache = PageCache::new(2);
        cache.put(1, page(1));
        cache.put(2, page(2));

        // Reading page 1 must not save it from eviction
        assert!(cache.get(1).is_some());
        assert!(cache.contains(1));

        assert_eq!(cache.put(3, page(3)), Some(1));
    }

    #[test]
    fn reinsert_replaces_value_without_reordering() {
        let mut cache = PageCache::new(3);
        cache.put(1, page(1));
        cache.put(2, page(2));

        let replacement = Arc::new(PageContent::new(1, vec![0xAA]));
        assert_eq!(cache.put(1, replacement), None);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.pages(), vec![1, 2]);
        assert_eq!(cache.get(1).map(|p| p.data.clone()), Some(vec![0xAA]));

        cache.put(3, page(3));
        assert_eq!(cache.put(4, page(4)), Some(1));
    }

    #[test]
    fn size_never_exceeds_capacity() {
        let mut cache = PageCache::new(4);
        let mut inserted = Vec::new();

        for n in [5, 1, 9, 5, 3, 7, 1, 2, 8, 9, 4, 6, 3] {
            let evicted = cache.put(n, page(n));
            assert!(cache.len() <= cache.capacity());

            if !inserted.contains(&n) {
                inserted.push(n);
            }
            if let Some(victim) = evicted {
                assert_eq!(victim, inserted.remove(0));
            }
            assert_eq!(cache.pages(), inserted);
        }
    }

    #[test]
    fn zero_capacity_falls_back_to_one() {
        let mut cache = PageCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.put(1, page(1));
        assert_eq!(cache.put(2, page(2)), Some(1));
    }

    #[test]
    fn clear_empties_cache() {
        let mut cache = PageCache::new(10);
        for n in 1..=5 {
            cache.put(n, page(n));
        }
        cache.clear();
        assert!(cache.is_empty());
    }
}
