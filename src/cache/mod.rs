//! Compilation cache: memoizes `(target type, filter text) -> filter tree`.

use std::any::{TypeId, type_name};
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::debug;

use crate::config::CacheSettings;
use crate::error::Result;
use crate::filter::FilterNode;
use crate::target::{Filterable, string_to_filter};

/// LRU map. Each entry carries the tick of its last use; `order` maps ticks
/// back to keys, so the first entry is the least recently used.
struct LruCache<K, V> {
    capacity: usize,
    tick: u64,
    items: HashMap<K, (V, u64)>,
    order: BTreeMap<u64, K>,
}

impl<K: Hash + Eq + Clone, V: Clone> LruCache<K, V> {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            tick: 0,
            items: HashMap::with_capacity(capacity),
            order: BTreeMap::new(),
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Look up a value and mark it most recently used.
    fn get(&mut self, key: &K) -> Option<V> {
        let tick = self.next_tick();
        let (value, stamp) = self.items.get_mut(key)?;
        let previous = std::mem::replace(stamp, tick);
        let value = value.clone();
        self.order.remove(&previous);
        self.order.insert(tick, key.clone());
        Some(value)
    }

    /// Insert unless already present; returns the stored value and the
    /// evicted key, if any.
    fn get_or_insert(&mut self, key: K, value: V) -> (V, Option<K>) {
        if let Some(existing) = self.get(&key) {
            return (existing, None);
        }
        let mut evicted = None;
        if self.items.len() >= self.capacity {
            if let Some((_, oldest)) = self.order.pop_first() {
                self.items.remove(&oldest);
                evicted = Some(oldest);
            }
        }
        let tick = self.next_tick();
        self.order.insert(tick, key.clone());
        self.items.insert(key, (value.clone(), tick));
        (value, evicted)
    }

    fn contains_key(&self, key: &K) -> bool {
        self.items.contains_key(key)
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn clear(&mut self) {
        self.items.clear();
        self.order.clear();
    }
}

type CacheKey = (TypeId, String);

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub capacity: usize,
    pub len: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Thread-safe LRU cache of compiled filters.
///
/// Keys combine the target type with the filter text exactly as given
/// (whitespace is significant in the grammar), so the same text compiled
/// for two types yields two entries. Failed compiles are never
/// stored. The lock only guards bookkeeping; compiling happens outside it,
/// so two threads missing on the same key may both compile and the first
/// insert wins.
pub struct FilterCache {
    capacity: usize,
    entries: Mutex<LruCache<CacheKey, Arc<FilterNode>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl FilterCache {
    /// Capacity 0 disables caching; every call compiles.
    pub fn new(capacity: usize) -> Self {
        FilterCache {
            capacity,
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self::new(settings.capacity)
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<CacheKey, Arc<FilterNode>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn key<T: Filterable>(text: &str) -> CacheKey {
        (TypeId::of::<T>(), text.to_string())
    }

    /// Compile `text` for `T`, reusing a cached tree when present.
    pub fn compile<T: Filterable>(&self, text: &str) -> Result<Arc<FilterNode>> {
        let key = Self::key::<T>(text);
        if self.capacity > 0 {
            if let Some(node) = self.lock().get(&key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(target_type = type_name::<T>(), text = %key.1, "filter cache hit");
                return Ok(node);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(target_type = type_name::<T>(), text = %key.1, "filter cache miss");
        let node = Arc::new(string_to_filter::<T>(text)?);
        if self.capacity == 0 {
            return Ok(node);
        }

        let (node, evicted) = self.lock().get_or_insert(key, node);
        if let Some((_, text)) = evicted {
            debug!(text = %text, "filter cache evicted");
        }
        Ok(node)
    }

    /// Whether a compiled tree for `text` and `T` is cached.
    pub fn contains<T: Filterable>(&self, text: &str) -> bool {
        self.lock().contains_key(&Self::key::<T>(text))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            capacity: self.capacity,
            len: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for FilterCache {
    fn default() -> Self {
        Self::from_settings(&CacheSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;
    use crate::target::AnyProperty;
    use std::thread;

    struct Hero;

    impl Filterable for Hero {
        const PROPERTIES: &'static [&'static str] = &["Name"];
    }

    #[test]
    fn test_lru_order_follows_use() {
        let mut lru = LruCache::new(3);
        for key in ["a", "b", "c"] {
            lru.get_or_insert(key, key.len());
        }
        for _ in 0..10 {
            lru.get(&"a");
        }
        lru.get(&"b");
        assert_eq!(lru.get_or_insert("d", 1), (1, Some("c")));
        assert_eq!(lru.get_or_insert("e", 1), (1, Some("a")));
        assert_eq!(lru.get_or_insert("b", 7), (1, None));
        assert_eq!(lru.order.len(), lru.len());
    }

    #[test]
    fn test_hit_returns_same_tree() {
        let cache = FilterCache::new(4);
        let first = cache.compile::<AnyProperty>("Name=Bat*").unwrap();
        let second = cache.compile::<AnyProperty>("Name=Bat*").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(
            cache.stats(),
            CacheStats {
                capacity: 4,
                len: 1,
                hits: 1,
                misses: 1
            }
        );
    }

    #[test]
    fn test_cached_result_matches_direct_compile() {
        let cache = FilterCache::new(4);
        for text in ["Name=Bruce ", "Name=Bruce\\ ", "Name=Bruce", "Name=\"Bruce \""] {
            let direct = string_to_filter::<AnyProperty>(text).map(Arc::new);
            assert_eq!(cache.compile::<AnyProperty>(text), direct, "{text:?}");
            assert_eq!(cache.compile::<AnyProperty>(text), direct, "{text:?}");
        }
        assert_eq!(cache.len(), 4);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let cache = FilterCache::new(2);
        cache.compile::<AnyProperty>("a=1").unwrap();
        cache.compile::<AnyProperty>("a=2").unwrap();
        cache.compile::<AnyProperty>("a=3").unwrap();
        assert_eq!(cache.len(), 2);
        assert!(!cache.contains::<AnyProperty>("a=1"));
        assert!(cache.contains::<AnyProperty>("a=2"));
        assert!(cache.contains::<AnyProperty>("a=3"));
    }

    #[test]
    fn test_hit_promotes_entry() {
        let cache = FilterCache::new(2);
        cache.compile::<AnyProperty>("a=1").unwrap();
        cache.compile::<AnyProperty>("a=2").unwrap();
        cache.compile::<AnyProperty>("a=1").unwrap();
        cache.compile::<AnyProperty>("a=3").unwrap();
        assert!(cache.contains::<AnyProperty>("a=1"));
        assert!(!cache.contains::<AnyProperty>("a=2"));
    }

    #[test]
    fn test_types_get_separate_entries() {
        let cache = FilterCache::new(4);
        cache.compile::<AnyProperty>("name=x").unwrap();
        cache.compile::<Hero>("name=x").unwrap();
        assert_eq!(cache.len(), 2);
        assert!(cache.contains::<Hero>("name=x"));
    }

    #[test]
    fn test_failures_are_not_cached() {
        let cache = FilterCache::new(4);
        assert!(matches!(
            cache.compile::<AnyProperty>("Name=(Bat"),
            Err(QueryError::Syntax { .. })
        ));
        assert!(matches!(
            cache.compile::<Hero>("Age=1"),
            Err(QueryError::UnknownProperty(_))
        ));
        assert!(cache.is_empty());
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn test_zero_capacity_disables_caching() {
        let cache = FilterCache::new(0);
        let first = cache.compile::<AnyProperty>("a=1").unwrap();
        let second = cache.compile::<AnyProperty>("a=1").unwrap();
        assert_eq!(first, second);
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(cache.is_empty());
        assert_eq!(cache.stats().hits, 0);
    }

    #[test]
    fn test_clear() {
        let cache = FilterCache::new(4);
        cache.compile::<AnyProperty>("a=1").unwrap();
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_shared_across_threads() {
        let cache = Arc::new(FilterCache::new(8));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for j in 0..50 {
                        let text = format!("a={}", (i + j) % 4);
                        cache.compile::<AnyProperty>(&text).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 4);
        let stats = cache.stats();
        assert_eq!(stats.hits + stats.misses, 400);
    }
}
