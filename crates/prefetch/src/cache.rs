use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A bounded map that evicts its earliest-inserted entry on overflow.
///
/// ```
/// use storybook_prefetch::PrefetchCache;
///
/// let mut cache = PrefetchCache::new(2);
/// cache.insert(1, "one");
/// cache.insert(2, "two");
/// assert_eq!(cache.get(&1), Some(&"one")); // reading does not promote
/// assert_eq!(cache.insert(3, "three"), Some(1));
/// assert!(!cache.has(&1));
/// ```
#[derive(Debug, Clone)]
pub struct PrefetchCache<K, V> {
    bound: usize,
    entries: HashMap<K, V>,
    order: VecDeque<K>,
}

impl<K: Eq + Hash + Clone, V> PrefetchCache<K, V> {
    pub fn new(bound: usize) -> Self {
        Self { bound, entries: HashMap::with_capacity(bound + 1), order: VecDeque::with_capacity(bound + 1) }
    }

    /// Insert or replace `key`, returning the key evicted to stay within the
    /// bound, if any.
    ///
    /// Replacing an existing key keeps its original insertion position.
    pub fn insert(&mut self, key: K, value: V) -> Option<K> {
        if self.entries.insert(key.clone(), value).is_none() {
            self.order.push_back(key);
        }
        if self.entries.len() <= self.bound {
            return None;
        }
        let evicted = self.order.pop_front()?;
        self.entries.remove(&evicted);
        Some(evicted)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn has(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn bound(&self) -> usize {
        self.bound
    }

    /// Keys from oldest to newest insertion.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.order.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

/// A [`PrefetchCache`] shared between the orchestrator and its background
/// prefetch tasks.
///
/// The lock is only ever held for the duration of a single map operation,
/// never across an `.await`.
#[derive(Debug)]
pub struct SharedCache<K, V> {
    inner: Mutex<PrefetchCache<K, V>>,
}

impl<K: Eq + Hash + Clone, V: Clone> SharedCache<K, V> {
    pub fn new(bound: usize) -> Self {
        Self { inner: Mutex::new(PrefetchCache::new(bound)) }
    }

    fn lock(&self) -> MutexGuard<'_, PrefetchCache<K, V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, key: K, value: V) -> Option<K> {
        self.lock().insert(key, value)
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.lock().get(key).cloned()
    }

    pub fn has(&self, key: &K) -> bool {
        self.lock().has(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Keys from oldest to newest insertion.
    pub fn keys(&self) -> Vec<K> {
        self.lock().keys().cloned().collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}
