use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;

use rustc_hash::FxHashMap;

/// Called with the key and value of every entry evicted for capacity.
pub type EvictionHook<K, V> = Box<dyn Fn(&K, &V) + Send + Sync>;

struct Node<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Fixed-capacity cache with least-recently-used eviction.
///
/// Entries live in a dense vector linked into a recency list by index; the map points
/// keys at their slot. `head` is the most recently touched entry, `tail` the next
/// eviction candidate. All operations are O(1).
pub struct Cache<K, V> {
    capacity: usize,
    map: FxHashMap<K, usize>,
    nodes: Vec<Node<K, V>>,
    head: Option<usize>,
    tail: Option<usize>,
    on_evict: Option<EvictionHook<K, V>>,
}

impl<K, V> Cache<K, V>
where
    K: Hash + Eq + Clone,
{
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            map: FxHashMap::default(),
            nodes: Vec::with_capacity(capacity.min(1024)),
            head: None,
            tail: None,
            on_evict: None,
        }
    }

    pub fn with_eviction_hook(capacity: usize, hook: EvictionHook<K, V>) -> Self {
        let mut cache = Self::new(capacity);
        cache.on_evict = Some(hook);
        cache
    }

    pub fn capacity(&self) -> usize { self.capacity }
    pub fn len(&self) -> usize { self.map.len() }
    pub fn is_empty(&self) -> bool { self.map.is_empty() }

    /// Membership test; does not touch recency.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.contains_key(key)
    }

    /// Look up `key` and mark it most recently used.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.map.get(key)?;
        self.promote(idx);
        Some(&self.nodes[idx].value)
    }

    /// Look up `key` without touching recency.
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.get(key).map(|&idx| &self.nodes[idx].value)
    }

    /// Insert or update `key` as most recently used. Returns the replaced value.
    ///
    /// Inserting beyond capacity evicts the least recently used entry and hands it to
    /// the eviction hook.
    pub fn put(&mut self, key: K, value: V) -> Option<V> {
        if let Some(&idx) = self.map.get(&key) {
            let old = std::mem::replace(&mut self.nodes[idx].value, value);
            self.promote(idx);
            return Some(old);
        }
        let idx = self.nodes.len();
        self.nodes.push(Node { key: key.clone(), value, prev: None, next: None });
        self.map.insert(key, idx);
        self.push_front(idx);
        if self.map.len() > self.capacity {
            self.evict();
        }
        None
    }

    /// Drop `key`. The eviction hook does not fire for explicit removal.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = self.map.remove(key)?;
        Some(self.detach(idx).value)
    }

    pub fn clear(&mut self) {
        self.map.clear();
        self.nodes.clear();
        self.head = None;
        self.tail = None;
    }

    /// Keys from most to least recently used.
    pub fn lru_keys(&self) -> Vec<&K> {
        self.iter().map(|(k, _)| k).collect()
    }

    /// Entries from most to least recently used.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let node = &self.nodes[cursor?];
            cursor = node.next;
            Some((&node.key, &node.value))
        })
    }

    fn evict(&mut self) {
        let Some(idx) = self.tail else { return };
        let node = self.detach(idx);
        self.map.remove(&node.key);
        if let Some(hook) = &self.on_evict {
            hook(&node.key, &node.value);
        }
    }

    fn promote(&mut self, idx: usize) {
        if self.head != Some(idx) {
            self.unlink(idx);
            self.push_front(idx);
        }
    }

    fn push_front(&mut self, idx: usize) {
        let old = self.head;
        self.nodes[idx].prev = None;
        self.nodes[idx].next = old;
        match old {
            Some(h) => self.nodes[h].prev = Some(idx),
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
        self.nodes[idx].prev = None;
        self.nodes[idx].next = None;
    }

    /// Unlink and remove the node at `idx`; the last node moves into the hole.
    /// The caller is responsible for the map entry of the removed key.
    fn detach(&mut self, idx: usize) -> Node<K, V> {
        self.unlink(idx);
        let removed = self.nodes.swap_remove(idx);
        if idx < self.nodes.len() {
            let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
            match prev {
                Some(p) => self.nodes[p].next = Some(idx),
                None => self.head = Some(idx),
            }
            match next {
                Some(n) => self.nodes[n].prev = Some(idx),
                None => self.tail = Some(idx),
            }
            if let Some(slot) = self.map.get_mut(&self.nodes[idx].key) {
                *slot = idx;
            }
        }
        removed
    }
}

impl<K: fmt::Debug, V> fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("capacity", &self.capacity)
            .field("len", &self.map.len())
            .finish()
    }
}
