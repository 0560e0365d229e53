#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arbor_store::{Cache, EvictionHook};

#[test]
fn never_exceeds_capacity_and_evicts_exactly_the_overflow() {
    let evicted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&evicted);
    let hook: EvictionHook<u32, u32> = Box::new(move |_: &u32, _: &u32| {
        counter.fetch_add(1, Ordering::Relaxed);
    });
    let mut cache = Cache::with_eviction_hook(7, hook);

    for i in 0..100u32 {
        cache.put(i, i);
        assert!(cache.len() <= 7);
    }
    assert_eq!(cache.len(), 7);
    assert_eq!(evicted.load(Ordering::Relaxed), 93);
    let keys: Vec<u32> = cache.lru_keys().into_iter().copied().collect();
    assert_eq!(keys, (93..100).rev().collect::<Vec<_>>());
}

#[test]
fn touched_entries_survive_eviction() {
    let mut cache: Cache<String, usize> = Cache::new(3);
    for (i, k) in ["a", "b", "c"].iter().enumerate() {
        cache.put(k.to_string(), i);
    }
    // keep "a" hot while new keys stream in
    for (i, k) in ["d", "e", "f"].iter().enumerate() {
        assert!(cache.get("a").is_some());
        cache.put(k.to_string(), i);
    }
    assert!(cache.contains("a"));
    assert!(cache.contains("f"));
    assert!(!cache.contains("b"));
    assert!(!cache.contains("c"));
    assert!(!cache.contains("d"));
}

#[test]
fn updating_an_entry_does_not_evict() {
    let evicted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&evicted);
    let hook: EvictionHook<&'static str, u8> = Box::new(move |_: &&'static str, _: &u8| {
        counter.fetch_add(1, Ordering::Relaxed);
    });
    let mut cache = Cache::with_eviction_hook(2, hook);
    cache.put("a", 1);
    cache.put("b", 2);
    for v in 0..10 {
        cache.put("a", v);
    }
    assert_eq!(evicted.load(Ordering::Relaxed), 0);
    assert_eq!(cache.peek("a"), Some(&9));
}
