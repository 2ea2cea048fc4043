use super::*;

use crate::page::{OverflowPage, Page};

fn page(key: i64) -> Arc<Page> {
    Arc::new(Page::Overflow(OverflowPage {
        record_key: key,
        data: vec![1, 2, 3],
    }))
}

#[test]
fn test_page_cache_get_put() {
    let cache = PageCache::new(64);
    assert!(cache.get(1024).is_none());

    cache.put(1024, page(1));
    cache.put(2048, page(2));
    let hit = cache.get(1024).unwrap();
    assert_eq!(hit.as_overflow().unwrap().record_key, 1);

    cache.clear();
    assert!(cache.get(1024).is_none());
    assert!(cache.get(2048).is_none());
}

#[test]
fn test_page_cache_counters() {
    let cache = PageCache::new(64);
    cache.get(64); // miss
    cache.put(64, page(1));
    cache.get(64); // hit
    cache.get(64); // hit
    cache.get(128); // miss

    let (hits, misses, sets) = cache.to_counts();
    assert_eq!((hits, misses, sets), (2, 2, 1));
}

#[test]
fn test_page_cache_eviction_is_bounded() {
    let cache = PageCache::new(16);
    for off in 0..10_000_u64 {
        cache.put(off, page(off as i64));
    }
    // capacity is per stripe, so only a bounded tail can remain.
    let survivors = (0..10_000_u64).filter(|off| cache.get(*off).is_some()).count();
    assert!(survivors <= 16, "{} survivors", survivors);
}

#[test]
fn test_index_node_cache() {
    let cache: Arc<IndexNodeCache<u64>> = IndexNodeCache::new(8);
    let key = IndexNodeKey {
        index_kind: 0,
        index_number: 0,
        revision: 3,
        node_key: 42,
    };
    assert!(cache.get(&key).is_none());
    cache.put(key, Arc::new(7));
    assert_eq!(*cache.get(&key).unwrap(), 7);

    let other = IndexNodeKey {
        revision: 4,
        ..key
    };
    assert!(cache.get(&other).is_none());
}
