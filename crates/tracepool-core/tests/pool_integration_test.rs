use std::collections::HashSet;

use tracepool_core::{hash_bytes, ArenaKind, InternedStr, PoolConfig, PoolError, StringPool};

fn one_bucket(threshold: u32) -> StringPool {
    StringPool::new(PoolConfig::default().with_buckets(1).with_fallback_threshold(threshold))
        .unwrap()
}

#[test]
fn test_dedup_identity() {
    let mut pool = StringPool::default();
    let a = pool.intern_hashed(b"sched_wakeup").unwrap();
    let b = pool.intern_hashed(b"sched_wakeup").unwrap();
    assert_eq!(a, b);
    assert_eq!(pool.resolve_str(a), Some("sched_wakeup"));
    assert_eq!(pool.len(), 1);
}

#[test]
fn test_distinct_strings_get_distinct_identities() {
    let mut pool = one_bucket(50);
    let a = pool.intern(b"foo", 0).unwrap();
    let b = pool.intern(b"foobar", 0).unwrap();
    let c = pool.intern(b"fo", 0).unwrap();
    assert_ne!(a, b);
    assert_ne!(a, c);
    assert_ne!(b, c);
    assert_eq!(pool.resolve(c), Some(&b"fo"[..]));
}

#[test]
fn test_order_independence() {
    let orders: [[&[u8]; 3]; 3] = [
        [b"foo", b"bar", b"foo"],
        [b"foo", b"foo", b"bar"],
        [b"bar", b"foo", b"foo"],
    ];
    for order in orders {
        let mut pool = one_bucket(50);
        let handles: Vec<InternedStr> = order
            .iter()
            .map(|s| pool.intern(s, 0).unwrap())
            .collect();
        let unique: HashSet<InternedStr> = handles.iter().copied().collect();
        assert_eq!(unique.len(), 2);
        let foos: Vec<InternedStr> = order
            .iter()
            .zip(&handles)
            .filter(|(s, _)| **s == b"foo")
            .map(|(_, h)| *h)
            .collect();
        assert_eq!(foos[0], foos[1]);
    }
}

#[test]
fn test_single_bucket_scenario() {
    let mut pool = StringPool::new(PoolConfig::single_bucket()).unwrap();
    let alpha = pool.intern_str("alpha", 0).unwrap();
    let beta = pool.intern_str("beta", 0).unwrap();
    let gamma = pool.intern_str("gamma", 0).unwrap();
    let again = pool.intern_str("alpha", 0).unwrap();

    assert_eq!(again, alpha);
    let unique: HashSet<_> = [alpha, beta, gamma, again].into_iter().collect();
    assert_eq!(unique.len(), 3);
    assert!(pool.bucket_height(0).unwrap() <= 2);
    assert_eq!(pool.bucket_usage(0), Some(3));
    pool.validate().unwrap();
}

#[test]
fn test_overload_fallback_disables_dedup() {
    let mut pool = one_bucket(50);
    let first = pool.intern(b"token-0", 0).unwrap();
    for i in 1..60 {
        pool.intern(format!("token-{i}").as_bytes(), 0).unwrap();
    }
    assert_eq!(pool.bucket_usage(0), Some(51));

    let again = pool.intern(b"token-0", 0).unwrap();
    assert_ne!(again, first);
    assert_eq!(pool.resolve(again), Some(&b"token-0"[..]));
    // the tree copy is still there for lookups
    assert_eq!(pool.lookup(b"token-0", 0), Some(first));

    let stats = pool.stats();
    assert_eq!(stats.distinct, 51);
    assert_eq!(stats.fallback_allocations, 10);
    assert_eq!(stats.overloaded_buckets, 1);
    pool.validate().unwrap();
}

#[test]
fn test_fallback_is_per_bucket() {
    let config = PoolConfig::default()
        .with_buckets(2)
        .with_fallback_threshold(3);
    let mut pool = StringPool::new(config).unwrap();
    for i in 0..10 {
        pool.intern(format!("hot-{i}").as_bytes(), 0).unwrap();
    }
    let a = pool.intern(b"cold", 1).unwrap();
    let b = pool.intern(b"cold", 1).unwrap();
    assert_eq!(a, b);
    assert_eq!(pool.stats().overloaded_buckets, 1);
}

#[test]
fn test_clear_invalidates_identities() {
    let mut pool = StringPool::default();
    let before = pool.intern_hashed(b"swapper/0").unwrap();
    pool.intern_hashed(b"migration/1").unwrap();
    let pages = pool.stats().byte_pages;

    pool.clear();

    for bucket in 0..pool.bucket_count() {
        assert_eq!(pool.bucket_usage(bucket), Some(0));
    }
    assert!(pool.is_empty());
    assert_eq!(pool.resolve(before), None);
    let after = pool.intern_hashed(b"swapper/0").unwrap();
    assert_ne!(after, before);
    // clearing keeps the arenas
    assert_eq!(pool.stats().byte_pages, pages);
}

#[test]
fn test_reset_releases_arenas() {
    let config = PoolConfig {
        byte_page_size: 16,
        slots_per_page: 4,
        ..PoolConfig::default()
    };
    let mut pool = StringPool::new(config).unwrap();
    let handles: Vec<_> = (0..40)
        .map(|i| pool.intern_hashed(format!("irq/{i}-eth0").as_bytes()).unwrap())
        .collect();
    assert!(pool.stats().byte_pages > 1);

    pool.reset();

    let stats = pool.stats();
    assert_eq!(stats.byte_pages, 0);
    assert_eq!(stats.node_pages, 0);
    assert_eq!(stats.record_pages, 0);
    assert_eq!(stats.distinct, 0);
    assert!(handles.iter().all(|h| pool.resolve(*h).is_none()));

    let fresh = pool.intern_hashed(b"irq/0-eth0").unwrap();
    assert!(!handles.contains(&fresh));
    assert_eq!(pool.resolve_str(fresh), Some("irq/0-eth0"));
}

#[test]
fn test_exhaustion_then_reset_recovers() {
    let config = PoolConfig {
        bucket_count: 8,
        byte_page_size: 32,
        byte_pages: 2,
        ..PoolConfig::default()
    };
    let mut pool = StringPool::new(config).unwrap();
    let mut failure = None;
    for i in 0..100 {
        if let Err(err) = pool.intern_hashed(format!("event_{i}").as_bytes()) {
            failure = Some(err);
            break;
        }
    }
    assert_eq!(
        failure,
        Some(PoolError::AllocationExhausted {
            arena: ArenaKind::StringBytes,
            max_pages: 2
        })
    );
    pool.validate().unwrap();

    pool.reset();
    assert!(pool.intern_hashed(b"event_0").is_ok());
}

#[test]
fn test_random_insertions_keep_trees_balanced() {
    let mut rng = fastrand::Rng::with_seed(0x7ace);
    let mut pool = StringPool::new(
        PoolConfig::default()
            .with_buckets(3)
            .with_fallback_threshold(u32::MAX),
    )
    .unwrap();
    let mut seen = std::collections::HashMap::new();
    for _ in 0..5_000 {
        let len = rng.usize(1..12);
        let token: Vec<u8> = (0..len).map(|_| rng.u8(b'a'..=b'f')).collect();
        let hash = hash_bytes(&token);
        let handle = pool.intern(&token, hash).unwrap();
        let first = *seen.entry(token).or_insert(handle);
        assert_eq!(first, handle);
    }
    pool.validate().unwrap();
    assert_eq!(pool.len(), seen.len());
    for bucket in 0..3 {
        let usage = pool.bucket_usage(bucket).unwrap() as f64;
        let height = pool.bucket_height(bucket).unwrap() as f64;
        assert!(height <= 1.45 * (usage + 2.0).log2());
    }
}

#[test]
fn test_byte_order_is_raw() {
    let mut pool = one_bucket(50);
    // uppercase sorts before lowercase, prefix before extension
    for s in ["b", "B", "a", "ab", "\u{e9}", "A"] {
        pool.intern_str(s, 0).unwrap();
    }
    pool.validate().unwrap();
    assert!(pool.contains("ab".as_bytes(), 0));
    assert!(!pool.contains("AB".as_bytes(), 0));
}

#[test]
fn test_stats_serialize() {
    let mut pool = StringPool::default();
    pool.intern_hashed(b"cpu_frequency").unwrap();
    pool.intern_hashed(b"cpu_frequency").unwrap();
    let json = serde_json::to_value(pool.stats()).unwrap();
    assert_eq!(json["distinct"], 1);
    assert_eq!(json["dedup_hits"], 1);
    assert_eq!(json["buckets"], 256);
}
