//! Key-to-shard assignment.
//!
//! The shard of key `k` is `hash(k) mod n_reduce` for a hasher that is
//! stable across calls within one process (no `RandomState` seed), so the
//! same key always lands in the same reducer's input.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::mr::codec::KeyValue;

fn shard_for_key(key: &str, n_reduce: u32) -> u32 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() % n_reduce as u64) as u32
}

/// Split `kvs` into `n_reduce` shards by key hash. Empty shards are
/// permitted.
pub fn partition(kvs: Vec<KeyValue>, n_reduce: u32) -> Vec<Vec<KeyValue>> {
    assert!(n_reduce > 0, "n_reduce must be >= 1");
    let mut shards: Vec<Vec<KeyValue>> = (0..n_reduce).map(|_| Vec::new()).collect();
    for kv in kvs {
        let idx = shard_for_key(&kv.key, n_reduce) as usize;
        shards[idx].push(kv);
    }
    shards
}
