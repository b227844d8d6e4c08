use fractaltiles_core::CacheConfig;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// Age buckets of touched keys.
///
/// A bucket holds the keys last touched during one tick; a key's age is the
/// number of ticks since then. Within a bucket keys keep their touch order,
/// so eviction always takes the least recently touched key first.
#[derive(Debug, Clone)]
pub struct TimeWheel<K> {
    now: u64,
    next_seq: u64,
    // touch tick -> (touch sequence -> key)
    buckets: BTreeMap<u64, BTreeMap<u64, K>>,
    entries: HashMap<K, (u64, u64)>,
}

impl<K> Default for TimeWheel<K> {
    fn default() -> Self {
        Self {
            now: 0,
            next_seq: 0,
            buckets: BTreeMap::new(),
            entries: HashMap::new(),
        }
    }
}

impl<K: Clone + Eq + Hash> TimeWheel<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move `key` into the youngest bucket.
    pub fn touch(&mut self, key: K) {
        self.unlink(&key);

        let seq = self.next_seq;
        self.next_seq += 1;
        self.buckets
            .entry(self.now)
            .or_default()
            .insert(seq, key.clone());
        self.entries.insert(key, (self.now, seq));
    }

    pub fn remove(&mut self, key: &K) -> bool {
        let removed = self.unlink(key);
        self.entries.remove(key);
        removed
    }

    /// Age every key by one.
    pub fn tick(&mut self) {
        self.now += 1;
    }

    pub fn age(&self, key: &K) -> Option<usize> {
        self.entries
            .get(key)
            .map(|&(touched, _)| (self.now - touched) as usize)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
        self.entries.clear();
    }

    /// Drop keys according to `policy` and return them, oldest first.
    ///
    /// Keys younger than `min_age` are never evicted for capacity. When
    /// `max_age > min_age` and the wheel spans `max_age` buckets (the
    /// oldest key is `max_age - 1` ticks old), the oldest bucket goes
    /// regardless of capacity.
    pub fn evict(&mut self, policy: &CacheConfig) -> Vec<K> {
        let mut evicted = Vec::new();

        if policy.max_age > policy.min_age {
            while let Some(touched) = self.buckets.keys().next().copied() {
                if self.buckets_spanned(touched) < policy.max_age {
                    break;
                }
                if let Some((_, bucket)) = self.buckets.pop_first() {
                    for key in bucket.into_values() {
                        self.entries.remove(&key);
                        evicted.push(key);
                    }
                }
            }
        }

        while self.entries.len() > policy.capacity {
            let Some(mut oldest) = self.buckets.first_entry() else {
                break;
            };
            if ((self.now - *oldest.key()) as usize) < policy.min_age {
                break;
            }

            if let Some((_, key)) = oldest.get_mut().pop_first() {
                self.entries.remove(&key);
                evicted.push(key);
            }
            if oldest.get().is_empty() {
                oldest.remove();
            }
        }

        evicted
    }

    /// Buckets from the one touched at `touched` up to the current one.
    fn buckets_spanned(&self, touched: u64) -> usize {
        (self.now - touched) as usize + 1
    }

    fn unlink(&mut self, key: &K) -> bool {
        let Some(&(touched, seq)) = self.entries.get(key) else {
            return false;
        };

        if let Some(bucket) = self.buckets.get_mut(&touched) {
            bucket.remove(&seq);
            if bucket.is_empty() {
                self.buckets.remove(&touched);
            }
        }
        true
    }
}
