//! A map from `K` to `(V, expiry-instant)`. Entries past their expiry are
//! invisible to every read operation; `purge` reclaims them.
//!
//! Grounded on the discovery awaiting-pongs use (see `discovery::manager`)
//! and on the synchronized-map idiom used elsewhere for JSON object parser
//! buffers — i.e. a single `parking_lot::Mutex` guarding every multi-step
//! invariant, rather than fine-grained locking.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

struct Entry<V> {
    value: V,
    expiry: Option<Instant>,
}

struct QueuedExpiry<K> {
    expiry: Instant,
    key: K,
    /// Identity token for the entry that was current when this was queued;
    /// `purge` only evicts if this still matches the live entry, so a stale
    /// queue item can't evict a later reinsertion under the same key.
    token: Arc<()>,
}

impl<K> PartialEq for QueuedExpiry<K> {
    fn eq(&self, other: &Self) -> bool {
        self.expiry == other.expiry
    }
}
impl<K> Eq for QueuedExpiry<K> {}
impl<K> PartialOrd for QueuedExpiry<K> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl<K> Ord for QueuedExpiry<K> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.expiry.cmp(&other.expiry)
    }
}

struct Inner<K, V> {
    entries: HashMap<K, (Entry<V>, Arc<()>)>,
    queue: BinaryHeap<Reverse<QueuedExpiry<K>>>,
}

/// Key→(value, expiry) map with lazy and forced purge.
pub struct ExpiringMap<K, V> {
    inner: Mutex<Inner<K, V>>,
}

impl<K, V> Default for ExpiringMap<K, V>
where
    K: std::hash::Hash + Eq + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> ExpiringMap<K, V>
where
    K: std::hash::Hash + Eq + Clone,
{
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                queue: BinaryHeap::new(),
            }),
        }
    }

    /// `put(k, v)` without an expiry: the entry never expires on its own.
    pub fn put(&self, key: K, value: V) {
        let mut inner = self.inner.lock();
        let token = Arc::new(());
        inner.entries.insert(key, (Entry { value, expiry: None }, token));
    }

    /// `put(k, v, expiry)`. `expiry <= now` behaves as `remove(k)`.
    pub fn put_with_expiry(&self, key: K, value: V, expiry: Instant, now: Instant) -> Option<V> {
        if expiry <= now {
            return self.remove_locked(&key);
        }
        let mut inner = self.inner.lock();
        let token = Arc::new(());
        let prev = inner
            .entries
            .insert(key.clone(), (Entry { value, expiry: Some(expiry) }, token.clone()));
        inner.queue.push(Reverse(QueuedExpiry { expiry, key, token }));
        prev.and_then(|(e, _)| if e.expiry.map_or(true, |exp| exp > now) { Some(e.value) } else { None })
    }

    pub fn get(&self, key: &K, now: Instant) -> Option<V>
    where
        V: Clone,
    {
        let inner = self.inner.lock();
        inner.entries.get(key).and_then(|(e, _)| {
            if e.expiry.map_or(true, |exp| exp > now) {
                Some(e.value.clone())
            } else {
                None
            }
        })
    }

    pub fn contains(&self, key: &K, now: Instant) -> bool {
        let inner = self.inner.lock();
        inner
            .entries
            .get(key)
            .is_some_and(|(e, _)| e.expiry.map_or(true, |exp| exp > now))
    }

    /// Removes and returns the live entry for `key`, if any (including ones
    /// that have not yet been purged but are already expired — this method
    /// always takes `now` into account).
    pub fn remove(&self, key: &K, now: Instant) -> Option<V> {
        let mut inner = self.inner.lock();
        match inner.entries.get(key) {
            Some((e, _)) if e.expiry.map_or(true, |exp| exp > now) => {
                inner.entries.remove(key).map(|(e, _)| e.value)
            }
            _ => None,
        }
    }

    /// Removes and returns the live entry for `key` only if its value equals
    /// `expected`; leaves a non-matching (or expired, or absent) entry alone.
    pub fn remove_if(&self, key: &K, now: Instant, expected: &V) -> Option<V>
    where
        V: PartialEq,
    {
        let mut inner = self.inner.lock();
        match inner.entries.get(key) {
            Some((e, _)) if e.expiry.map_or(true, |exp| exp > now) && &e.value == expected => {
                inner.entries.remove(key).map(|(e, _)| e.value)
            }
            _ => None,
        }
    }

    fn remove_locked(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        inner.entries.remove(key).map(|(e, _)| e.value)
    }

    pub fn size(&self, now: Instant) -> usize {
        let inner = self.inner.lock();
        inner
            .entries
            .values()
            .filter(|(e, _)| e.expiry.map_or(true, |exp| exp > now))
            .count()
    }

    /// Removes exactly those entries whose expiry `<= now` and whose queued
    /// reference still matches the current mapping.
    pub fn purge(&self, now: Instant) {
        let mut inner = self.inner.lock();
        while let Some(Reverse(top)) = inner.queue.peek() {
            if top.expiry > now {
                break;
            }
            let Reverse(expired) = inner.queue.pop().unwrap();
            if let Some((_, token)) = inner.entries.get(&expired.key) {
                if Arc::ptr_eq(token, &expired.token) {
                    inner.entries.remove(&expired.key);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn get_hides_expired_entries() {
        let map: ExpiringMap<&str, u32> = ExpiringMap::new();
        let now = Instant::now();
        map.put_with_expiry("a", 1, now + Duration::from_secs(10), now);
        assert_eq!(map.get(&"a", now), Some(1));
        assert_eq!(map.get(&"a", now + Duration::from_secs(11)), None);
    }

    #[test]
    fn put_expiry_le_now_behaves_as_remove() {
        let map: ExpiringMap<&str, u32> = ExpiringMap::new();
        let now = Instant::now();
        map.put("a", 1);
        map.put_with_expiry("a", 2, now, now);
        assert_eq!(map.get(&"a", now), None);
    }

    #[test]
    fn purge_respects_reinsertion_identity() {
        let map: ExpiringMap<&str, u32> = ExpiringMap::new();
        let now = Instant::now();
        map.put_with_expiry("a", 1, now + Duration::from_secs(1), now);
        // Reinsert under the same key with a much later expiry before the
        // first queue entry is purged.
        map.put_with_expiry("a", 2, now + Duration::from_secs(100), now);
        map.purge(now + Duration::from_secs(2));
        assert_eq!(map.get(&"a", now + Duration::from_secs(2)), Some(2));
    }

    #[test]
    fn remove_returns_live_value_only() {
        let map: ExpiringMap<&str, u32> = ExpiringMap::new();
        let now = Instant::now();
        map.put_with_expiry("a", 1, now + Duration::from_secs(1), now);
        assert_eq!(map.remove(&"a", now + Duration::from_secs(2)), None);
        map.put_with_expiry("b", 1, now + Duration::from_secs(1), now);
        assert_eq!(map.remove(&"b", now), Some(1));
        assert_eq!(map.get(&"b", now), None);
    }

    #[test]
    fn remove_if_leaves_non_matching_value_in_place() {
        let map: ExpiringMap<&str, u32> = ExpiringMap::new();
        let now = Instant::now();
        map.put_with_expiry("a", 1, now + Duration::from_secs(10), now);
        assert_eq!(map.remove_if(&"a", now, &2), None);
        assert_eq!(map.get(&"a", now), Some(1));
        assert_eq!(map.remove_if(&"a", now, &1), Some(1));
        assert_eq!(map.get(&"a", now), None);
    }
}
