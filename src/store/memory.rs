// In-memory state store backed by a sharded concurrent map.
//
// DashMap gives per-key locking without a global mutex, so concurrent
// scoring calls for different users/IPs/clips never contend. Atomicity is
// entry-level: each operation resolves its key's entry once and mutates it
// under that entry's lock.
//
// Expiry is lazy — an expired entry behaves as absent and is dropped the
// next time its key is read — plus a periodic `sweep` that prunes keys
// nobody touches anymore, bounding memory to recently-active identities.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use tracing::debug;

use super::{StateStore, StoreError, StoreResult};

#[derive(Debug, Clone)]
enum Value {
    Scalar(String),
    Counter(i64),
    Set(HashSet<String>),
    List(VecDeque<String>),
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Value, ttl: Option<Duration>, now: Instant) -> Self {
        Self {
            value,
            expires_at: ttl.map(|d| now + d),
        }
    }

    fn expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

fn wrong_type(key: &str, expected: &'static str) -> StoreError {
    StoreError::WrongType {
        key: key.to_string(),
        expected,
    }
}

/// Resolve a Redis-style inclusive [start, stop] range against a list of
/// `len` elements. Negative indices count from the tail. Returns `None`
/// when the resolved range is empty.
fn resolve_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }
    let len = len as i64;
    let start = if start < 0 { len + start } else { start }.max(0);
    let stop = if stop < 0 { len + stop } else { stop }.min(len - 1);
    if start > stop || start >= len || stop < 0 {
        None
    } else {
        Some((start as usize, stop as usize))
    }
}

enum Lookup<T> {
    Hit(StoreResult<T>),
    Expired,
    Missing,
}

/// Concurrent in-memory implementation of [`StateStore`].
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Number of live (non-expired) keys. Intended for stats output.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| !e.expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.expired(now));
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!(removed, remaining = self.entries.len(), "Swept expired state");
        }
        removed
    }

    /// Background housekeeping task: sweep expired entries on an interval.
    pub async fn sweep_loop(self: Arc<Self>, interval: Duration) {
        loop {
            tokio::time::sleep(interval).await;
            self.sweep();
        }
    }

    /// Run `f` against the live value at `key`, or return `absent` when the
    /// key is missing or expired. The map guard is released before an
    /// expired entry is evicted (holding it across the removal would
    /// deadlock on the entry's shard).
    fn read_live<T>(
        &self,
        key: &str,
        absent: T,
        f: impl FnOnce(&Value) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let now = Instant::now();
        let outcome = match self.entries.get(key) {
            Some(e) if e.expired(now) => Lookup::Expired,
            Some(e) => Lookup::Hit(f(&e.value)),
            None => Lookup::Missing,
        };
        match outcome {
            Lookup::Hit(result) => result,
            Lookup::Expired => {
                self.entries.remove_if(key, |_, e| e.expired(now));
                Ok(absent)
            }
            Lookup::Missing => Ok(absent),
        }
    }

    /// Mutable counterpart of `read_live`, with the same eviction rule.
    fn write_live<T>(
        &self,
        key: &str,
        absent: T,
        f: impl FnOnce(&mut Entry, Instant) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let now = Instant::now();
        let outcome = match self.entries.get_mut(key) {
            Some(e) if e.expired(now) => Lookup::Expired,
            Some(mut e) => Lookup::Hit(f(&mut e, now)),
            None => Lookup::Missing,
        };
        match outcome {
            Lookup::Hit(result) => result,
            Lookup::Expired => {
                self.entries.remove_if(key, |_, e| e.expired(now));
                Ok(absent)
            }
            Lookup::Missing => Ok(absent),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.read_live(key, None, |value| match value {
            Value::Scalar(s) => Ok(Some(s.clone())),
            Value::Counter(n) => Ok(Some(n.to_string())),
            _ => Err(wrong_type(key, "scalar")),
        })
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        let now = Instant::now();
        self.entries.insert(
            key.to_string(),
            Entry::new(Value::Scalar(value.to_string()), ttl, now),
        );
        Ok(())
    }

    async fn incr(&self, key: &str, ttl: Option<Duration>) -> StoreResult<i64> {
        let now = Instant::now();
        match self.entries.entry(key.to_string()) {
            MapEntry::Occupied(mut occ) => {
                let e = occ.get_mut();
                if e.expired(now) {
                    // First increment of a new window: fresh counter, fresh TTL.
                    *e = Entry::new(Value::Counter(1), ttl, now);
                    return Ok(1);
                }
                match &mut e.value {
                    Value::Counter(n) => {
                        *n += 1;
                        Ok(*n)
                    }
                    _ => Err(wrong_type(key, "counter")),
                }
            }
            MapEntry::Vacant(vac) => {
                vac.insert(Entry::new(Value::Counter(1), ttl, now));
                Ok(1)
            }
        }
    }

    async fn counter(&self, key: &str) -> StoreResult<i64> {
        self.read_live(key, 0, |value| match value {
            Value::Counter(n) => Ok(*n),
            _ => Err(wrong_type(key, "counter")),
        })
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        self.write_live(key, false, |e, now| {
            e.expires_at = Some(now + ttl);
            Ok(true)
        })
    }

    async fn set_add(&self, key: &str, member: &str, ttl: Option<Duration>) -> StoreResult<bool> {
        let now = Instant::now();
        match self.entries.entry(key.to_string()) {
            MapEntry::Occupied(mut occ) => {
                let e = occ.get_mut();
                if e.expired(now) {
                    *e = Entry::new(Value::Set(HashSet::from([member.to_string()])), ttl, now);
                    return Ok(true);
                }
                match &mut e.value {
                    Value::Set(set) => {
                        let added = set.insert(member.to_string());
                        // Sets stay alive as long as they keep seeing writes.
                        e.expires_at = ttl.map(|d| now + d);
                        Ok(added)
                    }
                    _ => Err(wrong_type(key, "set")),
                }
            }
            MapEntry::Vacant(vac) => {
                vac.insert(Entry::new(
                    Value::Set(HashSet::from([member.to_string()])),
                    ttl,
                    now,
                ));
                Ok(true)
            }
        }
    }

    async fn set_card(&self, key: &str) -> StoreResult<u64> {
        self.read_live(key, 0, |value| match value {
            Value::Set(set) => Ok(set.len() as u64),
            _ => Err(wrong_type(key, "set")),
        })
    }

    async fn set_contains(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.read_live(key, false, |value| match value {
            Value::Set(set) => Ok(set.contains(member)),
            _ => Err(wrong_type(key, "set")),
        })
    }

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        self.read_live(key, Vec::new(), |value| match value {
            Value::Set(set) => Ok(set.iter().cloned().collect()),
            _ => Err(wrong_type(key, "set")),
        })
    }

    async fn list_push(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<u64> {
        let now = Instant::now();
        match self.entries.entry(key.to_string()) {
            MapEntry::Occupied(mut occ) => {
                let e = occ.get_mut();
                if e.expired(now) {
                    *e = Entry::new(Value::List(VecDeque::from([value.to_string()])), ttl, now);
                    return Ok(1);
                }
                match &mut e.value {
                    Value::List(list) => {
                        list.push_back(value.to_string());
                        e.expires_at = ttl.map(|d| now + d);
                        Ok(list.len() as u64)
                    }
                    _ => Err(wrong_type(key, "list")),
                }
            }
            MapEntry::Vacant(vac) => {
                vac.insert(Entry::new(
                    Value::List(VecDeque::from([value.to_string()])),
                    ttl,
                    now,
                ));
                Ok(1)
            }
        }
    }

    async fn list_trim(&self, key: &str, start: i64, stop: i64) -> StoreResult<()> {
        self.write_live(key, (), |e, _now| match &mut e.value {
            Value::List(list) => {
                match resolve_range(list.len(), start, stop) {
                    Some((s, t)) => {
                        list.truncate(t + 1);
                        list.drain(..s);
                    }
                    None => list.clear(),
                }
                Ok(())
            }
            _ => Err(wrong_type(key, "list")),
        })
    }

    async fn list_range(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<String>> {
        self.read_live(key, Vec::new(), |value| match value {
            Value::List(list) => Ok(match resolve_range(list.len(), start, stop) {
                Some((s, t)) => list.iter().skip(s).take(t - s + 1).cloned().collect(),
                None => Vec::new(),
            }),
            _ => Err(wrong_type(key, "list")),
        })
    }
}
