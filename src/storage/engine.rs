//! The sharded keyspace engine: `N` independent shards (default 16, must be
//! a power of two), each owning its own key→`Entry` map behind an exclusive
//! `RwLock`. Every public operation here is atomic with respect to the
//! single key it names; multi-key operations lock the shards they touch in
//! ascending shard-index order to avoid deadlock (`lock_many`).
//!
//! Each shard holds one `RwLock<HashMap<Bytes, Entry>>` rather than a
//! separate map per value kind: a key owns exactly one `Kind` at a time, so
//! one map per shard is enough.

use crate::error::{CoreError, CoreResult};
use crate::storage::entry::{Entry, Kind};
use bytes::Bytes;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::sync::RwLockWriteGuard;
use std::time::Instant;
use tokio::sync::Notify;

pub struct Shard {
    data: RwLock<HashMap<Bytes, Entry>>,
}

impl Shard {
    fn new() -> Self {
        Shard {
            data: RwLock::new(HashMap::new()),
        }
    }
}

#[derive(Debug, Default)]
pub struct EngineStats {
    pub get_count: AtomicU64,
    pub set_count: AtomicU64,
    pub del_count: AtomicU64,
    pub expired_count: AtomicU64,
    pub keyspace_hits: AtomicU64,
    pub keyspace_misses: AtomicU64,
}

pub struct KeyspaceEngine {
    shards: Vec<Shard>,
    pub stats: EngineStats,
    /// Parked wakers for blocking list operations (`BLPOP`/`BRPOP`/
    /// `BLMOVE`/`BLMPOP`), keyed by the list key they're waiting on. A
    /// push notifies the oldest waiter first, so waiters are served
    /// roughly in arrival order.
    blocking_waiters: Mutex<HashMap<Bytes, VecDeque<Arc<Notify>>>>,
}

impl KeyspaceEngine {
    /// `num_shards` must be a power of two; callers pass the
    /// configured value (default 16) and this panics on misconfiguration
    /// rather than silently rounding, since the shard count is fixed for
    /// the server's lifetime.
    pub fn new(num_shards: usize) -> Self {
        assert!(
            num_shards > 0 && num_shards.is_power_of_two(),
            "shard count must be a power of two, got {}",
            num_shards
        );
        let shards = (0..num_shards).map(|_| Shard::new()).collect();
        KeyspaceEngine {
            shards,
            stats: EngineStats::default(),
            blocking_waiters: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a waker for `key` and returns it so the caller can
    /// `.notified().await` with a timeout.
    pub fn register_waiter(&self, key: &Bytes) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.blocking_waiters
            .lock()
            .unwrap()
            .entry(key.clone())
            .or_default()
            .push_back(notify.clone());
        notify
    }

    /// Wakes the oldest waiter on `key`, if any. Called right after a push
    /// makes the key non-empty so no wakeup is lost.
    pub fn notify_one_waiter(&self, key: &Bytes) {
        let mut waiters = self.blocking_waiters.lock().unwrap();
        if let Some(queue) = waiters.get_mut(key) {
            if let Some(notify) = queue.pop_front() {
                notify.notify_one();
            }
            if queue.is_empty() {
                waiters.remove(key);
            }
        }
    }

    pub fn num_shards(&self) -> usize {
        self.shards.len()
    }

    pub fn shard_index(&self, key: &[u8]) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) & (self.shards.len() - 1)
    }

    fn shard(&self, key: &[u8]) -> &Shard {
        &self.shards[self.shard_index(key)]
    }

    /// Removes `key` from `map` if its entry has expired. Returns `true` if
    /// a removal happened.
    fn evict_if_expired(map: &mut HashMap<Bytes, Entry>, key: &Bytes) -> bool {
        if let Some(entry) = map.get(key) {
            if entry.is_expired() {
                map.remove(key);
                return true;
            }
        }
        false
    }

    /// Lazy-expiry read: a read-lock fast path, falling back to a write
    /// lock only when the entry needs evicting (double-checked under the
    /// write lock in case another thread raced us to it).
    pub fn with_read<T>(&self, key: &Bytes, f: impl FnOnce(&Kind) -> T) -> Option<T> {
        let shard = self.shard(key);
        {
            let guard = shard.data.read().unwrap();
            match guard.get(key) {
                Some(entry) if !entry.is_expired() => return Some(f(&entry.kind)),
                Some(_) => {}
                None => return None,
            }
        }
        let mut guard = shard.data.write().unwrap();
        if Self::evict_if_expired(&mut guard, key) {
            self.stats.expired_count.fetch_add(1, Ordering::Relaxed);
        }
        guard.get(key).map(|entry| f(&entry.kind))
    }

    pub fn with_write<T>(&self, key: &Bytes, f: impl FnOnce(&mut Entry) -> T) -> Option<T> {
        let shard = self.shard(key);
        let mut guard = shard.data.write().unwrap();
        if Self::evict_if_expired(&mut guard, key) {
            self.stats.expired_count.fetch_add(1, Ordering::Relaxed);
        }
        guard.get_mut(key).map(|entry| {
            let r = f(entry);
            entry.bump_version();
            r
        })
    }

    /// Fetches the entry for `key`, creating it via `default` if absent.
    /// Families express a `WRONGTYPE` check themselves inside `f` (by
    /// matching on `entry.kind` and returning `Err(CoreError::WrongType)`),
    /// since only the caller knows which kinds it accepts.
    pub fn with_write_or_insert<T>(
        &self,
        key: &Bytes,
        default: impl FnOnce() -> Kind,
        f: impl FnOnce(&mut Entry) -> CoreResult<T>,
    ) -> CoreResult<T> {
        let shard = self.shard(key);
        let mut guard = shard.data.write().unwrap();
        if Self::evict_if_expired(&mut guard, key) {
            self.stats.expired_count.fetch_add(1, Ordering::Relaxed);
        }
        let entry = guard.entry(key.clone()).or_insert_with(|| Entry::new(default()));
        let result = f(entry)?;
        entry.bump_version();
        Ok(result)
    }

    pub fn exists(&self, key: &Bytes) -> bool {
        self.with_read(key, |_| ()).is_some()
    }

    pub fn type_of(&self, key: &Bytes) -> Option<&'static str> {
        self.with_read(key, |kind| kind.type_name())
    }

    pub fn version_of(&self, key: &Bytes) -> u64 {
        let shard = self.shard(key);
        let mut guard = shard.data.write().unwrap();
        if Self::evict_if_expired(&mut guard, key) {
            self.stats.expired_count.fetch_add(1, Ordering::Relaxed);
        }
        guard.get(key).map(|e| e.version).unwrap_or(0)
    }

    pub fn del(&self, keys: &[Bytes]) -> usize {
        let mut removed = 0;
        for key in keys {
            let shard = self.shard(key);
            let mut guard = shard.data.write().unwrap();
            if guard.remove(key).is_some() {
                removed += 1;
            }
        }
        self.stats.del_count.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Deletes `key` only if its current kind matches `type_name`
    /// (`DELTYPE`, an administrative extension alongside
    /// `DEL`/`FLUSHALL`/expiry sweep).
    pub fn del_if_type(&self, key: &Bytes, type_name: &str) -> bool {
        let shard = self.shard(key);
        let mut guard = shard.data.write().unwrap();
        let matches = guard
            .get(key)
            .map(|e| e.kind.type_name() == type_name)
            .unwrap_or(false);
        if matches {
            guard.remove(key);
        }
        matches
    }

    pub fn expire_at(&self, key: &Bytes, at: Option<Instant>) -> bool {
        let shard = self.shard(key);
        let mut guard = shard.data.write().unwrap();
        if Self::evict_if_expired(&mut guard, key) {
            return false;
        }
        match guard.get_mut(key) {
            Some(entry) => {
                entry.expires_at = at;
                entry.bump_version();
                true
            }
            None => false,
        }
    }

    /// `TTL`/`PTTL`: `None` means the key doesn't exist (caller reports
    /// `-2`); `Some(None)` means no expiry (`-1`); `Some(Some(ms))` is the
    /// remaining time.
    pub fn ttl_ms(&self, key: &Bytes) -> Option<Option<i64>> {
        let shard = self.shard(key);
        let mut guard = shard.data.write().unwrap();
        if Self::evict_if_expired(&mut guard, key) {
            return None;
        }
        guard.get(key).map(|entry| entry.ttl_ms())
    }

    pub fn persist(&self, key: &Bytes) -> bool {
        let shard = self.shard(key);
        let mut guard = shard.data.write().unwrap();
        match guard.get_mut(key) {
            Some(entry) if entry.expires_at.is_some() => {
                entry.expires_at = None;
                entry.bump_version();
                true
            }
            _ => false,
        }
    }

    /// Active-expiry sweep: scans every shard under its own write lock and
    /// evicts anything past its deadline, so a key that expires and is never
    /// touched again doesn't linger forever. Used by small/idle keyspaces and
    /// by tests, where a full scan is cheap. [`KeyspaceEngine::reap_sample`]
    /// is the steady-state background sweep.
    pub fn reap_expired(&self) -> usize {
        let mut removed = 0;
        for shard in &self.shards {
            let mut guard = shard.data.write().unwrap();
            let before = guard.len();
            guard.retain(|_, entry| !entry.is_expired());
            removed += before - guard.len();
        }
        if removed > 0 {
            self.stats.expired_count.fetch_add(removed as u64, Ordering::Relaxed);
        }
        removed
    }

    /// Active-expiry sweep over a random sample of each shard rather than a
    /// full scan, so sweep cost stays bounded as shards grow — the same
    /// sample-and-check-ratio approach real expire cycles use, adapted to a
    /// sharded map instead of a single keyspace. Returns `(sampled, expired)`
    /// so callers can compute an expiry ratio to drive adaptive scheduling.
    pub fn reap_sample(&self, sample_size_per_shard: usize) -> (usize, usize) {
        let mut rng = rand::thread_rng();
        let mut sampled = 0;
        let mut expired = 0;
        for shard in &self.shards {
            let mut guard = shard.data.write().unwrap();
            let len = guard.len();
            if len == 0 || sample_size_per_shard == 0 {
                continue;
            }
            let n = sample_size_per_shard.min(len);
            let chosen: std::collections::HashSet<usize> =
                rand::seq::index::sample(&mut rng, len, n).into_iter().collect();
            let expired_keys: Vec<Bytes> = guard
                .iter()
                .enumerate()
                .filter(|(i, (_, entry))| chosen.contains(i) && entry.is_expired())
                .map(|(_, (k, _))| k.clone())
                .collect();
            sampled += n;
            expired += expired_keys.len();
            for key in expired_keys {
                guard.remove(&key);
            }
        }
        if expired > 0 {
            self.stats.expired_count.fetch_add(expired as u64, Ordering::Relaxed);
        }
        (sampled, expired)
    }

    /// Shrinks the backing `HashMap` of any shard whose load factor has
    /// dropped below `fill_ratio_threshold` (many deletes, few remaining
    /// entries), reclaiming the excess bucket capacity. Returns the number
    /// of shards shrunk.
    pub fn defrag_pass(&self, fill_ratio_threshold: f64) -> usize {
        let mut shrunk = 0;
        for shard in &self.shards {
            let mut guard = shard.data.write().unwrap();
            let capacity = guard.capacity();
            if capacity == 0 {
                continue;
            }
            let fill_ratio = guard.len() as f64 / capacity as f64;
            if fill_ratio < fill_ratio_threshold {
                guard.shrink_to_fit();
                shrunk += 1;
            }
        }
        shrunk
    }

    pub fn dbsize(&self) -> usize {
        self.shards
            .iter()
            .map(|s| {
                let guard = s.data.read().unwrap();
                guard.values().filter(|e| !e.is_expired()).count()
            })
            .sum()
    }

    pub fn flush_all(&self) {
        for shard in &self.shards {
            shard.data.write().unwrap().clear();
        }
    }

    pub fn keys_matching(&self, pattern: &str) -> Vec<Bytes> {
        let mut out = Vec::new();
        for shard in &self.shards {
            let guard = shard.data.read().unwrap();
            for (key, entry) in guard.iter() {
                if !entry.is_expired() && glob_match(pattern.as_bytes(), key) {
                    out.push(key.clone());
                }
            }
        }
        out
    }

    /// Cursor-based `SCAN`: the cursor is a flat index into a deterministic
    /// per-call ordering (all live keys, sorted). Not a stable cursor under
    /// concurrent mutation — matching real Redis's own "may return
    /// duplicates or miss insertions" `SCAN` guarantee — but simple and
    /// correct for a single-pass client.
    pub fn scan(&self, cursor: u64, pattern: Option<&str>, count: usize) -> (u64, Vec<Bytes>) {
        let mut all_keys: Vec<Bytes> = Vec::new();
        for shard in &self.shards {
            let guard = shard.data.read().unwrap();
            for (key, entry) in guard.iter() {
                if !entry.is_expired() {
                    all_keys.push(key.clone());
                }
            }
        }
        all_keys.sort();
        let start = cursor as usize;
        if start >= all_keys.len() {
            return (0, Vec::new());
        }
        let end = (start + count.max(1)).min(all_keys.len());
        let page: Vec<Bytes> = all_keys[start..end]
            .iter()
            .filter(|k| pattern.map(|p| glob_match(p.as_bytes(), k)).unwrap_or(true))
            .cloned()
            .collect();
        let next_cursor = if end >= all_keys.len() { 0 } else { end as u64 };
        (next_cursor, page)
    }

    pub fn rename(&self, src: &Bytes, dst: &Bytes) -> CoreResult<()> {
        let si = self.shard_index(src);
        let di = self.shard_index(dst);
        if si == di {
            let mut guard = self.shards[si].data.write().unwrap();
            Self::evict_if_expired(&mut guard, src);
            let entry = guard.remove(src).ok_or(CoreError::NoSuchKey)?;
            guard.insert(dst.clone(), entry);
            Ok(())
        } else {
            let (first, second) = if si < di { (si, di) } else { (di, si) };
            let mut g1 = self.shards[first].data.write().unwrap();
            let mut g2 = self.shards[second].data.write().unwrap();
            let (src_guard, dst_guard): (&mut HashMap<Bytes, Entry>, &mut HashMap<Bytes, Entry>) =
                if si == first {
                    (&mut g1, &mut g2)
                } else {
                    (&mut g2, &mut g1)
                };
            Self::evict_if_expired(src_guard, src);
            let entry = src_guard.remove(src).ok_or(CoreError::NoSuchKey)?;
            dst_guard.insert(dst.clone(), entry);
            Ok(())
        }
    }

    /// Locks every shard touched by `keys`, in ascending shard-index order,
    /// for the duration of the returned guard set — the deadlock-avoidance
    /// strategy for multi-key atomic ops (`MSET`, `SINTERSTORE`,
    /// `ZUNIONSTORE`, ...).
    pub fn lock_many(&self, keys: &[Bytes]) -> MultiShardGuard<'_> {
        let mut indices: Vec<usize> = keys.iter().map(|k| self.shard_index(k)).collect();
        indices.sort_unstable();
        indices.dedup();
        let mut guards = BTreeMap::new();
        for idx in indices {
            guards.insert(idx, self.shards[idx].data.write().unwrap());
        }
        MultiShardGuard {
            engine: self,
            guards,
        }
    }
}

/// A set of write-locked shards acquired via [`KeyspaceEngine::lock_many`].
/// Holding this across several key mutations makes the overall operation
/// appear atomic, since no other session can touch any involved shard until
/// it drops.
pub struct MultiShardGuard<'a> {
    engine: &'a KeyspaceEngine,
    guards: BTreeMap<usize, RwLockWriteGuard<'a, HashMap<Bytes, Entry>>>,
}

impl<'a> MultiShardGuard<'a> {
    pub fn map_for(&mut self, key: &Bytes) -> &mut HashMap<Bytes, Entry> {
        let idx = self.engine.shard_index(key);
        self.guards.get_mut(&idx).expect("shard locked by lock_many")
    }
}

/// Hand-rolled glob matcher for `KEYS`/`SCAN` patterns, supporting `*`,
/// `?`, `[abc]`, `[^abc]`, ranges, and backslash escapes.
pub fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    match_recursive(pattern, text)
}

fn match_recursive(pattern: &[u8], text: &[u8]) -> bool {
    if pattern.is_empty() {
        return text.is_empty();
    }
    match pattern[0] {
        b'*' => {
            if match_recursive(&pattern[1..], text) {
                return true;
            }
            for i in 0..text.len() {
                if match_recursive(&pattern[1..], &text[i + 1..]) {
                    return true;
                }
            }
            false
        }
        b'?' => !text.is_empty() && match_recursive(&pattern[1..], &text[1..]),
        b'[' => {
            if text.is_empty() {
                return false;
            }
            match class_end(pattern) {
                Some(rest) => class_matches(pattern, text[0]) && match_recursive(rest, &text[1..]),
                None => false,
            }
        }
        b'\\' if pattern.len() > 1 => {
            !text.is_empty() && pattern[1] == text[0] && match_recursive(&pattern[2..], &text[1..])
        }
        c => !text.is_empty() && c == text[0] && match_recursive(&pattern[1..], &text[1..]),
    }
}

/// Returns the pattern slice following a `[...]` class, if `pattern` starts
/// with a well-formed one.
fn class_end(pattern: &[u8]) -> Option<&[u8]> {
    let close = pattern.iter().position(|&b| b == b']')?;
    if close == 0 {
        return None;
    }
    Some(&pattern[close + 1..])
}

fn class_matches(pattern: &[u8], c: u8) -> bool {
    let close = match pattern.iter().position(|&b| b == b']') {
        Some(i) => i,
        None => return false,
    };
    let mut body = &pattern[1..close];
    let negate = body.first() == Some(&b'^');
    if negate {
        body = &body[1..];
    }
    let mut i = 0;
    let mut found = false;
    while i < body.len() {
        if i + 2 < body.len() && body[i + 1] == b'-' {
            if body[i] <= c && c <= body[i + 2] {
                found = true;
            }
            i += 3;
        } else {
            if body[i] == c {
                found = true;
            }
            i += 1;
        }
    }
    found != negate
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> KeyspaceEngine {
        KeyspaceEngine::new(16)
    }

    #[test]
    fn basic_set_get_roundtrip() {
        let e = engine();
        let key = Bytes::from("k");
        e.with_write_or_insert(&key, || Kind::Str(Bytes::new()), |entry| {
            entry.kind = Kind::Str(Bytes::from("v"));
            Ok::<_, CoreError>(())
        })
        .unwrap();
        let got = e.with_read(&key, |kind| match kind {
            Kind::Str(b) => b.clone(),
            _ => panic!("wrong kind"),
        });
        assert_eq!(got, Some(Bytes::from("v")));
    }

    #[test]
    fn del_removes_key() {
        let e = engine();
        let key = Bytes::from("k");
        e.with_write_or_insert(&key, || Kind::Str(Bytes::new()), |_| Ok::<_, CoreError>(()))
            .unwrap();
        assert!(e.exists(&key));
        assert_eq!(e.del(&[key.clone()]), 1);
        assert!(!e.exists(&key));
    }

    #[test]
    fn expire_and_ttl() {
        let e = engine();
        let key = Bytes::from("k");
        e.with_write_or_insert(&key, || Kind::Str(Bytes::new()), |_| Ok::<_, CoreError>(()))
            .unwrap();
        assert_eq!(e.ttl_ms(&key), Some(None));
        e.expire_at(&key, Some(Instant::now() + std::time::Duration::from_secs(10)));
        let ttl = e.ttl_ms(&key).unwrap().unwrap();
        assert!(ttl > 0 && ttl <= 10_000);
        assert!(e.persist(&key));
        assert_eq!(e.ttl_ms(&key), Some(None));
    }

    #[test]
    fn rename_moves_value_across_shards() {
        let e = engine();
        let src = Bytes::from("src-key");
        let dst = Bytes::from("dst-key-that-hashes-elsewhere");
        e.with_write_or_insert(&src, || Kind::Str(Bytes::from("hello")), |_| Ok::<_, CoreError>(()))
            .unwrap();
        e.rename(&src, &dst).unwrap();
        assert!(!e.exists(&src));
        assert!(e.exists(&dst));
    }

    #[test]
    fn version_bumps_on_mutation() {
        let e = engine();
        let key = Bytes::from("k");
        e.with_write_or_insert(&key, || Kind::Str(Bytes::new()), |_| Ok::<_, CoreError>(()))
            .unwrap();
        let v0 = e.version_of(&key);
        e.with_write(&key, |entry| entry.kind = Kind::Str(Bytes::from("changed")));
        let v1 = e.version_of(&key);
        assert!(v1 > v0);
    }

    #[test]
    fn glob_star_question_and_class() {
        assert!(glob_match(b"user:*", b"user:123"));
        assert!(glob_match(b"k?y", b"key"));
        assert!(glob_match(b"[abc]x", b"ax"));
        assert!(!glob_match(b"[^abc]x", b"ax"));
        assert!(glob_match(b"[a-c]x", b"bx"));
    }

    #[test]
    fn reap_expired_evicts_past_deadline_keys() {
        let e = engine();
        let key = Bytes::from("k");
        e.with_write_or_insert(&key, || Kind::Str(Bytes::new()), |_| Ok::<_, CoreError>(()))
            .unwrap();
        e.expire_at(&key, Some(Instant::now() - std::time::Duration::from_secs(1)));
        let removed = e.reap_expired();
        assert_eq!(removed, 1);
        assert_eq!(e.dbsize(), 0);
    }

    #[test]
    fn defrag_pass_shrinks_underfull_shards() {
        let e = engine();
        for i in 0..100 {
            let key = Bytes::from(format!("k{}", i));
            e.with_write_or_insert(&key, || Kind::Str(Bytes::new()), |_| Ok::<_, CoreError>(()))
                .unwrap();
        }
        e.del(&(0..95).map(|i| Bytes::from(format!("k{}", i))).collect::<Vec<_>>());
        let shrunk = e.defrag_pass(0.9);
        assert!(shrunk > 0);
    }

    #[test]
    fn lock_many_touches_every_distinct_shard() {
        let e = engine();
        let keys = vec![Bytes::from("a"), Bytes::from("b"), Bytes::from("c")];
        let mut guard = e.lock_many(&keys);
        for k in &keys {
            guard.map_for(k).insert(k.clone(), Entry::new(Kind::Str(Bytes::new())));
        }
        drop(guard);
        assert_eq!(e.dbsize(), 3);
    }
}
