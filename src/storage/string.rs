//! String-family operations: `SET`/`GET` with `NX|XX|EX`, the
//! `INCR`/`DECR` family treating a missing key as `"0"`, byte-addressed
//! `APPEND`/`GETRANGE`/`SETRANGE`, and the atomic multi-key `MSET`/`MSETNX`.

use crate::error::{CoreError, CoreResult};
use crate::storage::engine::KeyspaceEngine;
use crate::storage::entry::Kind;
use bytes::Bytes;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub struct SetOptions {
    pub nx: bool,
    pub xx: bool,
    pub expires_at: Option<Instant>,
    pub keep_ttl: bool,
}

impl Default for SetOptions {
    fn default() -> Self {
        SetOptions {
            nx: false,
            xx: false,
            expires_at: None,
            keep_ttl: false,
        }
    }
}

fn as_str_bytes(kind: &Kind) -> CoreResult<Bytes> {
    match kind {
        Kind::Str(b) => Ok(b.clone()),
        _ => Err(CoreError::WrongType),
    }
}

impl KeyspaceEngine {
    /// Returns `true` if the value was set (always `true` unless `NX`/`XX`
    /// vetoed it).
    pub fn str_set(&self, key: &Bytes, value: Bytes, opts: SetOptions) -> CoreResult<bool> {
        let exists = self.exists(key);
        if opts.nx && exists {
            return Ok(false);
        }
        if opts.xx && !exists {
            return Ok(false);
        }
        self.with_write_or_insert(
            key,
            || Kind::Str(Bytes::new()),
            |entry| {
                let prior_ttl = entry.expires_at;
                entry.kind = Kind::Str(value.clone());
                entry.expires_at = if opts.keep_ttl { prior_ttl } else { opts.expires_at };
                Ok(())
            },
        )?;
        Ok(true)
    }

    pub fn str_get(&self, key: &Bytes) -> CoreResult<Option<Bytes>> {
        match self.with_read(key, as_str_bytes) {
            Some(r) => r.map(Some),
            None => Ok(None),
        }
    }

    pub fn str_getset(&self, key: &Bytes, value: Bytes) -> CoreResult<Option<Bytes>> {
        let previous = self.str_get(key)?;
        self.str_set(key, value, SetOptions::default())?;
        Ok(previous)
    }

    pub fn str_getdel(&self, key: &Bytes) -> CoreResult<Option<Bytes>> {
        let previous = self.str_get(key)?;
        if previous.is_some() {
            self.del(&[key.clone()]);
        }
        Ok(previous)
    }

    pub fn str_getex(&self, key: &Bytes, expires_at: Option<ExpireUpdate>) -> CoreResult<Option<Bytes>> {
        let value = self.str_get(key)?;
        if value.is_some() {
            if let Some(update) = expires_at {
                match update {
                    ExpireUpdate::Set(at) => {
                        self.expire_at(key, Some(at));
                    }
                    ExpireUpdate::Persist => {
                        self.persist(key);
                    }
                }
            }
        }
        Ok(value)
    }

    pub fn str_append(&self, key: &Bytes, suffix: &[u8]) -> CoreResult<usize> {
        self.with_write_or_insert(
            key,
            || Kind::Str(Bytes::new()),
            |entry| match &mut entry.kind {
                Kind::Str(b) => {
                    let mut buf = Vec::with_capacity(b.len() + suffix.len());
                    buf.extend_from_slice(b);
                    buf.extend_from_slice(suffix);
                    *b = Bytes::from(buf);
                    Ok(b.len())
                }
                _ => Err(CoreError::WrongType),
            },
        )
    }

    pub fn str_strlen(&self, key: &Bytes) -> CoreResult<usize> {
        Ok(self.str_get(key)?.map(|b| b.len()).unwrap_or(0))
    }

    pub fn str_getrange(&self, key: &Bytes, start: i64, end: i64) -> CoreResult<Bytes> {
        let value = self.str_get(key)?.unwrap_or_default();
        let len = value.len() as i64;
        if len == 0 {
            return Ok(Bytes::new());
        }
        let norm = |i: i64| -> i64 {
            if i < 0 {
                (len + i).max(0)
            } else {
                i
            }
        };
        let start = norm(start).min(len);
        let end = norm(end).min(len - 1);
        if start > end || start >= len {
            return Ok(Bytes::new());
        }
        Ok(value.slice(start as usize..=(end as usize)))
    }

    pub fn str_setrange(&self, key: &Bytes, offset: usize, value: &[u8]) -> CoreResult<usize> {
        self.with_write_or_insert(
            key,
            || Kind::Str(Bytes::new()),
            |entry| match &mut entry.kind {
                Kind::Str(b) => {
                    let needed = offset + value.len();
                    let mut buf = b.to_vec();
                    if buf.len() < needed {
                        buf.resize(needed, 0);
                    }
                    buf[offset..offset + value.len()].copy_from_slice(value);
                    *b = Bytes::from(buf);
                    Ok(b.len())
                }
                _ => Err(CoreError::WrongType),
            },
        )
    }

    pub fn str_incrby(&self, key: &Bytes, delta: i64) -> CoreResult<i64> {
        self.with_write_or_insert(
            key,
            || Kind::Str(Bytes::from("0")),
            |entry| match &mut entry.kind {
                Kind::Str(b) => {
                    let current = parse_i64(b)?;
                    let updated = current.checked_add(delta).ok_or(CoreError::Overflow)?;
                    *b = Bytes::from(updated.to_string());
                    Ok(updated)
                }
                _ => Err(CoreError::WrongType),
            },
        )
    }

    pub fn str_incrbyfloat(&self, key: &Bytes, delta: f64) -> CoreResult<f64> {
        self.with_write_or_insert(
            key,
            || Kind::Str(Bytes::from("0")),
            |entry| match &mut entry.kind {
                Kind::Str(b) => {
                    let current = parse_f64(b)?;
                    let updated = current + delta;
                    if !updated.is_finite() {
                        return Err(CoreError::generic("increment would produce NaN or Infinity"));
                    }
                    *b = Bytes::from(format_float_no_exponent(updated));
                    Ok(updated)
                }
                _ => Err(CoreError::WrongType),
            },
        )
    }

    /// All-or-nothing across shards: locks every touched shard first so no
    /// other session observes a partial `MSET`.
    pub fn str_mset(&self, pairs: &[(Bytes, Bytes)]) {
        let keys: Vec<Bytes> = pairs.iter().map(|(k, _)| k.clone()).collect();
        let mut guard = self.lock_many(&keys);
        for (key, value) in pairs {
            use crate::storage::entry::Entry;
            let map = guard.map_for(key);
            match map.get_mut(key) {
                Some(e) => {
                    e.kind = Kind::Str(value.clone());
                    e.bump_version();
                }
                None => {
                    map.insert(key.clone(), Entry::new(Kind::Str(value.clone())));
                }
            }
        }
    }

    /// Commits only if every key is absent; otherwise no key is touched.
    pub fn str_msetnx(&self, pairs: &[(Bytes, Bytes)]) -> bool {
        let keys: Vec<Bytes> = pairs.iter().map(|(k, _)| k.clone()).collect();
        let mut guard = self.lock_many(&keys);
        if pairs.iter().any(|(k, _)| guard.map_for(k).contains_key(k)) {
            return false;
        }
        for (key, value) in pairs {
            use crate::storage::entry::Entry;
            guard
                .map_for(key)
                .insert(key.clone(), Entry::new(Kind::Str(value.clone())));
        }
        true
    }

    pub fn str_mget(&self, keys: &[Bytes]) -> Vec<Option<Bytes>> {
        keys.iter().map(|k| self.str_get(k).unwrap_or(None)).collect()
    }

    /// Longest Common Subsequence via the classic O(mn) DP table.
    pub fn str_lcs(&self, a: &Bytes, b: &Bytes) -> CoreResult<Bytes> {
        let a = self.str_get(a)?.unwrap_or_default();
        let b = self.str_get(b)?.unwrap_or_default();
        let (n, m) = (a.len(), b.len());
        let mut dp = vec![vec![0u32; m + 1]; n + 1];
        for i in 1..=n {
            for j in 1..=m {
                dp[i][j] = if a[i - 1] == b[j - 1] {
                    dp[i - 1][j - 1] + 1
                } else {
                    dp[i - 1][j].max(dp[i][j - 1])
                };
            }
        }
        let mut out = Vec::with_capacity(dp[n][m] as usize);
        let (mut i, mut j) = (n, m);
        while i > 0 && j > 0 {
            if a[i - 1] == b[j - 1] {
                out.push(a[i - 1]);
                i -= 1;
                j -= 1;
            } else if dp[i - 1][j] >= dp[i][j - 1] {
                i -= 1;
            } else {
                j -= 1;
            }
        }
        out.reverse();
        Ok(Bytes::from(out))
    }
}

pub enum ExpireUpdate {
    Set(Instant),
    Persist,
}

pub fn ttl_from_secs(secs: i64) -> Option<Instant> {
    if secs <= 0 {
        None
    } else {
        Some(Instant::now() + Duration::from_secs(secs as u64))
    }
}

/// Converts an absolute unix timestamp (milliseconds) into an `Instant`
/// anchored to the current wall clock. A timestamp at or before now maps to
/// an immediate expiry rather than `None`, since `EXAT`/`PXAT` name a point
/// in time rather than a duration.
pub fn instant_from_unix_millis(unix_ms: i64) -> Instant {
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);
    let delta_ms = unix_ms - now_ms;
    if delta_ms <= 0 {
        Instant::now()
    } else {
        Instant::now() + Duration::from_millis(delta_ms as u64)
    }
}

/// Converts an absolute unix timestamp (seconds) into an `Instant`.
pub fn instant_from_unix_secs(unix_secs: i64) -> Instant {
    instant_from_unix_millis(unix_secs.saturating_mul(1000))
}

pub fn parse_i64(bytes: &[u8]) -> CoreResult<i64> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(CoreError::NotAnInteger)
}

pub fn parse_f64(bytes: &[u8]) -> CoreResult<f64> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|f| f.is_finite())
        .ok_or(CoreError::NotAFloat)
}

/// Formats a float without scientific notation, trimming trailing zeros —
/// `INCRBYFLOAT`'s documented output format.
pub fn format_float_no_exponent(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e17 {
        return format!("{}", value as i64);
    }
    let mut s = format!("{:.17}", value);
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> KeyspaceEngine {
        KeyspaceEngine::new(16)
    }

    #[test]
    fn set_get_basic() {
        let e = engine();
        let k = Bytes::from("k");
        e.str_set(&k, Bytes::from("v"), SetOptions::default()).unwrap();
        assert_eq!(e.str_get(&k).unwrap(), Some(Bytes::from("v")));
    }

    #[test]
    fn nx_refuses_existing_key() {
        let e = engine();
        let k = Bytes::from("k");
        e.str_set(&k, Bytes::from("v1"), SetOptions::default()).unwrap();
        let opts = SetOptions {
            nx: true,
            ..Default::default()
        };
        assert!(!e.str_set(&k, Bytes::from("v2"), opts).unwrap());
        assert_eq!(e.str_get(&k).unwrap(), Some(Bytes::from("v1")));
    }

    #[test]
    fn incr_treats_missing_key_as_zero() {
        let e = engine();
        let k = Bytes::from("counter");
        assert_eq!(e.str_incrby(&k, 5).unwrap(), 5);
        assert_eq!(e.str_incrby(&k, -2).unwrap(), 3);
    }

    #[test]
    fn incrbyfloat_has_full_precision_no_scientific_notation() {
        let e = engine();
        let k = Bytes::from("f");
        e.str_incrbyfloat(&k, 10.5).unwrap();
        let result = e.str_incrbyfloat(&k, 0.1).unwrap();
        assert!((result - 10.6).abs() < 1e-9);
        let raw = e.str_get(&k).unwrap().unwrap();
        assert!(!raw.iter().any(|&b| b == b'e' || b == b'E'));
    }

    #[test]
    fn append_and_getrange_setrange_are_byte_addressed() {
        let e = engine();
        let k = Bytes::from("s");
        e.str_append(&k, b"hello").unwrap();
        e.str_append(&k, b" world").unwrap();
        assert_eq!(e.str_get(&k).unwrap(), Some(Bytes::from("hello world")));
        assert_eq!(e.str_getrange(&k, 0, 4).unwrap(), Bytes::from("hello"));
        e.str_setrange(&k, 6, b"Redis").unwrap();
        assert_eq!(e.str_get(&k).unwrap(), Some(Bytes::from("hello Redis")));
    }

    #[test]
    fn setrange_zero_pads_gaps() {
        let e = engine();
        let k = Bytes::from("s");
        e.str_setrange(&k, 5, b"hi").unwrap();
        let v = e.str_get(&k).unwrap().unwrap();
        assert_eq!(v.len(), 7);
        assert_eq!(&v[5..], b"hi");
    }

    #[test]
    fn mset_is_atomic_across_shards() {
        let e = engine();
        let pairs = vec![
            (Bytes::from("a"), Bytes::from("1")),
            (Bytes::from("b"), Bytes::from("2")),
        ];
        e.str_mset(&pairs);
        assert_eq!(e.str_get(&Bytes::from("a")).unwrap(), Some(Bytes::from("1")));
        assert_eq!(e.str_get(&Bytes::from("b")).unwrap(), Some(Bytes::from("2")));
    }

    #[test]
    fn msetnx_commits_only_if_all_absent() {
        let e = engine();
        e.str_set(&Bytes::from("a"), Bytes::from("existing"), SetOptions::default())
            .unwrap();
        let pairs = vec![(Bytes::from("a"), Bytes::from("x")), (Bytes::from("c"), Bytes::from("y"))];
        assert!(!e.str_msetnx(&pairs));
        assert_eq!(e.str_get(&Bytes::from("c")).unwrap(), None);
    }

    #[test]
    fn lcs_finds_longest_common_subsequence() {
        let e = engine();
        e.str_set(&Bytes::from("k1"), Bytes::from("ohmytext"), SetOptions::default())
            .unwrap();
        e.str_set(&Bytes::from("k2"), Bytes::from("mynewtext"), SetOptions::default())
            .unwrap();
        let lcs = e.str_lcs(&Bytes::from("k1"), &Bytes::from("k2")).unwrap();
        assert_eq!(lcs, Bytes::from("mytext"));
    }

    #[test]
    fn wrongtype_on_list_key() {
        let e = engine();
        let k = Bytes::from("lst");
        e.with_write_or_insert(&k, || Kind::List(Default::default()), |_| Ok::<_, CoreError>(()))
            .unwrap();
        assert_eq!(e.str_get(&k).unwrap_err(), CoreError::WrongType);
    }

    #[test]
    fn ttl_from_secs_rejects_non_positive() {
        assert!(ttl_from_secs(0).is_none());
        assert!(ttl_from_secs(-5).is_none());
        assert!(ttl_from_secs(10).is_some());
    }

    #[test]
    fn instant_from_unix_millis_future_timestamp_is_later_than_now() {
        let now_ms = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as i64;
        let at = instant_from_unix_millis(now_ms + 60_000);
        assert!(at > Instant::now());
    }

    #[test]
    fn instant_from_unix_millis_past_timestamp_is_immediate() {
        let now_ms = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as i64;
        let at = instant_from_unix_millis(now_ms - 60_000);
        assert!(at <= Instant::now());
    }
}
