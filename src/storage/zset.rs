//! Sorted set storage: a member → score map plus a score-ordered index.
//! `GEOADD`/`GEOSEARCH` reuse this structure directly — the data model
//! describes a `GeoIndex` as "a sorted set keyed by geohash score", so there
//! is no separate geo-specific container.

use crate::error::{CoreError, CoreResult};
use crate::storage::engine::KeyspaceEngine;
use crate::storage::entry::Kind;
use bytes::Bytes;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

/// Total-ordered wrapper around `f64` so scores can live in a `BTreeSet`.
/// NaN never enters a sorted set (`ZADD` rejects it), so `total_cmp` is safe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score(pub f64);

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ZSetData {
    scores: HashMap<Bytes, f64>,
    /// Ordered by (score, member) — ascending score then lexicographic
    /// member, matching `ZRANGE`'s ordering contract.
    index: BTreeSet<(Score, Bytes)>,
}

impl ZSetData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn score(&self, member: &[u8]) -> Option<f64> {
        self.scores.get(member).copied()
    }

    /// Inserts or updates `member`'s score. Returns `true` if the member was
    /// newly added (idempotent on an unchanged score/member pair, per
    /// ZADD's contract, which simply reindexes on a score update).
    pub fn insert(&mut self, member: Bytes, score: f64) -> bool {
        if let Some(&old) = self.scores.get(&member) {
            if old == score {
                return false;
            }
            self.index.remove(&(Score(old), member.clone()));
            self.index.insert((Score(score), member.clone()));
            self.scores.insert(member, score);
            false
        } else {
            self.index.insert((Score(score), member.clone()));
            self.scores.insert(member, score);
            true
        }
    }

    pub fn remove(&mut self, member: &[u8]) -> Option<f64> {
        if let Some(score) = self.scores.remove(member) {
            self.index.remove(&(Score(score), Bytes::copy_from_slice(member)));
            Some(score)
        } else {
            None
        }
    }

    pub fn rank(&self, member: &[u8]) -> Option<usize> {
        let score = self.score(member)?;
        self.index
            .iter()
            .position(|(s, m)| s.0 == score && m.as_ref() == member)
    }

    /// Ascending (score, member) order, the canonical `ZRANGE` iteration
    /// order.
    pub fn iter_ascending(&self) -> impl Iterator<Item = (&Bytes, f64)> {
        self.index.iter().map(|(s, m)| (m, s.0))
    }

    pub fn range_by_score(&self, min: f64, max: f64, min_excl: bool, max_excl: bool) -> Vec<(Bytes, f64)> {
        self.index
            .iter()
            .filter(|(s, _)| {
                let above_min = if min_excl { s.0 > min } else { s.0 >= min };
                let below_max = if max_excl { s.0 < max } else { s.0 <= max };
                above_min && below_max
            })
            .map(|(s, m)| (m.clone(), s.0))
            .collect()
    }

    /// `ZRANGEBYLEX` requires every member to share a score; iteration order
    /// is then purely lexicographic, matching Redis's lex-range contract.
    pub fn range_by_lex(&self, min: &LexBound, max: &LexBound) -> Vec<Bytes> {
        self.index
            .iter()
            .map(|(_, m)| m.clone())
            .filter(|m| min.allows_below(m) && max.allows_above(m))
            .collect()
    }

    pub fn increment(&mut self, member: Bytes, delta: f64) -> f64 {
        let new_score = self.score(&member).unwrap_or(0.0) + delta;
        self.insert(member, new_score);
        new_score
    }
}

/// A `ZRANGEBYLEX` endpoint: `-`/`+` (unbounded), `[member` (inclusive), or
/// `(member` (exclusive).
#[derive(Debug, Clone)]
pub enum LexBound {
    NegInf,
    PosInf,
    Inclusive(Bytes),
    Exclusive(Bytes),
}

impl LexBound {
    pub fn parse(raw: &[u8]) -> Result<Self, String> {
        match raw.first() {
            Some(b'-') if raw.len() == 1 => Ok(LexBound::NegInf),
            Some(b'+') if raw.len() == 1 => Ok(LexBound::PosInf),
            Some(b'[') => Ok(LexBound::Inclusive(Bytes::copy_from_slice(&raw[1..]))),
            Some(b'(') => Ok(LexBound::Exclusive(Bytes::copy_from_slice(&raw[1..]))),
            _ => Err("min or max not valid string range item".to_string()),
        }
    }

    /// Whether `member` sits above this bound when used as a minimum.
    fn allows_below(&self, member: &Bytes) -> bool {
        match self {
            LexBound::NegInf => true,
            LexBound::PosInf => false,
            LexBound::Inclusive(b) => member.as_ref() >= b.as_ref(),
            LexBound::Exclusive(b) => member.as_ref() > b.as_ref(),
        }
    }

    /// Whether `member` sits below this bound when used as a maximum.
    fn allows_above(&self, member: &Bytes) -> bool {
        match self {
            LexBound::PosInf => true,
            LexBound::NegInf => false,
            LexBound::Inclusive(b) => member.as_ref() <= b.as_ref(),
            LexBound::Exclusive(b) => member.as_ref() < b.as_ref(),
        }
    }
}

fn as_zset(kind: &Kind) -> CoreResult<ZSetData> {
    match kind {
        Kind::ZSet(z) => Ok(z.clone()),
        _ => Err(CoreError::WrongType),
    }
}

pub enum ZAggregate {
    Sum,
    Min,
    Max,
}

impl KeyspaceEngine {
    /// Returns the number of newly-added members (ZADD is idempotent on an
    /// unchanged member+score pair; an existing member whose score changes
    /// is reindexed, not counted as added).
    pub fn zset_add(&self, key: &Bytes, members: &[(Bytes, f64)]) -> CoreResult<usize> {
        self.with_write_or_insert(
            key,
            || Kind::ZSet(ZSetData::new()),
            |entry| match &mut entry.kind {
                Kind::ZSet(z) => {
                    let mut added = 0;
                    for (member, score) in members {
                        if score.is_nan() {
                            return Err(CoreError::NotAFloat);
                        }
                        if z.insert(member.clone(), *score) {
                            added += 1;
                        }
                    }
                    Ok(added)
                }
                _ => Err(CoreError::WrongType),
            },
        )
    }

    pub fn zset_score(&self, key: &Bytes, member: &Bytes) -> CoreResult<Option<f64>> {
        match self.with_read(key, as_zset) {
            Some(r) => r.map(|z| z.score(member)),
            None => Ok(None),
        }
    }

    pub fn zset_incrby(&self, key: &Bytes, member: &Bytes, delta: f64) -> CoreResult<f64> {
        self.with_write_or_insert(
            key,
            || Kind::ZSet(ZSetData::new()),
            |entry| match &mut entry.kind {
                Kind::ZSet(z) => Ok(z.increment(member.clone(), delta)),
                _ => Err(CoreError::WrongType),
            },
        )
    }

    pub fn zset_rem(&self, key: &Bytes, members: &[Bytes]) -> CoreResult<usize> {
        let result = self.with_write(key, |entry| match &mut entry.kind {
            Kind::ZSet(z) => Ok(members.iter().filter(|m| z.remove(m).is_some()).count()),
            _ => Err(CoreError::WrongType),
        });
        result.unwrap_or(Ok(0))
    }

    pub fn zset_card(&self, key: &Bytes) -> CoreResult<usize> {
        match self.with_read(key, as_zset) {
            Some(r) => r.map(|z| z.len()),
            None => Ok(0),
        }
    }

    pub fn zset_rank(&self, key: &Bytes, member: &Bytes, reverse: bool) -> CoreResult<Option<usize>> {
        match self.with_read(key, as_zset) {
            Some(r) => r.map(|z| {
                z.rank(member).map(|rank| if reverse { z.len() - 1 - rank } else { rank })
            }),
            None => Ok(None),
        }
    }

    pub fn zset_range(&self, key: &Bytes, start: i64, stop: i64, reverse: bool) -> CoreResult<Vec<(Bytes, f64)>> {
        match self.with_read(key, as_zset) {
            Some(r) => r.map(|z| {
                let mut all: Vec<(Bytes, f64)> = z.iter_ascending().map(|(m, s)| (m.clone(), s)).collect();
                if reverse {
                    all.reverse();
                }
                let len = all.len() as i64;
                if len == 0 {
                    return Vec::new();
                }
                let norm = |i: i64| if i < 0 { (len + i).max(0) } else { i };
                let start = norm(start).min(len);
                let stop = norm(stop).min(len - 1);
                if start > stop {
                    return Vec::new();
                }
                all[start as usize..=stop as usize].to_vec()
            }),
            None => Ok(Vec::new()),
        }
    }

    pub fn zset_range_by_score(&self, key: &Bytes, min: f64, max: f64, min_excl: bool, max_excl: bool) -> CoreResult<Vec<(Bytes, f64)>> {
        match self.with_read(key, as_zset) {
            Some(r) => r.map(|z| z.range_by_score(min, max, min_excl, max_excl)),
            None => Ok(Vec::new()),
        }
    }

    pub fn zset_range_by_lex(&self, key: &Bytes, min: &LexBound, max: &LexBound) -> CoreResult<Vec<Bytes>> {
        match self.with_read(key, as_zset) {
            Some(r) => r.map(|z| z.range_by_lex(min, max)),
            None => Ok(Vec::new()),
        }
    }

    fn read_zsets(&self, keys: &[Bytes]) -> CoreResult<Vec<ZSetData>> {
        keys.iter()
            .map(|k| self.with_read(k, as_zset).unwrap_or_else(|| Ok(ZSetData::new())))
            .collect()
    }

    /// Shared implementation for `ZUNIONSTORE`/`ZINTERSTORE`: combines
    /// per-member scores from each input set using per-key `weights` and
    /// the requested `aggregate` function.
    pub fn zset_store_combine(
        &self,
        dest: &Bytes,
        keys: &[Bytes],
        weights: &[f64],
        aggregate: ZAggregate,
        intersect: bool,
    ) -> CoreResult<usize> {
        let sets = self.read_zsets(keys)?;
        let mut combined: HashMap<Bytes, f64> = HashMap::new();
        let mut member_count: HashMap<Bytes, usize> = HashMap::new();

        for (set, weight) in sets.iter().zip(weights.iter()) {
            for (member, score) in set.iter_ascending() {
                let weighted = score * weight;
                *member_count.entry(member.clone()).or_insert(0) += 1;
                combined
                    .entry(member.clone())
                    .and_modify(|existing| {
                        *existing = match aggregate {
                            ZAggregate::Sum => *existing + weighted,
                            ZAggregate::Min => existing.min(weighted),
                            ZAggregate::Max => existing.max(weighted),
                        };
                    })
                    .or_insert(weighted);
            }
        }

        if intersect {
            combined.retain(|m, _| member_count.get(m).copied().unwrap_or(0) == sets.len());
        }

        let mut result = ZSetData::new();
        for (member, score) in &combined {
            result.insert(member.clone(), *score);
        }
        let len = result.len();
        self.del(&[dest.clone()]);
        if len > 0 {
            self.with_write_or_insert(dest, || Kind::ZSet(result), |_| Ok::<_, CoreError>(()))?;
        }
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_by_score_then_member() {
        let mut z = ZSetData::new();
        z.insert(Bytes::from("b"), 1.0);
        z.insert(Bytes::from("a"), 1.0);
        z.insert(Bytes::from("c"), 0.5);
        let members: Vec<_> = z.iter_ascending().map(|(m, _)| m.clone()).collect();
        assert_eq!(members, vec![Bytes::from("c"), Bytes::from("a"), Bytes::from("b")]);
    }

    #[test]
    fn reindexes_on_score_update() {
        let mut z = ZSetData::new();
        z.insert(Bytes::from("a"), 1.0);
        z.insert(Bytes::from("a"), 5.0);
        assert_eq!(z.score(b"a"), Some(5.0));
        assert_eq!(z.len(), 1);
    }

    #[test]
    fn range_by_score_respects_exclusivity() {
        let mut z = ZSetData::new();
        for (m, s) in [("a", 1.0), ("b", 2.0), ("c", 3.0)] {
            z.insert(Bytes::from(m), s);
        }
        let r = z.range_by_score(1.0, 3.0, true, false);
        assert_eq!(r.iter().map(|(m, _)| m.clone()).collect::<Vec<_>>(), vec![Bytes::from("b"), Bytes::from("c")]);
    }

    #[test]
    fn lex_range_bounds() {
        let mut z = ZSetData::new();
        for m in ["a", "b", "c", "d"] {
            z.insert(Bytes::from(m), 0.0);
        }
        let min = LexBound::parse(b"[b").unwrap();
        let max = LexBound::parse(b"(d").unwrap();
        let r = z.range_by_lex(&min, &max);
        assert_eq!(r, vec![Bytes::from("b"), Bytes::from("c")]);
    }

    fn engine() -> KeyspaceEngine {
        KeyspaceEngine::new(16)
    }

    #[test]
    fn zadd_counts_only_new_members() {
        let e = engine();
        let k = Bytes::from("z");
        assert_eq!(e.zset_add(&k, &[(Bytes::from("a"), 1.0), (Bytes::from("b"), 2.0)]).unwrap(), 2);
        assert_eq!(e.zset_add(&k, &[(Bytes::from("a"), 5.0)]).unwrap(), 0);
        assert_eq!(e.zset_score(&k, &Bytes::from("a")).unwrap(), Some(5.0));
    }

    #[test]
    fn zrange_supports_negative_indices_and_reverse() {
        let e = engine();
        let k = Bytes::from("z");
        e.zset_add(&k, &[(Bytes::from("a"), 1.0), (Bytes::from("b"), 2.0), (Bytes::from("c"), 3.0)])
            .unwrap();
        assert_eq!(e.zset_range(&k, 0, -1, false).unwrap().iter().map(|(m, _)| m.clone()).collect::<Vec<_>>(),
            vec![Bytes::from("a"), Bytes::from("b"), Bytes::from("c")]);
        assert_eq!(e.zset_range(&k, 0, 0, true).unwrap().iter().map(|(m, _)| m.clone()).collect::<Vec<_>>(),
            vec![Bytes::from("c")]);
    }

    #[test]
    fn zrank_honors_reverse_flag() {
        let e = engine();
        let k = Bytes::from("z");
        e.zset_add(&k, &[(Bytes::from("a"), 1.0), (Bytes::from("b"), 2.0)]).unwrap();
        assert_eq!(e.zset_rank(&k, &Bytes::from("a"), false).unwrap(), Some(0));
        assert_eq!(e.zset_rank(&k, &Bytes::from("a"), true).unwrap(), Some(1));
    }

    #[test]
    fn zincrby_creates_key_if_missing() {
        let e = engine();
        let k = Bytes::from("z");
        assert_eq!(e.zset_incrby(&k, &Bytes::from("a"), 2.5).unwrap(), 2.5);
        assert_eq!(e.zset_incrby(&k, &Bytes::from("a"), 2.5).unwrap(), 5.0);
    }

    #[test]
    fn zunionstore_sums_weighted_scores() {
        let e = engine();
        e.zset_add(&Bytes::from("z1"), &[(Bytes::from("a"), 1.0)]).unwrap();
        e.zset_add(&Bytes::from("z2"), &[(Bytes::from("a"), 2.0), (Bytes::from("b"), 3.0)]).unwrap();
        let keys = [Bytes::from("z1"), Bytes::from("z2")];
        let n = e
            .zset_store_combine(&Bytes::from("dest"), &keys, &[1.0, 1.0], ZAggregate::Sum, false)
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(e.zset_score(&Bytes::from("dest"), &Bytes::from("a")).unwrap(), Some(3.0));
        assert_eq!(e.zset_score(&Bytes::from("dest"), &Bytes::from("b")).unwrap(), Some(3.0));
    }

    #[test]
    fn zinterstore_keeps_only_members_in_every_set() {
        let e = engine();
        e.zset_add(&Bytes::from("z1"), &[(Bytes::from("a"), 1.0), (Bytes::from("b"), 1.0)]).unwrap();
        e.zset_add(&Bytes::from("z2"), &[(Bytes::from("b"), 2.0)]).unwrap();
        let keys = [Bytes::from("z1"), Bytes::from("z2")];
        let n = e
            .zset_store_combine(&Bytes::from("dest"), &keys, &[1.0, 1.0], ZAggregate::Max, true)
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(e.zset_score(&Bytes::from("dest"), &Bytes::from("b")).unwrap(), Some(2.0));
    }

    #[test]
    fn zrem_removes_listed_members() {
        let e = engine();
        let k = Bytes::from("z");
        e.zset_add(&k, &[(Bytes::from("a"), 1.0), (Bytes::from("b"), 2.0)]).unwrap();
        assert_eq!(e.zset_rem(&k, &[Bytes::from("a")]).unwrap(), 1);
        assert_eq!(e.zset_card(&k).unwrap(), 1);
    }
}
