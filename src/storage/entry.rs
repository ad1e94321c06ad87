//! The `Entry`/`Kind` model: one key maps to exactly one `Kind` at a time.
//! Rather than separate maps per value type, every kind folds into a single
//! tagged union so cross-kind operations can be rejected uniformly with
//! `WRONGTYPE`.

use crate::storage::json::JsonValue;
use crate::storage::prob::{BloomFilter, CountMinSketch, CuckooFilter, HyperLogLog, TDigest, TopK};
use crate::storage::stream::StreamData;
use crate::storage::timeseries::TimeSeriesData;
use crate::storage::zset::ZSetData;
use bytes::Bytes;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;

/// The value stored under a key. Every Redis-alike data type is a variant
/// here instead of a separate storage map, which is what makes a same-key,
/// cross-kind write a simple tag mismatch check.
#[derive(Debug, Clone)]
pub enum Kind {
    Str(Bytes),
    List(VecDeque<Bytes>),
    Hash(HashMap<Bytes, Bytes>),
    Set(HashSet<Bytes>),
    ZSet(ZSetData),
    Stream(StreamData),
    Bitmap(Vec<u8>),
    Json(JsonValue),
    Bloom(BloomFilter),
    Cuckoo(CuckooFilter),
    Cms(CountMinSketch),
    TopK(TopK),
    Hll(HyperLogLog),
    TDigest(TDigest),
    TimeSeries(TimeSeriesData),
}

impl Kind {
    /// The `TYPE`/`XINFO`-facing name for this kind, matching Redis's
    /// lowercase type strings where a direct analog exists.
    pub fn type_name(&self) -> &'static str {
        match self {
            Kind::Str(_) => "string",
            Kind::List(_) => "list",
            Kind::Hash(_) => "hash",
            Kind::Set(_) => "set",
            Kind::ZSet(_) => "zset",
            Kind::Stream(_) => "stream",
            Kind::Bitmap(_) => "string",
            Kind::Json(_) => "ReJSON-RL",
            Kind::Bloom(_) => "MBbloom--",
            Kind::Cuckoo(_) => "MBbloomCF",
            Kind::Cms(_) => "MBcmsCMS",
            Kind::TopK(_) => "MBtopkTOPK",
            Kind::Hll(_) => "string",
            Kind::TDigest(_) => "MBbloomTD",
            Kind::TimeSeries(_) => "TSDB-TYPE",
        }
    }
}

/// One keyspace entry: its current value, optional absolute expiration, and
/// a monotonically increasing version used by `WATCH` to detect concurrent
/// mutation.
#[derive(Debug, Clone)]
pub struct Entry {
    pub kind: Kind,
    pub expires_at: Option<Instant>,
    pub version: u64,
    pub created_at: Instant,
}

impl Entry {
    pub fn new(kind: Kind) -> Self {
        let now = Instant::now();
        Entry {
            kind,
            expires_at: None,
            version: 0,
            created_at: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        matches!(self.expires_at, Some(at) if Instant::now() >= at)
    }

    pub fn bump_version(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    pub fn ttl_ms(&self) -> Option<i64> {
        self.expires_at.map(|at| {
            let now = Instant::now();
            if at > now {
                (at - now).as_millis() as i64
            } else {
                0
            }
        })
    }
}
