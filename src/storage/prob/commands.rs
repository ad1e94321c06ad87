//! Wires each probabilistic sketch into the keyspace: one `impl
//! KeyspaceEngine` block per sketch family, each following the same
//! `with_write_or_insert`/`with_read`/`WRONGTYPE` shape the other storage
//! modules use.

use crate::error::{CoreError, CoreResult};
use crate::storage::engine::KeyspaceEngine;
use crate::storage::entry::Kind;
use crate::storage::prob::{BloomFilter, CountMinSketch, CuckooFilter, HyperLogLog, TDigest, TopK};
use bytes::Bytes;

impl KeyspaceEngine {
    pub fn bf_reserve(&self, key: &Bytes, error_rate: f64, capacity: u64) -> CoreResult<()> {
        if self.exists(key) {
            return Err(CoreError::generic("item exists"));
        }
        self.with_write_or_insert(
            key,
            || Kind::Bloom(BloomFilter::new(capacity, error_rate)),
            |_| Ok::<_, CoreError>(()),
        )
    }

    pub fn bf_add(&self, key: &Bytes, item: &[u8]) -> CoreResult<bool> {
        self.with_write_or_insert(
            key,
            || Kind::Bloom(BloomFilter::new(1000, 0.01)),
            |entry| match &mut entry.kind {
                Kind::Bloom(bf) => Ok(bf.add(item)),
                _ => Err(CoreError::WrongType),
            },
        )
    }

    pub fn bf_exists(&self, key: &Bytes, item: &[u8]) -> CoreResult<bool> {
        match self.with_read(key, |kind| match kind {
            Kind::Bloom(bf) => Ok(bf.contains(item)),
            _ => Err(CoreError::WrongType),
        }) {
            Some(r) => r,
            None => Ok(false),
        }
    }

    pub fn bf_merge(&self, dest: &Bytes, sources: &[Bytes]) -> CoreResult<()> {
        let mut iter = sources.iter();
        let first_key = iter.next().ok_or_else(|| CoreError::generic("BF.MERGE needs at least one source"))?;
        let first = self
            .with_read(first_key, |kind| match kind {
                Kind::Bloom(bf) => Ok(bf.clone()),
                _ => Err(CoreError::WrongType),
            })
            .ok_or_else(|| CoreError::generic("source key does not exist"))??;
        let mut merged = first;
        for key in iter {
            let other = self
                .with_read(key, |kind| match kind {
                    Kind::Bloom(bf) => Ok(bf.clone()),
                    _ => Err(CoreError::WrongType),
                })
                .ok_or_else(|| CoreError::generic("source key does not exist"))??;
            merged.merge(&other).map_err(CoreError::generic)?;
        }
        self.del(&[dest.clone()]);
        self.with_write_or_insert(dest, || Kind::Bloom(merged), |_| Ok::<_, CoreError>(()))
    }

    pub fn cf_add(&self, key: &Bytes, item: &[u8]) -> CoreResult<bool> {
        self.with_write_or_insert(
            key,
            || Kind::Cuckoo(CuckooFilter::new(1000)),
            |entry| match &mut entry.kind {
                Kind::Cuckoo(cf) => Ok(cf.add(item)),
                _ => Err(CoreError::WrongType),
            },
        )
    }

    pub fn cf_exists(&self, key: &Bytes, item: &[u8]) -> CoreResult<bool> {
        match self.with_read(key, |kind| match kind {
            Kind::Cuckoo(cf) => Ok(cf.contains(item)),
            _ => Err(CoreError::WrongType),
        }) {
            Some(r) => r,
            None => Ok(false),
        }
    }

    pub fn cf_del(&self, key: &Bytes, item: &[u8]) -> CoreResult<bool> {
        let result = self.with_write(key, |entry| match &mut entry.kind {
            Kind::Cuckoo(cf) => Ok(cf.remove(item)),
            _ => Err(CoreError::WrongType),
        });
        result.unwrap_or(Ok(false))
    }

    pub fn cms_incrby(&self, key: &Bytes, item: &[u8], delta: u64) -> CoreResult<u64> {
        self.with_write_or_insert(
            key,
            || Kind::Cms(CountMinSketch::with_error_bounds(0.001, 0.01)),
            |entry| match &mut entry.kind {
                Kind::Cms(cms) => {
                    cms.incrby(item, delta);
                    Ok(cms.query(item))
                }
                _ => Err(CoreError::WrongType),
            },
        )
    }

    pub fn cms_query(&self, key: &Bytes, item: &[u8]) -> CoreResult<u64> {
        match self.with_read(key, |kind| match kind {
            Kind::Cms(cms) => Ok(cms.query(item)),
            _ => Err(CoreError::WrongType),
        }) {
            Some(r) => r,
            None => Ok(0),
        }
    }

    pub fn cms_merge(&self, dest: &Bytes, sources: &[(Bytes, u64)]) -> CoreResult<()> {
        let (first_key, _) =
            sources.first().ok_or_else(|| CoreError::generic("CMS.MERGE needs at least one source"))?;
        let first = self
            .with_read(first_key, |kind| match kind {
                Kind::Cms(cms) => Ok(cms.clone()),
                _ => Err(CoreError::WrongType),
            })
            .ok_or_else(|| CoreError::generic("source key does not exist"))??;
        let mut merged = CountMinSketch::new(first.width(), first.depth());
        for (key, weight) in sources {
            let other = self
                .with_read(key, |kind| match kind {
                    Kind::Cms(cms) => Ok(cms.clone()),
                    _ => Err(CoreError::WrongType),
                })
                .ok_or_else(|| CoreError::generic("source key does not exist"))??;
            merged.merge(&other, *weight).map_err(CoreError::generic)?;
        }
        self.del(&[dest.clone()]);
        self.with_write_or_insert(dest, || Kind::Cms(merged), |_| Ok::<_, CoreError>(()))
    }

    pub fn topk_add(&self, key: &Bytes, items: &[(Bytes, f64)]) -> CoreResult<()> {
        self.with_write_or_insert(
            key,
            || Kind::TopK(TopK::new(10, 8 * 50, 5, 0.9)),
            |entry| match &mut entry.kind {
                Kind::TopK(topk) => {
                    for (item, increment) in items {
                        topk.add(item.clone(), *increment);
                    }
                    Ok(())
                }
                _ => Err(CoreError::WrongType),
            },
        )
    }

    pub fn topk_query(&self, key: &Bytes, item: &[u8]) -> CoreResult<bool> {
        match self.with_read(key, |kind| match kind {
            Kind::TopK(topk) => Ok(topk.query(item)),
            _ => Err(CoreError::WrongType),
        }) {
            Some(r) => r,
            None => Ok(false),
        }
    }

    pub fn topk_list(&self, key: &Bytes) -> CoreResult<Vec<Bytes>> {
        match self.with_read(key, |kind| match kind {
            Kind::TopK(topk) => Ok(topk.list()),
            _ => Err(CoreError::WrongType),
        }) {
            Some(r) => r,
            None => Ok(Vec::new()),
        }
    }

    pub fn pfadd(&self, key: &Bytes, items: &[Bytes]) -> CoreResult<bool> {
        self.with_write_or_insert(
            key,
            || Kind::Hll(HyperLogLog::new()),
            |entry| match &mut entry.kind {
                Kind::Hll(hll) => {
                    let mut changed = false;
                    for item in items {
                        if hll.add(item) {
                            changed = true;
                        }
                    }
                    Ok(changed)
                }
                _ => Err(CoreError::WrongType),
            },
        )
    }

    pub fn pfcount(&self, keys: &[Bytes]) -> CoreResult<u64> {
        let mut combined = HyperLogLog::new();
        for key in keys {
            if let Some(r) = self.with_read(key, |kind| match kind {
                Kind::Hll(hll) => Ok(hll.clone()),
                _ => Err(CoreError::WrongType),
            }) {
                combined.merge(&r?);
            }
        }
        Ok(combined.count())
    }

    pub fn pfmerge(&self, dest: &Bytes, sources: &[Bytes]) -> CoreResult<()> {
        let mut merged = self
            .with_read(dest, |kind| match kind {
                Kind::Hll(hll) => Ok(hll.clone()),
                _ => Err(CoreError::WrongType),
            })
            .transpose()?
            .unwrap_or_default();
        for key in sources {
            if let Some(r) = self.with_read(key, |kind| match kind {
                Kind::Hll(hll) => Ok(hll.clone()),
                _ => Err(CoreError::WrongType),
            }) {
                merged.merge(&r?);
            }
        }
        self.del(&[dest.clone()]);
        self.with_write_or_insert(dest, || Kind::Hll(merged), |_| Ok::<_, CoreError>(()))
    }

    pub fn tdigest_add(&self, key: &Bytes, values: &[f64]) -> CoreResult<()> {
        self.with_write_or_insert(
            key,
            || Kind::TDigest(TDigest::new(100.0)),
            |entry| match &mut entry.kind {
                Kind::TDigest(td) => {
                    for v in values {
                        td.add(*v, 1.0);
                    }
                    Ok(())
                }
                _ => Err(CoreError::WrongType),
            },
        )
    }

    pub fn tdigest_quantile(&self, key: &Bytes, q: f64) -> CoreResult<Option<f64>> {
        let result = self.with_write(key, |entry| match &mut entry.kind {
            Kind::TDigest(td) => Ok(td.quantile(q)),
            _ => Err(CoreError::WrongType),
        });
        result.unwrap_or(Ok(None))
    }

    pub fn tdigest_merge(&self, dest: &Bytes, sources: &[Bytes]) -> CoreResult<()> {
        let mut merged = self
            .with_read(dest, |kind| match kind {
                Kind::TDigest(td) => Ok(td.clone()),
                _ => Err(CoreError::WrongType),
            })
            .transpose()?
            .unwrap_or_else(|| TDigest::new(100.0));
        for key in sources {
            if let Some(r) = self.with_read(key, |kind| match kind {
                Kind::TDigest(td) => Ok(td.clone()),
                _ => Err(CoreError::WrongType),
            }) {
                merged.merge(&r?);
            }
        }
        self.del(&[dest.clone()]);
        self.with_write_or_insert(dest, || Kind::TDigest(merged), |_| Ok::<_, CoreError>(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> KeyspaceEngine {
        KeyspaceEngine::new(16)
    }

    #[test]
    fn bf_add_then_exists() {
        let e = engine();
        let k = Bytes::from("bf");
        e.bf_add(&k, b"a").unwrap();
        assert!(e.bf_exists(&k, b"a").unwrap());
        assert!(!e.bf_exists(&k, b"z").unwrap());
    }

    #[test]
    fn cf_add_then_del() {
        let e = engine();
        let k = Bytes::from("cf");
        e.cf_add(&k, b"a").unwrap();
        assert!(e.cf_exists(&k, b"a").unwrap());
        assert!(e.cf_del(&k, b"a").unwrap());
        assert!(!e.cf_exists(&k, b"a").unwrap());
    }

    #[test]
    fn cms_incrby_accumulates() {
        let e = engine();
        let k = Bytes::from("cms");
        e.cms_incrby(&k, b"a", 5).unwrap();
        e.cms_incrby(&k, b"a", 5).unwrap();
        assert!(e.cms_query(&k, b"a").unwrap() >= 10);
    }

    #[test]
    fn pfadd_pfcount_roughly_tracks_cardinality() {
        let e = engine();
        let k = Bytes::from("hll");
        for i in 0..1000 {
            e.pfadd(&k, &[Bytes::from(format!("item-{}", i))]).unwrap();
        }
        let count = e.pfcount(&[k]).unwrap();
        assert!((count as f64 - 1000.0).abs() / 1000.0 < 0.1);
    }

    #[test]
    fn tdigest_add_then_quantile() {
        let e = engine();
        let k = Bytes::from("td");
        let values: Vec<f64> = (0..=1000).map(|i| i as f64).collect();
        e.tdigest_add(&k, &values).unwrap();
        let median = e.tdigest_quantile(&k, 0.5).unwrap().unwrap();
        assert!((median - 500.0).abs() < 30.0);
    }
}
