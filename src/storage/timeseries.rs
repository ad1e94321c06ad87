//! Time series storage: an ordered `(timestamp, value)` sequence plus
//! labels and downsampling rules.

use crate::error::{CoreError, CoreResult};
use crate::storage::engine::KeyspaceEngine;
use crate::storage::entry::Kind;
use bytes::Bytes;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregation {
    Avg,
    Sum,
    Min,
    Max,
    Count,
}

impl Aggregation {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "AVG" => Some(Aggregation::Avg),
            "SUM" => Some(Aggregation::Sum),
            "MIN" => Some(Aggregation::Min),
            "MAX" => Some(Aggregation::Max),
            "COUNT" => Some(Aggregation::Count),
            _ => None,
        }
    }

    pub fn apply(&self, values: &[f64]) -> f64 {
        match self {
            Aggregation::Avg => values.iter().sum::<f64>() / values.len().max(1) as f64,
            Aggregation::Sum => values.iter().sum(),
            Aggregation::Min => values.iter().cloned().fold(f64::INFINITY, f64::min),
            Aggregation::Max => values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            Aggregation::Count => values.len() as f64,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DownsampleRule {
    pub dest_key: Bytes,
    pub bucket_duration_ms: u64,
    pub aggregation: Aggregation,
}

#[derive(Debug, Clone, Default)]
pub struct TimeSeriesData {
    points: BTreeMap<u64, f64>,
    pub labels: Vec<(Bytes, Bytes)>,
    pub retention_ms: Option<u64>,
    pub rules: Vec<DownsampleRule>,
}

impl TimeSeriesData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sample; timestamps must be strictly monotonic.
    pub fn add(&mut self, ts: u64, value: f64) -> Result<(), String> {
        if let Some((&last_ts, _)) = self.points.iter().next_back() {
            if ts <= last_ts {
                return Err(
                    "TSDB: Timestamp must be equal to or greater than the maximum observed timestamp"
                        .to_string(),
                );
            }
        }
        self.points.insert(ts, value);
        if let Some(retention) = self.retention_ms {
            let cutoff = ts.saturating_sub(retention);
            self.points.retain(|&t, _| t >= cutoff);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<(u64, f64)> {
        self.points.iter().next_back().map(|(&t, &v)| (t, v))
    }

    pub fn range(&self, from: u64, to: u64) -> Vec<(u64, f64)> {
        self.points
            .range(from..=to)
            .map(|(&t, &v)| (t, v))
            .collect()
    }

    /// Buckets `[from, to]` into fixed-width windows and aggregates each.
    pub fn range_aggregated(
        &self,
        from: u64,
        to: u64,
        bucket_ms: u64,
        agg: Aggregation,
    ) -> Vec<(u64, f64)> {
        if bucket_ms == 0 {
            return self.range(from, to);
        }
        let mut buckets: BTreeMap<u64, Vec<f64>> = BTreeMap::new();
        for (ts, value) in self.range(from, to) {
            let bucket_start = (ts / bucket_ms) * bucket_ms;
            buckets.entry(bucket_start).or_default().push(value);
        }
        buckets
            .into_iter()
            .map(|(bucket_ts, values)| (bucket_ts, agg.apply(&values)))
            .collect()
    }
}

fn as_timeseries(kind: &Kind) -> CoreResult<TimeSeriesData> {
    match kind {
        Kind::TimeSeries(ts) => Ok(ts.clone()),
        _ => Err(CoreError::WrongType),
    }
}

impl KeyspaceEngine {
    pub fn ts_create(&self, key: &Bytes, retention_ms: Option<u64>, labels: Vec<(Bytes, Bytes)>) -> CoreResult<()> {
        if self.exists(key) {
            return Err(CoreError::generic("TSDB: key already exists"));
        }
        self.with_write_or_insert(
            key,
            || {
                Kind::TimeSeries(TimeSeriesData {
                    retention_ms,
                    labels: labels.clone(),
                    ..Default::default()
                })
            },
            |_| Ok::<_, CoreError>(()),
        )
    }

    pub fn ts_add(&self, key: &Bytes, ts: u64, value: f64) -> CoreResult<u64> {
        self.with_write_or_insert(
            key,
            || Kind::TimeSeries(TimeSeriesData::new()),
            |entry| match &mut entry.kind {
                Kind::TimeSeries(series) => {
                    series.add(ts, value).map_err(CoreError::generic)?;
                    Ok(ts)
                }
                _ => Err(CoreError::WrongType),
            },
        )
    }

    pub fn ts_get(&self, key: &Bytes) -> CoreResult<Option<(u64, f64)>> {
        match self.with_read(key, as_timeseries) {
            Some(r) => r.map(|ts| ts.last()),
            None => Ok(None),
        }
    }

    pub fn ts_range(&self, key: &Bytes, from: u64, to: u64) -> CoreResult<Vec<(u64, f64)>> {
        match self.with_read(key, as_timeseries) {
            Some(r) => r.map(|ts| ts.range(from, to)),
            None => Ok(Vec::new()),
        }
    }

    pub fn ts_range_aggregated(
        &self,
        key: &Bytes,
        from: u64,
        to: u64,
        bucket_ms: u64,
        agg: Aggregation,
    ) -> CoreResult<Vec<(u64, f64)>> {
        match self.with_read(key, as_timeseries) {
            Some(r) => r.map(|ts| ts.range_aggregated(from, to, bucket_ms, agg)),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_monotonic_timestamps() {
        let mut ts = TimeSeriesData::new();
        ts.add(100, 1.0).unwrap();
        assert!(ts.add(50, 2.0).is_err());
    }

    #[test]
    fn retention_drops_old_points() {
        let mut ts = TimeSeriesData::new();
        ts.retention_ms = Some(100);
        ts.add(0, 1.0).unwrap();
        ts.add(50, 2.0).unwrap();
        ts.add(150, 3.0).unwrap();
        assert_eq!(ts.len(), 2);
    }

    #[test]
    fn range_aggregated_buckets_correctly() {
        let mut ts = TimeSeriesData::new();
        for i in 0..10u64 {
            ts.add(i * 10, i as f64).unwrap();
        }
        let buckets = ts.range_aggregated(0, 99, 50, Aggregation::Sum);
        assert_eq!(buckets.len(), 2);
    }

    fn engine() -> KeyspaceEngine {
        KeyspaceEngine::new(16)
    }

    #[test]
    fn ts_create_rejects_duplicate_key() {
        let e = engine();
        let k = Bytes::from("ts");
        e.ts_create(&k, None, vec![]).unwrap();
        assert!(e.ts_create(&k, None, vec![]).is_err());
    }

    #[test]
    fn ts_add_then_get_returns_last_sample() {
        let e = engine();
        let k = Bytes::from("ts");
        e.ts_add(&k, 100, 1.0).unwrap();
        e.ts_add(&k, 200, 2.0).unwrap();
        assert_eq!(e.ts_get(&k).unwrap(), Some((200, 2.0)));
    }

    #[test]
    fn ts_range_aggregated_through_engine() {
        let e = engine();
        let k = Bytes::from("ts");
        for i in 0..10u64 {
            e.ts_add(&k, i * 10, i as f64).unwrap();
        }
        let buckets = e.ts_range_aggregated(&k, 0, 99, 50, Aggregation::Sum).unwrap();
        assert_eq!(buckets.len(), 2);
    }
}
