//! Stream storage: append-only `(ms, seq)`-keyed entries, consumer groups,
//! and their per-consumer pending entry lists (PEL).

use crate::error::{CoreError, CoreResult};
use crate::storage::engine::KeyspaceEngine;
use crate::storage::entry::Kind;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use std::time::{SystemTime, UNIX_EPOCH};

/// A stream entry id: milliseconds since epoch plus a per-millisecond
/// sequence counter. Ordered lexicographically on `(ms, seq)`, which is the
/// strictly-monotonic order streams require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamId {
    pub ms: u64,
    pub seq: u64,
}

impl StreamId {
    pub const MIN: StreamId = StreamId { ms: 0, seq: 0 };

    pub fn to_bytes(self) -> Bytes {
        Bytes::from(format!("{}-{}", self.ms, self.seq))
    }

    /// Parses `ms-seq`, `ms` (seq defaults to 0), or `ms-*` (seq chosen by
    /// the caller during XADD auto-generation, represented here as `None`).
    pub fn parse(raw: &str) -> Result<(u64, Option<u64>), String> {
        if let Some((ms, seq)) = raw.split_once('-') {
            let ms = ms
                .parse::<u64>()
                .map_err(|_| "Invalid stream ID specified as stream command argument".to_string())?;
            if seq == "*" {
                return Ok((ms, None));
            }
            let seq = seq
                .parse::<u64>()
                .map_err(|_| "Invalid stream ID specified as stream command argument".to_string())?;
            Ok((ms, Some(seq)))
        } else {
            let ms = raw
                .parse::<u64>()
                .map_err(|_| "Invalid stream ID specified as stream command argument".to_string())?;
            Ok((ms, Some(0)))
        }
    }
}

#[derive(Debug, Clone)]
pub struct PendingEntry {
    pub consumer: Bytes,
    pub delivery_time_ms: u64,
    pub delivery_count: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ConsumerGroup {
    pub last_delivered: StreamId,
    pub pending: BTreeMap<StreamId, PendingEntry>,
    pub consumers: HashMap<Bytes, u64>,
}

#[derive(Debug, Clone, Default)]
pub struct StreamData {
    pub entries: BTreeMap<StreamId, Vec<(Bytes, Bytes)>>,
    pub last_id: StreamId,
    pub max_deleted_id: StreamId,
    pub entries_added: u64,
    pub groups: HashMap<Bytes, ConsumerGroup>,
}

impl StreamData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates the next id for an auto (`*`) `XADD`: `max(now_ms,
    /// last_id.ms)`, bumping the sequence if that equals the last id's ms.
    pub fn next_auto_id(&self, now_ms: u64) -> StreamId {
        let ms = now_ms.max(self.last_id.ms);
        let seq = if ms == self.last_id.ms {
            self.last_id.seq + 1
        } else {
            0
        };
        StreamId { ms, seq }
    }

    pub fn append(&mut self, id: StreamId, fields: Vec<(Bytes, Bytes)>) -> Result<(), String> {
        if id <= self.last_id && !(self.entries.is_empty() && self.last_id == StreamId::MIN && id > StreamId::MIN) {
            if id <= self.last_id {
                return Err(
                    "The ID specified in XADD is equal or smaller than the target stream top item"
                        .to_string(),
                );
            }
        }
        self.entries.insert(id, fields);
        self.last_id = id;
        self.entries_added += 1;
        Ok(())
    }

    pub fn trim_maxlen(&mut self, maxlen: usize) -> usize {
        let mut removed = 0;
        while self.entries.len() > maxlen {
            if let Some((&id, _)) = self.entries.iter().next() {
                self.entries.remove(&id);
                if id > self.max_deleted_id {
                    self.max_deleted_id = id;
                }
                removed += 1;
            } else {
                break;
            }
        }
        removed
    }

    pub fn range(&self, start: StreamId, end: StreamId, count: Option<usize>) -> Vec<(StreamId, Vec<(Bytes, Bytes)>)> {
        let iter = self
            .entries
            .range(start..=end)
            .map(|(id, fields)| (*id, fields.clone()));
        match count {
            Some(n) => iter.take(n).collect(),
            None => iter.collect(),
        }
    }

    pub fn group_mut(&mut self, name: &[u8]) -> Option<&mut ConsumerGroup> {
        self.groups.get_mut(name)
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn as_stream(kind: &Kind) -> CoreResult<StreamData> {
    match kind {
        Kind::Stream(s) => Ok(s.clone()),
        _ => Err(CoreError::WrongType),
    }
}

impl KeyspaceEngine {
    /// Appends one entry. `id` is `None` for auto-generated (`*`) ids, or
    /// `Some((ms, seq))` — `seq` itself `None` means "auto-pick sequence for
    /// this ms" (the `ms-*` form).
    pub fn stream_add(
        &self,
        key: &Bytes,
        id: Option<(u64, Option<u64>)>,
        fields: Vec<(Bytes, Bytes)>,
        maxlen: Option<usize>,
    ) -> CoreResult<Bytes> {
        self.with_write_or_insert(
            key,
            || Kind::Stream(StreamData::new()),
            |entry| match &mut entry.kind {
                Kind::Stream(s) => {
                    let resolved = match id {
                        None => s.next_auto_id(now_ms()),
                        Some((ms, None)) => {
                            if ms == s.last_id.ms {
                                StreamId { ms, seq: s.last_id.seq + 1 }
                            } else {
                                StreamId { ms, seq: 0 }
                            }
                        }
                        Some((ms, Some(seq))) => StreamId { ms, seq },
                    };
                    s.append(resolved, fields).map_err(CoreError::generic)?;
                    if let Some(maxlen) = maxlen {
                        s.trim_maxlen(maxlen);
                    }
                    Ok(resolved.to_bytes())
                }
                _ => Err(CoreError::WrongType),
            },
        )
    }

    pub fn stream_len(&self, key: &Bytes) -> CoreResult<usize> {
        match self.with_read(key, as_stream) {
            Some(r) => r.map(|s| s.entries.len()),
            None => Ok(0),
        }
    }

    pub fn stream_range(
        &self,
        key: &Bytes,
        start: StreamId,
        end: StreamId,
        count: Option<usize>,
    ) -> CoreResult<Vec<(StreamId, Vec<(Bytes, Bytes)>)>> {
        match self.with_read(key, as_stream) {
            Some(r) => r.map(|s| s.range(start, end, count)),
            None => Ok(Vec::new()),
        }
    }

    pub fn stream_trim_maxlen(&self, key: &Bytes, maxlen: usize) -> CoreResult<usize> {
        let result = self.with_write(key, |entry| match &mut entry.kind {
            Kind::Stream(s) => Ok(s.trim_maxlen(maxlen)),
            _ => Err(CoreError::WrongType),
        });
        result.unwrap_or(Ok(0))
    }

    pub fn stream_del(&self, key: &Bytes, ids: &[StreamId]) -> CoreResult<usize> {
        let result = self.with_write(key, |entry| match &mut entry.kind {
            Kind::Stream(s) => {
                let mut removed = 0;
                for id in ids {
                    if s.entries.remove(id).is_some() {
                        if *id > s.max_deleted_id {
                            s.max_deleted_id = *id;
                        }
                        removed += 1;
                    }
                }
                Ok(removed)
            }
            _ => Err(CoreError::WrongType),
        });
        result.unwrap_or(Ok(0))
    }

    pub fn stream_group_create(&self, key: &Bytes, group: &Bytes, start_id: StreamId) -> CoreResult<()> {
        self.with_write_or_insert(
            key,
            || Kind::Stream(StreamData::new()),
            |entry| match &mut entry.kind {
                Kind::Stream(s) => {
                    if s.groups.contains_key(group) {
                        return Err(CoreError::generic("BUSYGROUP Consumer Group name already exists"));
                    }
                    s.groups.insert(
                        group.clone(),
                        ConsumerGroup { last_delivered: start_id, ..Default::default() },
                    );
                    Ok(())
                }
                _ => Err(CoreError::WrongType),
            },
        )
    }

    /// `XREADGROUP`: delivers entries after the group's last-delivered id to
    /// `consumer`, advancing the cursor and recording each as pending.
    pub fn stream_read_group(
        &self,
        key: &Bytes,
        group: &Bytes,
        consumer: &Bytes,
        count: Option<usize>,
    ) -> CoreResult<Vec<(StreamId, Vec<(Bytes, Bytes)>)>> {
        let result = self.with_write(key, |entry| match &mut entry.kind {
            Kind::Stream(s) => {
                let last_delivered = match s.groups.get(group) {
                    Some(g) => g.last_delivered,
                    None => return Err(CoreError::generic("NOGROUP No such consumer group")),
                };
                let after: Vec<(StreamId, Vec<(Bytes, Bytes)>)> = s
                    .entries
                    .range(..)
                    .filter(|(id, _)| **id > last_delivered)
                    .map(|(id, f)| (*id, f.clone()))
                    .take(count.unwrap_or(usize::MAX))
                    .collect();
                let now = now_ms();
                let g = s.groups.get_mut(group).unwrap();
                for (id, _) in &after {
                    g.last_delivered = *id;
                    g.pending.insert(
                        *id,
                        PendingEntry { consumer: consumer.clone(), delivery_time_ms: now, delivery_count: 1 },
                    );
                }
                *g.consumers.entry(consumer.clone()).or_insert(0) += after.len() as u64;
                Ok(after)
            }
            _ => Err(CoreError::WrongType),
        });
        result.unwrap_or(Ok(Vec::new()))
    }

    pub fn stream_ack(&self, key: &Bytes, group: &Bytes, ids: &[StreamId]) -> CoreResult<usize> {
        let result = self.with_write(key, |entry| match &mut entry.kind {
            Kind::Stream(s) => {
                let g = match s.group_mut(group) {
                    Some(g) => g,
                    None => return Ok(0),
                };
                Ok(ids.iter().filter(|id| g.pending.remove(id).is_some()).count())
            }
            _ => Err(CoreError::WrongType),
        });
        result.unwrap_or(Ok(0))
    }

    /// `XCLAIM`: reassigns the named pending entries to `consumer`, bumping
    /// delivery count, only if they've been idle at least `min_idle_ms`.
    pub fn stream_claim(
        &self,
        key: &Bytes,
        group: &Bytes,
        consumer: &Bytes,
        min_idle_ms: u64,
        ids: &[StreamId],
    ) -> CoreResult<Vec<(StreamId, Vec<(Bytes, Bytes)>)>> {
        let result = self.with_write(key, |entry| match &mut entry.kind {
            Kind::Stream(s) => {
                let now = now_ms();
                let entries_snapshot = s.entries.clone();
                let g = match s.group_mut(group) {
                    Some(g) => g,
                    None => return Err(CoreError::generic("NOGROUP No such consumer group")),
                };
                let mut claimed = Vec::new();
                for id in ids {
                    if let Some(pending) = g.pending.get_mut(id) {
                        if now.saturating_sub(pending.delivery_time_ms) >= min_idle_ms {
                            pending.consumer = consumer.clone();
                            pending.delivery_time_ms = now;
                            pending.delivery_count += 1;
                            if let Some(fields) = entries_snapshot.get(id) {
                                claimed.push((*id, fields.clone()));
                            }
                        }
                    }
                }
                Ok(claimed)
            }
            _ => Err(CoreError::WrongType),
        });
        result.unwrap_or(Ok(Vec::new()))
    }

    /// `XAUTOCLAIM`: like `stream_claim` but scans the PEL from `start`
    /// forward instead of taking an explicit id list, returning the next
    /// cursor to resume from.
    pub fn stream_autoclaim(
        &self,
        key: &Bytes,
        group: &Bytes,
        consumer: &Bytes,
        min_idle_ms: u64,
        start: StreamId,
        count: usize,
    ) -> CoreResult<(StreamId, Vec<(StreamId, Vec<(Bytes, Bytes)>)>)> {
        let result = self.with_write(key, |entry| match &mut entry.kind {
            Kind::Stream(s) => {
                let now = now_ms();
                let entries_snapshot = s.entries.clone();
                let g = match s.group_mut(group) {
                    Some(g) => g,
                    None => return Err(CoreError::generic("NOGROUP No such consumer group")),
                };
                let candidate_ids: Vec<StreamId> = g
                    .pending
                    .range(start..)
                    .filter(|(_, p)| now.saturating_sub(p.delivery_time_ms) >= min_idle_ms)
                    .map(|(id, _)| *id)
                    .take(count)
                    .collect();
                let mut claimed = Vec::new();
                for id in &candidate_ids {
                    let pending = g.pending.get_mut(id).unwrap();
                    pending.consumer = consumer.clone();
                    pending.delivery_time_ms = now;
                    pending.delivery_count += 1;
                    if let Some(fields) = entries_snapshot.get(id) {
                        claimed.push((*id, fields.clone()));
                    }
                }
                let next_cursor = candidate_ids
                    .last()
                    .map(|id| StreamId { ms: id.ms, seq: id.seq + 1 })
                    .unwrap_or(StreamId::MIN);
                Ok((next_cursor, claimed))
            }
            _ => Err(CoreError::WrongType),
        });
        result.unwrap_or(Ok((StreamId::MIN, Vec::new())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_id_bumps_sequence_within_same_millisecond() {
        let mut s = StreamData::new();
        let id1 = s.next_auto_id(100);
        s.append(id1, vec![]).unwrap();
        let id2 = s.next_auto_id(100);
        assert_eq!(id2, StreamId { ms: 100, seq: 1 });
    }

    #[test]
    fn auto_id_resets_sequence_on_new_millisecond() {
        let mut s = StreamData::new();
        s.append(StreamId { ms: 100, seq: 5 }, vec![]).unwrap();
        let id = s.next_auto_id(200);
        assert_eq!(id, StreamId { ms: 200, seq: 0 });
    }

    #[test]
    fn rejects_non_monotonic_ids() {
        let mut s = StreamData::new();
        s.append(StreamId { ms: 100, seq: 0 }, vec![]).unwrap();
        assert!(s.append(StreamId { ms: 50, seq: 0 }, vec![]).is_err());
    }

    #[test]
    fn trim_maxlen_drops_oldest() {
        let mut s = StreamData::new();
        for i in 0..5 {
            s.append(StreamId { ms: i, seq: 0 }, vec![]).unwrap();
        }
        let removed = s.trim_maxlen(3);
        assert_eq!(removed, 2);
        assert_eq!(s.entries.len(), 3);
        assert!(s.entries.contains_key(&StreamId { ms: 4, seq: 0 }));
    }

    #[test]
    fn id_parse_supports_ms_and_ms_seq_and_wildcard_seq() {
        assert_eq!(StreamId::parse("100").unwrap(), (100, Some(0)));
        assert_eq!(StreamId::parse("100-5").unwrap(), (100, Some(5)));
        assert_eq!(StreamId::parse("100-*").unwrap(), (100, None));
    }

    fn engine() -> KeyspaceEngine {
        KeyspaceEngine::new(16)
    }

    #[test]
    fn xadd_then_xrange_returns_appended_entry() {
        let e = engine();
        let k = Bytes::from("s");
        let id = e.stream_add(&k, None, vec![(Bytes::from("f"), Bytes::from("v"))], None).unwrap();
        assert!(id.len() > 0);
        let entries = e.stream_range(&k, StreamId::MIN, StreamId { ms: u64::MAX, seq: u64::MAX }, None).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(e.stream_len(&k).unwrap(), 1);
    }

    #[test]
    fn xadd_with_maxlen_trims_old_entries() {
        let e = engine();
        let k = Bytes::from("s");
        for _ in 0..5 {
            e.stream_add(&k, None, vec![], Some(3)).unwrap();
        }
        assert_eq!(e.stream_len(&k).unwrap(), 3);
    }

    #[test]
    fn xgroup_create_then_xreadgroup_delivers_and_pends() {
        let e = engine();
        let k = Bytes::from("s");
        e.stream_add(&k, None, vec![(Bytes::from("f"), Bytes::from("v"))], None).unwrap();
        e.stream_group_create(&k, &Bytes::from("g"), StreamId::MIN).unwrap();
        let delivered = e
            .stream_read_group(&k, &Bytes::from("g"), &Bytes::from("c1"), None)
            .unwrap();
        assert_eq!(delivered.len(), 1);
        let again = e
            .stream_read_group(&k, &Bytes::from("g"), &Bytes::from("c1"), None)
            .unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn xack_removes_from_pending() {
        let e = engine();
        let k = Bytes::from("s");
        let id_raw = e.stream_add(&k, None, vec![], None).unwrap();
        let id = {
            let (ms, seq) = StreamId::parse(std::str::from_utf8(&id_raw).unwrap()).unwrap();
            StreamId { ms, seq: seq.unwrap() }
        };
        e.stream_group_create(&k, &Bytes::from("g"), StreamId::MIN).unwrap();
        e.stream_read_group(&k, &Bytes::from("g"), &Bytes::from("c1"), None).unwrap();
        let acked = e.stream_ack(&k, &Bytes::from("g"), &[id]).unwrap();
        assert_eq!(acked, 1);
    }

    #[test]
    fn xclaim_requires_min_idle_time() {
        let e = engine();
        let k = Bytes::from("s");
        let id_raw = e.stream_add(&k, None, vec![], None).unwrap();
        let id = {
            let (ms, seq) = StreamId::parse(std::str::from_utf8(&id_raw).unwrap()).unwrap();
            StreamId { ms, seq: seq.unwrap() }
        };
        e.stream_group_create(&k, &Bytes::from("g"), StreamId::MIN).unwrap();
        e.stream_read_group(&k, &Bytes::from("g"), &Bytes::from("c1"), None).unwrap();
        let claimed = e.stream_claim(&k, &Bytes::from("g"), &Bytes::from("c2"), 1_000_000, &[id]).unwrap();
        assert!(claimed.is_empty());
        let claimed = e.stream_claim(&k, &Bytes::from("g"), &Bytes::from("c2"), 0, &[id]).unwrap();
        assert_eq!(claimed.len(), 1);
    }

    #[test]
    fn xdel_removes_named_entries() {
        let e = engine();
        let k = Bytes::from("s");
        let id_raw = e.stream_add(&k, None, vec![], None).unwrap();
        let id = {
            let (ms, seq) = StreamId::parse(std::str::from_utf8(&id_raw).unwrap()).unwrap();
            StreamId { ms, seq: seq.unwrap() }
        };
        assert_eq!(e.stream_del(&k, &[id]).unwrap(), 1);
        assert_eq!(e.stream_len(&k).unwrap(), 0);
    }
}
