//! Hash-family operations: a field→value map per key. Iteration
//! order is not guaranteed, but `HSCAN`'s cursor must still be stable
//! across calls for a given snapshot, so it reuses the same flat-sorted
//! cursor strategy as the keyspace-level `SCAN`.

use crate::error::{CoreError, CoreResult};
use crate::storage::engine::{glob_match, KeyspaceEngine};
use crate::storage::entry::Kind;
use bytes::Bytes;
use std::collections::HashMap;

fn as_hash(kind: &Kind) -> CoreResult<HashMap<Bytes, Bytes>> {
    match kind {
        Kind::Hash(h) => Ok(h.clone()),
        _ => Err(CoreError::WrongType),
    }
}

impl KeyspaceEngine {
    pub fn hash_set(&self, key: &Bytes, fields: &[(Bytes, Bytes)]) -> CoreResult<usize> {
        self.with_write_or_insert(
            key,
            || Kind::Hash(HashMap::new()),
            |entry| match &mut entry.kind {
                Kind::Hash(map) => {
                    let mut added = 0;
                    for (field, value) in fields {
                        if map.insert(field.clone(), value.clone()).is_none() {
                            added += 1;
                        }
                    }
                    Ok(added)
                }
                _ => Err(CoreError::WrongType),
            },
        )
    }

    pub fn hash_setnx(&self, key: &Bytes, field: &Bytes, value: Bytes) -> CoreResult<bool> {
        self.with_write_or_insert(
            key,
            || Kind::Hash(HashMap::new()),
            |entry| match &mut entry.kind {
                Kind::Hash(map) => {
                    if map.contains_key(field) {
                        Ok(false)
                    } else {
                        map.insert(field.clone(), value);
                        Ok(true)
                    }
                }
                _ => Err(CoreError::WrongType),
            },
        )
    }

    pub fn hash_get(&self, key: &Bytes, field: &Bytes) -> CoreResult<Option<Bytes>> {
        match self.with_read(key, as_hash) {
            Some(r) => r.map(|m| m.get(field).cloned()),
            None => Ok(None),
        }
    }

    pub fn hash_mget(&self, key: &Bytes, fields: &[Bytes]) -> CoreResult<Vec<Option<Bytes>>> {
        match self.with_read(key, as_hash) {
            Some(r) => r.map(|m| fields.iter().map(|f| m.get(f).cloned()).collect()),
            None => Ok(fields.iter().map(|_| None).collect()),
        }
    }

    pub fn hash_getall(&self, key: &Bytes) -> CoreResult<Vec<(Bytes, Bytes)>> {
        match self.with_read(key, as_hash) {
            Some(r) => r.map(|m| m.into_iter().collect()),
            None => Ok(Vec::new()),
        }
    }

    pub fn hash_del(&self, key: &Bytes, fields: &[Bytes]) -> CoreResult<usize> {
        let removed = self.with_write(key, |entry| match &mut entry.kind {
            Kind::Hash(map) => {
                let mut removed = 0;
                for f in fields {
                    if map.remove(f).is_some() {
                        removed += 1;
                    }
                }
                Ok(removed)
            }
            _ => Err(CoreError::WrongType),
        });
        match removed {
            Some(r) => r,
            None => Ok(0),
        }
    }

    pub fn hash_exists(&self, key: &Bytes, field: &Bytes) -> CoreResult<bool> {
        Ok(self.hash_get(key, field)?.is_some())
    }

    pub fn hash_len(&self, key: &Bytes) -> CoreResult<usize> {
        match self.with_read(key, as_hash) {
            Some(r) => r.map(|m| m.len()),
            None => Ok(0),
        }
    }

    pub fn hash_incrby(&self, key: &Bytes, field: &Bytes, delta: i64) -> CoreResult<i64> {
        self.with_write_or_insert(
            key,
            || Kind::Hash(HashMap::new()),
            |entry| match &mut entry.kind {
                Kind::Hash(map) => {
                    let current = match map.get(field) {
                        Some(v) => crate::storage::string::parse_i64(v)?,
                        None => 0,
                    };
                    let updated = current.checked_add(delta).ok_or(CoreError::Overflow)?;
                    map.insert(field.clone(), Bytes::from(updated.to_string()));
                    Ok(updated)
                }
                _ => Err(CoreError::WrongType),
            },
        )
    }

    pub fn hash_incrbyfloat(&self, key: &Bytes, field: &Bytes, delta: f64) -> CoreResult<f64> {
        self.with_write_or_insert(
            key,
            || Kind::Hash(HashMap::new()),
            |entry| match &mut entry.kind {
                Kind::Hash(map) => {
                    let current = match map.get(field) {
                        Some(v) => crate::storage::string::parse_f64(v)?,
                        None => 0.0,
                    };
                    let updated = current + delta;
                    map.insert(
                        field.clone(),
                        Bytes::from(crate::storage::string::format_float_no_exponent(updated)),
                    );
                    Ok(updated)
                }
                _ => Err(CoreError::WrongType),
            },
        )
    }

    pub fn hash_keys(&self, key: &Bytes) -> CoreResult<Vec<Bytes>> {
        match self.with_read(key, as_hash) {
            Some(r) => r.map(|m| m.into_keys().collect()),
            None => Ok(Vec::new()),
        }
    }

    pub fn hash_vals(&self, key: &Bytes) -> CoreResult<Vec<Bytes>> {
        match self.with_read(key, as_hash) {
            Some(r) => r.map(|m| m.into_values().collect()),
            None => Ok(Vec::new()),
        }
    }

    /// Stable cursor over a snapshot of the hash's fields, matching
    /// `SCAN`'s semantics applied within one hash.
    pub fn hash_scan(&self, key: &Bytes, cursor: u64, pattern: Option<&str>, count: usize) -> CoreResult<(u64, Vec<(Bytes, Bytes)>)> {
        let map = match self.with_read(key, as_hash) {
            Some(r) => r?,
            None => return Ok((0, Vec::new())),
        };
        let mut entries: Vec<(Bytes, Bytes)> = map.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let start = cursor as usize;
        if start >= entries.len() {
            return Ok((0, Vec::new()));
        }
        let end = (start + count.max(1)).min(entries.len());
        let page: Vec<(Bytes, Bytes)> = entries[start..end]
            .iter()
            .filter(|(f, _)| pattern.map(|p| glob_match(p.as_bytes(), f)).unwrap_or(true))
            .cloned()
            .collect();
        let next = if end >= entries.len() { 0 } else { end as u64 };
        Ok((next, page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> KeyspaceEngine {
        KeyspaceEngine::new(16)
    }

    #[test]
    fn set_get_del() {
        let e = engine();
        let k = Bytes::from("h");
        e.hash_set(&k, &[(Bytes::from("f1"), Bytes::from("v1"))]).unwrap();
        assert_eq!(e.hash_get(&k, &Bytes::from("f1")).unwrap(), Some(Bytes::from("v1")));
        assert_eq!(e.hash_del(&k, &[Bytes::from("f1")]).unwrap(), 1);
        assert_eq!(e.hash_get(&k, &Bytes::from("f1")).unwrap(), None);
    }

    #[test]
    fn incrby_treats_missing_field_as_zero() {
        let e = engine();
        let k = Bytes::from("h");
        assert_eq!(e.hash_incrby(&k, &Bytes::from("f"), 3).unwrap(), 3);
    }

    #[test]
    fn setnx_only_sets_if_absent() {
        let e = engine();
        let k = Bytes::from("h");
        assert!(e.hash_setnx(&k, &Bytes::from("f"), Bytes::from("a")).unwrap());
        assert!(!e.hash_setnx(&k, &Bytes::from("f"), Bytes::from("b")).unwrap());
        assert_eq!(e.hash_get(&k, &Bytes::from("f")).unwrap(), Some(Bytes::from("a")));
    }

    #[test]
    fn hscan_cursor_covers_all_fields() {
        let e = engine();
        let k = Bytes::from("h");
        for i in 0..10 {
            e.hash_set(&k, &[(Bytes::from(format!("f{}", i)), Bytes::from("v"))]).unwrap();
        }
        let mut cursor = 0;
        let mut seen = 0;
        loop {
            let (next, page) = e.hash_scan(&k, cursor, None, 3).unwrap();
            seen += page.len();
            if next == 0 {
                break;
            }
            cursor = next;
        }
        assert_eq!(seen, 10);
    }
}
