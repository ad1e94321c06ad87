//! Set-family operations: unique, unordered byte-string membership,
//! plus the multi-key `SINTER`/`SUNION`/`SDIFF` family and their `*STORE`
//! variants, which lock every involved shard via [`KeyspaceEngine::lock_many`]
//! so the store step is atomic with the read.

use crate::error::{CoreError, CoreResult};
use crate::storage::engine::KeyspaceEngine;
use crate::storage::entry::{Entry, Kind};
use bytes::Bytes;
use std::collections::HashSet;

fn as_set(kind: &Kind) -> CoreResult<HashSet<Bytes>> {
    match kind {
        Kind::Set(s) => Ok(s.clone()),
        _ => Err(CoreError::WrongType),
    }
}

impl KeyspaceEngine {
    pub fn set_add(&self, key: &Bytes, members: &[Bytes]) -> CoreResult<usize> {
        self.with_write_or_insert(
            key,
            || Kind::Set(HashSet::new()),
            |entry| match &mut entry.kind {
                Kind::Set(set) => {
                    let mut added = 0;
                    for m in members {
                        if set.insert(m.clone()) {
                            added += 1;
                        }
                    }
                    Ok(added)
                }
                _ => Err(CoreError::WrongType),
            },
        )
    }

    pub fn set_rem(&self, key: &Bytes, members: &[Bytes]) -> CoreResult<usize> {
        let result = self.with_write(key, |entry| match &mut entry.kind {
            Kind::Set(set) => {
                let mut removed = 0;
                for m in members {
                    if set.remove(m) {
                        removed += 1;
                    }
                }
                Ok(removed)
            }
            _ => Err(CoreError::WrongType),
        });
        result.unwrap_or(Ok(0))
    }

    pub fn set_members(&self, key: &Bytes) -> CoreResult<Vec<Bytes>> {
        match self.with_read(key, as_set) {
            Some(r) => r.map(|s| s.into_iter().collect()),
            None => Ok(Vec::new()),
        }
    }

    pub fn set_is_member(&self, key: &Bytes, member: &Bytes) -> CoreResult<bool> {
        match self.with_read(key, as_set) {
            Some(r) => r.map(|s| s.contains(member)),
            None => Ok(false),
        }
    }

    pub fn set_card(&self, key: &Bytes) -> CoreResult<usize> {
        match self.with_read(key, as_set) {
            Some(r) => r.map(|s| s.len()),
            None => Ok(0),
        }
    }

    pub fn set_move(&self, src: &Bytes, dst: &Bytes, member: &Bytes) -> CoreResult<bool> {
        let keys = [src.clone(), dst.clone()];
        let mut guard = self.lock_many(&keys);

        let removed = match guard.map_for(src).get_mut(src) {
            Some(e) => match &mut e.kind {
                Kind::Set(set) => {
                    let was_present = set.remove(member);
                    if was_present {
                        e.bump_version();
                    }
                    was_present
                }
                _ => return Err(CoreError::WrongType),
            },
            None => false,
        };
        if !removed {
            return Ok(false);
        }
        let dst_map = guard.map_for(dst);
        match dst_map.get_mut(dst) {
            Some(e) => match &mut e.kind {
                Kind::Set(set) => {
                    set.insert(member.clone());
                    e.bump_version();
                }
                _ => return Err(CoreError::WrongType),
            },
            None => {
                let mut set = HashSet::new();
                set.insert(member.clone());
                dst_map.insert(dst.clone(), Entry::new(Kind::Set(set)));
            }
        }
        Ok(true)
    }

    fn read_sets(&self, keys: &[Bytes]) -> CoreResult<Vec<HashSet<Bytes>>> {
        keys.iter()
            .map(|k| self.with_read(k, as_set).unwrap_or_else(|| Ok(HashSet::new())))
            .collect()
    }

    pub fn set_inter(&self, keys: &[Bytes]) -> CoreResult<HashSet<Bytes>> {
        let sets = self.read_sets(keys)?;
        let mut iter = sets.into_iter();
        let first = iter.next().unwrap_or_default();
        Ok(iter.fold(first, |acc, s| acc.intersection(&s).cloned().collect()))
    }

    pub fn set_union(&self, keys: &[Bytes]) -> CoreResult<HashSet<Bytes>> {
        let sets = self.read_sets(keys)?;
        Ok(sets.into_iter().fold(HashSet::new(), |mut acc, s| {
            acc.extend(s);
            acc
        }))
    }

    pub fn set_diff(&self, keys: &[Bytes]) -> CoreResult<HashSet<Bytes>> {
        let mut sets = self.read_sets(keys)?.into_iter();
        let first = sets.next().unwrap_or_default();
        Ok(sets.fold(first, |acc, s| acc.difference(&s).cloned().collect()))
    }

    pub fn set_store(&self, dest: &Bytes, members: HashSet<Bytes>) -> usize {
        let len = members.len();
        self.del(&[dest.clone()]);
        if !members.is_empty() {
            let _ = self.with_write_or_insert(
                dest,
                || Kind::Set(members.clone()),
                |_| Ok::<_, CoreError>(()),
            );
        }
        len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> KeyspaceEngine {
        KeyspaceEngine::new(16)
    }

    #[test]
    fn add_rem_ismember() {
        let e = engine();
        let k = Bytes::from("s");
        e.set_add(&k, &[Bytes::from("a"), Bytes::from("b")]).unwrap();
        assert!(e.set_is_member(&k, &Bytes::from("a")).unwrap());
        assert_eq!(e.set_rem(&k, &[Bytes::from("a")]).unwrap(), 1);
        assert!(!e.set_is_member(&k, &Bytes::from("a")).unwrap());
    }

    #[test]
    fn inter_union_diff() {
        let e = engine();
        e.set_add(&Bytes::from("s1"), &[Bytes::from("a"), Bytes::from("b"), Bytes::from("c")])
            .unwrap();
        e.set_add(&Bytes::from("s2"), &[Bytes::from("b"), Bytes::from("c"), Bytes::from("d")])
            .unwrap();
        let keys = [Bytes::from("s1"), Bytes::from("s2")];
        let inter = e.set_inter(&keys).unwrap();
        assert_eq!(inter, HashSet::from([Bytes::from("b"), Bytes::from("c")]));
        let union = e.set_union(&keys).unwrap();
        assert_eq!(union.len(), 4);
        let diff = e.set_diff(&keys).unwrap();
        assert_eq!(diff, HashSet::from([Bytes::from("a")]));
    }

    #[test]
    fn smove_moves_between_shards() {
        let e = engine();
        e.set_add(&Bytes::from("src"), &[Bytes::from("x")]).unwrap();
        assert!(e.set_move(&Bytes::from("src"), &Bytes::from("dst"), &Bytes::from("x")).unwrap());
        assert!(!e.set_is_member(&Bytes::from("src"), &Bytes::from("x")).unwrap());
        assert!(e.set_is_member(&Bytes::from("dst"), &Bytes::from("x")).unwrap());
    }
}
