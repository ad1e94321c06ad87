//! List-family operations: a doubly-indexable, insertion-ordered
//! sequence. Blocking variants (`BLPOP`/`BRPOP`/`BLMOVE`/`BLMPOP`) are
//! implemented one layer up in `commands::lists`, which parks on the
//! `Notify` handles registered here (`register_waiter`/`notify_one_waiter`)
//! — the same waiter-queue design spec.md's Design Notes describe to avoid
//! lost wakeups.

use crate::error::{CoreError, CoreResult};
use crate::storage::engine::KeyspaceEngine;
use crate::storage::entry::Kind;
use bytes::Bytes;
use std::collections::VecDeque;

pub enum Side {
    Left,
    Right,
}

impl KeyspaceEngine {
    pub fn list_push(&self, key: &Bytes, side: Side, values: &[Bytes]) -> CoreResult<usize> {
        let len = self.with_write_or_insert(
            key,
            || Kind::List(VecDeque::new()),
            |entry| match &mut entry.kind {
                Kind::List(list) => {
                    for v in values {
                        match side {
                            Side::Left => list.push_front(v.clone()),
                            Side::Right => list.push_back(v.clone()),
                        }
                    }
                    Ok(list.len())
                }
                _ => Err(CoreError::WrongType),
            },
        )?;
        self.notify_one_waiter(key);
        Ok(len)
    }

    /// Pushes only if the key already exists as a list (`LPUSHX`/`RPUSHX`).
    pub fn list_pushx(&self, key: &Bytes, side: Side, values: &[Bytes]) -> CoreResult<usize> {
        let result = self.with_write(key, |entry| match &mut entry.kind {
            Kind::List(list) => {
                for v in values {
                    match side {
                        Side::Left => list.push_front(v.clone()),
                        Side::Right => list.push_back(v.clone()),
                    }
                }
                Ok(list.len())
            }
            _ => Err(CoreError::WrongType),
        });
        match result {
            Some(r) => {
                let len = r?;
                self.notify_one_waiter(key);
                Ok(len)
            }
            None => Ok(0),
        }
    }

    pub fn list_pop(&self, key: &Bytes, side: Side, count: usize) -> CoreResult<Vec<Bytes>> {
        let result = self.with_write(key, |entry| match &mut entry.kind {
            Kind::List(list) => {
                let mut out = Vec::with_capacity(count.min(list.len()));
                for _ in 0..count {
                    let popped = match side {
                        Side::Left => list.pop_front(),
                        Side::Right => list.pop_back(),
                    };
                    match popped {
                        Some(v) => out.push(v),
                        None => break,
                    }
                }
                Ok(out)
            }
            _ => Err(CoreError::WrongType),
        });
        let popped = match result {
            Some(r) => r?,
            None => return Ok(Vec::new()),
        };
        if self.list_len(key).unwrap_or(0) == 0 {
            self.del(&[key.clone()]);
        }
        Ok(popped)
    }

    pub fn list_len(&self, key: &Bytes) -> CoreResult<usize> {
        match self.with_read(key, |kind| match kind {
            Kind::List(l) => Ok(l.len()),
            _ => Err(CoreError::WrongType),
        }) {
            Some(r) => r,
            None => Ok(0),
        }
    }

    pub fn list_index(&self, key: &Bytes, index: i64) -> CoreResult<Option<Bytes>> {
        match self.with_read(key, |kind| match kind {
            Kind::List(l) => Ok(normalize_index(index, l.len()).map(|i| l[i].clone())),
            _ => Err(CoreError::WrongType),
        }) {
            Some(r) => r,
            None => Ok(None),
        }
    }

    pub fn list_range(&self, key: &Bytes, start: i64, stop: i64) -> CoreResult<Vec<Bytes>> {
        match self.with_read(key, |kind| match kind {
            Kind::List(l) => {
                let len = l.len() as i64;
                if len == 0 {
                    return Ok(Vec::new());
                }
                let norm = |i: i64| if i < 0 { (len + i).max(0) } else { i };
                let start = norm(start).min(len);
                let stop = norm(stop).min(len - 1);
                if start > stop {
                    return Ok(Vec::new());
                }
                Ok(l.iter().skip(start as usize).take((stop - start + 1) as usize).cloned().collect())
            }
            _ => Err(CoreError::WrongType),
        }) {
            Some(r) => r,
            None => Ok(Vec::new()),
        }
    }

    pub fn list_set(&self, key: &Bytes, index: i64, value: Bytes) -> CoreResult<()> {
        let result = self.with_write(key, |entry| match &mut entry.kind {
            Kind::List(l) => match normalize_index(index, l.len()) {
                Some(i) => {
                    l[i] = value;
                    Ok(())
                }
                None => Err(CoreError::IndexOutOfRange),
            },
            _ => Err(CoreError::WrongType),
        });
        result.unwrap_or(Err(CoreError::NoSuchKey))
    }

    pub fn list_rem(&self, key: &Bytes, count: i64, value: &Bytes) -> CoreResult<usize> {
        let result = self.with_write(key, |entry| match &mut entry.kind {
            Kind::List(l) => {
                let mut removed = 0;
                if count >= 0 {
                    let limit = if count == 0 { usize::MAX } else { count as usize };
                    let mut kept = VecDeque::with_capacity(l.len());
                    for item in l.drain(..) {
                        if removed < limit && &item == value {
                            removed += 1;
                        } else {
                            kept.push_back(item);
                        }
                    }
                    *l = kept;
                } else {
                    let limit = (-count) as usize;
                    let mut kept: VecDeque<Bytes> = VecDeque::with_capacity(l.len());
                    for item in l.drain(..).rev() {
                        if removed < limit && &item == value {
                            removed += 1;
                        } else {
                            kept.push_front(item);
                        }
                    }
                    *l = kept;
                }
                Ok(removed)
            }
            _ => Err(CoreError::WrongType),
        });
        result.unwrap_or(Ok(0))
    }

    pub fn list_trim(&self, key: &Bytes, start: i64, stop: i64) -> CoreResult<()> {
        let result = self.with_write(key, |entry| match &mut entry.kind {
            Kind::List(l) => {
                let len = l.len() as i64;
                let norm = |i: i64| if i < 0 { (len + i).max(0) } else { i };
                let start = norm(start).min(len);
                let stop = norm(stop).min(len - 1);
                if start > stop || len == 0 {
                    l.clear();
                } else {
                    let tail = l.split_off(stop as usize + 1);
                    drop(tail);
                    let _ = l.drain(0..start as usize);
                }
                Ok(())
            }
            _ => Err(CoreError::WrongType),
        });
        result.unwrap_or(Ok(()))
    }

    pub fn list_insert(&self, key: &Bytes, before: bool, pivot: &Bytes, value: Bytes) -> CoreResult<Option<usize>> {
        let result = self.with_write(key, |entry| match &mut entry.kind {
            Kind::List(l) => match l.iter().position(|v| v == pivot) {
                Some(pos) => {
                    let insert_at = if before { pos } else { pos + 1 };
                    l.insert(insert_at, value);
                    Ok(Some(l.len()))
                }
                None => Ok(None),
            },
            _ => Err(CoreError::WrongType),
        });
        result.unwrap_or(Ok(None))
    }

    /// `RPOPLPUSH`/`LMOVE`: pops one element from `src`'s chosen side and
    /// pushes it onto `dst`'s chosen side, atomically across both shards.
    pub fn list_move(&self, src: &Bytes, dst: &Bytes, from: Side, to: Side) -> CoreResult<Option<Bytes>> {
        let keys = [src.clone(), dst.clone()];
        let mut guard = self.lock_many(&keys);
        let popped = match guard.map_for(src).get_mut(src) {
            Some(e) => match &mut e.kind {
                Kind::List(l) => {
                    let v = match from {
                        Side::Left => l.pop_front(),
                        Side::Right => l.pop_back(),
                    };
                    if v.is_some() {
                        e.bump_version();
                    }
                    v
                }
                _ => return Err(CoreError::WrongType),
            },
            None => None,
        };
        let value = match popped {
            Some(v) => v,
            None => return Ok(None),
        };
        let dst_map = guard.map_for(dst);
        match dst_map.get_mut(dst) {
            Some(e) => match &mut e.kind {
                Kind::List(l) => {
                    match to {
                        Side::Left => l.push_front(value.clone()),
                        Side::Right => l.push_back(value.clone()),
                    }
                    e.bump_version();
                }
                _ => return Err(CoreError::WrongType),
            },
            None => {
                use crate::storage::entry::Entry;
                let mut list = VecDeque::new();
                list.push_back(value.clone());
                dst_map.insert(dst.clone(), Entry::new(Kind::List(list)));
            }
        }
        drop(guard);
        self.notify_one_waiter(dst);
        Ok(Some(value))
    }
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let i = if index < 0 { len + index } else { index };
    if i < 0 || i >= len {
        None
    } else {
        Some(i as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> KeyspaceEngine {
        KeyspaceEngine::new(16)
    }

    #[test]
    fn push_pop_preserves_order() {
        let e = engine();
        let k = Bytes::from("l");
        e.list_push(&k, Side::Right, &[Bytes::from("a"), Bytes::from("b"), Bytes::from("c")]).unwrap();
        assert_eq!(e.list_range(&k, 0, -1).unwrap(), vec![Bytes::from("a"), Bytes::from("b"), Bytes::from("c")]);
        assert_eq!(e.list_pop(&k, Side::Left, 1).unwrap(), vec![Bytes::from("a")]);
    }

    #[test]
    fn lrem_positive_and_negative_count() {
        let e = engine();
        let k = Bytes::from("l");
        e.list_push(&k, Side::Right, &[
            Bytes::from("a"), Bytes::from("b"), Bytes::from("a"), Bytes::from("a"),
        ]).unwrap();
        let removed = e.list_rem(&k, 1, &Bytes::from("a")).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(e.list_range(&k, 0, -1).unwrap(), vec![Bytes::from("b"), Bytes::from("a"), Bytes::from("a")]);
    }

    #[test]
    fn list_move_between_keys() {
        let e = engine();
        e.list_push(&Bytes::from("src"), Side::Right, &[Bytes::from("x"), Bytes::from("y")]).unwrap();
        let moved = e.list_move(&Bytes::from("src"), &Bytes::from("dst"), Side::Right, Side::Left).unwrap();
        assert_eq!(moved, Some(Bytes::from("y")));
        assert_eq!(e.list_range(&Bytes::from("dst"), 0, -1).unwrap(), vec![Bytes::from("y")]);
    }

    #[test]
    fn trim_keeps_only_requested_range() {
        let e = engine();
        let k = Bytes::from("l");
        e.list_push(&k, Side::Right, &[Bytes::from("a"), Bytes::from("b"), Bytes::from("c"), Bytes::from("d")]).unwrap();
        e.list_trim(&k, 1, 2).unwrap();
        assert_eq!(e.list_range(&k, 0, -1).unwrap(), vec![Bytes::from("b"), Bytes::from("c")]);
    }
}
