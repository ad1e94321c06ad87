//! Bitmap operations: a bit-addressed byte buffer. `TYPE` reports a
//! bitmap key as `string` since Redis itself layers `SETBIT`/`GETBIT` over
//! plain strings rather than a distinct type.

use crate::error::{CoreError, CoreResult};
use crate::storage::engine::KeyspaceEngine;
use crate::storage::entry::Kind;
use bytes::Bytes;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BitOp {
    And,
    Or,
    Xor,
    Not,
}

impl KeyspaceEngine {
    pub fn bitmap_setbit(&self, key: &Bytes, offset: u64, value: bool) -> CoreResult<bool> {
        self.with_write_or_insert(
            key,
            || Kind::Bitmap(Vec::new()),
            |entry| match &mut entry.kind {
                Kind::Bitmap(bits) => {
                    let byte_idx = (offset / 8) as usize;
                    let bit_idx = 7 - (offset % 8) as u8;
                    if bits.len() <= byte_idx {
                        bits.resize(byte_idx + 1, 0);
                    }
                    let old = (bits[byte_idx] >> bit_idx) & 1 == 1;
                    if value {
                        bits[byte_idx] |= 1 << bit_idx;
                    } else {
                        bits[byte_idx] &= !(1 << bit_idx);
                    }
                    Ok(old)
                }
                _ => Err(CoreError::WrongType),
            },
        )
    }

    pub fn bitmap_getbit(&self, key: &Bytes, offset: u64) -> CoreResult<bool> {
        match self.with_read(key, |kind| match kind {
            Kind::Bitmap(bits) => {
                let byte_idx = (offset / 8) as usize;
                let bit_idx = 7 - (offset % 8) as u8;
                Ok(bits.get(byte_idx).map(|b| (b >> bit_idx) & 1 == 1).unwrap_or(false))
            }
            _ => Err(CoreError::WrongType),
        }) {
            Some(r) => r,
            None => Ok(false),
        }
    }

    pub fn bitmap_count(&self, key: &Bytes, range: Option<(i64, i64)>) -> CoreResult<u64> {
        match self.with_read(key, |kind| match kind {
            Kind::Bitmap(bits) => {
                let slice = slice_for_range(bits, range);
                Ok(slice.iter().map(|b| b.count_ones() as u64).sum())
            }
            _ => Err(CoreError::WrongType),
        }) {
            Some(r) => r,
            None => Ok(0),
        }
    }

    pub fn bitmap_pos(&self, key: &Bytes, target: bool, range: Option<(i64, i64)>) -> CoreResult<i64> {
        match self.with_read(key, |kind| match kind {
            Kind::Bitmap(bits) => {
                let (slice, base_offset) = slice_for_range_with_offset(bits, range);
                for (i, byte) in slice.iter().enumerate() {
                    for bit in 0..8u8 {
                        let set = (byte >> (7 - bit)) & 1 == 1;
                        if set == target {
                            return Ok(((base_offset + i) * 8 + bit as usize) as i64);
                        }
                    }
                }
                Ok(-1)
            }
            _ => Err(CoreError::WrongType),
        }) {
            Some(r) => r,
            None => Ok(-1),
        }
    }

    pub fn bitmap_op(&self, op: BitOp, dest: &Bytes, sources: &[Bytes]) -> CoreResult<usize> {
        let values: Vec<Vec<u8>> = sources
            .iter()
            .map(|k| {
                self.with_read(k, |kind| match kind {
                    Kind::Bitmap(b) => Ok(b.clone()),
                    Kind::Str(b) => Ok(b.to_vec()),
                    _ => Err(CoreError::WrongType),
                })
                .unwrap_or(Ok(Vec::new()))
            })
            .collect::<CoreResult<Vec<_>>>()?;

        if op == BitOp::Not && values.len() != 1 {
            return Err(CoreError::generic("BITOP NOT must be called with a single source key"));
        }

        let max_len = values.iter().map(|v| v.len()).max().unwrap_or(0);
        let mut result = vec![0u8; max_len];
        match op {
            BitOp::Not => {
                for (i, r) in result.iter_mut().enumerate() {
                    *r = !values[0].get(i).copied().unwrap_or(0);
                }
            }
            BitOp::And => {
                for r in result.iter_mut() {
                    *r = 0xff;
                }
                for v in &values {
                    for (i, r) in result.iter_mut().enumerate() {
                        *r &= v.get(i).copied().unwrap_or(0);
                    }
                }
            }
            BitOp::Or => {
                for v in &values {
                    for (i, r) in result.iter_mut().enumerate() {
                        *r |= v.get(i).copied().unwrap_or(0);
                    }
                }
            }
            BitOp::Xor => {
                for v in &values {
                    for (i, r) in result.iter_mut().enumerate() {
                        *r ^= v.get(i).copied().unwrap_or(0);
                    }
                }
            }
        }

        let len = result.len();
        self.del(&[dest.clone()]);
        if len > 0 {
            self.with_write_or_insert(dest, || Kind::Bitmap(result), |_| Ok::<_, CoreError>(()))?;
        }
        Ok(len)
    }
}

fn slice_for_range(bits: &[u8], range: Option<(i64, i64)>) -> Vec<u8> {
    let (slice, _) = slice_for_range_with_offset(bits, range);
    slice
}

fn slice_for_range_with_offset(bits: &[u8], range: Option<(i64, i64)>) -> (Vec<u8>, usize) {
    let len = bits.len() as i64;
    match range {
        None => (bits.to_vec(), 0),
        Some((start, end)) => {
            let norm = |i: i64| if i < 0 { (len + i).max(0) } else { i };
            let start = norm(start).min(len);
            let end = norm(end).min(len.saturating_sub(1));
            if start > end || len == 0 {
                (Vec::new(), start as usize)
            } else {
                (bits[start as usize..=end as usize].to_vec(), start as usize)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> KeyspaceEngine {
        KeyspaceEngine::new(16)
    }

    #[test]
    fn setbit_getbit_roundtrip() {
        let e = engine();
        let k = Bytes::from("bm");
        assert!(!e.bitmap_setbit(&k, 7, true).unwrap());
        assert!(e.bitmap_getbit(&k, 7).unwrap());
        assert!(!e.bitmap_getbit(&k, 6).unwrap());
    }

    #[test]
    fn bitcount_counts_set_bits() {
        let e = engine();
        let k = Bytes::from("bm");
        e.bitmap_setbit(&k, 0, true).unwrap();
        e.bitmap_setbit(&k, 1, true).unwrap();
        e.bitmap_setbit(&k, 15, true).unwrap();
        assert_eq!(e.bitmap_count(&k, None).unwrap(), 3);
    }

    #[test]
    fn bitop_and_or_xor() {
        let e = engine();
        e.bitmap_setbit(&Bytes::from("a"), 0, true).unwrap();
        e.bitmap_setbit(&Bytes::from("b"), 0, true).unwrap();
        e.bitmap_setbit(&Bytes::from("b"), 1, true).unwrap();
        e.bitmap_op(BitOp::And, &Bytes::from("dest"), &[Bytes::from("a"), Bytes::from("b")]).unwrap();
        assert!(e.bitmap_getbit(&Bytes::from("dest"), 0).unwrap());
        assert!(!e.bitmap_getbit(&Bytes::from("dest"), 1).unwrap());
    }
}
