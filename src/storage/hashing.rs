//! Hash primitives shared by the probabilistic sketches.
//!
//! Bloom/Cuckoo filters need a handful of independent, well-distributed hash
//! functions from one seed. Redis-alikes commonly derive them from a single
//! 128-bit MurmurHash3 x64 run (`h1`, `h2`) combined via `h1 + i*h2`, which is
//! what `bloom.rs` and `cuckoo.rs` build on.

/// MurmurHash3 x64 128-bit, returned as two u64 halves (`h1`, `h2`).
pub fn murmur3_x64_128(data: &[u8], seed: u64) -> (u64, u64) {
    const C1: u64 = 0x87c3_7b91_1142_53d5;
    const C2: u64 = 0x4cf5_ad43_2745_937f;

    let mut h1 = seed;
    let mut h2 = seed;

    let nblocks = data.len() / 16;
    for i in 0..nblocks {
        let base = i * 16;
        let mut k1 = u64::from_le_bytes(data[base..base + 8].try_into().unwrap());
        let mut k2 = u64::from_le_bytes(data[base + 8..base + 16].try_into().unwrap());

        k1 = k1.wrapping_mul(C1);
        k1 = k1.rotate_left(31);
        k1 = k1.wrapping_mul(C2);
        h1 ^= k1;
        h1 = h1.rotate_left(27);
        h1 = h1.wrapping_add(h2);
        h1 = h1.wrapping_mul(5).wrapping_add(0x52dc_e729);

        k2 = k2.wrapping_mul(C2);
        k2 = k2.rotate_left(33);
        k2 = k2.wrapping_mul(C1);
        h2 ^= k2;
        h2 = h2.rotate_left(31);
        h2 = h2.wrapping_add(h1);
        h2 = h2.wrapping_mul(5).wrapping_add(0x3849_5ab5);
    }

    let tail = &data[nblocks * 16..];
    let mut k1: u64 = 0;
    let mut k2: u64 = 0;
    let tlen = tail.len();
    if tlen > 8 {
        for i in (8..tlen).rev() {
            k2 ^= (tail[i] as u64) << ((i - 8) * 8);
        }
        k2 = k2.wrapping_mul(C2).rotate_left(33).wrapping_mul(C1);
        h2 ^= k2;
    }
    if tlen >= 8 {
        for i in (0..8.min(tlen)).rev() {
            k1 ^= (tail[i] as u64) << (i * 8);
        }
    } else {
        for i in (0..tlen).rev() {
            k1 ^= (tail[i] as u64) << (i * 8);
        }
    }
    if tlen > 0 {
        k1 = k1.wrapping_mul(C1).rotate_left(31).wrapping_mul(C2);
        h1 ^= k1;
    }

    h1 ^= data.len() as u64;
    h2 ^= data.len() as u64;
    h1 = h1.wrapping_add(h2);
    h2 = h2.wrapping_add(h1);

    h1 = fmix64(h1);
    h2 = fmix64(h2);

    h1 = h1.wrapping_add(h2);
    h2 = h2.wrapping_add(h1);

    (h1, h2)
}

fn fmix64(mut k: u64) -> u64 {
    k ^= k >> 33;
    k = k.wrapping_mul(0xff51_afd7_ed55_8ccd);
    k ^= k >> 33;
    k = k.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    k ^= k >> 33;
    k
}

/// The `i`-th derived hash from a `(h1, h2)` pair, per the standard
/// Kirsch-Mitzenmacher double-hashing scheme used by Bloom/Cuckoo filters.
pub fn derived_hash(h1: u64, h2: u64, i: u64) -> u64 {
    h1.wrapping_add(i.wrapping_mul(h2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_deterministic() {
        let a = murmur3_x64_128(b"hello world", 0);
        let b = murmur3_x64_128(b"hello world", 0);
        assert_eq!(a, b);
    }

    #[test]
    fn differs_by_seed() {
        let a = murmur3_x64_128(b"hello", 0);
        let b = murmur3_x64_128(b"hello", 1);
        assert_ne!(a, b);
    }

    #[test]
    fn differs_by_input() {
        let a = murmur3_x64_128(b"hello", 0);
        let b = murmur3_x64_128(b"world", 0);
        assert_ne!(a, b);
    }

    #[test]
    fn handles_empty_and_short_tails() {
        for len in 0..20 {
            let data = vec![7u8; len];
            let _ = murmur3_x64_128(&data, 42);
        }
    }
}
