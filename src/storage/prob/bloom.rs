//! Bloom filter: a bit array plus `k` derived hash seeds, sized from the
//! caller's target false-positive rate and expected capacity.

use crate::storage::hashing::{derived_hash, murmur3_x64_128};

#[derive(Debug, Clone)]
pub struct BloomFilter {
    bits: Vec<u64>,
    num_bits: u64,
    num_hashes: u32,
    capacity: u64,
    inserted: u64,
}

impl BloomFilter {
    /// `error_rate` is the target false-positive probability (e.g. `0.01`),
    /// `capacity` the expected number of inserted elements.
    pub fn new(capacity: u64, error_rate: f64) -> Self {
        let capacity = capacity.max(1);
        let m = optimal_bits(capacity, error_rate);
        let k = optimal_hashes(m, capacity);
        BloomFilter {
            bits: vec![0u64; ((m + 63) / 64) as usize],
            num_bits: m,
            num_hashes: k,
            capacity,
            inserted: 0,
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }

    pub fn inserted(&self) -> u64 {
        self.inserted
    }

    /// Returns `true` if the item was not already present (best-effort —
    /// Bloom filters never report false negatives but may already have set
    /// all of an item's bits via a collision).
    pub fn add(&mut self, item: &[u8]) -> bool {
        let (h1, h2) = murmur3_x64_128(item, 0);
        let mut newly_set = false;
        for i in 0..self.num_hashes as u64 {
            let bit = derived_hash(h1, h2, i) % self.num_bits;
            if self.set_bit(bit) {
                newly_set = true;
            }
        }
        self.inserted += 1;
        newly_set
    }

    pub fn contains(&self, item: &[u8]) -> bool {
        let (h1, h2) = murmur3_x64_128(item, 0);
        (0..self.num_hashes as u64).all(|i| {
            let bit = derived_hash(h1, h2, i) % self.num_bits;
            self.get_bit(bit)
        })
    }

    fn set_bit(&mut self, bit: u64) -> bool {
        let word = (bit / 64) as usize;
        let mask = 1u64 << (bit % 64);
        let was_set = self.bits[word] & mask != 0;
        self.bits[word] |= mask;
        !was_set
    }

    fn get_bit(&self, bit: u64) -> bool {
        let word = (bit / 64) as usize;
        let mask = 1u64 << (bit % 64);
        self.bits[word] & mask != 0
    }

    /// Merges another filter of identical dimensions in place (bitwise OR).
    pub fn merge(&mut self, other: &BloomFilter) -> Result<(), String> {
        if self.num_bits != other.num_bits || self.num_hashes != other.num_hashes {
            return Err("BF.MERGE requires filters with matching dimensions".to_string());
        }
        for (a, b) in self.bits.iter_mut().zip(other.bits.iter()) {
            *a |= b;
        }
        Ok(())
    }
}

fn optimal_bits(capacity: u64, error_rate: f64) -> u64 {
    let n = capacity as f64;
    let m = -(n * error_rate.ln()) / (std::f64::consts::LN_2.powi(2));
    (m.ceil() as u64).max(8)
}

fn optimal_hashes(num_bits: u64, capacity: u64) -> u32 {
    let k = (num_bits as f64 / capacity as f64) * std::f64::consts::LN_2;
    (k.round() as u32).clamp(1, 32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_false_negatives() {
        let mut bf = BloomFilter::new(1000, 0.01);
        let items: Vec<String> = (0..1000).map(|i| format!("item-{}", i)).collect();
        for item in &items {
            bf.add(item.as_bytes());
        }
        for item in &items {
            assert!(bf.contains(item.as_bytes()), "false negative for {}", item);
        }
    }

    #[test]
    fn false_positive_rate_within_reason() {
        let mut bf = BloomFilter::new(1000, 0.01);
        for i in 0..1000 {
            bf.add(format!("in-{}", i).as_bytes());
        }
        let mut false_positives = 0;
        let trials = 2000;
        for i in 0..trials {
            if bf.contains(format!("out-{}", i).as_bytes()) {
                false_positives += 1;
            }
        }
        let rate = false_positives as f64 / trials as f64;
        assert!(rate < 0.05, "false positive rate too high: {}", rate);
    }

    #[test]
    fn merge_requires_matching_dimensions() {
        let mut a = BloomFilter::new(100, 0.01);
        let b = BloomFilter::new(200, 0.01);
        assert!(a.merge(&b).is_err());
    }
}
