//! Top-K: a count-min-log sketch tracking the `k` most frequent items seen.
//! Each increment decays every touched counter by `decay^delta`, where delta
//! is the number of steps since that counter was last touched.

use crate::storage::hashing::murmur3_x64_128;
use bytes::Bytes;

#[derive(Debug, Clone)]
struct Counter {
    count: f64,
    last_touched: u64,
}

#[derive(Debug, Clone)]
pub struct TopK {
    k: usize,
    width: usize,
    depth: usize,
    decay: f64,
    counters: Vec<Vec<Counter>>,
    step: u64,
    items: Vec<(Bytes, f64)>,
}

impl TopK {
    pub fn new(k: usize, width: usize, depth: usize, decay: f64) -> Self {
        TopK {
            k: k.max(1),
            width: width.max(1),
            depth: depth.max(1),
            decay,
            counters: vec![
                vec![
                    Counter {
                        count: 0.0,
                        last_touched: 0
                    };
                    width.max(1)
                ];
                depth.max(1)
            ],
            step: 0,
            items: Vec::new(),
        }
    }

    fn slot(&self, row: usize, item: &[u8]) -> usize {
        let (h1, h2) = murmur3_x64_128(item, row as u64);
        (h1.wrapping_add(h2.wrapping_mul(row as u64 + 1)) as usize) % self.width
    }

    pub fn add(&mut self, item: Bytes, increment: f64) {
        self.step += 1;
        let mut estimate = f64::MAX;
        for row in 0..self.depth {
            let col = self.slot(row, &item);
            let counter = &mut self.counters[row][col];
            let delta = self.step.saturating_sub(counter.last_touched);
            counter.count *= self.decay.powi(delta as i32);
            counter.last_touched = self.step;
            counter.count += increment;
            estimate = estimate.min(counter.count);
        }

        if let Some(entry) = self.items.iter_mut().find(|(m, _)| *m == item) {
            entry.1 = estimate;
        } else if self.items.len() < self.k {
            self.items.push((item, estimate));
        } else if let Some(min_idx) = self
            .items
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
        {
            if self.items[min_idx].1 < estimate {
                self.items[min_idx] = (item, estimate);
            }
        }
        self.items.sort_by(|a, b| b.1.total_cmp(&a.1));
    }

    pub fn query(&self, item: &[u8]) -> bool {
        self.items.iter().any(|(m, _)| m.as_ref() == item)
    }

    pub fn list(&self) -> Vec<Bytes> {
        self.items.iter().map(|(m, _)| m.clone()).collect()
    }

    pub fn count(&self, item: &[u8]) -> f64 {
        (0..self.depth)
            .map(|row| {
                let col = self.slot(row, item);
                self.counters[row][col].count
            })
            .fold(f64::MAX, f64::min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequent_item_rises_to_top() {
        let mut topk = TopK::new(3, 64, 4, 0.9);
        for _ in 0..50 {
            topk.add(Bytes::from("hot"), 1.0);
        }
        for item in ["a", "b", "c", "d"] {
            topk.add(Bytes::from(item), 1.0);
        }
        assert!(topk.query(b"hot"));
    }

    #[test]
    fn bounded_to_k_items() {
        let mut topk = TopK::new(2, 64, 4, 0.9);
        for item in ["a", "b", "c", "d", "e"] {
            for _ in 0..(item.as_bytes()[0] as u32) {
                topk.add(Bytes::from(item), 1.0);
            }
        }
        assert!(topk.list().len() <= 2);
    }
}
