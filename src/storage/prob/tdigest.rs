//! t-digest: a Dunning-compressed list of centroids supporting streaming
//! quantile estimation. `QUANTILE` linearly interpolates between
//! the centroids straddling the target rank.

#[derive(Debug, Clone, Copy)]
struct Centroid {
    mean: f64,
    weight: f64,
}

#[derive(Debug, Clone)]
pub struct TDigest {
    centroids: Vec<Centroid>,
    compression: f64,
    total_weight: f64,
    min: f64,
    max: f64,
}

impl TDigest {
    pub fn new(compression: f64) -> Self {
        TDigest {
            centroids: Vec::new(),
            compression: compression.max(1.0),
            total_weight: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    pub fn count(&self) -> f64 {
        self.total_weight
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn add(&mut self, value: f64, weight: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.total_weight += weight;
        self.centroids.push(Centroid {
            mean: value,
            weight,
        });
        // Recompress whenever the centroid count outgrows a budget
        // proportional to the compression factor, bounding memory while
        // keeping quantile accuracy high near the tails.
        if self.centroids.len() as f64 > self.compression * 20.0 {
            self.compress();
        }
    }

    fn compress(&mut self) {
        self.centroids
            .sort_by(|a, b| a.mean.total_cmp(&b.mean));
        let mut merged: Vec<Centroid> = Vec::new();
        let total = self.total_weight.max(1.0);
        let mut cumulative = 0.0;
        for c in self.centroids.drain(..) {
            if let Some(last) = merged.last_mut() {
                let q = (cumulative + last.weight / 2.0) / total;
                let max_weight = 4.0 * total * q * (1.0 - q) / self.compression;
                if last.weight + c.weight <= max_weight.max(1.0) {
                    let new_weight = last.weight + c.weight;
                    last.mean = (last.mean * last.weight + c.mean * c.weight) / new_weight;
                    last.weight = new_weight;
                    cumulative += c.weight;
                    continue;
                }
            }
            cumulative += c.weight;
            merged.push(c);
        }
        self.centroids = merged;
    }

    /// Estimates the value at quantile `q` (0.0..=1.0) by interpolating
    /// between the two centroids straddling the target cumulative weight.
    pub fn quantile(&mut self, q: f64) -> Option<f64> {
        if self.centroids.is_empty() {
            return None;
        }
        self.compress();
        let q = q.clamp(0.0, 1.0);
        let target = q * self.total_weight;

        let mut cumulative = 0.0;
        for (i, c) in self.centroids.iter().enumerate() {
            let next_cumulative = cumulative + c.weight;
            if target <= next_cumulative || i == self.centroids.len() - 1 {
                if i == 0 {
                    return Some(c.mean);
                }
                let prev = self.centroids[i - 1];
                let span = next_cumulative - cumulative;
                if span <= 0.0 {
                    return Some(c.mean);
                }
                let frac = (target - cumulative) / span;
                return Some(prev.mean + frac * (c.mean - prev.mean));
            }
            cumulative = next_cumulative;
        }
        self.centroids.last().map(|c| c.mean)
    }

    pub fn merge(&mut self, other: &TDigest) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.total_weight += other.total_weight;
        self.centroids.extend_from_slice(&other.centroids);
        self.compress();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantile_of_uniform_data_is_approximately_linear() {
        let mut td = TDigest::new(100.0);
        for i in 0..=1000 {
            td.add(i as f64, 1.0);
        }
        let median = td.quantile(0.5).unwrap();
        assert!((median - 500.0).abs() < 30.0, "median estimate {}", median);
    }

    #[test]
    fn min_and_max_are_exact() {
        let mut td = TDigest::new(100.0);
        for v in [5.0, 1.0, 9.0, 3.0] {
            td.add(v, 1.0);
        }
        assert_eq!(td.min(), 1.0);
        assert_eq!(td.max(), 9.0);
    }

    #[test]
    fn merge_combines_counts() {
        let mut a = TDigest::new(100.0);
        let mut b = TDigest::new(100.0);
        for i in 0..100 {
            a.add(i as f64, 1.0);
        }
        for i in 100..200 {
            b.add(i as f64, 1.0);
        }
        a.merge(&b);
        assert_eq!(a.count(), 200.0);
    }
}
