//! Probabilistic sketches: Bloom/Cuckoo filters, Count-Min Sketch, Top-K,
//! HyperLogLog, and t-digest — each a `Kind` variant in its own right.

pub mod bloom;
pub mod cms;
mod commands;
pub mod cuckoo;
pub mod hll;
pub mod tdigest;
pub mod topk;

pub use bloom::BloomFilter;
pub use cms::CountMinSketch;
pub use cuckoo::CuckooFilter;
pub use hll::HyperLogLog;
pub use tdigest::TDigest;
pub use topk::TopK;
