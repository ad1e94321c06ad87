//! Storage engine: a thread-safe, sharded keyspace backing every data-model
//! kind in the system, plus the background maintenance tasks that keep it
//! tidy.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     KeyspaceEngine                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │...N     │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ shards  │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                 ┌──────────┴──────────┐
//!                 │  ExpirySweeper      │
//!                 │  DefragTask         │
//!                 │  (background tasks) │
//!                 └─────────────────────┘
//! ```
//!
//! Each shard owns exactly one `HashMap<Bytes, Entry>`, and every key maps to
//! exactly one `Kind` at a time — string, list, hash, set, sorted set
//! (including geo indexes), stream, bitmap, JSON document, probabilistic
//! sketch, or time series. Multi-key operations that must appear atomic
//! (`MSET`, `SINTERSTORE`, `ZUNIONSTORE`, `LMOVE`, ...) lock every shard they
//! touch via [`engine::KeyspaceEngine::lock_many`].
//!
//! ## Features
//!
//! - **Sharded storage**: independent shards reduce lock contention
//! - **TTL support**: keys can have time-to-live expiry
//! - **Lazy expiry**: expired keys are cleaned on access
//! - **Active expiry**: a background sweeper cleans orphaned expired keys
//! - **Defrag**: a background task shrinks underfull shard maps
//!
//! ## Example
//!
//! ```
//! use crystalcache::storage::KeyspaceEngine;
//! use bytes::Bytes;
//!
//! let engine = KeyspaceEngine::new(16);
//! engine.str_set(&Bytes::from("name"), Bytes::from("Ariz"), Default::default()).unwrap();
//! assert_eq!(engine.str_get(&Bytes::from("name")).unwrap(), Some(Bytes::from("Ariz")));
//! ```

pub mod bitmap;
pub mod engine;
pub mod entry;
pub mod expiry;
pub mod geo;
pub mod hash;
pub mod hashing;
pub mod json;
pub mod list;
pub mod prob;
pub mod set;
pub mod stream;
pub mod string;
pub mod timeseries;
pub mod zset;

pub use engine::{glob_match, EngineStats, KeyspaceEngine, MultiShardGuard};
pub use entry::{Entry, Kind};
pub use expiry::{start_expiry_sweeper, DefragSchedule, DefragTask, ExpiryConfig, ExpirySweeper};
