//! # CrystalCache — an in-memory, RESP-compatible multi-model data store
//!
//! CrystalCache speaks the RESP2 wire protocol and layers several data
//! models (strings, lists, hashes, sets, sorted sets, streams, bitmaps,
//! JSON documents, probabilistic sketches, geospatial indexes, and time
//! series) over one sharded, concurrent keyspace.
//!
//! ## Features
//!
//! - **RESP2-compatible**: speaks the same wire protocol as Redis clients
//! - **Multi-model**: one keyspace, many value kinds, each with its own command family
//! - **Sharded storage**: independent `RwLock`-guarded shards for concurrent access
//! - **TTL support**: lazy and active expiry
//! - **Transactions**: `MULTI`/`EXEC`/`DISCARD`/`WATCH`
//! - **Persistence**: append-only file with configurable fsync policy
//! - **Replication**: single master, many replicas, command propagation
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │                             CrystalCache                              │
//! │                                                                       │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                │
//! │  │ TCP Server  │───>│ Connection  │───>│  Dispatcher │                │
//! │  │ (server.rs) │    │  Handler    │    │  (commands) │                │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘                │
//! │                                               │                       │
//! │                         ┌─────────────────────┼───────────────┐       │
//! │                         ▼                     ▼               ▼       │
//! │                  ┌─────────────┐      ┌─────────────┐  ┌───────────┐  │
//! │                  │KeyspaceEngine│     │  AOF writer │  │Replication│  │
//! │                  │ (sharded map) │    │             │  │  manager  │  │
//! │                  └──────┬──────┘      └─────────────┘  └───────────┘  │
//! │                         │                                             │
//! │          ┌──────────────┴───────────────┐                             │
//! │          │   ExpirySweeper / DefragTask  │                             │
//! │          │      (background tasks)       │                             │
//! │          └───────────────────────────────┘                             │
//! └───────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use crystalcache::config::Config;
//! use crystalcache::commands::{Dispatcher, Shared};
//! use crystalcache::connection::{handle_connection, ConnectionStats};
//! use crystalcache::replication::ReplicationManager;
//! use crystalcache::session::ClientRegistry;
//! use crystalcache::storage::{start_expiry_sweeper, KeyspaceEngine};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::default();
//!     let engine = Arc::new(KeyspaceEngine::new(config.cache.shards));
//!     let _sweeper = start_expiry_sweeper(Arc::clone(&engine));
//!
//!     let clients = Arc::new(ClientRegistry::new());
//!     let replication = Arc::new(ReplicationManager::new());
//!     let shared = Arc::new(Shared::new(engine, config, clients, replication));
//!     let dispatcher = Dispatcher::new(shared);
//!     let stats = Arc::new(ConnectionStats::new());
//!
//!     let listener = TcpListener::bind("127.0.0.1:6379").await.unwrap();
//!     loop {
//!         let (stream, addr) = listener.accept().await.unwrap();
//!         tokio::spawn(handle_connection(stream, addr, dispatcher.clone(), Arc::clone(&stats)));
//!     }
//! }
//! ```
//!
//! ## Module overview
//!
//! - [`protocol`]: RESP2 parser and wire types
//! - [`storage`]: sharded, thread-safe multi-model keyspace
//! - [`commands`]: the command dispatcher and per-family handlers
//! - [`connection`]: per-client connection tasks
//! - [`session`]: per-connection and process-wide client state
//! - [`txn`]: `MULTI`/`WATCH` transaction support
//! - [`aof`]: append-only file persistence
//! - [`replication`]: master/replica command propagation
//! - [`config`]: YAML-backed configuration schema
//! - [`error`]: the shared error type and its RESP conversion
//! - [`server`]: the accept loop and process wiring
//!
//! ## Design highlights
//!
//! ### Sharded concurrency
//!
//! The keyspace is split across a power-of-two number of independent
//! `RwLock`-guarded shards, so unrelated keys never contend on the same lock.
//!
//! ### Lazy + active expiry
//!
//! Keys with a TTL are reaped two ways: lazily, on access, and actively, by
//! a background sweeper that periodically samples shards for expired keys.
//!
//! ### One key, one kind
//!
//! Every key maps to exactly one `Kind` at a time (string, list, hash, set,
//! sorted set, stream, bitmap, JSON document, probabilistic sketch, or time
//! series); an operation against the wrong kind returns a type error rather
//! than coercing.

pub mod aof;
pub mod commands;
pub mod config;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod replication;
pub mod server;
pub mod session;
pub mod storage;
pub mod txn;

pub use commands::{Dispatcher, Shared};
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{ParseError, RespParser, RespValue};
pub use storage::{start_expiry_sweeper, ExpiryConfig, ExpirySweeper, KeyspaceEngine};

/// The default port CrystalCache listens on (same as Redis).
pub const DEFAULT_PORT: u16 = 6379;

/// The default host CrystalCache binds to.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of CrystalCache.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
