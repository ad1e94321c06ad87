//! Connection management: each accepted TCP connection is handled by its
//! own async task, letting the server serve many concurrent clients without
//! blocking on any one of them.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TCP Listener (server.rs)                │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │ accept()
//!                        ▼
//!           ┌────────────────────────┐
//!           │   For each client...   │
//!           └────────────┬───────────┘
//!                        │ spawn task
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │  Read bytes ──▶ Parse RESP ──▶ Dispatcher::execute ──▶ Send  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Async I/O**: Tokio-based, non-blocking
//! - **Buffer management**: a `BytesMut` buffer absorbs partial/pipelined reads
//! - **Per-client session state**: `ClientSession`, registered in `ClientRegistry`
//!
//! ## Example
//!
//! ```ignore
//! use crystalcache::connection::{handle_connection, ConnectionStats};
//! use crystalcache::commands::{Dispatcher, Shared};
//! use std::sync::Arc;
//!
//! let shared = Arc::new(shared);
//! let dispatcher = Dispatcher::new(shared);
//! let stats = Arc::new(ConnectionStats::new());
//!
//! // For each accepted connection...
//! let (stream, addr) = listener.accept().await?;
//! tokio::spawn(handle_connection(stream, addr, dispatcher.clone(), stats));
//! ```

pub mod handler;

pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
