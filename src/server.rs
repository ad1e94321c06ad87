//! Process wiring: the TCP accept loop, admission control, connection
//! timeouts, graceful shutdown, and AOF rewrite-on-threshold — everything
//! `main.rs` needs beyond constructing the shared state. The accept loop
//! follows the familiar `tokio::select!`-against-`signal::ctrl_c` shutdown
//! shape, extended with an admission cap and per-connection idle timeouts.

use crate::commands::{Dispatcher, Shared};
use crate::config::Config;
use crate::connection::{handle_connection, ConnectionStats};
use crate::protocol::RespValue;
use crate::session::ClientSession;
use crate::storage::KeyspaceEngine;
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Runs the accept loop until `shutdown_rx` fires, admitting at most
/// `max_connections` concurrent clients. Over the cap, a connection is
/// accepted then immediately sent an error and closed, matching Redis's
/// "max number of clients reached" behavior rather than refusing the TCP
/// handshake itself.
pub async fn accept_loop(
    listener: TcpListener,
    dispatcher: Dispatcher,
    stats: Arc<ConnectionStats>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let max_connections = dispatcher.shared.config.server.max_connections;
    let active = Arc::new(AtomicUsize::new(0));

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        if active.load(Ordering::Relaxed) >= max_connections {
                            warn!(client = %addr, max = max_connections, "rejecting connection, max clients reached");
                            tokio::spawn(reject_over_capacity(stream));
                            continue;
                        }

                        active.fetch_add(1, Ordering::Relaxed);
                        let dispatcher = dispatcher.clone();
                        let stats = Arc::clone(&stats);
                        let active = Arc::clone(&active);
                        let timeouts = dispatcher.shared.config.server.timeouts.clone();

                        tokio::spawn(async move {
                            run_with_timeouts(stream, addr, dispatcher, stats, timeouts).await;
                            active.fetch_sub(1, Ordering::Relaxed);
                        });
                    }
                    Err(e) => error!("failed to accept connection: {}", e),
                }
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!("accept loop received shutdown signal");
                    return;
                }
            }
        }
    }
}

async fn reject_over_capacity(mut stream: tokio::net::TcpStream) {
    use tokio::io::AsyncWriteExt;
    let _ = stream
        .write_all(b"-ERR max number of clients reached\r\n")
        .await;
}

/// Wraps `handle_connection` with the configured idle timeout: if the
/// client sends nothing for `idle_secs`, the connection is dropped. Read
/// and write timeouts on the socket itself are left to the kernel/client;
/// `idle_secs` is the one bound that matters for the dispatcher's long-poll
/// blocking commands, which would otherwise hold a connection open
/// indefinitely.
async fn run_with_timeouts(
    stream: tokio::net::TcpStream,
    addr: std::net::SocketAddr,
    dispatcher: Dispatcher,
    stats: Arc<ConnectionStats>,
    timeouts: crate::config::TimeoutsConfig,
) {
    let work = handle_connection(stream, addr, dispatcher, stats);
    if timeouts.idle_secs > 0 {
        let deadline = Duration::from_secs(timeouts.idle_secs);
        if tokio::time::timeout(deadline, work).await.is_err() {
            warn!(client = %addr, "connection idle timeout elapsed, closing");
        }
    } else {
        work.await;
    }
}

/// Replays the AOF (if present) through the dispatcher in loading mode, so
/// every recorded command rebuilds the keyspace without re-appending to the
/// AOF or re-propagating to replicas.
pub async fn replay_aof(dispatcher: &Dispatcher, config: &Config) {
    if config.storage.storage_type != "aof" {
        return;
    }
    let outcome = match crate::aof::replay_file(&config.storage) {
        Ok(o) => o,
        Err(e) => {
            error!(error = %e, "failed to read aof file for replay");
            return;
        }
    };

    if outcome.truncated {
        warn!(
            recovered_bytes = outcome.recovered_bytes,
            total_bytes = outcome.total_bytes,
            "aof replay recovered a truncated tail"
        );
    }

    let replaying = Dispatcher::loading_mode(Arc::clone(&dispatcher.shared));
    let mut fake_session = ClientSession::new(0, "0.0.0.0:0".parse().unwrap());
    let mut replayed = 0usize;
    for command in outcome.commands {
        replaying.execute(&mut fake_session, command).await;
        replayed += 1;
    }
    info!(commands = replayed, "aof replay complete");
}

/// Spawns the AOF writer (if enabled) and wires its handle into `shared`.
pub async fn start_aof(shared: &Arc<Shared>) -> Option<crate::aof::AofWriter> {
    if shared.config.storage.storage_type != "aof" {
        return None;
    }
    match crate::aof::AofWriter::start(&shared.config.storage).await {
        Ok((writer, handle)) => {
            shared.set_aof(handle);
            Some(writer)
        }
        Err(e) => {
            error!(error = %e, "failed to start aof writer, persistence disabled");
            None
        }
    }
}

/// Periodically checks the AOF's size against `max_file_size` and rewrites
/// it to a minimal command sequence when it's exceeded, per the
/// size-triggered rewrite described for the storage layer. Runs until
/// `shutdown_rx` fires.
pub async fn run_aof_rewrite_watcher(
    engine: Arc<KeyspaceEngine>,
    config: Config,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    if config.storage.storage_type != "aof" {
        return;
    }
    let mut interval = tokio::time::interval(Duration::from_secs(30));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = maybe_rewrite_aof(&engine, &config).await {
                    error!(error = %e, "aof rewrite failed");
                }
            }
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    return;
                }
            }
        }
    }
}

async fn maybe_rewrite_aof(engine: &KeyspaceEngine, config: &Config) -> std::io::Result<()> {
    let path = std::path::Path::new(&config.storage.path).join(&config.storage.file_name);
    let current_size = match tokio::fs::metadata(&path).await {
        Ok(meta) => meta.len(),
        Err(_) => return Ok(()),
    };
    if current_size < config.storage.max_file_size {
        return Ok(());
    }

    let snapshot = build_aof_snapshot(engine);
    crate::aof::rewrite(&config.storage, snapshot).await
}

/// Walks the live keyspace and re-encodes each key as the command(s) that
/// would recreate it, so a rewritten AOF is a minimal replay of current
/// state rather than the full write history. Probabilistic sketches,
/// streams, and time series have no single recreating command in this
/// implementation and are skipped with a warning rather than silently
/// dropped without a trace — the next append keeps their keys alive in the
/// new file once they're next mutated.
fn build_aof_snapshot(engine: &KeyspaceEngine) -> Vec<Vec<u8>> {
    use crate::storage::Kind;

    let mut out = Vec::new();
    for key in engine.keys_matching("*") {
        let rebuilt = engine.with_read(&key, |kind| -> Option<Vec<Bytes>> {
            match kind {
                Kind::Str(v) => Some(vec![Bytes::from_static(b"SET"), key.clone(), v.clone()]),
                Kind::List(items) => {
                    if items.is_empty() {
                        return None;
                    }
                    let mut parts = vec![Bytes::from_static(b"RPUSH"), key.clone()];
                    parts.extend(items.iter().cloned());
                    Some(parts)
                }
                Kind::Hash(map) => {
                    if map.is_empty() {
                        return None;
                    }
                    let mut parts = vec![Bytes::from_static(b"HSET"), key.clone()];
                    for (field, value) in map.iter() {
                        parts.push(field.clone());
                        parts.push(value.clone());
                    }
                    Some(parts)
                }
                Kind::Set(members) => {
                    if members.is_empty() {
                        return None;
                    }
                    let mut parts = vec![Bytes::from_static(b"SADD"), key.clone()];
                    parts.extend(members.iter().cloned());
                    Some(parts)
                }
                Kind::ZSet(zset) => {
                    if zset.is_empty() {
                        return None;
                    }
                    let mut parts = vec![Bytes::from_static(b"ZADD"), key.clone()];
                    for (member, score) in zset.iter_ascending() {
                        parts.push(Bytes::from(score.to_string()));
                        parts.push(member.clone());
                    }
                    Some(parts)
                }
                Kind::Json(json) => Some(vec![
                    Bytes::from_static(b"JSON.SET"),
                    key.clone(),
                    Bytes::from_static(b"$"),
                    Bytes::from(json.to_json_string()),
                ]),
                Kind::Bitmap(_) | Kind::Stream(_) | Kind::Bloom(_) | Kind::Cuckoo(_)
                | Kind::Cms(_) | Kind::TopK(_) | Kind::Hll(_) | Kind::TDigest(_)
                | Kind::TimeSeries(_) => {
                    warn!(kind = kind.type_name(), "aof rewrite skipped unsupported kind, leaving out of compacted file");
                    None
                }
            }
        });

        if let Some(Some(parts)) = rebuilt {
            out.push(array_bytes(parts).serialize());
            if let Some(Some(ttl)) = engine.ttl_ms(&key) {
                out.push(
                    array_bytes(vec![
                        Bytes::from_static(b"PEXPIRE"),
                        key.clone(),
                        Bytes::from(ttl.to_string()),
                    ])
                    .serialize(),
                );
            }
        }
    }

    out
}

fn array_bytes(parts: Vec<Bytes>) -> RespValue {
    RespValue::Array(parts.into_iter().map(RespValue::BulkString).collect())
}
