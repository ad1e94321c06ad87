//! Append-only file persistence: a single-writer serial task that durably
//! logs every mutating command, replayed on startup to reconstruct state.
//! Uses the same background-task shape as `ExpirySweeper` (a `tokio::spawn`'d
//! loop plus a `watch`-channel shutdown) applied to an I/O-bound writer
//! instead of a sweep.

use crate::config::{StorageConfig, SyncStrategy};
use crate::protocol::{parse_message, RespValue};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot, watch, Mutex as AsyncMutex};
use tracing::{debug, error, info, warn};

/// One encoded command record queued to the writer task.
struct AofRecord {
    bytes: Vec<u8>,
    ack: Option<oneshot::Sender<io::Result<()>>>,
}

/// Handle shared by every session; cheap to clone.
#[derive(Clone)]
pub struct AofHandle {
    tx: mpsc::Sender<AofRecord>,
    sync_strategy: SyncStrategy,
    bytes_written: Arc<AtomicU64>,
}

impl AofHandle {
    /// Appends one RESP-encoded command. Under `always`, awaits the writer
    /// task's fsync before returning; the client waits for durability only
    /// under that policy. Under other policies, the write is buffered and
    /// this returns as soon as it is queued.
    pub async fn append(&self, command: &RespValue) -> io::Result<()> {
        let bytes = command.serialize();
        self.bytes_written.fetch_add(bytes.len() as u64, Ordering::Relaxed);

        if self.sync_strategy == SyncStrategy::Always {
            let (ack_tx, ack_rx) = oneshot::channel();
            self.tx
                .send(AofRecord { bytes, ack: Some(ack_tx) })
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "aof writer gone"))?;
            ack_rx
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "aof writer dropped ack"))?
        } else {
            self.tx
                .send(AofRecord { bytes, ack: None })
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "aof writer gone"))
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }
}

/// Owns the AOF file and the background fsync timer (`everysec`). Dropping
/// this stops both the writer task and the fsync timer.
pub struct AofWriter {
    shutdown_tx: watch::Sender<bool>,
}

impl AofWriter {
    /// Opens (creating if absent) the AOF file at `dir/file_name` and spawns
    /// the writer task plus, for `everysec`, the periodic fsync task.
    pub async fn start(storage: &StorageConfig) -> io::Result<(Self, AofHandle)> {
        tokio::fs::create_dir_all(&storage.path).await?;
        let path = Path::new(&storage.path).join(&storage.file_name);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        let (tx, rx) = mpsc::channel(1024);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let sync_strategy = storage.sync_strategy;

        tokio::spawn(writer_loop(file, rx, sync_strategy, shutdown_rx.clone()));

        if sync_strategy == SyncStrategy::Everysec {
            let path = path.clone();
            tokio::spawn(fsync_timer(path, shutdown_rx));
        }

        info!(path = %path.display(), strategy = ?sync_strategy, "aof writer started");

        Ok((
            AofWriter { shutdown_tx },
            AofHandle {
                tx,
                sync_strategy,
                bytes_written: Arc::new(AtomicU64::new(0)),
            },
        ))
    }

    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for AofWriter {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn writer_loop(
    mut file: tokio::fs::File,
    mut rx: mpsc::Receiver<AofRecord>,
    sync_strategy: SyncStrategy,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            record = rx.recv() => {
                let Some(record) = record else { return };
                let result = write_record(&mut file, &record.bytes, sync_strategy).await;
                if let Err(ref e) = result {
                    error!(error = %e, "aof write failed");
                }
                if let Some(ack) = record.ack {
                    let _ = ack.send(result);
                }
            }
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("aof writer received shutdown signal");
                    return;
                }
            }
        }
    }
}

async fn write_record(file: &mut tokio::fs::File, bytes: &[u8], sync_strategy: SyncStrategy) -> io::Result<()> {
    file.write_all(bytes).await?;
    if sync_strategy == SyncStrategy::Always {
        file.sync_data().await?;
    }
    Ok(())
}

async fn fsync_timer(path: PathBuf, mut shutdown_rx: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Ok(file) = tokio::fs::OpenOptions::new().append(true).open(&path).await {
                    if let Err(e) = file.sync_data().await {
                        warn!(error = %e, "periodic aof fsync failed");
                    }
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

/// One decoded AOF record plus whether the stream ended cleanly at this
/// point (used to report how much of a corrupt tail was recovered).
pub struct ReplayOutcome {
    pub commands: Vec<RespValue>,
    pub recovered_bytes: usize,
    pub total_bytes: usize,
    pub truncated: bool,
}

/// Reads every complete RESP command from the AOF file, stopping at the
/// first unparseable byte (a truncated write from a crash mid-append) and
/// reporting the longest consistent prefix rather than failing the whole
/// replay.
pub fn replay_file(storage: &StorageConfig) -> io::Result<ReplayOutcome> {
    let path = Path::new(&storage.path).join(&storage.file_name);
    if !path.exists() {
        return Ok(ReplayOutcome { commands: Vec::new(), recovered_bytes: 0, total_bytes: 0, truncated: false });
    }

    let mut buf = Vec::new();
    std::fs::File::open(&path)?.read_to_end(&mut buf)?;
    let total_bytes = buf.len();

    let mut commands = Vec::new();
    let mut offset = 0;
    let mut truncated = false;

    loop {
        match parse_message(&buf[offset..]) {
            Ok(Some((value, consumed))) => {
                commands.push(value);
                offset += consumed;
            }
            Ok(None) => {
                truncated = offset < total_bytes;
                break;
            }
            Err(e) => {
                warn!(error = %e, offset, "aof replay stopped at corrupt tail record");
                truncated = true;
                break;
            }
        }
    }

    if truncated {
        warn!(recovered = offset, total = total_bytes, "aof tail was incomplete, loaded longest consistent prefix");
    }

    Ok(ReplayOutcome { commands, recovered_bytes: offset, total_bytes, truncated })
}

/// Atomically rewrites the AOF to a minimal command sequence reconstructing
/// `snapshot` (pairs of encoded commands, one per live key). Callers build
/// `snapshot` from the live keyspace (see `server::maybe_rewrite_aof`);
/// writes to a temp file then renames over the original so a crash
/// mid-rewrite never leaves a half-written AOF.
pub async fn rewrite(storage: &StorageConfig, snapshot: Vec<Vec<u8>>) -> io::Result<()> {
    let path = Path::new(&storage.path).join(&storage.file_name);
    let tmp_path = path.with_extension("rewrite.tmp");

    {
        let mut tmp = std::fs::File::create(&tmp_path)?;
        for record in &snapshot {
            tmp.write_all(record)?;
        }
        tmp.sync_all()?;
    }
    std::fs::rename(&tmp_path, &path)?;
    info!(records = snapshot.len(), "aof rewrite completed");
    Ok(())
}

pub type SharedAofWriter = Arc<AsyncMutex<Option<AofWriter>>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use bytes::Bytes;

    fn test_storage_config(dir: &Path) -> StorageConfig {
        StorageConfig {
            storage_type: "aof".to_string(),
            path: dir.to_string_lossy().to_string(),
            file_name: "test.aof".to_string(),
            sync_strategy: SyncStrategy::Always,
            compression: false,
            max_file_size: 64 * 1024 * 1024,
        }
    }

    #[tokio::test]
    async fn append_then_replay_roundtrips_command() {
        let dir = tempdir();
        let storage = test_storage_config(dir.path());
        let (writer, handle) = AofWriter::start(&storage).await.unwrap();

        let cmd = RespValue::Array(vec![
            RespValue::BulkString(Bytes::from("SET")),
            RespValue::BulkString(Bytes::from("k")),
            RespValue::BulkString(Bytes::from("v")),
        ]);
        handle.append(&cmd).await.unwrap();
        drop(writer);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let outcome = replay_file(&storage).unwrap();
        assert_eq!(outcome.commands.len(), 1);
        assert!(!outcome.truncated);
    }

    #[test]
    fn replay_missing_file_returns_empty() {
        let dir = tempdir();
        let storage = test_storage_config(dir.path());
        let outcome = replay_file(&storage).unwrap();
        assert!(outcome.commands.is_empty());
        assert!(!outcome.truncated);
    }

    #[test]
    fn replay_detects_truncated_tail() {
        let dir = tempdir();
        let storage = test_storage_config(dir.path());
        std::fs::create_dir_all(&storage.path).unwrap();
        let path = Path::new(&storage.path).join(&storage.file_name);
        std::fs::write(&path, b"*2\r\n$3\r\nGET\r\n$1\r\nk").unwrap();

        let outcome = replay_file(&storage).unwrap();
        assert!(outcome.commands.is_empty());
        assert!(outcome.truncated);
    }

    struct TempDir(PathBuf);
    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }
    impl TempDir {
        fn path(&self) -> &Path {
            &self.0
        }
    }

    fn tempdir() -> TempDir {
        let mut dir = std::env::temp_dir();
        dir.push(format!("crystalcache-aof-test-{}", std::process::id()));
        dir.push(format!("{:p}", &dir as *const _));
        TempDir(dir)
    }
}
