//! Per-connection session state: one `ClientSession` per accepted
//! connection, plus the process-wide `ClientRegistry` that turns a plain
//! atomic-counter stats struct into something `CLIENT LIST`/`CLIENT KILL`
//! can enumerate.

use bytes::Bytes;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::protocol::RespValue;

/// A transaction's queued command buffer and dirty flag: tracks whether a
/// `MULTI` block is open and whether a queued command has already failed.
#[derive(Debug, Default)]
pub struct TxnState {
    pub active: bool,
    pub dirty: bool,
    pub queued: Vec<RespValue>,
    /// (key, version-at-watch-time) fingerprints recorded by `WATCH`.
    pub watched: Vec<(Bytes, u64)>,
}

impl TxnState {
    pub fn reset(&mut self) {
        self.active = false;
        self.dirty = false;
        self.queued.clear();
        self.watched.clear();
    }
}

/// Per-connection state, owned by the connection's task — never shared
/// across tasks, unlike `ClientRegistry`.
pub struct ClientSession {
    pub id: u64,
    pub addr: SocketAddr,
    pub created_at: Instant,
    pub last_command_at: Instant,
    pub db_index: usize,
    pub name: Option<String>,
    pub txn: TxnState,
    /// Set once the session issues `REPLCONF`/becomes a replica link; the
    /// dispatcher suppresses normal replies on this connection in that mode.
    pub is_replica_link: bool,
}

impl ClientSession {
    pub fn new(id: u64, addr: SocketAddr) -> Self {
        let now = Instant::now();
        ClientSession {
            id,
            addr,
            created_at: now,
            last_command_at: now,
            db_index: 0,
            name: None,
            txn: TxnState::default(),
            is_replica_link: false,
        }
    }

    pub fn touch(&mut self) {
        self.last_command_at = Instant::now();
    }
}

/// A snapshot of a client's state as reported by `CLIENT LIST`/`CLIENT INFO`.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub id: u64,
    pub addr: SocketAddr,
    pub name: Option<String>,
    pub db_index: usize,
    pub age_secs: u64,
    pub idle_secs: u64,
}

struct RegisteredClient {
    addr: SocketAddr,
    name: Mutex<Option<String>>,
    db_index: AtomicU64,
    created_at: Instant,
    last_command_at: Mutex<Instant>,
    kill_requested: AtomicBool,
}

/// Process-wide table of connected clients: per-client metadata needed by
/// `CLIENT LIST`/`CLIENT KILL`/`CLIENT INFO`/`CLIENT SETNAME`.
#[derive(Default)]
pub struct ClientRegistry {
    next_id: AtomicU64,
    clients: Mutex<HashMap<u64, RegisteredClient>>,
    pub connections_accepted: AtomicU64,
    pub commands_processed: AtomicU64,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, addr: SocketAddr) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.clients.lock().unwrap().insert(
            id,
            RegisteredClient {
                addr,
                name: Mutex::new(None),
                db_index: AtomicU64::new(0),
                created_at: Instant::now(),
                last_command_at: Mutex::new(Instant::now()),
                kill_requested: AtomicBool::new(false),
            },
        );
        id
    }

    pub fn unregister(&self, id: u64) {
        self.clients.lock().unwrap().remove(&id);
    }

    pub fn touch(&self, id: u64, db_index: usize) {
        if let Some(c) = self.clients.lock().unwrap().get(&id) {
            *c.last_command_at.lock().unwrap() = Instant::now();
            c.db_index.store(db_index as u64, Ordering::Relaxed);
            self.commands_processed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn set_name(&self, id: u64, name: String) {
        if let Some(c) = self.clients.lock().unwrap().get(&id) {
            *c.name.lock().unwrap() = Some(name);
        }
    }

    pub fn should_kill(&self, id: u64) -> bool {
        self.clients
            .lock()
            .unwrap()
            .get(&id)
            .map(|c| c.kill_requested.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    /// Returns how many matching clients were marked for disconnection.
    pub fn kill_matching(&self, target_id: Option<u64>, target_addr: Option<SocketAddr>) -> usize {
        let mut killed = 0;
        for (id, c) in self.clients.lock().unwrap().iter() {
            let id_match = target_id.map(|t| t == *id).unwrap_or(true);
            let addr_match = target_addr.map(|t| t == c.addr).unwrap_or(true);
            if id_match && addr_match {
                c.kill_requested.store(true, Ordering::Relaxed);
                killed += 1;
            }
        }
        killed
    }

    pub fn list(&self) -> Vec<ClientInfo> {
        let now = Instant::now();
        self.clients
            .lock()
            .unwrap()
            .iter()
            .map(|(id, c)| ClientInfo {
                id: *id,
                addr: c.addr,
                name: c.name.lock().unwrap().clone(),
                db_index: c.db_index.load(Ordering::Relaxed) as usize,
                age_secs: now.duration_since(c.created_at).as_secs(),
                idle_secs: now.duration_since(*c.last_command_at.lock().unwrap()).as_secs(),
            })
            .collect()
    }

    pub fn connected_count(&self) -> usize {
        self.clients.lock().unwrap().len()
    }
}

pub type SharedClientRegistry = Arc<ClientRegistry>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_list_reports_client() {
        let registry = ClientRegistry::new();
        let addr: SocketAddr = "127.0.0.1:1234".parse().unwrap();
        let id = registry.register(addr);
        let list = registry.list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, id);
    }

    #[test]
    fn kill_matching_by_id_marks_client() {
        let registry = ClientRegistry::new();
        let addr: SocketAddr = "127.0.0.1:1234".parse().unwrap();
        let id = registry.register(addr);
        assert_eq!(registry.kill_matching(Some(id), None), 1);
        assert!(registry.should_kill(id));
    }

    #[test]
    fn unregister_removes_client() {
        let registry = ClientRegistry::new();
        let addr: SocketAddr = "127.0.0.1:1234".parse().unwrap();
        let id = registry.register(addr);
        registry.unregister(id);
        assert_eq!(registry.connected_count(), 0);
    }
}
