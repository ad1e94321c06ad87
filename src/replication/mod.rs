//! Replication manager: a server is either `Master` or `Replica`.
//! `REPLICAOF host port` promotes to replica (full resync, then streamed
//! commands); `REPLICAOF NO ONE` restores master role. Master-side
//! propagation uses one bounded outbound buffer per replica — overflow
//! drops that replica rather than blocking the writer, the same posture
//! `storage/expiry.rs`'s watch-channel shutdown idiom takes for its own
//! signaling, generalized here to a per-replica send buffer.

use crate::protocol::RespValue;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tracing::{info, warn};

const REPLICA_BUFFER_CAPACITY: usize = 4096;

#[derive(Debug, Clone, PartialEq)]
pub enum Role {
    Master,
    Replica { master_host: String, master_port: u16 },
}

struct ReplicaLink {
    tx: mpsc::Sender<RespValue>,
}

/// Process-wide replication state: current role plus the set of connected
/// replicas' outbound buffers.
pub struct ReplicationManager {
    role: RwLock<Role>,
    replicas: RwLock<HashMap<u64, ReplicaLink>>,
    next_replica_id: AtomicU64,
}

impl ReplicationManager {
    pub fn new() -> Self {
        ReplicationManager {
            role: RwLock::new(Role::Master),
            replicas: RwLock::new(HashMap::new()),
            next_replica_id: AtomicU64::new(1),
        }
    }

    pub fn role(&self) -> Role {
        self.role.read().unwrap().clone()
    }

    pub fn is_replica(&self) -> bool {
        matches!(*self.role.read().unwrap(), Role::Replica { .. })
    }

    pub fn set_role(&self, role: Role) {
        info!(?role, "replication role changed");
        *self.role.write().unwrap() = role;
    }

    pub fn promote_to_replica(&self, host: String, port: u16) {
        self.set_role(Role::Replica { master_host: host, master_port: port });
    }

    pub fn promote_to_master(&self) {
        self.set_role(Role::Master);
        self.replicas.write().unwrap().clear();
    }

    /// Registers a newly connected replica and returns its id plus the
    /// receiving half of its outbound buffer.
    pub fn register_replica(&self) -> (u64, mpsc::Receiver<RespValue>) {
        let id = self.next_replica_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(REPLICA_BUFFER_CAPACITY);
        self.replicas.write().unwrap().insert(id, ReplicaLink { tx });
        (id, rx)
    }

    pub fn unregister_replica(&self, id: u64) {
        self.replicas.write().unwrap().remove(&id);
    }

    pub fn replica_count(&self) -> usize {
        self.replicas.read().unwrap().len()
    }

    /// Enqueues a successfully applied mutating command on every connected
    /// replica's buffer. A full buffer (a replica that fell behind) is
    /// dropped rather than blocking the writer — it must resync.
    pub fn propagate(&self, command: &RespValue) {
        if matches!(*self.role.read().unwrap(), Role::Replica { .. }) {
            return;
        }
        let mut dead = Vec::new();
        {
            let replicas = self.replicas.read().unwrap();
            for (id, link) in replicas.iter() {
                if link.tx.try_send(command.clone()).is_err() {
                    dead.push(*id);
                }
            }
        }
        if !dead.is_empty() {
            let mut replicas = self.replicas.write().unwrap();
            for id in dead {
                warn!(replica = id, "replica outbound buffer full, dropping replica");
                replicas.remove(&id);
            }
        }
    }
}

impl Default for ReplicationManager {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedReplicationManager = Arc<ReplicationManager>;

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn ping() -> RespValue {
        RespValue::Array(vec![RespValue::BulkString(Bytes::from("PING"))])
    }

    #[test]
    fn master_propagates_to_registered_replicas() {
        let mgr = ReplicationManager::new();
        let (id, mut rx) = mgr.register_replica();
        mgr.propagate(&ping());
        assert!(rx.try_recv().is_ok());
        mgr.unregister_replica(id);
        assert_eq!(mgr.replica_count(), 0);
    }

    #[test]
    fn replica_role_does_not_propagate() {
        let mgr = ReplicationManager::new();
        mgr.promote_to_replica("127.0.0.1".to_string(), 6380);
        let (_, mut rx) = mgr.register_replica();
        mgr.propagate(&ping());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn promote_to_master_clears_replicas() {
        let mgr = ReplicationManager::new();
        mgr.register_replica();
        mgr.promote_to_replica("h".to_string(), 1);
        mgr.promote_to_master();
        assert_eq!(mgr.replica_count(), 0);
        assert_eq!(mgr.role(), Role::Master);
    }

    #[test]
    fn full_replica_buffer_gets_dropped() {
        let mgr = ReplicationManager::new();
        let (id, _rx) = mgr.register_replica();
        for _ in 0..REPLICA_BUFFER_CAPACITY + 1 {
            mgr.propagate(&ping());
        }
        assert!(mgr.replicas.read().unwrap().get(&id).is_none());
    }
}
