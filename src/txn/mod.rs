//! Transaction controller: `MULTI`/`EXEC`/`DISCARD`/`WATCH`/`UNWATCH`
//! layered on top of a session's `TxnState` and the keyspace's per-key
//! `version` counter (`KeyspaceEngine::version_of`): fingerprints are
//! recorded as `(key, version)` pairs and re-checked at `EXEC` with no
//! cross-shard lock needed.

use crate::session::TxnState;
use crate::storage::KeyspaceEngine;
use bytes::Bytes;

/// Records the current version of each key for later comparison at `EXEC`.
/// Keys are deduplicated against any already-watched key.
pub fn watch(txn: &mut TxnState, engine: &KeyspaceEngine, keys: &[Bytes]) {
    for key in keys {
        if txn.watched.iter().any(|(k, _)| k == key) {
            continue;
        }
        txn.watched.push((key.clone(), engine.version_of(key)));
    }
}

pub fn unwatch(txn: &mut TxnState) {
    txn.watched.clear();
}

/// `true` if every watched key still has the version recorded at watch
/// time — `EXEC` proceeds only when this holds.
pub fn watch_still_valid(txn: &TxnState, engine: &KeyspaceEngine) -> bool {
    txn.watched.iter().all(|(key, version)| engine.version_of(key) == *version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::entry::Kind;
    use crate::error::CoreError;

    fn engine() -> KeyspaceEngine {
        KeyspaceEngine::new(16)
    }

    #[test]
    fn watch_detects_concurrent_mutation() {
        let e = engine();
        let k = Bytes::from("k");
        e.with_write_or_insert(&k, || Kind::Str(Bytes::from("v")), |_| Ok::<_, CoreError>(())).unwrap();

        let mut txn = TxnState::default();
        watch(&mut txn, &e, &[k.clone()]);
        assert!(watch_still_valid(&txn, &e));

        e.with_write(&k, |entry| entry.bump_version());
        assert!(!watch_still_valid(&txn, &e));
    }

    #[test]
    fn unwatch_clears_fingerprints() {
        let e = engine();
        let k = Bytes::from("k");
        let mut txn = TxnState::default();
        watch(&mut txn, &e, &[k]);
        unwatch(&mut txn);
        assert!(txn.watched.is_empty());
    }

    #[test]
    fn watching_same_key_twice_is_idempotent() {
        let e = engine();
        let k = Bytes::from("k");
        let mut txn = TxnState::default();
        watch(&mut txn, &e, &[k.clone(), k]);
        assert_eq!(txn.watched.len(), 1);
    }
}
