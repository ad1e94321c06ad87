//! Connection-scoped and server-introspection commands.

use super::args;
use super::Dispatcher;
use crate::error::CoreError;
use crate::protocol::RespValue;
use crate::session::ClientSession;
use std::sync::atomic::Ordering;

impl Dispatcher {
    pub(crate) fn cmd_ping(&self, args_in: &[RespValue]) -> RespValue {
        match args_in.first() {
            Some(v) => RespValue::bulk_string(args::bytes(v).unwrap_or_default()),
            None => RespValue::simple_string("PONG"),
        }
    }

    pub(crate) fn cmd_echo(&self, args_in: &[RespValue]) -> RespValue {
        match args_in.first().and_then(args::bytes) {
            Some(b) => RespValue::bulk_string(b),
            None => args::arity_err("ECHO"),
        }
    }

    pub(crate) fn cmd_time(&self, _args_in: &[RespValue]) -> RespValue {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        RespValue::Array(vec![
            RespValue::bulk_string(now.as_secs().to_string()),
            RespValue::bulk_string(now.subsec_micros().to_string()),
        ])
    }

    pub(crate) fn cmd_command(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.first().and_then(args::upper).as_deref() == Some("COUNT") {
            return RespValue::Integer(0);
        }
        RespValue::Array(Vec::new())
    }

    pub(crate) fn cmd_debug(&self, args_in: &[RespValue]) -> RespValue {
        match args_in.first().and_then(args::upper).as_deref() {
            Some("SLEEP") => RespValue::ok(),
            Some("JSONDEBUG") => RespValue::ok(),
            _ => RespValue::ok(),
        }
    }

    pub(crate) fn cmd_select(&self, session: &mut ClientSession, args_in: &[RespValue]) -> RespValue {
        let index = match args_in.first().and_then(args::integer) {
            Some(n) if n >= 0 => n as usize,
            _ => return CoreError::generic("DB index is out of range").into(),
        };
        session.db_index = index;
        RespValue::ok()
    }

    pub(crate) fn cmd_info(&self, args_in: &[RespValue]) -> RespValue {
        let section = args_in.first().and_then(args::string).map(|s| s.to_lowercase());
        let want = |name: &str| section.as_deref().map(|s| s == name).unwrap_or(true);
        let mut out = String::new();

        if want("server") {
            out.push_str("# Server\r\n");
            out.push_str("crystalcache_version:1.0.0\r\n");
            out.push_str(&format!("uptime_in_seconds:{}\r\n", self.shared.start_time.elapsed().as_secs()));
            out.push_str(&format!("tcp_port:{}\r\n", self.shared.config.server.port));
            out.push_str("\r\n");
        }
        if want("clients") {
            out.push_str("# Clients\r\n");
            out.push_str(&format!("connected_clients:{}\r\n", self.shared.clients.connected_count()));
            out.push_str("\r\n");
        }
        if want("stats") {
            let stats = &self.engine().stats;
            out.push_str("# Stats\r\n");
            out.push_str(&format!("total_commands_processed:{}\r\n", self.shared.clients.commands_processed.load(Ordering::Relaxed)));
            out.push_str(&format!("total_connections_received:{}\r\n", self.shared.clients.connections_accepted.load(Ordering::Relaxed)));
            out.push_str(&format!("expired_keys:{}\r\n", stats.expired_count.load(Ordering::Relaxed)));
            out.push_str(&format!("keyspace_hits:{}\r\n", stats.keyspace_hits.load(Ordering::Relaxed)));
            out.push_str(&format!("keyspace_misses:{}\r\n", stats.keyspace_misses.load(Ordering::Relaxed)));
            out.push_str("\r\n");
        }
        if want("persistence") {
            out.push_str("# Persistence\r\n");
            out.push_str(&format!("aof_enabled:{}\r\n", if self.shared.aof.read().unwrap().is_some() { 1 } else { 0 }));
            out.push_str("\r\n");
        }
        if want("replication") {
            let role = self.shared.replication.role();
            out.push_str("# Replication\r\n");
            match role {
                crate::replication::Role::Master => {
                    out.push_str("role:master\r\n");
                    out.push_str(&format!("connected_slaves:{}\r\n", self.shared.replication.replica_count()));
                }
                crate::replication::Role::Replica { master_host, master_port } => {
                    out.push_str("role:slave\r\n");
                    out.push_str(&format!("master_host:{}\r\n", master_host));
                    out.push_str(&format!("master_port:{}\r\n", master_port));
                }
            }
            out.push_str("\r\n");
        }
        if want("keyspace") {
            out.push_str("# Keyspace\r\n");
            out.push_str(&format!("db0:keys={}\r\n", self.engine().dbsize()));
        }

        RespValue::bulk_string(out)
    }
}
