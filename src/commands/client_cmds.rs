//! `CLIENT`, `MEMORY`, `MODULE`, `CLUSTER` administrative commands.

use super::args;
use super::Dispatcher;
use crate::protocol::RespValue;
use crate::session::ClientSession;

impl Dispatcher {
    pub(crate) fn cmd_client(&self, session: &mut ClientSession, args_in: &[RespValue]) -> RespValue {
        if args_in.is_empty() {
            return args::arity_err("CLIENT");
        }
        match args::upper(&args_in[0]).as_deref() {
            Some("LIST") => {
                let mut out = String::new();
                for c in self.shared.clients.list() {
                    out.push_str(&format!(
                        "id={} addr={} name={} db={} age={} idle={}\n",
                        c.id,
                        c.addr,
                        c.name.unwrap_or_default(),
                        c.db_index,
                        c.age_secs,
                        c.idle_secs
                    ));
                }
                RespValue::bulk_string(out)
            }
            Some("INFO") => {
                let info = self
                    .shared
                    .clients
                    .list()
                    .into_iter()
                    .find(|c| c.id == session.id);
                match info {
                    Some(c) => RespValue::bulk_string(format!(
                        "id={} addr={} name={} db={} age={} idle={}",
                        c.id,
                        c.addr,
                        c.name.unwrap_or_default(),
                        c.db_index,
                        c.age_secs,
                        c.idle_secs
                    )),
                    None => RespValue::null(),
                }
            }
            Some("ID") => RespValue::Integer(session.id as i64),
            Some("SETNAME") => {
                let name = match args_in.get(1).and_then(args::string) {
                    Some(n) => n,
                    None => return args::arity_err("CLIENT SETNAME"),
                };
                session.name = Some(name.clone());
                self.shared.clients.set_name(session.id, name);
                RespValue::ok()
            }
            Some("GETNAME") => RespValue::bulk_string(session.name.clone().unwrap_or_default()),
            Some("KILL") => {
                let target_id = args_in.get(1).and_then(args::integer).map(|n| n as u64);
                let killed = self.shared.clients.kill_matching(target_id, None);
                RespValue::Integer(killed as i64)
            }
            _ => RespValue::ok(),
        }
    }

    pub(crate) fn cmd_memory(&self, args_in: &[RespValue]) -> RespValue {
        match args_in.first().and_then(args::upper).as_deref() {
            Some("USAGE") => {
                if self.engine().exists(&args_in.get(1).and_then(args::bytes).unwrap_or_default()) {
                    RespValue::Integer(0)
                } else {
                    RespValue::null()
                }
            }
            Some("STATS") => RespValue::Array(vec![
                RespValue::bulk_string("keys.count"),
                RespValue::Integer(self.engine().dbsize() as i64),
            ]),
            Some("PURGE") => RespValue::ok(),
            _ => RespValue::ok(),
        }
    }

    pub(crate) fn cmd_module(&self, args_in: &[RespValue]) -> RespValue {
        match args_in.first().and_then(args::upper).as_deref() {
            Some("LIST") => RespValue::Array(Vec::new()),
            _ => RespValue::ok(),
        }
    }

    pub(crate) fn cmd_cluster(&self, args_in: &[RespValue]) -> RespValue {
        match args_in.first().and_then(args::upper).as_deref() {
            Some("INFO") => RespValue::bulk_string(format!(
                "cluster_enabled:{}\r\ncluster_state:ok\r\n",
                if self.shared.config.cluster.enabled { 1 } else { 0 }
            )),
            Some("NODES") => RespValue::bulk_string(""),
            Some("SLOTS") => RespValue::Array(Vec::new()),
            _ => RespValue::ok(),
        }
    }
}
