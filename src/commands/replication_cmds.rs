//! `REPLICAOF`/`SLAVEOF`: switches this node's role between master
//! and replica.

use super::args;
use super::Dispatcher;
use crate::protocol::RespValue;

impl Dispatcher {
    pub(crate) fn cmd_replicaof(&self, args_in: &[RespValue]) -> RespValue {
        if args_in.len() != 2 {
            return args::arity_err("REPLICAOF");
        }
        let host = args::string(&args_in[0]).unwrap_or_default();
        if host.eq_ignore_ascii_case("no") {
            if args::string(&args_in[1]).unwrap_or_default().eq_ignore_ascii_case("one") {
                self.shared.replication.promote_to_master();
                return RespValue::ok();
            }
            return crate::error::CoreError::Syntax.into();
        }
        let port = match args::integer(&args_in[1]) {
            Some(n) if n > 0 && n < 65536 => n as u16,
            _ => return crate::error::CoreError::NotAnInteger.into(),
        };
        self.shared.replication.promote_to_replica(host, port);
        RespValue::ok()
    }
}
